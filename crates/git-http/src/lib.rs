//! Protocol-pure Git Smart HTTP core: wire framing, object model, packfile
//! read/write, ref storage, per-repo actor, and the derived read API that
//! backs a browsing layer. `crates/server` wires this library to a concrete
//! `ObjectStore`/`AuthZ` and an axum router.

pub mod actor;
pub mod cache;
pub mod delta;
pub mod errors;
pub mod gitobjects;
pub mod negotiation;
pub mod objects;
pub mod oid;
pub mod pack;
pub mod pkt;
pub mod protocol;
pub mod readapi;
pub mod refs;
pub mod repo;
pub mod store;

pub use errors::{GitError, GitHttpError};
pub use oid::{Oid, ZERO_OID};
