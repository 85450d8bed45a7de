//! Git Smart HTTP server library: wires `git_http`'s protocol-pure core to a
//! concrete `ObjectStore`, a static-config `AuthZ`, and an axum router.

pub mod authz;
pub mod config;
pub mod metrics_exporter;
pub mod router;
pub mod storage;
pub mod validation;
