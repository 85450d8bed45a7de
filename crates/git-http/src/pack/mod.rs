//! Packfile read (`indexPack`) and write (`packObjects`) per spec §4.3 / §4.4.3.
//!
//! Grounded on `web3infra-foundation-git-internal/src/internal/pack`'s
//! entry-header framing and `andyyu2004-bit`'s delta-application shape, with
//! this crate's own `.idx` format (see [`idx`]): a simplified, sorted,
//! self-contained table that is sufficient for this crate's own
//! `readObject` lookups rather than a bit-for-bit reimplementation of git's
//! on-disk pack-index format, which spec.md does not mandate.

pub mod idx;
mod reader;
mod writer;

pub use reader::{index_pack, IndexedObject, IndexedPack};
pub use writer::{object_count_from_header, pack_objects};

pub const PACK_SIGNATURE: &[u8; 4] = b"PACK";
pub const PACK_VERSION: u32 = 2;

const OBJ_COMMIT: u8 = 1;
const OBJ_TREE: u8 = 2;
const OBJ_BLOB: u8 = 3;
const OBJ_TAG: u8 = 4;
const OBJ_OFS_DELTA: u8 = 6;
const OBJ_REF_DELTA: u8 = 7;

use crate::objects::ObjectKind;

fn type_code(kind: ObjectKind) -> u8 {
    match kind {
        ObjectKind::Commit => OBJ_COMMIT,
        ObjectKind::Tree => OBJ_TREE,
        ObjectKind::Blob => OBJ_BLOB,
        ObjectKind::Tag => OBJ_TAG,
    }
}

fn kind_from_code(code: u8) -> Option<ObjectKind> {
    match code {
        OBJ_COMMIT => Some(ObjectKind::Commit),
        OBJ_TREE => Some(ObjectKind::Tree),
        OBJ_BLOB => Some(ObjectKind::Blob),
        OBJ_TAG => Some(ObjectKind::Tag),
        _ => None,
    }
}
