use flate2::write::ZlibEncoder;
use flate2::Compression;
use sha1::{Digest, Sha1};
use std::io::Write;

use crate::errors::GitError;
use crate::objects::RawObject;
use crate::oid::Oid;

use super::{type_code, PACK_SIGNATURE, PACK_VERSION};

/// Emit a valid `PACK` v2 file containing exactly the given objects, all as
/// non-delta (full) entries, with a trailing SHA-1 (spec §4.3 `packObjects`,
/// §9 thin-pack design note: this core never emits delta objects).
pub fn pack_objects(objects: &[(Oid, RawObject)]) -> Result<Vec<u8>, GitError> {
    let mut out = Vec::new();
    out.extend_from_slice(PACK_SIGNATURE);
    out.extend_from_slice(&PACK_VERSION.to_be_bytes());
    out.extend_from_slice(&(objects.len() as u32).to_be_bytes());

    for (_, obj) in objects {
        write_entry_header(&mut out, type_code(obj.kind), obj.content.len());
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(&obj.content)
            .map_err(|e| GitError::internal(format!("zlib deflate failed: {e}")))?;
        let compressed = encoder
            .finish()
            .map_err(|e| GitError::internal(format!("zlib deflate finish failed: {e}")))?;
        out.extend_from_slice(&compressed);
    }

    let mut hasher = Sha1::new();
    hasher.update(&out);
    let trailer = hasher.finalize();
    out.extend_from_slice(&trailer);
    Ok(out)
}

fn write_entry_header(out: &mut Vec<u8>, type_code: u8, mut len: usize) {
    let mut first = (type_code << 4) | (len & 0x0f) as u8;
    len >>= 4;
    if len > 0 {
        first |= 0x80;
    }
    out.push(first);
    while len > 0 {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }
}

/// Read the big-endian uint32 object count from a pack's 12-byte header
/// (offset 8, after the 4-byte `PACK` magic and 4-byte version) — used for
/// the `remote: Counting objects: N` progress lines in fetch responses.
pub fn object_count_from_header(pack: &[u8]) -> Option<u32> {
    if pack.len() < 12 || &pack[0..4] != PACK_SIGNATURE {
        return None;
    }
    Some(u32::from_be_bytes(pack[8..12].try_into().ok()?))
}
