//! This crate's `.idx` sibling format.
//!
//! Not a reimplementation of git's on-disk pack-index — spec.md only
//! requires that a pack is never visible to readers without its index
//! written (§4.2) and that `readObject` can find pack-sourced objects
//! (§4.3). This format stores the fully materialized object set produced by
//! [`super::index_pack`] directly, sorted by oid, so lookups are a binary
//! search with no delta resolution needed at read time.

use std::collections::HashMap;

use crate::errors::GitError;
use crate::objects::ObjectKind;
use crate::oid::Oid;

use super::reader::IndexedObject;
use super::kind_from_code;

const MAGIC: &[u8; 4] = b"GHX2";

pub fn write_idx(objects: &HashMap<Oid, IndexedObject>) -> Vec<u8> {
    let mut sorted: Vec<(&Oid, &IndexedObject)> = objects.iter().collect();
    sorted.sort_by_key(|(oid, _)| **oid);

    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(sorted.len() as u32).to_be_bytes());
    for (oid, obj) in sorted {
        out.extend_from_slice(oid.as_bytes());
        out.push(super::type_code(obj.kind));
        out.extend_from_slice(&(obj.content.len() as u64).to_be_bytes());
        out.extend_from_slice(&obj.content);
    }
    out
}

pub fn read_idx(bytes: &[u8]) -> Result<HashMap<Oid, IndexedObject>, GitError> {
    if bytes.len() < 8 || &bytes[0..4] != MAGIC {
        return Err(GitError::Internal("bad .idx magic".into()));
    }
    let count = u32::from_be_bytes(bytes[4..8].try_into().unwrap()) as usize;
    let mut pos = 8;
    let mut objects = HashMap::with_capacity(count);
    for _ in 0..count {
        if pos + 29 > bytes.len() {
            return Err(GitError::Internal("truncated .idx entry".into()));
        }
        let mut oid_bytes = [0u8; 20];
        oid_bytes.copy_from_slice(&bytes[pos..pos + 20]);
        let oid = Oid::from_bytes(oid_bytes);
        pos += 20;
        let kind_code = bytes[pos];
        pos += 1;
        let kind: ObjectKind = kind_from_code(kind_code)
            .ok_or_else(|| GitError::Internal(format!("bad .idx object kind {kind_code}")))?;
        let len = u64::from_be_bytes(bytes[pos..pos + 8].try_into().unwrap()) as usize;
        pos += 8;
        if pos + len > bytes.len() {
            return Err(GitError::Internal("truncated .idx content".into()));
        }
        let content = bytes[pos..pos + len].to_vec();
        pos += len;
        objects.insert(oid, IndexedObject { kind, content });
    }
    Ok(objects)
}
