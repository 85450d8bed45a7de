use std::collections::HashMap;
use std::io::{Cursor, Read};

use flate2::read::ZlibDecoder;
use sha1::{Digest, Sha1};

use crate::delta::apply_delta;
use crate::errors::GitError;
use crate::objects::ObjectKind;
use crate::oid::Oid;

use super::{kind_from_code, OBJ_OFS_DELTA, OBJ_REF_DELTA, PACK_SIGNATURE, PACK_VERSION};

#[derive(Debug, Clone)]
pub struct IndexedObject {
    pub kind: ObjectKind,
    pub content: Vec<u8>,
}

#[derive(Debug, Default)]
pub struct IndexedPack {
    pub objects: HashMap<Oid, IndexedObject>,
    pub object_count: usize,
}

enum RawEntry {
    Base(ObjectKind, Vec<u8>),
    OfsDelta(usize, Vec<u8>),
    RefDelta(Oid, Vec<u8>),
}

/// Parse, verify, and fully materialize an inbound packfile (spec §4.3
/// `indexPack`): signature, version, per-entry type+size header,
/// `OFS_DELTA`/`REF_DELTA` materialization against in-pack bases, and
/// trailing SHA-1 verification. Assumes a self-contained (non-thin) pack,
/// matching the `no-thin` capability this server advertises for
/// receive-pack.
pub fn index_pack(raw: &[u8]) -> Result<IndexedPack, GitError> {
    if raw.len() < 12 {
        return Err(GitError::Unpack("pack shorter than header".into()));
    }
    if &raw[0..4] != PACK_SIGNATURE {
        return Err(GitError::Unpack("bad pack signature".into()));
    }
    let version = u32::from_be_bytes(raw[4..8].try_into().unwrap());
    if version != PACK_VERSION {
        return Err(GitError::Unpack(format!("unsupported pack version {version}")));
    }
    let count = u32::from_be_bytes(raw[8..12].try_into().unwrap()) as usize;

    let mut pos = 12usize;
    let mut entries: Vec<RawEntry> = Vec::with_capacity(count);
    let mut offset_to_index: HashMap<usize, usize> = HashMap::with_capacity(count);

    for i in 0..count {
        let entry_start = pos;
        offset_to_index.insert(entry_start, i);

        let first = *raw.get(pos).ok_or_else(|| GitError::Unpack("truncated entry header".into()))?;
        pos += 1;
        let type_code = (first >> 4) & 0x7;
        let mut size = (first & 0x0f) as usize;
        let mut shift = 4u32;
        let mut more = first & 0x80 != 0;
        while more {
            let byte = *raw.get(pos).ok_or_else(|| GitError::Unpack("truncated entry size".into()))?;
            pos += 1;
            size |= ((byte & 0x7f) as usize) << shift;
            shift += 7;
            more = byte & 0x80 != 0;
        }

        let entry = if type_code == OBJ_OFS_DELTA {
            let offset_val = read_ofs_delta_offset(raw, &mut pos)?;
            let base_offset = entry_start
                .checked_sub(offset_val)
                .ok_or_else(|| GitError::Unpack("OFS_DELTA offset underflows pack start".into()))?;
            let delta = inflate_exact(raw, &mut pos, size)?;
            RawEntry::OfsDelta(base_offset, delta)
        } else if type_code == OBJ_REF_DELTA {
            if pos + 20 > raw.len() {
                return Err(GitError::Unpack("truncated REF_DELTA base oid".into()));
            }
            let mut buf = [0u8; 20];
            buf.copy_from_slice(&raw[pos..pos + 20]);
            pos += 20;
            let base_oid = Oid::from_bytes(buf);
            let delta = inflate_exact(raw, &mut pos, size)?;
            RawEntry::RefDelta(base_oid, delta)
        } else {
            let kind = kind_from_code(type_code)
                .ok_or_else(|| GitError::Unpack(format!("unknown pack entry type {type_code}")))?;
            let content = inflate_exact(raw, &mut pos, size)?;
            RawEntry::Base(kind, content)
        };
        entries.push(entry);
    }

    if pos + 20 != raw.len() {
        return Err(GitError::Unpack("trailing bytes don't match expected SHA-1 trailer length".into()));
    }
    let mut hasher = Sha1::new();
    hasher.update(&raw[..pos]);
    let computed = hasher.finalize();
    if computed.as_slice() != &raw[pos..pos + 20] {
        return Err(GitError::Unpack("pack trailer SHA-1 mismatch".into()));
    }

    materialize(entries, &offset_to_index, count)
}

fn materialize(
    entries: Vec<RawEntry>,
    offset_to_index: &HashMap<usize, usize>,
    count: usize,
) -> Result<IndexedPack, GitError> {
    let mut resolved: Vec<Option<(ObjectKind, Vec<u8>)>> = vec![None; entries.len()];
    for (i, entry) in entries.iter().enumerate() {
        if let RawEntry::Base(kind, content) = entry {
            resolved[i] = Some((*kind, content.clone()));
        }
    }

    let mut by_oid: HashMap<Oid, usize> = HashMap::new();
    for (i, slot) in resolved.iter().enumerate() {
        if let Some((kind, content)) = slot {
            by_oid.insert(Oid::hash_object(kind.as_str(), content), i);
        }
    }

    let mut progressed = true;
    while progressed {
        progressed = false;
        for (i, entry) in entries.iter().enumerate() {
            if resolved[i].is_some() {
                continue;
            }
            let base_idx = match entry {
                RawEntry::Base(..) => unreachable!(),
                RawEntry::OfsDelta(base_offset, _) => offset_to_index.get(base_offset).copied(),
                RawEntry::RefDelta(base_oid, _) => by_oid.get(base_oid).copied(),
            };
            let Some(base_idx) = base_idx else { continue };
            let Some((base_kind, base_content)) = resolved[base_idx].clone() else { continue };
            let delta = match entry {
                RawEntry::OfsDelta(_, d) | RawEntry::RefDelta(_, d) => d,
                RawEntry::Base(..) => unreachable!(),
            };
            let content = apply_delta(&base_content, delta)
                .map_err(|e| GitError::Unpack(format!("delta application failed: {e}")))?;
            let oid = Oid::hash_object(base_kind.as_str(), &content);
            by_oid.insert(oid, i);
            resolved[i] = Some((base_kind, content));
            progressed = true;
        }
    }

    let mut objects = HashMap::with_capacity(resolved.len());
    for slot in resolved {
        let (kind, content) =
            slot.ok_or_else(|| GitError::Unpack("pack contains an unresolved delta chain".into()))?;
        let oid = Oid::hash_object(kind.as_str(), &content);
        objects.insert(oid, IndexedObject { kind, content });
    }

    Ok(IndexedPack { objects, object_count: count })
}

/// Git's offset-delta varint: distinct from the standard LEB128 used
/// elsewhere in the pack format (each continuation adds 1 before shifting).
fn read_ofs_delta_offset(raw: &[u8], pos: &mut usize) -> Result<usize, GitError> {
    let first = *raw.get(*pos).ok_or_else(|| GitError::Unpack("truncated OFS_DELTA offset".into()))?;
    *pos += 1;
    let mut value = (first & 0x7f) as usize;
    let mut more = first & 0x80 != 0;
    while more {
        let byte = *raw.get(*pos).ok_or_else(|| GitError::Unpack("truncated OFS_DELTA offset".into()))?;
        *pos += 1;
        value += 1;
        value = (value << 7) | (byte & 0x7f) as usize;
        more = byte & 0x80 != 0;
    }
    Ok(value)
}

fn inflate_exact(raw: &[u8], pos: &mut usize, decompressed_len: usize) -> Result<Vec<u8>, GitError> {
    let cursor = Cursor::new(&raw[*pos..]);
    let mut decoder = ZlibDecoder::new(cursor);
    let mut out = vec![0u8; decompressed_len];
    decoder
        .read_exact(&mut out)
        .map_err(|e| GitError::Unpack(format!("zlib inflate failed: {e}")))?;
    let consumed = decoder.get_ref().position() as usize;
    *pos += consumed;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::super::writer::pack_objects;
    use super::*;
    use crate::objects::RawObject;

    #[test]
    fn round_trips_a_simple_pack() {
        let blob = RawObject { kind: ObjectKind::Blob, content: b"hello\n".to_vec() };
        let oid = blob.oid();
        let raw = pack_objects(&[(oid, blob.clone())]).unwrap();
        let indexed = index_pack(&raw).unwrap();
        assert_eq!(indexed.object_count, 1);
        let got = indexed.objects.get(&oid).unwrap();
        assert_eq!(got.content, blob.content);
        assert_eq!(got.kind, ObjectKind::Blob);
    }

    #[test]
    fn rejects_bad_signature() {
        let mut raw = vec![0u8; 20];
        raw[0..4].copy_from_slice(b"NOPE");
        assert!(index_pack(&raw).is_err());
    }

    #[test]
    fn rejects_corrupted_trailer() {
        let blob = RawObject { kind: ObjectKind::Blob, content: b"x".to_vec() };
        let oid = blob.oid();
        let mut raw = pack_objects(&[(oid, blob)]).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0xff;
        assert!(index_pack(&raw).is_err());
    }
}
