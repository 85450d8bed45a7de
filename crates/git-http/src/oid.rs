//! 40-hex Git object identifiers.

use std::fmt;
use std::str::FromStr;

use sha1::{Digest, Sha1};

/// A 40-character lowercase hex SHA-1 object id.
///
/// Equality is byte-equal on the decoded 20-byte digest, so two `Oid`s
/// constructed from differently-cased hex still compare equal.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid([u8; 20]);

/// The all-zero oid used on the wire for "no object" (ref create/delete).
pub const ZERO_OID: Oid = Oid([0u8; 20]);

impl Oid {
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Oid(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 20]
    }

    /// Hash `"<kind> <len>\0" || content` the way every Git object is addressed.
    pub fn hash_object(kind: &str, content: &[u8]) -> Oid {
        let mut hasher = Sha1::new();
        hasher.update(kind.as_bytes());
        hasher.update(b" ");
        hasher.update(content.len().to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(content);
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Oid(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.0)
    }
}

impl serde::Serialize for Oid {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({})", self.to_hex())
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum OidParseError {
    #[error("oid must be exactly 40 hex characters, got {0}")]
    BadLength(usize),
    #[error("oid contains non-hex characters")]
    NotHex,
}

impl FromStr for Oid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(OidParseError::BadLength(s.len()));
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_val(chunk[0]).ok_or(OidParseError::NotHex)?;
            let lo = hex_val(chunk[1]).ok_or(OidParseError::NotHex)?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Oid(bytes))
    }
}

fn hex_val(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0xf) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_oid_is_forty_zeroes() {
        assert_eq!(ZERO_OID.to_hex(), "0".repeat(40));
    }

    #[test]
    fn round_trips_through_hex() {
        let oid = Oid::hash_object("blob", b"hello\n");
        let parsed: Oid = oid.to_hex().parse().unwrap();
        assert_eq!(oid, parsed);
    }

    #[test]
    fn rejects_bad_length() {
        assert!(matches!("abcd".parse::<Oid>(), Err(OidParseError::BadLength(4))));
    }

    #[test]
    fn rejects_non_hex() {
        let bad = "z".repeat(40);
        assert!(matches!(bad.parse::<Oid>(), Err(OidParseError::NotHex)));
    }

    #[test]
    fn known_blob_hash() {
        // git hash-object for a blob containing "hello\n"
        let oid = Oid::hash_object("blob", b"hello\n");
        assert_eq!(oid.to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
    }
}
