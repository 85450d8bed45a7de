//! Git object model: commit, tree, blob, tag (spec §3).

use crate::oid::Oid;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Tag => "tag",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ObjectKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(ObjectKind::Commit),
            "tree" => Ok(ObjectKind::Tree),
            "blob" => Ok(ObjectKind::Blob),
            "tag" => Ok(ObjectKind::Tag),
            other => Err(ParseError(format!("unknown object type `{other}`"))),
        }
    }
}

/// An immutable Git object as read from or about to be written to the store.
#[derive(Debug, Clone)]
pub struct RawObject {
    pub kind: ObjectKind,
    pub content: Vec<u8>,
}

impl RawObject {
    pub fn oid(&self) -> Oid {
        Oid::hash_object(self.kind.as_str(), &self.content)
    }

    /// The on-disk loose-object framing: `"<type> <len>\0" || content`.
    pub fn to_loose_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.content.len() + 24);
        out.extend_from_slice(self.kind.as_str().as_bytes());
        out.push(b' ');
        out.extend_from_slice(self.content.len().to_string().as_bytes());
        out.push(0);
        out.extend_from_slice(&self.content);
        out
    }

    pub fn from_loose_bytes(bytes: &[u8]) -> Result<Self, ParseError> {
        let nul = bytes
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| ParseError("loose object missing NUL header terminator".into()))?;
        let header = std::str::from_utf8(&bytes[..nul])
            .map_err(|_| ParseError("loose object header not utf8".into()))?;
        let (kind_str, len_str) = header
            .split_once(' ')
            .ok_or_else(|| ParseError("loose object header missing space".into()))?;
        let kind: ObjectKind = kind_str.parse()?;
        let len: usize = len_str
            .parse()
            .map_err(|_| ParseError("loose object header has non-numeric length".into()))?;
        let content = &bytes[nul + 1..];
        if content.len() != len {
            return Err(ParseError(format!(
                "loose object length mismatch: header says {len}, got {}",
                content.len()
            )));
        }
        Ok(RawObject { kind, content: content.to_vec() })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(pub String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl std::error::Error for ParseError {}

/// `name <email> unix_seconds ±HHMM`
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub time: i64,
    pub tz_offset: String,
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}> {} {}", self.name, self.email, self.time, self.tz_offset)
    }
}

impl Signature {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        // "<name> <<email>> <time> <tz>"
        let email_start = s.find('<').ok_or_else(|| ParseError("signature missing '<'".into()))?;
        let email_end = s.find('>').ok_or_else(|| ParseError("signature missing '>'".into()))?;
        let name = s[..email_start].trim().to_string();
        let email = s[email_start + 1..email_end].to_string();
        let rest = s[email_end + 1..].trim();
        let mut parts = rest.split_whitespace();
        let time: i64 = parts
            .next()
            .ok_or_else(|| ParseError("signature missing timestamp".into()))?
            .parse()
            .map_err(|_| ParseError("signature timestamp not numeric".into()))?;
        let tz_offset = parts
            .next()
            .ok_or_else(|| ParseError("signature missing tz offset".into()))?
            .to_string();
        Ok(Signature { name, email, time, tz_offset })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub author: Signature,
    pub committer: Signature,
    pub message: String,
}

impl Commit {
    pub fn parse(content: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(content).map_err(|_| ParseError("commit body not utf8".into()))?;
        let (header, message) = text
            .split_once("\n\n")
            .map(|(h, m)| (h, m.to_string()))
            .unwrap_or((text, String::new()));

        let mut tree = None;
        let mut parents = Vec::new();
        let mut author = None;
        let mut committer = None;

        for line in header.lines() {
            if let Some(rest) = line.strip_prefix("tree ") {
                tree = Some(rest.parse::<Oid>().map_err(|e| ParseError(e.to_string()))?);
            } else if let Some(rest) = line.strip_prefix("parent ") {
                parents.push(rest.parse::<Oid>().map_err(|e| ParseError(e.to_string()))?);
            } else if let Some(rest) = line.strip_prefix("author ") {
                author = Some(Signature::parse(rest)?);
            } else if let Some(rest) = line.strip_prefix("committer ") {
                committer = Some(Signature::parse(rest)?);
            }
        }

        Ok(Commit {
            tree: tree.ok_or_else(|| ParseError("commit missing tree".into()))?,
            parents,
            author: author.ok_or_else(|| ParseError("commit missing author".into()))?,
            committer: committer.ok_or_else(|| ParseError("commit missing committer".into()))?,
            message,
        })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = String::new();
        out.push_str(&format!("tree {}\n", self.tree));
        for parent in &self.parents {
            out.push_str(&format!("parent {parent}\n"));
        }
        out.push_str(&format!("author {}\n", self.author));
        out.push_str(&format!("committer {}\n", self.committer));
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntryRaw {
    pub mode: String,
    pub name: String,
    pub oid: Oid,
}

impl TreeEntryRaw {
    pub fn kind(&self) -> EntryKind {
        if self.mode == "40000" || self.mode == "040000" {
            EntryKind::Tree
        } else {
            EntryKind::Blob
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tree {
    pub entries: Vec<TreeEntryRaw>,
}

impl Tree {
    pub fn parse(content: &[u8]) -> Result<Self, ParseError> {
        let mut entries = Vec::new();
        let mut rest = content;
        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| ParseError("tree entry missing space".into()))?;
            let mode = std::str::from_utf8(&rest[..space])
                .map_err(|_| ParseError("tree mode not utf8".into()))?
                .to_string();
            let after_mode = &rest[space + 1..];
            let nul = after_mode
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| ParseError("tree entry missing NUL".into()))?;
            let name = std::str::from_utf8(&after_mode[..nul])
                .map_err(|_| ParseError("tree entry name not utf8".into()))?
                .to_string();
            let oid_bytes = &after_mode[nul + 1..];
            if oid_bytes.len() < 20 {
                return Err(ParseError("tree entry truncated oid".into()));
            }
            let mut buf = [0u8; 20];
            buf.copy_from_slice(&oid_bytes[..20]);
            entries.push(TreeEntryRaw { mode, name, oid: Oid::from_bytes(buf) });
            rest = &oid_bytes[20..];
        }
        Ok(Tree { entries })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.oid.as_bytes());
        }
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub object: Oid,
    pub target_kind: ObjectKind,
    pub tag: String,
    pub tagger: Option<Signature>,
    pub message: String,
}

impl Tag {
    pub fn parse(content: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(content).map_err(|_| ParseError("tag body not utf8".into()))?;
        let (header, message) = text
            .split_once("\n\n")
            .map(|(h, m)| (h, m.to_string()))
            .unwrap_or((text, String::new()));

        let mut object = None;
        let mut target_kind = None;
        let mut tag = None;
        let mut tagger = None;

        for line in header.lines() {
            if let Some(rest) = line.strip_prefix("object ") {
                object = Some(rest.parse::<Oid>().map_err(|e| ParseError(e.to_string()))?);
            } else if let Some(rest) = line.strip_prefix("type ") {
                target_kind = Some(rest.parse::<ObjectKind>()?);
            } else if let Some(rest) = line.strip_prefix("tag ") {
                tag = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("tagger ") {
                tagger = Some(Signature::parse(rest)?);
            }
        }

        Ok(Tag {
            object: object.ok_or_else(|| ParseError("tag missing object".into()))?,
            target_kind: target_kind.ok_or_else(|| ParseError("tag missing type".into()))?,
            tag: tag.ok_or_else(|| ParseError("tag missing tag name".into()))?,
            tagger,
            message,
        })
    }
}

/// Binary detection rule from spec §3: any NUL in the first 8,000 bytes.
pub fn is_binary(content: &[u8]) -> bool {
    content.iter().take(8_000).any(|&b| b == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid_of(n: u8) -> Oid {
        Oid::from_bytes([n; 20])
    }

    #[test]
    fn commit_round_trips() {
        let commit = Commit {
            tree: oid_of(1),
            parents: vec![oid_of(2), oid_of(3)],
            author: Signature { name: "A".into(), email: "a@x.com".into(), time: 100, tz_offset: "+0000".into() },
            committer: Signature { name: "B".into(), email: "b@x.com".into(), time: 200, tz_offset: "-0500".into() },
            message: "hello\n".into(),
        };
        let bytes = commit.serialize();
        let parsed = Commit::parse(&bytes).unwrap();
        assert_eq!(parsed, commit);
    }

    #[test]
    fn commit_with_no_parents_is_root() {
        let bytes = format!(
            "tree {}\nauthor A <a@x.com> 1 +0000\ncommitter A <a@x.com> 1 +0000\n\nroot\n",
            oid_of(9)
        );
        let commit = Commit::parse(bytes.as_bytes()).unwrap();
        assert!(commit.parents.is_empty());
    }

    #[test]
    fn tree_round_trips() {
        let tree = Tree {
            entries: vec![
                TreeEntryRaw { mode: "100644".into(), name: "a.txt".into(), oid: oid_of(1) },
                TreeEntryRaw { mode: "40000".into(), name: "sub".into(), oid: oid_of(2) },
            ],
        };
        let bytes = tree.serialize();
        let parsed = Tree::parse(&bytes).unwrap();
        assert_eq!(parsed, tree);
        assert_eq!(parsed.entries[0].kind(), EntryKind::Blob);
        assert_eq!(parsed.entries[1].kind(), EntryKind::Tree);
    }

    #[test]
    fn binary_detection() {
        assert!(!is_binary(b"hello world"));
        assert!(is_binary(b"hello\0world"));
        let mut long = vec![b'a'; 8_001];
        long.push(0);
        assert!(!is_binary(&long)); // NUL past the 8000-byte window
    }

    #[test]
    fn oid_hashing_matches_loose_framing() {
        let raw = RawObject { kind: ObjectKind::Blob, content: b"hello\n".to_vec() };
        assert_eq!(raw.oid().to_hex(), "ce013625030ba8dba906f756967f9e9ca394464a");
        let bytes = raw.to_loose_bytes();
        let back = RawObject::from_loose_bytes(&bytes).unwrap();
        assert_eq!(back.content, raw.content);
        assert_eq!(back.kind, raw.kind);
    }
}
