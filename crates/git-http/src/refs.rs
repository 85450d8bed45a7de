//! Ref storage: resolution, listing, and the bare-repo ref layout (spec §3).

use crate::errors::GitError;
use crate::oid::Oid;
use crate::store::ObjectStore;

const MAX_SYMREF_HOPS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadValue {
    Direct(Oid),
    Symbolic(String),
    Unborn,
}

/// One resolved ref as returned by `listRefs` (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefEntry {
    pub name: String,
    pub oid: Oid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefListing {
    pub refs: Vec<RefEntry>,
    pub symbolic_head: Option<String>,
}

fn ref_path(name: &str) -> String {
    if name == "HEAD" {
        "HEAD".to_string()
    } else {
        name.to_string()
    }
}

async fn read_raw_ref(store: &dyn ObjectStore, name: &str) -> Result<Option<String>, GitError> {
    match store.read(&ref_path(name)).await {
        Ok(bytes) => {
            let text = String::from_utf8(bytes).map_err(|_| GitError::Internal(format!("ref {name} is not utf8")))?;
            Ok(Some(text.trim_end_matches('\n').to_string()))
        }
        Err(crate::store::StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(GitError::internal(e)),
    }
}

/// Read `HEAD` (or any ref file) without following symrefs.
pub async fn read_head(store: &dyn ObjectStore) -> Result<HeadValue, GitError> {
    match read_raw_ref(store, "HEAD").await? {
        None => Ok(HeadValue::Unborn),
        Some(content) => Ok(parse_ref_value(&content)),
    }
}

fn parse_ref_value(content: &str) -> HeadValue {
    if let Some(target) = content.strip_prefix("ref: ") {
        HeadValue::Symbolic(target.trim().to_string())
    } else {
        match content.trim().parse::<Oid>() {
            Ok(oid) => HeadValue::Direct(oid),
            Err(_) => HeadValue::Unborn,
        }
    }
}

/// Recursively resolve symrefs (bounded at 5 hops) to an OID.
pub async fn resolve_ref(store: &dyn ObjectStore, name: &str) -> Result<Oid, GitError> {
    let mut current = name.to_string();
    for _ in 0..MAX_SYMREF_HOPS {
        let raw = read_raw_ref(store, &current)
            .await?
            .ok_or_else(|| GitError::NotFound(format!("ref {current} not found")))?;
        match parse_ref_value(&raw) {
            HeadValue::Direct(oid) => return Ok(oid),
            HeadValue::Symbolic(target) => current = target,
            HeadValue::Unborn => return Err(GitError::NotFound(format!("ref {current} is unborn"))),
        }
    }
    Err(GitError::NotFound(format!("symref chain from {name} exceeded {MAX_SYMREF_HOPS} hops")))
}

/// List refs in the order spec §4.3 demands: HEAD first (if present), then
/// branches in ASCII order, then tags in ASCII order.
pub async fn list_refs(store: &dyn ObjectStore) -> Result<RefListing, GitError> {
    let mut refs = Vec::new();
    let mut symbolic_head = None;

    if let Ok(head_oid) = resolve_ref(store, "HEAD").await {
        refs.push(RefEntry { name: "HEAD".to_string(), oid: head_oid });
        if let HeadValue::Symbolic(target) = read_head(store).await? {
            symbolic_head = Some(target);
        }
    }

    let mut branches = list_namespace(store, "refs/heads").await?;
    branches.sort_by(|a, b| a.name.cmp(&b.name));
    refs.extend(branches);

    let mut tags = list_namespace(store, "refs/tags").await?;
    tags.sort_by(|a, b| a.name.cmp(&b.name));
    refs.extend(tags);

    Ok(RefListing { refs, symbolic_head })
}

async fn list_namespace(store: &dyn ObjectStore, prefix: &str) -> Result<Vec<RefEntry>, GitError> {
    let mut out = Vec::new();
    for path in store.list(prefix).await.map_err(GitError::internal)? {
        let raw = match read_raw_ref(store, &path).await? {
            Some(r) => r,
            None => continue,
        };
        if let HeadValue::Direct(oid) = parse_ref_value(&raw) {
            out.push(RefEntry { name: path, oid });
        }
    }
    Ok(out)
}

pub async fn write_ref(store: &dyn ObjectStore, name: &str, oid: Oid) -> Result<(), GitError> {
    let content = format!("{oid}\n");
    store.write(&ref_path(name), content.as_bytes()).await.map_err(GitError::internal)
}

pub async fn delete_ref(store: &dyn ObjectStore, name: &str) -> Result<(), GitError> {
    store.delete(&ref_path(name)).await.map_err(GitError::internal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsObjectStore;

    fn oid_of(n: u8) -> Oid {
        Oid::from_bytes([n; 20])
    }

    #[tokio::test]
    async fn resolves_direct_ref() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf());
        write_ref(&store, "refs/heads/main", oid_of(1)).await.unwrap();
        assert_eq!(resolve_ref(&store, "refs/heads/main").await.unwrap(), oid_of(1));
    }

    #[tokio::test]
    async fn resolves_symbolic_head() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf());
        store.write("HEAD", b"ref: refs/heads/main\n").await.unwrap();
        write_ref(&store, "refs/heads/main", oid_of(2)).await.unwrap();
        assert_eq!(resolve_ref(&store, "HEAD").await.unwrap(), oid_of(2));
    }

    #[tokio::test]
    async fn unborn_head_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf());
        store.write("HEAD", b"ref: refs/heads/main\n").await.unwrap();
        assert!(resolve_ref(&store, "HEAD").await.is_err());
    }

    #[tokio::test]
    async fn list_refs_orders_head_then_branches_then_tags() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf());
        store.write("HEAD", b"ref: refs/heads/main\n").await.unwrap();
        write_ref(&store, "refs/heads/main", oid_of(1)).await.unwrap();
        write_ref(&store, "refs/heads/alpha", oid_of(2)).await.unwrap();
        write_ref(&store, "refs/tags/v1", oid_of(3)).await.unwrap();
        let listing = list_refs(&store).await.unwrap();
        let names: Vec<_> = listing.refs.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["HEAD", "refs/heads/alpha", "refs/heads/main", "refs/tags/v1"]);
        assert_eq!(listing.symbolic_head.as_deref(), Some("refs/heads/main"));
    }

    #[tokio::test]
    async fn empty_repo_has_no_refs() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsObjectStore::new(dir.path().to_path_buf());
        store.write("HEAD", b"ref: refs/heads/main\n").await.unwrap();
        let listing = list_refs(&store).await.unwrap();
        assert!(listing.refs.is_empty());
    }
}
