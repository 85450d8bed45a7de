//! ReadAPI (spec §4.7): pure functions over a repo snapshot, used by the
//! browsing layer. Thin shaping on top of [`crate::gitobjects::GitObjects`]'s
//! lower-level `log`/`tree`/`blob`/`commit_with_changes`, which operate on
//! oids directly; this layer resolves refs first.

use crate::errors::GitError;
use crate::gitobjects::{CommitInfo, FileChange, GitObjects};
use crate::objects::EntryKind;
use crate::oid::Oid;

#[derive(Debug, Clone, serde::Serialize)]
pub struct TreeEntryInfo {
    pub name: String,
    pub kind: EntryKind,
    pub oid: Oid,
    pub last_commit: Option<CommitInfo>,
}

#[derive(Debug, Clone)]
pub struct BlobInfo {
    pub oid: Oid,
    pub content: Vec<u8>,
    pub size: usize,
    pub is_binary: bool,
}

pub async fn branches(objects: &GitObjects) -> Result<Vec<String>, GitError> {
    let listing = objects.list_refs().await?;
    Ok(listing
        .refs
        .iter()
        .filter_map(|r| r.name.strip_prefix("refs/heads/"))
        .map(str::to_string)
        .collect())
}

pub async fn current_branch(objects: &GitObjects) -> Result<Option<String>, GitError> {
    match objects.symbolic_head().await? {
        Some(target) => Ok(target.strip_prefix("refs/heads/").map(str::to_string)),
        None => Ok(None),
    }
}

/// Newest first along first-parent-then-parents order (spec §4.7).
pub async fn log(
    objects: &GitObjects,
    ref_name: Option<&str>,
    depth: Option<usize>,
    path: Option<&str>,
) -> Result<Vec<CommitInfo>, GitError> {
    let start = objects.resolve_ref(ref_name.unwrap_or("HEAD")).await?;
    objects.log(start, depth, path).await
}

pub async fn tree(objects: &GitObjects, ref_name: &str, path: Option<&str>) -> Result<Vec<TreeEntryInfo>, GitError> {
    let commit_oid = objects.resolve_ref(ref_name).await?;
    let tree_oid = objects.commit_tree_oid(commit_oid).await?;
    let entries = objects.tree(tree_oid, path).await?;

    let mut out = Vec::with_capacity(entries.len());
    for entry in entries {
        let entry_path = match path {
            Some(p) if !p.is_empty() => format!("{p}/{}", entry.name),
            _ => entry.name.clone(),
        };
        let last_commit = objects
            .log(commit_oid, Some(1), Some(&entry_path))
            .await
            .ok()
            .and_then(|mut v| if v.is_empty() { None } else { Some(v.remove(0)) });
        out.push(TreeEntryInfo { name: entry.name, kind: entry.kind(), oid: entry.oid, last_commit });
    }
    Ok(out)
}

pub async fn blob(objects: &GitObjects, ref_name: &str, path: &str) -> Result<BlobInfo, GitError> {
    let commit_oid = objects.resolve_ref(ref_name).await?;
    let tree_oid = objects.commit_tree_oid(commit_oid).await?;
    let obj = objects.blob(tree_oid, path).await?;
    Ok(BlobInfo {
        oid: obj.oid(),
        size: obj.content.len(),
        is_binary: crate::objects::is_binary(&obj.content),
        content: obj.content,
    })
}

pub async fn commit_with_changes(objects: &GitObjects, oid: Oid) -> Result<(CommitInfo, Vec<FileChange>), GitError> {
    objects.commit_with_changes(oid).await
}
