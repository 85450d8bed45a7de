//! v2 `ls-refs` command (spec §4.4.2).

use crate::errors::GitError;
use crate::gitobjects::GitObjects;
use crate::negotiation;
use crate::objects::{ObjectKind, Tag};
use crate::oid::Oid;
use crate::pkt;

pub async fn handle(objects: &GitObjects, arg_lines: &[String]) -> Result<Vec<u8>, GitError> {
    let args = negotiation::parse_ls_refs_args(arg_lines);
    let listing = objects.list_refs().await?;

    let mut out = Vec::new();
    for r in &listing.refs {
        let is_head = r.name == "HEAD";
        if !is_head
            && !args.ref_prefixes.is_empty()
            && !args.ref_prefixes.iter().any(|p| r.name.starts_with(p.as_str()))
        {
            continue;
        }

        let mut line = format!("{} {}", r.oid, r.name);
        if args.symrefs && r.name == "HEAD" {
            if let Some(target) = &listing.symbolic_head {
                line.push_str(&format!(" symref-target:{target}"));
            }
        }
        line.push('\n');
        out.extend(pkt::encode_str(&line).map_err(GitError::internal)?);

        if args.peel && r.name.starts_with("refs/tags/") {
            if let Ok(obj) = objects.read_object(r.oid).await {
                if obj.kind == ObjectKind::Tag {
                    if let Ok(tag) = Tag::parse(&obj.content) {
                        let peeled = peel_to_non_tag(objects, tag.object).await?;
                        let peel_line = format!("{peeled} {}^{{}}\n", r.name);
                        out.extend(pkt::encode_str(&peel_line).map_err(GitError::internal)?);
                    }
                }
            }
        }
    }
    out.extend(pkt::encode_flush());

    Ok(out)
}

async fn peel_to_non_tag(objects: &GitObjects, mut oid: Oid) -> Result<Oid, GitError> {
    loop {
        let obj = objects.read_object(oid).await?;
        if obj.kind != ObjectKind::Tag {
            return Ok(oid);
        }
        oid = Tag::parse(&obj.content).map_err(GitError::internal)?.object;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{RawObject, Signature};
    use crate::pkt::Pkt;
    use crate::refs;
    use crate::store::FsObjectStore;
    use std::sync::Arc;

    fn objects() -> (GitObjects, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn crate::store::ObjectStore> = Arc::new(FsObjectStore::new(dir.path().to_path_buf()));
        (GitObjects::new(store), dir)
    }

    #[tokio::test]
    async fn empty_repo_yields_only_flush() {
        let (go, _dir) = objects();
        go.init().await.unwrap();
        let resp = handle(&go, &[]).await.unwrap();
        let pkts = pkt::decode_all(&resp).unwrap();
        assert_eq!(pkts, vec![Pkt::Flush]);
    }

    #[tokio::test]
    async fn symrefs_reports_head_target() {
        let (go, _dir) = objects();
        go.init().await.unwrap();

        let blob = RawObject { kind: ObjectKind::Blob, content: b"x".to_vec() };
        let blob_oid = go.write_loose_object(&blob).await.unwrap();
        let tree = crate::objects::Tree {
            entries: vec![crate::objects::TreeEntryRaw { mode: "100644".into(), name: "a".into(), oid: blob_oid }],
        };
        let tree_obj = RawObject { kind: ObjectKind::Tree, content: tree.serialize() };
        let tree_oid = go.write_loose_object(&tree_obj).await.unwrap();
        let commit = crate::objects::Commit {
            tree: tree_oid,
            parents: vec![],
            author: Signature { name: "a".into(), email: "a@x.com".into(), time: 1, tz_offset: "+0000".into() },
            committer: Signature { name: "a".into(), email: "a@x.com".into(), time: 1, tz_offset: "+0000".into() },
            message: "c\n".into(),
        };
        let commit_obj = RawObject { kind: ObjectKind::Commit, content: commit.serialize() };
        let commit_oid = go.write_loose_object(&commit_obj).await.unwrap();
        refs::write_ref(&**go.store(), "refs/heads/main", commit_oid).await.unwrap();

        let args = vec!["symrefs".to_string(), "ref-prefix refs/heads/".to_string()];
        let resp = handle(&go, &args).await.unwrap();
        let pkts = pkt::decode_all(&resp).unwrap();
        let first = match &pkts[0] {
            Pkt::Data(d) => String::from_utf8_lossy(d).into_owned(),
            other => panic!("expected data, got {other:?}"),
        };
        assert!(first.starts_with(&format!("{commit_oid} HEAD symref-target:refs/heads/main")));
    }
}
