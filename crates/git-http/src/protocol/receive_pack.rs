//! v0/v1 `receive-pack` — commands plus a raw packfile (spec §4.4.3).

use crate::errors::GitError;
use crate::gitobjects::{GitObjects, RefCommand, RefUpdateResult};
use crate::negotiation::{self, ReceivePackCapabilities};
use crate::oid::OidParseError;
use crate::pkt::{self, Pkt};

/// Body layout: pkt-line command lines terminated by flush, then the raw
/// packfile bytes (not pkt-line framed).
fn parse_body(body: &[u8]) -> Result<(Vec<RefCommand>, ReceivePackCapabilities, &[u8]), GitError> {
    let mut pos = 0usize;
    let mut commands = Vec::new();
    let mut caps = ReceivePackCapabilities::default();
    let mut first = true;

    loop {
        let (pkt, consumed) =
            pkt::decode(&body[pos..]).map_err(|e| GitError::Protocol(e.to_string()))?;
        pos += consumed;
        match pkt {
            Pkt::Flush => break,
            Pkt::Data(bytes) => {
                let mut line = String::from_utf8_lossy(&bytes).trim_end_matches('\n').to_string();
                if first {
                    first = false;
                    if let Some(nul) = line.find('\0') {
                        caps = negotiation::parse_receive_pack_capabilities(&line[nul + 1..]);
                        line.truncate(nul);
                    }
                }
                let mut parts = line.splitn(3, ' ');
                let old = parts.next().ok_or_else(|| GitError::Protocol("command line missing old oid".into()))?;
                let new = parts.next().ok_or_else(|| GitError::Protocol("command line missing new oid".into()))?;
                let name = parts.next().ok_or_else(|| GitError::Protocol("command line missing ref name".into()))?;
                let old_oid = old.parse().map_err(|e: OidParseError| GitError::Protocol(e.to_string()))?;
                let new_oid = new.parse().map_err(|e: OidParseError| GitError::Protocol(e.to_string()))?;
                commands.push(RefCommand { name: name.to_string(), old_oid, new_oid });
            }
            other => return Err(GitError::Protocol(format!("unexpected pkt in command stream: {other:?}"))),
        }
    }

    Ok((commands, caps, &body[pos..]))
}

pub async fn handle(objects: &GitObjects, body: &[u8]) -> Result<Vec<u8>, GitError> {
    let (commands, caps, pack_bytes) = parse_body(body)?;

    if pack_bytes.is_empty() && commands.is_empty() {
        return Ok(build_report_status(&[], None));
    }

    match objects.index_pack(pack_bytes).await {
        Ok(_count) => {
            let results = objects.apply_ref_updates(&commands, caps.atomic).await?;
            Ok(build_report_status(&results, None))
        }
        Err(e) => Ok(build_report_status(&[], Some(e.to_string()))),
    }
}

fn build_report_status(results: &[RefUpdateResult], unpack_err: Option<String>) -> Vec<u8> {
    let mut out = Vec::new();
    let unpack_line = match unpack_err {
        Some(msg) => format!("unpack {msg}\n"),
        None => "unpack ok\n".to_string(),
    };
    out.extend(pkt::encode_str(&unpack_line).expect("unpack status line fits a pkt-line"));
    for r in results {
        let line = if r.ok {
            format!("ok {}\n", r.name)
        } else {
            format!("ng {} {}\n", r.name, r.reason.as_deref().unwrap_or("failed to update"))
        };
        out.extend(pkt::encode_str(&line).expect("report-status line fits a pkt-line"));
    }
    out.extend(pkt::encode_flush());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::objects::{Commit, ObjectKind, RawObject, Signature};
    use crate::oid::ZERO_OID;
    use crate::pack::pack_objects;
    use crate::store::FsObjectStore;
    use std::sync::Arc;

    fn objects() -> (GitObjects, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn crate::store::ObjectStore> = Arc::new(FsObjectStore::new(dir.path().to_path_buf()));
        (GitObjects::new(store), dir)
    }

    fn build_push_body(oid: crate::oid::Oid, pack_bytes: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        let line = format!("{ZERO_OID} {oid} refs/heads/main\0report-status atomic");
        body.extend(pkt::encode_str(&line).unwrap());
        body.extend(pkt::encode_flush());
        body.extend_from_slice(pack_bytes);
        body
    }

    #[tokio::test]
    async fn first_push_creates_branch() {
        let (go, _dir) = objects();
        go.init().await.unwrap();

        let commit = RawObject { kind: ObjectKind::Commit, content: Commit {
            tree: crate::oid::Oid::hash_object("tree", b""),
            parents: vec![],
            author: Signature { name: "a".into(), email: "a@x.com".into(), time: 1, tz_offset: "+0000".into() },
            committer: Signature { name: "a".into(), email: "a@x.com".into(), time: 1, tz_offset: "+0000".into() },
            message: "c\n".into(),
        }.serialize() };
        let commit_oid = commit.oid();
        let tree = RawObject { kind: ObjectKind::Tree, content: Vec::new() };
        let pack_bytes = pack_objects(&[(tree.oid(), tree), (commit_oid, commit)]).unwrap();

        let body = build_push_body(commit_oid, &pack_bytes);
        let resp = handle(&go, &body).await.unwrap();
        let pkts = pkt::decode_all(&resp).unwrap();
        assert!(matches!(&pkts[0], Pkt::Data(d) if d == b"unpack ok\n"));
        assert!(matches!(&pkts[1], Pkt::Data(d) if d == b"ok refs/heads/main\n"));

        assert_eq!(go.resolve_ref("refs/heads/main").await.unwrap(), commit_oid);
    }

    #[tokio::test]
    async fn bad_pack_reports_unpack_failure_and_touches_no_refs() {
        let (go, _dir) = objects();
        go.init().await.unwrap();
        let oid = crate::oid::Oid::hash_object("blob", b"nope");
        let body = build_push_body(oid, b"not a pack");
        let resp = handle(&go, &body).await.unwrap();
        let pkts = pkt::decode_all(&resp).unwrap();
        let line = match &pkts[0] {
            Pkt::Data(d) => String::from_utf8_lossy(d).into_owned(),
            other => panic!("expected data, got {other:?}"),
        };
        assert!(line.starts_with("unpack "));
        assert!(line != "unpack ok\n");
        assert!(go.resolve_ref("refs/heads/main").await.is_err());
    }
}
