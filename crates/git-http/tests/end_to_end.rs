//! End-to-end scenarios driven through `RepoActor`, exercising the wire
//! protocol the way a real client would: advertise, negotiate, push, clone.

use std::sync::Arc;

use git_http::actor::RepoActor;
use git_http::objects::{Commit, ObjectKind, RawObject, Signature, Tree, TreeEntryRaw};
use git_http::oid::{Oid, ZERO_OID};
use git_http::pack::pack_objects;
use git_http::pkt::{self, Pkt};
use git_http::store::{FsObjectStore, ObjectStore};

fn sig(name: &str, t: i64) -> Signature {
    Signature { name: name.into(), email: format!("{name}@x.com"), time: t, tz_offset: "+0000".into() }
}

async fn actor() -> (RepoActor, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(dir.path().to_path_buf()));
    (RepoActor::new(store).await.unwrap(), dir)
}

fn root_commit_pack() -> (Oid, Vec<u8>) {
    let blob = RawObject { kind: ObjectKind::Blob, content: b"hello\n".to_vec() };
    let tree = Tree { entries: vec![TreeEntryRaw { mode: "100644".into(), name: "a.txt".into(), oid: blob.oid() }] };
    let tree_obj = RawObject { kind: ObjectKind::Tree, content: tree.serialize() };
    let commit = Commit {
        tree: tree_obj.oid(),
        parents: vec![],
        author: sig("a", 1),
        committer: sig("a", 1),
        message: "root\n".into(),
    };
    let commit_obj = RawObject { kind: ObjectKind::Commit, content: commit.serialize() };
    let commit_oid = commit_obj.oid();
    let pack = pack_objects(&[(blob.oid(), blob), (tree_obj.oid(), tree_obj), (commit_oid, commit_obj)]).unwrap();
    (commit_oid, pack)
}

fn receive_pack_body(old: Oid, new: Oid, name: &str, pack: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    let line = format!("{old} {new} {name}\0report-status atomic");
    body.extend(pkt::encode_str(&line).unwrap());
    body.extend(pkt::encode_flush());
    body.extend_from_slice(pack);
    body
}

#[tokio::test]
async fn init_then_empty_ls_refs_yields_flush_only() {
    let (actor, _dir) = actor().await;
    let listing = actor.list_refs().await.unwrap();
    assert!(listing.refs.is_empty());

    let mut body = Vec::new();
    body.extend(pkt::encode_str("command=ls-refs\n").unwrap());
    body.extend(pkt::encode_delim());
    body.extend(pkt::encode_flush());
    let resp = actor.upload_pack(&body).await.unwrap();
    let pkts = pkt::decode_all(&resp).unwrap();
    assert_eq!(pkts, vec![Pkt::Flush]);
}

#[tokio::test]
async fn push_then_clone_round_trips_the_commit() {
    let (actor, _dir) = actor().await;
    let (commit_oid, pack) = root_commit_pack();

    let push_body = receive_pack_body(ZERO_OID, commit_oid, "refs/heads/main", &pack);
    let push_resp = actor.receive_pack(&push_body).await.unwrap();
    let pkts = pkt::decode_all(&push_resp).unwrap();
    assert!(matches!(&pkts[0], Pkt::Data(d) if d == b"unpack ok\n"));
    assert!(matches!(&pkts[1], Pkt::Data(d) if d == b"ok refs/heads/main\n"));

    let listing = actor.list_refs().await.unwrap();
    assert_eq!(listing.refs.len(), 1);
    assert_eq!(listing.refs[0].oid, commit_oid);

    let mut fetch_body = Vec::new();
    fetch_body.extend(pkt::encode_str("command=fetch\n").unwrap());
    fetch_body.extend(pkt::encode_delim());
    fetch_body.extend(pkt::encode_str(&format!("want {commit_oid}\n")).unwrap());
    fetch_body.extend(pkt::encode_str("done\n").unwrap());
    fetch_body.extend(pkt::encode_flush());

    let fetch_resp = actor.upload_pack(&fetch_body).await.unwrap();
    let fetch_pkts = pkt::decode_all(&fetch_resp).unwrap();
    assert!(matches!(&fetch_pkts[0], Pkt::Data(d) if d == b"packfile\n"));
    assert_eq!(*fetch_pkts.last().unwrap(), Pkt::Flush);
}

#[tokio::test]
async fn non_fast_forward_push_is_rejected_and_ref_is_unchanged() {
    let (actor, _dir) = actor().await;
    let (root_oid, root_pack) = root_commit_pack();
    let push_body = receive_pack_body(ZERO_OID, root_oid, "refs/heads/main", &root_pack);
    actor.receive_pack(&push_body).await.unwrap();

    let other_tree_obj = RawObject { kind: ObjectKind::Tree, content: Vec::new() };
    let other_commit_obj = RawObject {
        kind: ObjectKind::Commit,
        content: Commit {
            tree: other_tree_obj.oid(),
            parents: vec![],
            author: sig("b", 5),
            committer: sig("b", 5),
            message: "unrelated\n".into(),
        }
        .serialize(),
    };
    let other_oid = other_commit_obj.oid();
    let pack = pack_objects(&[(other_tree_obj.oid(), other_tree_obj), (other_oid, other_commit_obj)]).unwrap();

    let bad_push = receive_pack_body(root_oid, other_oid, "refs/heads/main", &pack);
    let resp = actor.receive_pack(&bad_push).await.unwrap();
    let pkts = pkt::decode_all(&resp).unwrap();
    assert!(matches!(&pkts[0], Pkt::Data(d) if d == b"unpack ok\n"));
    let line = match &pkts[1] {
        Pkt::Data(d) => String::from_utf8_lossy(d).into_owned(),
        other => panic!("expected data, got {other:?}"),
    };
    assert!(line.starts_with("ng refs/heads/main"));

    let listing = actor.list_refs().await.unwrap();
    assert_eq!(listing.refs[0].oid, root_oid);
}

#[tokio::test]
async fn deleting_a_branch_removes_it_from_listing() {
    let (actor, _dir) = actor().await;
    let (root_oid, pack) = root_commit_pack();
    actor.receive_pack(&receive_pack_body(ZERO_OID, root_oid, "refs/heads/main", &pack)).await.unwrap();

    let delete_body = receive_pack_body(root_oid, ZERO_OID, "refs/heads/main", &[]);
    let resp = actor.receive_pack(&delete_body).await.unwrap();
    let pkts = pkt::decode_all(&resp).unwrap();
    assert!(matches!(&pkts[1], Pkt::Data(d) if d == b"ok refs/heads/main\n"));

    let listing = actor.list_refs().await.unwrap();
    assert!(listing.refs.is_empty());
}
