//! Capability advertisement — `GET info/refs?service=…` (spec §4.4.1).

use crate::errors::GitError;
use crate::gitobjects::GitObjects;
use crate::oid::ZERO_OID;
use crate::pkt;

pub const AGENT: &str = "git-http-core/0.1.0";

/// v2 advertisement for `git-upload-pack`. Static: doesn't depend on repo state.
pub fn upload_pack_v2() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(pkt::encode_str("version 2\n").expect("static capability line fits a pkt-line"));
    out.extend(
        pkt::encode_str(&format!("agent={AGENT}\n")).expect("static capability line fits a pkt-line"),
    );
    out.extend(pkt::encode_str("ls-refs\n").expect("static capability line fits a pkt-line"));
    out.extend(pkt::encode_str("fetch\n").expect("static capability line fits a pkt-line"));
    out.extend(pkt::encode_str("side-band-64k\n").expect("static capability line fits a pkt-line"));
    out.extend(pkt::encode_str("object-format=sha1\n").expect("static capability line fits a pkt-line"));
    out.extend(pkt::encode_flush());
    out
}

/// v0/v1 advertisement for `git-receive-pack`: the compatibility path,
/// refs included inline with capabilities riding the first ref line.
pub async fn receive_pack_v0(objects: &GitObjects) -> Result<Vec<u8>, GitError> {
    let listing = objects.list_refs().await?;

    let mut caps = format!("report-status delete-refs atomic no-thin agent={AGENT}");
    if let Some(target) = &listing.symbolic_head {
        caps.push_str(&format!(" symref=HEAD:{target}"));
    }

    let mut out = Vec::new();
    out.extend(pkt::encode_str("# service=git-receive-pack\n").map_err(GitError::internal)?);
    out.extend(pkt::encode_flush());

    if listing.refs.is_empty() {
        let line = format!("{ZERO_OID} capabilities^{{}}\0{caps}\n");
        out.extend(pkt::encode_str(&line).map_err(GitError::internal)?);
    } else {
        let first = &listing.refs[0];
        let line = format!("{} {}\0{caps}\n", first.oid, first.name);
        out.extend(pkt::encode_str(&line).map_err(GitError::internal)?);
        for r in &listing.refs[1..] {
            out.extend(pkt::encode_str(&format!("{} {}\n", r.oid, r.name)).map_err(GitError::internal)?);
        }
    }
    out.extend(pkt::encode_flush());

    Ok(out)
}
