//! v2 `fetch` command (spec §4.4.2).

use crate::errors::GitError;
use crate::gitobjects::GitObjects;
use crate::negotiation;
use crate::pack;
use crate::pkt::{self, SideBandChannel};

pub async fn handle(objects: &GitObjects, arg_lines: &[String]) -> Result<Vec<u8>, GitError> {
    let args = negotiation::parse_fetch_args(arg_lines)?;

    if let Some(filter) = &args.filter {
        tracing::debug!(%filter, "fetch filter parsed but not honored, returning full pack");
    }

    let common = objects.find_common_commits(&args.haves).await;

    if !args.done {
        let mut out = Vec::new();
        out.extend(pkt::encode_str("acknowledgments\n").map_err(GitError::internal)?);
        if common.is_empty() {
            out.extend(pkt::encode_str("NAK\n").map_err(GitError::internal)?);
        } else {
            for oid in &common {
                out.extend(pkt::encode_str(&format!("ACK {oid}\n")).map_err(GitError::internal)?);
            }
        }
        out.extend(pkt::encode_str("ready\n").map_err(GitError::internal)?);
        out.extend(pkt::encode_delim());
        return Ok(out);
    }

    if args.wants.is_empty() {
        return Ok(pkt::encode_flush());
    }

    let to_send = match objects.collect_objects_for_pack(&args.wants, &args.haves).await {
        Ok(oids) => oids,
        Err(e) => return Ok(want_error_response(&e.to_string())),
    };
    let pack_bytes = objects.pack_objects(&to_send).await?;
    let count = pack::object_count_from_header(&pack_bytes).unwrap_or(to_send.len() as u32);
    metrics::histogram!("git_http.fetch_pack_objects").record(count as f64);
    metrics::histogram!("git_http.fetch_pack_bytes").record(pack_bytes.len() as f64);

    let mut out = Vec::new();
    out.extend(pkt::encode_str("packfile\n").map_err(GitError::internal)?);

    if !args.no_progress {
        out.extend(progress_line(&format!("Counting objects: {count}, done.\r\n")));
        out.extend(progress_line(&format!("Compressing objects: 100% ({count}/{count}), done.\r\n")));
    }

    for chunk in pkt::encode_sideband_chunks(SideBandChannel::PackData, &pack_bytes) {
        out.extend(chunk);
    }

    if !args.no_progress {
        out.extend(progress_line(&format!(
            "Total {count} (delta 0), reused {count} (delta 0), pack-reused 0\r\n"
        )));
    }

    out.extend(pkt::encode_flush());
    Ok(out)
}

fn progress_line(msg: &str) -> Vec<u8> {
    let line = format!("remote: {msg}");
    pkt::encode_sideband_chunks(SideBandChannel::Progress, line.as_bytes())
        .into_iter()
        .flatten()
        .collect()
}

/// A `want` that can't be read still gets a 200 with a `packfile` section
/// (spec §7: "once in upload-pack, a missing want is reported as ERR
/// side-band"), not an HTTP-level error.
fn want_error_response(msg: &str) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend(pkt::encode_str("packfile\n").expect("literal fits a pkt-line"));
    let line = format!("ERR {msg}\n");
    for chunk in pkt::encode_sideband_chunks(SideBandChannel::Error, line.as_bytes()) {
        out.extend(chunk);
    }
    out.extend(pkt::encode_flush());
    out
}
