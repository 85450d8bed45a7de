//! ProtocolEngine (spec §4.4): the three wire endpoints. Each submodule
//! parses its slice of the wire format, calls into [`crate::gitobjects`],
//! and frames the response with [`crate::pkt`].

pub mod advertise;
pub mod fetch;
pub mod ls_refs;
pub mod receive_pack;

use crate::errors::GitError;
use crate::gitobjects::GitObjects;
use crate::pkt::{self, Pkt};

/// Dispatch a v2 `upload-pack` POST body: a `command=<name>` header line,
/// a delim, then command-specific argument lines (spec §4.4.2).
pub async fn dispatch_upload_pack(objects: &GitObjects, body: &[u8]) -> Result<Vec<u8>, GitError> {
    let pkts = pkt::decode_all(body).map_err(|e| GitError::Protocol(e.to_string()))?;
    let mut iter = pkts.into_iter();

    let command = match iter.next() {
        Some(Pkt::Data(bytes)) => {
            let line = String::from_utf8_lossy(&bytes).trim_end_matches('\n').to_string();
            line.strip_prefix("command=")
                .map(|s| s.to_string())
                .ok_or_else(|| GitError::Protocol("upload-pack body missing command= line".to_string()))?
        }
        _ => return Err(GitError::Protocol("upload-pack body missing command line".to_string())),
    };

    let mut arg_lines = Vec::new();
    for pkt in iter {
        match pkt {
            Pkt::Data(bytes) => {
                arg_lines.push(String::from_utf8_lossy(&bytes).trim_end_matches('\n').to_string())
            }
            Pkt::Delim | Pkt::Flush => break,
            _ => {}
        }
    }

    match command.as_str() {
        "ls-refs" => ls_refs::handle(objects, &arg_lines).await,
        "fetch" => fetch::handle(objects, &arg_lines).await,
        other => Err(GitError::Protocol(format!("unsupported upload-pack command {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsObjectStore;
    use std::sync::Arc;

    fn objects() -> (GitObjects, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn crate::store::ObjectStore> = Arc::new(FsObjectStore::new(dir.path().to_path_buf()));
        (GitObjects::new(store), dir)
    }

    #[tokio::test]
    async fn dispatches_ls_refs() {
        let (go, _dir) = objects();
        go.init().await.unwrap();
        let mut body = Vec::new();
        body.extend(pkt::encode_str("command=ls-refs\n").unwrap());
        body.extend(pkt::encode_delim());
        body.extend(pkt::encode_flush());
        let resp = dispatch_upload_pack(&go, &body).await.unwrap();
        let pkts = pkt::decode_all(&resp).unwrap();
        assert_eq!(pkts, vec![Pkt::Flush]);
    }

    #[tokio::test]
    async fn rejects_unknown_command() {
        let (go, _dir) = objects();
        go.init().await.unwrap();
        let mut body = Vec::new();
        body.extend(pkt::encode_str("command=bogus\n").unwrap());
        body.extend(pkt::encode_flush());
        assert!(dispatch_upload_pack(&go, &body).await.is_err());
    }
}
