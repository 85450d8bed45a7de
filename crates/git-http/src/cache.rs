//! ResultCache (spec §4.8): a fingerprinted, TTL'd key→bytes cache fronting
//! ReadAPI. The key already embeds the ref's current OID, so content
//! changes invalidate naturally; the TTL only bounds unbounded growth.

use std::collections::HashMap;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use crate::errors::GitError;
use crate::oid::Oid;

/// One year, per spec §4.8 — the key already invalidates on content change.
pub const DEFAULT_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

struct Entry {
    bytes: Vec<u8>,
    inserted: Instant,
}

pub struct ResultCache {
    entries: Mutex<HashMap<String, Entry>>,
    ttl: Duration,
}

pub fn fingerprint(repo_full_name: &str, operation: &str, params: &str, latest_oid: Oid) -> String {
    format!("{repo_full_name}\0{operation}\0{params}\0{latest_oid}")
}

impl ResultCache {
    pub fn new(ttl: Duration) -> Self {
        ResultCache { entries: Mutex::new(HashMap::new()), ttl }
    }

    /// `compute` returns `Ok(None)` for a miss that should not be cached
    /// (spec §4.8: "null/undefined values are not cached").
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> Result<Option<Vec<u8>>, GitError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<Vec<u8>>, GitError>>,
    {
        {
            let entries = self.entries.lock().await;
            if let Some(entry) = entries.get(key) {
                if entry.inserted.elapsed() < self.ttl {
                    return Ok(Some(entry.bytes.clone()));
                }
            }
        }

        let result = compute().await?;
        if let Some(bytes) = &result {
            let mut entries = self.entries.lock().await;
            entries.insert(key.to_string(), Entry { bytes: bytes.clone(), inserted: Instant::now() });
        }
        Ok(result)
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        ResultCache::new(DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn hits_cache_on_repeated_key() {
        let cache = ResultCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            let result = cache
                .get_or_compute("k", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(b"value".to_vec()))
                })
                .await
                .unwrap();
            assert_eq!(result.as_deref(), Some(b"value".as_slice()));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn does_not_cache_none() {
        let cache = ResultCache::default();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            let result = cache
                .get_or_compute("missing", || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await
                .unwrap();
            assert!(result.is_none());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn distinct_fingerprints_miss_independently() {
        let cache = ResultCache::default();
        let key_a = fingerprint("alice/demo", "log", "", Oid::hash_object("commit", b"a"));
        let key_b = fingerprint("alice/demo", "log", "", Oid::hash_object("commit", b"b"));
        assert_ne!(key_a, key_b);
    }
}
