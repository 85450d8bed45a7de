//! ObjectStore adapter: a filesystem-like byte-addressed store (spec §4.2).
//!
//! `ObjectStore` is the trait spec.md names as an external collaborator.
//! `FsObjectStore` is a concrete, `tokio::fs`-backed implementation so this
//! crate (and `crates/server`) has a working instance without requiring a
//! second host to supply one.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("io error on {path}: {source}")]
    Io { path: String, #[source] source: std::io::Error },
}

impl StoreError {
    fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            StoreError::NotFound(path.into())
        } else {
            StoreError::Io { path: path.into(), source }
        }
    }
}

/// A filesystem-like byte-addressed store, used as the backing for the bare
/// repository layout (`HEAD`, `refs/…`, `objects/…`, `objects/pack/…`).
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    async fn stat(&self, path: &str) -> bool;
    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError>;
    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError>;
    /// Atomic at path granularity; used to publish a packfile after indexing.
    async fn rename(&self, src: &str, dst: &str) -> Result<(), StoreError>;
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    async fn delete(&self, path: &str) -> Result<(), StoreError>;
}

/// `ObjectStore` rooted at a single bare-repository directory on the local
/// filesystem.
#[derive(Clone, Debug)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: PathBuf) -> Self {
        FsObjectStore { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait::async_trait]
impl ObjectStore for FsObjectStore {
    async fn stat(&self, path: &str) -> bool {
        tokio::fs::metadata(self.resolve(path)).await.is_ok()
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, StoreError> {
        tokio::fs::read(self.resolve(path))
            .await
            .map_err(|e| StoreError::io(path, e))
    }

    async fn write(&self, path: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(path, e))?;
        }
        // create-or-replace: write to a temp sibling then rename, so a
        // concurrent reader never observes a half-written file.
        let tmp = full.with_extension(format!("tmp-{}", rand::random::<u32>()));
        tokio::fs::write(&tmp, bytes)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        tokio::fs::rename(&tmp, &full)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        Ok(())
    }

    async fn rename(&self, src: &str, dst: &str) -> Result<(), StoreError> {
        let full_dst = self.resolve(dst);
        if let Some(parent) = full_dst.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::io(dst, e))?;
        }
        tokio::fs::rename(self.resolve(src), full_dst)
            .await
            .map_err(|e| StoreError::io(src, e))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let dir = self.resolve(prefix);
        let mut entries = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(entries),
            Err(e) => return Err(StoreError::io(prefix, e)),
        };
        while let Some(entry) = read_dir.next_entry().await.map_err(|e| StoreError::io(prefix, e))? {
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push(format!("{}/{}", prefix.trim_end_matches('/'), name));
        }
        entries.sort();
        Ok(entries)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.resolve(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}
