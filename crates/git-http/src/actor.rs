//! RepoActor (spec §4.5): one logical instance per `owner/repo`, owning an
//! `ObjectStore` handle and a `GitObjects` instance, serializing mutating
//! operations while letting reads run concurrently.
//!
//! Grounded on the teacher's `state.rs`/`repo.rs` pairing of a
//! `tokio::sync::Semaphore`-gated state handle with a storage trait; here
//! the per-repo exclusivity contract needs a reader/writer split rather
//! than a bare counting semaphore, so the actor holds a
//! `tokio::sync::RwLock<()>` instead: writers (`receive_pack`, `init`) take
//! it exclusively, readers (`upload_pack`, `list_refs`, ReadAPI calls) take
//! it shared.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, RwLock};

use crate::errors::GitError;
use crate::gitobjects::GitObjects;
use crate::protocol;
use crate::refs::RefListing;
use crate::store::ObjectStore;

pub struct RepoActor {
    objects: GitObjects,
    lock: RwLock<()>,
}

impl RepoActor {
    /// Construct and initialize an actor for a single repository. `init()`
    /// runs under the write lock before the actor is handed out, per §4.5's
    /// "nothing else runs until it completes" rule.
    pub async fn new(store: Arc<dyn ObjectStore>) -> Result<Self, GitError> {
        let objects = GitObjects::new(store);
        let actor = RepoActor { objects, lock: RwLock::new(()) };
        {
            let _guard = actor.lock.write().await;
            actor.objects.init().await?;
        }
        Ok(actor)
    }

    pub fn objects(&self) -> &GitObjects {
        &self.objects
    }

    pub async fn list_refs(&self) -> Result<RefListing, GitError> {
        let _guard = self.lock.read().await;
        self.objects.list_refs().await
    }

    pub async fn advertise_upload_pack(&self) -> Vec<u8> {
        protocol::advertise::upload_pack_v2()
    }

    pub async fn advertise_receive_pack(&self) -> Result<Vec<u8>, GitError> {
        let _guard = self.lock.read().await;
        protocol::advertise::receive_pack_v0(&self.objects).await
    }

    pub async fn upload_pack(&self, body: &[u8]) -> Result<Vec<u8>, GitError> {
        let wait_start = Instant::now();
        let _guard = self.lock.read().await;
        metrics::histogram!("git_http.repo_lock_wait_seconds", "mode" => "read")
            .record(wait_start.elapsed().as_secs_f64());
        protocol::dispatch_upload_pack(&self.objects, body).await
    }

    /// Exclusive: at most one in-flight `receive_pack` (or any other
    /// mutating call) per repository; others queue FIFO on the write lock.
    pub async fn receive_pack(&self, body: &[u8]) -> Result<Vec<u8>, GitError> {
        let wait_start = Instant::now();
        let _guard = self.lock.write().await;
        metrics::histogram!("git_http.repo_lock_wait_seconds", "mode" => "write")
            .record(wait_start.elapsed().as_secs_f64());

        let call_start = Instant::now();
        let result = protocol::receive_pack::handle(&self.objects, body).await;
        metrics::histogram!("git_http.receive_pack_duration_seconds")
            .record(call_start.elapsed().as_secs_f64());
        result
    }
}

/// Keyed registry of actors, one per `owner/repo`. A `tokio::sync::Mutex`
/// around the map is fine here: only actor *creation* contends on it, not
/// the (much hotter) per-repo read/write traffic once an actor exists.
#[derive(Default)]
pub struct RepoActorRegistry {
    actors: Mutex<HashMap<String, Arc<RepoActor>>>,
}

impl RepoActorRegistry {
    pub fn new() -> Self {
        RepoActorRegistry { actors: Mutex::new(HashMap::new()) }
    }

    pub async fn get_or_init<F>(&self, key: &str, make_store: F) -> Result<Arc<RepoActor>, GitError>
    where
        F: FnOnce() -> Arc<dyn ObjectStore>,
    {
        let mut actors = self.actors.lock().await;
        if let Some(actor) = actors.get(key) {
            return Ok(Arc::clone(actor));
        }
        let actor = Arc::new(RepoActor::new(make_store()).await?);
        actors.insert(key.to_string(), Arc::clone(&actor));
        Ok(actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FsObjectStore;

    #[tokio::test]
    async fn new_actor_initializes_head() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FsObjectStore::new(dir.path().to_path_buf()));
        let actor = RepoActor::new(store).await.unwrap();
        let listing = actor.list_refs().await.unwrap();
        assert!(listing.refs.is_empty());
    }

    #[tokio::test]
    async fn registry_reuses_existing_actor() {
        let dir = tempfile::tempdir().unwrap();
        let registry = RepoActorRegistry::new();
        let path = dir.path().to_path_buf();
        let a = registry
            .get_or_init("alice/demo", || Arc::new(FsObjectStore::new(path.clone())) as Arc<dyn ObjectStore>)
            .await
            .unwrap();
        let b = registry
            .get_or_init("alice/demo", || Arc::new(FsObjectStore::new(path.clone())) as Arc<dyn ObjectStore>)
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
