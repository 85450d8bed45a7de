//! Filesystem `ObjectStore`/`RepositoryProvider` wiring (spec §4.2), grounded
//! on the teacher's `repository/storage.rs` local-path resolution (the
//! remote-clone half of that file backed a feature this rewrite doesn't
//! carry — see DESIGN.md).

use std::path::PathBuf;
use std::sync::Arc;

use git_http::actor::RepoActorRegistry;
use git_http::store::{FsObjectStore, ObjectStore};

#[derive(Clone)]
pub struct RepositoryStorage {
    pub local_root: PathBuf,
}

impl RepositoryStorage {
    pub fn new(local_root: PathBuf) -> Self {
        RepositoryStorage { local_root }
    }

    pub fn ensure_local_repository(&self, segments: &[String]) -> anyhow::Result<PathBuf> {
        let mut path = self.local_root.clone();
        for segment in segments {
            path.push(segment);
        }
        Ok(path.with_extension("git"))
    }
}

impl git_http::repo::RepositoryProvider for RepositoryStorage {
    fn ensure_local_repository(&self, segments: &[String]) -> anyhow::Result<PathBuf> {
        RepositoryStorage::ensure_local_repository(self, segments)
    }
}

/// `owner/repo` key used by the `RepoActorRegistry`.
pub fn repo_key(owner: &str, repo: &str) -> String {
    format!("{owner}/{repo}")
}

pub async fn actor_for(
    registry: &RepoActorRegistry,
    storage: &RepositoryStorage,
    owner: &str,
    repo: &str,
) -> anyhow::Result<Arc<git_http::actor::RepoActor>> {
    let key = repo_key(owner, repo);
    let dir = storage.ensure_local_repository(&[owner.to_string(), repo.to_string()])?;
    let actor = registry
        .get_or_init(&key, || Arc::new(FsObjectStore::new(dir.clone())) as Arc<dyn ObjectStore>)
        .await?;
    Ok(actor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_local_repository_appends_git_suffix() {
        let storage = RepositoryStorage::new(PathBuf::from("/srv/repos"));
        let path = storage.ensure_local_repository(&["alice".into(), "demo".into()]).unwrap();
        assert_eq!(path, PathBuf::from("/srv/repos/alice/demo.git"));
    }
}
