use std::path::PathBuf;

/// Trait representing repository storage that can resolve repository paths.
/// Implemented by `crates/server`'s `RepositoryStorage`; the gate on whether
/// a caller may reach a repo at all is `crates/server`'s `AuthZ`, not this
/// trait.
pub trait RepositoryProvider {
    fn ensure_local_repository(&self, segments: &[String]) -> anyhow::Result<PathBuf>;
}
