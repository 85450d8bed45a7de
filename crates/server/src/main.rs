use std::sync::Arc;

use anyhow::Context as _;
use tokio::sync::Semaphore;

use server::authz::StaticAuthz;
use server::config;
use server::router::{build_router, AppState};
use server::storage::RepositoryStorage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    server::metrics_exporter::init_metrics();

    let config = Arc::new(config::load_with_discovery().context("failed to load configuration")?);

    std::fs::create_dir_all(&config.repos_root).with_context(|| {
        format!("failed to create repository root directory: {}", config.repos_root.display())
    })?;

    let storage = RepositoryStorage::new(config.repos_root.clone());
    let registry = Arc::new(git_http::actor::RepoActorRegistry::new());
    let authz = Arc::new(StaticAuthz::new(Arc::clone(&config)));
    let git_semaphore = Arc::new(Semaphore::new(num_cpus_fallback() * 4));

    let state = AppState { storage, registry, authz, config: Arc::clone(&config), git_semaphore };
    let router = build_router(state);

    tracing::info!("listening on {}", config.listen_addr);
    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    axum::serve(listener, router).await.context("server exited with an error")?;

    Ok(())
}

fn num_cpus_fallback() -> usize {
    std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4)
}
