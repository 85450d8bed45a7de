//! Router / auth gate (spec §4.6), grounded on the teacher's
//! `git_http/v2.rs` handler shape (segment normalization, semaphore-gated
//! body buffering, per-request timeout) regrounded on `RepoActor` instead of
//! shelling out to a `git` binary, plus the browsing-layer JSON surface and
//! `/metrics`/`/init` control endpoints SPEC_FULL.md adds.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::Engine;
use metrics::{counter, histogram};
use serde::Deserialize;
use tokio::sync::Semaphore;

use git_http::actor::RepoActorRegistry;
use git_http::errors::GitHttpError;
use git_http::{readapi, GitError};

use crate::authz::{AuthZ, BasicCredentials, Operation};
use crate::config::Config;
use crate::storage::{self, RepositoryStorage};
use crate::validation::slug::validate_slug;

#[derive(Clone)]
pub struct AppState {
    pub storage: RepositoryStorage,
    pub registry: Arc<RepoActorRegistry>,
    pub authz: Arc<dyn AuthZ>,
    pub config: Arc<Config>,
    pub git_semaphore: Arc<Semaphore>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/{owner}/{repo}/info/refs", get(info_refs))
        .route("/{owner}/{repo}/git-upload-pack", post(upload_pack))
        .route("/{owner}/{repo}/git-receive-pack", post(receive_pack))
        .route("/{owner}/{repo}/init", post(init_repo))
        .route("/{owner}/{repo}/branches", get(branches))
        .route("/{owner}/{repo}/log", get(log))
        .route("/{owner}/{repo}/tree/{ref_name}/{*path}", get(tree))
        .route("/{owner}/{repo}/tree/{ref_name}", get(tree_root))
        .route("/{owner}/{repo}/blob/{ref_name}/{*path}", get(blob))
        .route("/{owner}/{repo}/commit/{oid}", get(commit))
        .route("/metrics", get(metrics))
        .with_state(state)
}

fn basic_credentials(headers: &HeaderMap) -> Option<BasicCredentials> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).ok()?;
    let text = String::from_utf8(decoded).ok()?;
    let (username, password) = text.split_once(':')?;
    Some(BasicCredentials { username: username.to_string(), password: password.to_string() })
}

fn unauthorized() -> Response {
    let mut resp = (StatusCode::UNAUTHORIZED, "authentication required").into_response();
    resp.headers_mut().insert(header::WWW_AUTHENTICATE, "Basic realm=\"Git\"".parse().unwrap());
    resp
}

fn strip_git_suffix(repo: &str) -> &str {
    repo.strip_suffix(".git").unwrap_or(repo)
}

async fn authorize(state: &AppState, owner: &str, repo: &str, op: Operation, headers: &HeaderMap) -> Result<Option<BasicCredentials>, Response> {
    if let Err(e) = validate_slug(owner).and_then(|_| validate_slug(repo)) {
        return Err((StatusCode::BAD_REQUEST, e.to_string()).into_response());
    }
    let creds = basic_credentials(headers);
    if !state.authz.check(owner, repo, op, creds.as_ref()).await {
        return Err(unauthorized());
    }
    Ok(creds)
}

fn map_git_error(err: GitError) -> Response {
    GitHttpError::from(err).into_response()
}

#[derive(Debug, Deserialize)]
struct ServiceQuery {
    service: Option<String>,
}

async fn info_refs(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(q): Query<ServiceQuery>,
    headers: HeaderMap,
) -> Response {
    let repo = strip_git_suffix(&repo).to_string();
    let op = match q.service.as_deref() {
        Some("git-receive-pack") => Operation::Write,
        _ => Operation::Read,
    };
    if let Err(resp) = authorize(&state, &owner, &repo, op, &headers).await {
        return resp;
    }

    let actor = match storage::actor_for(&state.registry, &state.storage, &owner, &repo).await {
        Ok(a) => a,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    match q.service.as_deref() {
        Some("git-upload-pack") => {
            let body = actor.advertise_upload_pack().await;
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/x-git-upload-pack-advertisement")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(axum::body::Body::from(body))
                .expect("response build")
        }
        Some("git-receive-pack") => match actor.advertise_receive_pack().await {
            Ok(body) => Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/x-git-receive-pack-advertisement")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(axum::body::Body::from(body))
                .expect("response build"),
            Err(e) => map_git_error(e),
        },
        _ => (StatusCode::BAD_REQUEST, "unsupported service").into_response(),
    }
}

async fn upload_pack(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Response {
    let repo = strip_git_suffix(&repo).to_string();
    if let Err(resp) = authorize(&state, &owner, &repo, Operation::Read, &headers).await {
        return resp;
    }
    let _permit = state.git_semaphore.clone().acquire_owned().await.ok();

    let max = state.config.git_max_body_bytes;
    let bytes = match axum::body::to_bytes(body, max).await {
        Ok(b) => b,
        Err(_) => return (StatusCode::BAD_REQUEST, "request body too large or malformed").into_response(),
    };

    let actor = match storage::actor_for(&state.registry, &state.storage, &owner, &repo).await {
        Ok(a) => a,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let start = Instant::now();
    let timeout = Duration::from_secs(state.config.timeouts.read_secs);
    let result = tokio::time::timeout(timeout, actor.upload_pack(&bytes)).await;
    histogram!("git_http.upload_pack_ms").record(start.elapsed().as_millis() as f64);
    match result {
        Ok(Ok(body)) => {
            counter!("git_http.upload_pack", "result" => "ok").increment(1);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/x-git-upload-pack-result")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(axum::body::Body::from(body))
                .expect("response build")
        }
        Ok(Err(e)) => {
            counter!("git_http.upload_pack", "result" => "error").increment(1);
            map_git_error(e)
        }
        Err(_) => (StatusCode::REQUEST_TIMEOUT, "upload-pack timed out").into_response(),
    }
}

async fn receive_pack(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
    body: axum::body::Body,
) -> Response {
    let repo = strip_git_suffix(&repo).to_string();
    if let Err(resp) = authorize(&state, &owner, &repo, Operation::Write, &headers).await {
        return resp;
    }
    let _permit = state.git_semaphore.clone().acquire_owned().await.ok();

    let max = state.config.git_max_body_bytes;
    let bytes = match axum::body::to_bytes(body, max).await {
        Ok(b) => b,
        Err(_) => return (StatusCode::BAD_REQUEST, "request body too large or malformed").into_response(),
    };

    let actor = match storage::actor_for(&state.registry, &state.storage, &owner, &repo).await {
        Ok(a) => a,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };

    let start = Instant::now();
    let timeout = Duration::from_secs(state.config.timeouts.receive_pack_secs);
    let result = tokio::time::timeout(timeout, actor.receive_pack(&bytes)).await;
    histogram!("git_http.receive_pack_ms").record(start.elapsed().as_millis() as f64);
    match result {
        Ok(Ok(body)) => {
            counter!("git_http.receive_pack", "result" => "ok").increment(1);
            Response::builder()
                .status(StatusCode::OK)
                .header(header::CONTENT_TYPE, "application/x-git-receive-pack-result")
                .header(header::CACHE_CONTROL, "no-cache")
                .body(axum::body::Body::from(body))
                .expect("response build")
        }
        Ok(Err(e)) => {
            counter!("git_http.receive_pack", "result" => "error").increment(1);
            map_git_error(e)
        }
        Err(_) => (StatusCode::REQUEST_TIMEOUT, "receive-pack timed out").into_response(),
    }
}

async fn init_repo(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let repo = strip_git_suffix(&repo).to_string();
    if let Err(resp) = authorize(&state, &owner, &repo, Operation::Write, &headers).await {
        return resp;
    }
    match storage::actor_for(&state.registry, &state.storage, &owner, &repo).await {
        Ok(_actor) => StatusCode::OK.into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

async fn branches(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    headers: HeaderMap,
) -> Response {
    let repo = strip_git_suffix(&repo).to_string();
    if let Err(resp) = authorize(&state, &owner, &repo, Operation::Read, &headers).await {
        return resp;
    }
    let actor = match storage::actor_for(&state.registry, &state.storage, &owner, &repo).await {
        Ok(a) => a,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    match readapi::branches(actor.objects()).await {
        Ok(names) => axum::Json(names).into_response(),
        Err(e) => map_git_error(e),
    }
}

#[derive(Debug, Deserialize)]
struct LogQuery {
    #[serde(rename = "ref")]
    ref_name: Option<String>,
    depth: Option<usize>,
    path: Option<String>,
}

async fn log(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
    Query(q): Query<LogQuery>,
    headers: HeaderMap,
) -> Response {
    let repo = strip_git_suffix(&repo).to_string();
    if let Err(resp) = authorize(&state, &owner, &repo, Operation::Read, &headers).await {
        return resp;
    }
    let actor = match storage::actor_for(&state.registry, &state.storage, &owner, &repo).await {
        Ok(a) => a,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    match readapi::log(actor.objects(), q.ref_name.as_deref(), q.depth, q.path.as_deref()).await {
        Ok(commits) => axum::Json(commits).into_response(),
        Err(e) => map_git_error(e),
    }
}

async fn tree_root(
    state: State<AppState>,
    Path((owner, repo, ref_name)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    tree_impl(state, owner, repo, ref_name, None, headers).await
}

async fn tree(
    state: State<AppState>,
    Path((owner, repo, ref_name, path)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Response {
    tree_impl(state, owner, repo, ref_name, Some(path), headers).await
}

async fn tree_impl(
    State(state): State<AppState>,
    owner: String,
    repo: String,
    ref_name: String,
    path: Option<String>,
    headers: HeaderMap,
) -> Response {
    let repo = strip_git_suffix(&repo).to_string();
    if let Err(resp) = authorize(&state, &owner, &repo, Operation::Read, &headers).await {
        return resp;
    }
    let actor = match storage::actor_for(&state.registry, &state.storage, &owner, &repo).await {
        Ok(a) => a,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    match readapi::tree(actor.objects(), &ref_name, path.as_deref()).await {
        Ok(entries) => axum::Json(entries).into_response(),
        Err(e) => map_git_error(e),
    }
}

#[derive(serde::Serialize)]
struct BlobResponse {
    oid: String,
    size: usize,
    is_binary: bool,
    text: Option<String>,
    content_base64: Option<String>,
}

async fn blob(
    State(state): State<AppState>,
    Path((owner, repo, ref_name, path)): Path<(String, String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let repo = strip_git_suffix(&repo).to_string();
    if let Err(resp) = authorize(&state, &owner, &repo, Operation::Read, &headers).await {
        return resp;
    }
    let actor = match storage::actor_for(&state.registry, &state.storage, &owner, &repo).await {
        Ok(a) => a,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    match readapi::blob(actor.objects(), &ref_name, &path).await {
        Ok(info) => {
            let response = if info.is_binary {
                BlobResponse {
                    oid: info.oid.to_string(),
                    size: info.size,
                    is_binary: true,
                    text: None,
                    content_base64: Some(base64::engine::general_purpose::STANDARD.encode(&info.content)),
                }
            } else {
                BlobResponse {
                    oid: info.oid.to_string(),
                    size: info.size,
                    is_binary: false,
                    text: Some(String::from_utf8_lossy(&info.content).into_owned()),
                    content_base64: None,
                }
            };
            axum::Json(response).into_response()
        }
        Err(e) => map_git_error(e),
    }
}

async fn commit(
    State(state): State<AppState>,
    Path((owner, repo, oid)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    let repo = strip_git_suffix(&repo).to_string();
    if let Err(resp) = authorize(&state, &owner, &repo, Operation::Read, &headers).await {
        return resp;
    }
    let parsed_oid = match oid.parse() {
        Ok(o) => o,
        Err(_) => return (StatusCode::BAD_REQUEST, "malformed oid").into_response(),
    };
    let actor = match storage::actor_for(&state.registry, &state.storage, &owner, &repo).await {
        Ok(a) => a,
        Err(e) => return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    };
    match readapi::commit_with_changes(actor.objects(), parsed_oid).await {
        Ok((commit, changes)) => axum::Json(serde_json::json!({ "commit": commit, "changes": changes })).into_response(),
        Err(e) => map_git_error(e),
    }
}

async fn metrics() -> impl IntoResponse {
    crate::metrics_exporter::render_metrics()
}
