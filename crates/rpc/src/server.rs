use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use cantus_registry::{RegistryError, WorkRegistry};
use cantus_types::{AccountId, Fingerprint, SongRecord, WorkId};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<WorkRegistry>,
    pub node_id: String,
    pub start_time: Instant,
    pub req_count: Arc<AtomicUsize>,
}

impl AppState {
    pub fn new(registry: Arc<WorkRegistry>, node_id: String) -> Self {
        Self {
            registry,
            node_id,
            start_time: Instant::now(),
            req_count: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn record_request(&self) -> u64 {
        self.req_count.fetch_add(1, Ordering::Relaxed) as u64 + 1
    }

    fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

type SharedState = Arc<AppState>;

#[derive(Debug, Deserialize)]
struct RegisterWorkRequest {
    title: String,
    creator: String,
    metadata_ref: String,
    /// Principal performing the registration, as attested by the identity
    /// layer in front of this API. Trusted as given.
    registrant: String,
}

#[derive(Debug, Serialize)]
struct RegisterWorkResponse {
    id: WorkId,
    fingerprint: String,
}

#[derive(Debug, Serialize)]
struct WorkCountResponse {
    node_id: String,
    count: u64,
}

#[derive(Debug, Serialize)]
struct OwnerWorksResponse {
    owner: AccountId,
    works: Vec<WorkId>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    node_id: String,
    uptime_secs: u64,
    works: u64,
    req_total: u64,
    time_us: u64,
}

#[derive(Debug, Serialize)]
struct VersionResponse {
    node_id: String,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match &err {
            RegistryError::DuplicateWork { .. } => {
                ApiError::new(StatusCode::CONFLICT, err.to_string())
            }
            RegistryError::NotFound { .. } => {
                ApiError::new(StatusCode::NOT_FOUND, err.to_string())
            }
            RegistryError::Storage(_) => ApiError::internal(err.to_string()),
        }
    }
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!(%addr, "registry RPC listening");
    axum::serve(listener, app)
        .await
        .context("RPC server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {addr}"))
    }
}

fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/version", get(handle_version))
        .route("/metrics", get(handle_metrics))
        .route("/works", post(handle_register_work))
        .route("/works", get(handle_work_count))
        .route("/works/:id", get(handle_get_work))
        .route("/owners/:owner/works", get(handle_owner_works))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_register_work(
    State(state): State<SharedState>,
    Json(req): Json<RegisterWorkRequest>,
) -> Result<(StatusCode, Json<RegisterWorkResponse>), ApiError> {
    state.record_request();

    let fingerprint = Fingerprint::compute(&req.title, &req.creator);
    let id = state.registry.register(
        &req.title,
        &req.creator,
        &req.metadata_ref,
        AccountId::new(req.registrant),
    )?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterWorkResponse {
            id,
            fingerprint: fingerprint.to_hex(),
        }),
    ))
}

async fn handle_get_work(
    State(state): State<SharedState>,
    AxumPath(id): AxumPath<u64>,
) -> Result<Json<SongRecord>, ApiError> {
    state.record_request();
    let record = state.registry.lookup(WorkId::new(id))?;
    Ok(Json(record))
}

async fn handle_work_count(
    State(state): State<SharedState>,
) -> Result<Json<WorkCountResponse>, ApiError> {
    state.record_request();
    let count = state.registry.work_count()?;
    Ok(Json(WorkCountResponse {
        node_id: state.node_id.clone(),
        count,
    }))
}

async fn handle_owner_works(
    State(state): State<SharedState>,
    AxumPath(owner): AxumPath<String>,
) -> Result<Json<OwnerWorksResponse>, ApiError> {
    state.record_request();
    let owner = AccountId::new(owner);
    let works = state.registry.works_by_owner(&owner)?;
    Ok(Json(OwnerWorksResponse { owner, works }))
}

async fn handle_health(State(state): State<SharedState>) -> Result<Json<HealthResponse>, ApiError> {
    let req_total = state.record_request();
    let works = state.registry.work_count()?;

    Ok(Json(HealthResponse {
        status: "ok",
        node_id: state.node_id.clone(),
        uptime_secs: state.uptime_seconds(),
        works,
        req_total,
        time_us: unix_time_us(),
    }))
}

async fn handle_version(State(state): State<SharedState>) -> Json<VersionResponse> {
    state.record_request();
    Json(VersionResponse {
        node_id: state.node_id.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_metrics(State(state): State<SharedState>) -> Result<Response, ApiError> {
    let req_total = state.record_request();
    let uptime = state.uptime_seconds();
    let works = state.registry.work_count()?;

    let mut metrics =
        "# HELP cantus_http_requests_total Total number of RPC requests handled\n".to_string();
    metrics.push_str("# TYPE cantus_http_requests_total counter\n");
    metrics.push_str(&format!("cantus_http_requests_total {req_total}\n"));
    metrics.push_str("# HELP cantus_uptime_seconds Uptime of the node in seconds\n");
    metrics.push_str("# TYPE cantus_uptime_seconds gauge\n");
    metrics.push_str(&format!("cantus_uptime_seconds {uptime}\n"));
    metrics.push_str("# HELP cantus_works_total Number of registered works\n");
    metrics.push_str("# TYPE cantus_works_total gauge\n");
    metrics.push_str(&format!("cantus_works_total {works}\n"));

    let mut response = Response::new(Body::from(metrics));
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    Ok(response)
}

fn unix_time_us() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|dur| dur.as_micros() as u64)
        .unwrap_or_default()
}
