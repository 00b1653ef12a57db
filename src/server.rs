//! HTTP API for the chat proxy and its catalog.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/chat` | Chat with optional catalog augmentation |
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/models` | Selectable models |
//! | `GET`  | `/db/products` | Tokenized product search (`q`, `limit`) |
//! | `POST` | `/db/products/{id}` | Partial product update |
//! | `GET`  | `/db/health` | Database connectivity check |
//! | `GET`  | `/db/meta` | Connection metadata without password |
//! | `GET`  | `/db/debug/sample` | First products by id |
//! | `GET`  | `/db/debug/search` | Search with tokenization trace |
//! | `GET`  | `/debug/gemini-key` | Whether a Gemini key is configured |
//! | `GET`  | `/test/list-gemini-models` | Upstream models supporting `generateContent` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "upstream_error", "message": "ollama API error 500: ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `upstream_error` (502),
//! `configuration_error` (500), `request_failed` (500), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser frontends on
//! other ports can call the API.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::catalog::{self, ProductUpdate, SearchTrace};
use crate::chat::{ChatRequest, ChatService};
use crate::config::Config;
use crate::db;
use crate::error::ChatError;
use crate::migrate;
use crate::models::{CatalogItem, ChatResponse, ModelInfo};
use crate::provider::{self, GeminiProvider};

const DEFAULT_SEARCH_LIMIT: i64 = 20;
const DEFAULT_DEBUG_LIMIT: i64 = 10;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    pool: SqlitePool,
    chat: Arc<ChatService>,
    gemini: Arc<GeminiProvider>,
}

impl AppState {
    pub fn new(config: Config, pool: SqlitePool) -> Result<Self, ChatError> {
        let chat = ChatService::from_config(&config, pool.clone())?;
        let gemini = GeminiProvider::new(&config)?;
        Ok(Self {
            config: Arc::new(config),
            pool,
            chat: Arc::new(chat),
            gemini: Arc::new(gemini),
        })
    }
}

/// Builds the router with all routes, CORS, and request tracing.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/chat", post(handle_chat))
        .route("/health", get(handle_health))
        .route("/models", get(handle_models))
        .route("/db/products", get(handle_list_products))
        .route("/db/products/{id}", post(handle_update_product))
        .route("/db/health", get(handle_db_health))
        .route("/db/meta", get(handle_db_meta))
        .route("/db/debug/sample", get(handle_debug_sample))
        .route("/db/debug/search", get(handle_debug_search))
        .route("/debug/gemini-key", get(handle_gemini_key))
        .route("/test/list-gemini-models", get(handle_list_gemini_models))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Starts the HTTP server on `[server].bind`.
///
/// Opens the catalog pool, ensures the schema exists, and serves until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(&config.db).await?;
    migrate::run_migrations(&pool).await?;

    let listener = TcpListener::bind(&config.server.bind).await?;
    info!(addr = %listener.local_addr()?, "catalog-chat listening");

    serve(listener, config.clone(), pool).await
}

/// Serves the API on an already-bound listener.
pub async fn serve(listener: TcpListener, config: Config, pool: SqlitePool) -> anyhow::Result<()> {
    let state = AppState::new(config, pool)?;
    axum::serve(listener, router(state)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"upstream_error"`).
    code: String,
    message: String,
}

/// Error type that converts into an Axum HTTP response.
pub struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::BAD_REQUEST, "bad_request", message)
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError::new(StatusCode::NOT_FOUND, "not_found", message)
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        let (status, code) = match &err {
            ChatError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            ChatError::InvalidModel(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            ChatError::Upstream { .. } | ChatError::InvalidResponse { .. } => {
                (StatusCode::BAD_GATEWAY, "upstream_error")
            }
            ChatError::Transport(_) => (StatusCode::INTERNAL_SERVER_ERROR, "request_failed"),
        };
        error!(error = %err, status = status.as_u16(), "chat request failed");
        AppError::new(status, code, err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        error!(error = %err, "internal error");
        AppError::new(StatusCode::INTERNAL_SERVER_ERROR, "internal", err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        bad_request(rejection.body_text())
    }
}

// ============ POST /chat ============

async fn handle_chat(
    State(state): State<AppState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, AppError> {
    let Json(request) = body?;
    let response = state.chat.chat(request).await?;
    Ok(Json(response))
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

// ============ GET /models ============

#[derive(Serialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

async fn handle_models() -> Json<ModelsResponse> {
    Json(ModelsResponse {
        models: provider::available_models(),
    })
}

// ============ /db ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
    limit: Option<i64>,
}

#[derive(Serialize)]
struct ItemsResponse {
    items: Vec<CatalogItem>,
}

async fn handle_list_products(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<ItemsResponse>, AppError> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_SEARCH_LIMIT);
    let items = catalog::search_products(&state.pool, &params.q, limit).await?;
    Ok(Json(ItemsResponse { items }))
}

#[derive(Serialize)]
struct UpdateResponse {
    status: &'static str,
    item: CatalogItem,
}

async fn handle_update_product(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<ProductUpdate>, JsonRejection>,
) -> Result<Json<UpdateResponse>, AppError> {
    let Path(id) = id?;
    let Json(update) = body?;
    update.validate().map_err(bad_request)?;

    let item = catalog::update_product(&state.pool, id, &update)
        .await?
        .ok_or_else(|| not_found(format!("product {} not found", id)))?;

    info!(id, "product updated");
    Ok(Json(UpdateResponse { status: "ok", item }))
}

#[derive(Serialize)]
struct DbHealthResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

async fn handle_db_health(State(state): State<AppState>) -> Json<DbHealthResponse> {
    match catalog::ping(&state.pool).await {
        Ok(()) => Json(DbHealthResponse {
            status: "ok",
            detail: None,
        }),
        Err(e) => {
            error!(error = %e, "database health check failed");
            Json(DbHealthResponse {
                status: "error",
                detail: Some(e.to_string()),
            })
        }
    }
}

async fn handle_db_meta(State(state): State<AppState>) -> Result<Json<db::ConnectionMeta>, AppError> {
    let meta = db::connection_meta(&state.config.db.url)?;
    Ok(Json(meta))
}

#[derive(Deserialize)]
struct LimitParams {
    limit: Option<i64>,
}

#[derive(Serialize)]
struct SampleItem {
    id: i64,
    name: String,
    category: String,
    price: f64,
    stock: i64,
}

#[derive(Serialize)]
struct SampleResponse {
    count: usize,
    items: Vec<SampleItem>,
}

async fn handle_debug_sample(
    State(state): State<AppState>,
    params: Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<SampleResponse>, AppError> {
    let Query(params) = params?;
    let items = catalog::sample_products(&state.pool, params.limit.unwrap_or(DEFAULT_DEBUG_LIMIT))
        .await?;

    let items: Vec<SampleItem> = items
        .into_iter()
        .map(|p| SampleItem {
            id: p.id,
            name: p.name,
            category: p.category,
            price: p.price,
            stock: p.stock,
        })
        .collect();

    Ok(Json(SampleResponse {
        count: items.len(),
        items,
    }))
}

#[derive(Serialize)]
struct TraceItem {
    id: i64,
    name: String,
    category: String,
    price: f64,
}

#[derive(Serialize)]
struct TraceResponse {
    tokens: Vec<String>,
    expanded: Vec<String>,
    match_count: usize,
    items: Vec<TraceItem>,
}

impl From<SearchTrace> for TraceResponse {
    fn from(trace: SearchTrace) -> Self {
        Self {
            tokens: trace.tokens,
            expanded: trace.expanded,
            match_count: trace.match_count,
            items: trace
                .items
                .into_iter()
                .map(|p| TraceItem {
                    id: p.id,
                    name: p.name,
                    category: p.category,
                    price: p.price,
                })
                .collect(),
        }
    }
}

async fn handle_debug_search(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Result<Json<TraceResponse>, AppError> {
    let Query(params) = params?;
    let limit = params.limit.unwrap_or(DEFAULT_DEBUG_LIMIT);
    let trace = catalog::trace_search(&state.pool, &params.q, limit).await?;
    Ok(Json(trace.into()))
}

// ============ Gemini diagnostics ============

#[derive(Serialize)]
struct KeyStatus {
    key_exists: bool,
    key_length: usize,
}

async fn handle_gemini_key(State(state): State<AppState>) -> Json<KeyStatus> {
    let key = state.config.gemini.api_key();
    Json(KeyStatus {
        key_exists: key.is_some(),
        key_length: key.map(str::len).unwrap_or(0),
    })
}

async fn handle_list_gemini_models(State(state): State<AppState>) -> Json<serde_json::Value> {
    match state.gemini.list_models().await {
        Ok(models) => Json(serde_json::json!({ "models": models })),
        Err(ChatError::Upstream { status, body, .. }) => {
            Json(serde_json::json!({ "error": body, "status": status }))
        }
        Err(ChatError::Config(_)) => Json(serde_json::json!({ "error": "No API key found" })),
        Err(e) => Json(serde_json::json!({ "error": e.to_string() })),
    }
}
