//! HTTP API over the RAG engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Liveness (returns version) |
//! | `POST`   | `/api/chat` | Ask a question: `{ "message": "..." }` |
//! | `GET`    | `/api/chat` | Engine health and stats |
//! | `POST`   | `/api/reindex` | Re-index every note |
//! | `GET`    | `/api/reindex` | Index stats and health |
//! | `DELETE` | `/api/reindex` | Clear the index |
//! | `DELETE` | `/api/documents/{id}` | Remove one document's chunks |
//! | `GET`    | `/api/test` | Self-test: health, stats, per-backend checks |
//! | `POST`   | `/api/test` | Timed test question: `{ "query": "..." }` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "message must not be empty" } }
//! ```
//!
//! Error codes: `bad_request` (400), `backend_unavailable` (503),
//! `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser chat UI can
//! be served from anywhere.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use noterag_core::is_backend_unavailable;

use crate::rag::{
    AskResponse, DeleteOutcome, HealthReport, HealthStatus, IndexReport, RagEngine, SourceRef,
    StatsReport,
};

#[derive(Clone)]
struct AppState {
    engine: Arc<RagEngine>,
}

/// Serve `engine` on `bind_addr` until the process exits.
pub async fn serve(engine: Arc<RagEngine>, bind_addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "noterag server listening");
    axum::serve(listener, router(engine)).await?;
    Ok(())
}

pub fn router(engine: Arc<RagEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/chat", get(handle_chat_status).post(handle_chat))
        .route(
            "/api/reindex",
            get(handle_index_status)
                .post(handle_reindex)
                .delete(handle_clear),
        )
        .route("/api/documents/{id}", delete(handle_delete_document))
        .route("/api/test", get(handle_test_status).post(handle_test_query))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { engine })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
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
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request",
        message: message.into(),
    }
}

/// Maps engine errors: unreachable backends become 503, everything else 500.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        let message = format!("{:#}", err);
        if is_backend_unavailable(&err) {
            tracing::warn!(error = %message, "backend unavailable");
            AppError {
                status: StatusCode::SERVICE_UNAVAILABLE,
                code: "backend_unavailable",
                message,
            }
        } else {
            tracing::error!(error = %message, "request failed");
            AppError {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                code: "internal",
                message,
            }
        }
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

// ============ GET /health ============

#[derive(Serialize)]
struct LivenessResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ /api/chat ============

#[derive(Deserialize)]
struct ChatRequest {
    #[serde(default)]
    message: String,
}

#[derive(Serialize)]
struct ChatResponse {
    message: String,
    sources: Vec<SourceRef>,
    confidence: f32,
}

impl From<AskResponse> for ChatResponse {
    fn from(r: AskResponse) -> Self {
        Self {
            message: r.answer,
            sources: r.sources,
            confidence: r.confidence,
        }
    }
}

async fn handle_chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(bad_request("message must not be empty"));
    }
    let response = state.engine.ask(message).await?;
    Ok(Json(response.into()))
}

#[derive(Serialize)]
struct ChatStatusResponse {
    status: &'static str,
    health: HealthReport,
    stats: StatsReport,
    timestamp: String,
}

async fn handle_chat_status(State(state): State<AppState>) -> Json<ChatStatusResponse> {
    let (health, stats) = tokio::join!(state.engine.health(), state.engine.stats());
    Json(ChatStatusResponse {
        status: "running",
        health,
        stats,
        timestamp: timestamp(),
    })
}

// ============ /api/reindex ============

#[derive(Serialize)]
struct ReindexResponse {
    success: bool,
    message: String,
    report: IndexReport,
    stats: StatsReport,
}

async fn handle_reindex(State(state): State<AppState>) -> Result<Json<ReindexResponse>, AppError> {
    let report = state.engine.index_all().await?;
    let stats = state.engine.stats().await;
    Ok(Json(ReindexResponse {
        success: true,
        message: format!(
            "Indexed {} chunks from {} documents",
            report.upserted, report.documents
        ),
        report,
        stats,
    }))
}

#[derive(Serialize)]
struct IndexStatusResponse {
    stats: StatsReport,
    health: HealthReport,
    timestamp: String,
}

async fn handle_index_status(State(state): State<AppState>) -> Json<IndexStatusResponse> {
    let (health, stats) = tokio::join!(state.engine.health(), state.engine.stats());
    Json(IndexStatusResponse {
        stats,
        health,
        timestamp: timestamp(),
    })
}

#[derive(Serialize)]
struct MessageResponse {
    success: bool,
    message: String,
}

async fn handle_clear(State(state): State<AppState>) -> Result<Json<MessageResponse>, AppError> {
    state.engine.clear_index().await?;
    Ok(Json(MessageResponse {
        success: true,
        message: "Index cleared".to_string(),
    }))
}

// ============ DELETE /api/documents/{id} ============

#[derive(Serialize)]
struct DeleteResponse {
    success: bool,
    document_id: String,
    outcome: DeleteOutcome,
}

async fn handle_delete_document(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    if id.trim().is_empty() {
        return Err(bad_request("document id must not be empty"));
    }
    let outcome = state.engine.delete_document(&id).await?;
    Ok(Json(DeleteResponse {
        success: true,
        document_id: id,
        outcome,
    }))
}

// ============ /api/test ============

#[derive(Serialize)]
struct TestChecks {
    database_connection: bool,
    ai_connection: bool,
    file_system: bool,
    overall_status: HealthStatus,
}

#[derive(Serialize)]
struct TestResults {
    timestamp: String,
    health: HealthReport,
    stats: StatsReport,
    tests: TestChecks,
}

#[derive(Serialize)]
struct TestStatusResponse {
    success: bool,
    message: String,
    results: TestResults,
}

async fn handle_test_status(State(state): State<AppState>) -> Json<TestStatusResponse> {
    let (health, stats) = tokio::join!(state.engine.health(), state.engine.stats());
    let tests = TestChecks {
        database_connection: health.store,
        ai_connection: health.llm,
        file_system: health.files,
        overall_status: health.status,
    };
    tracing::info!(status = ?health.status, "self-test complete");
    Json(TestStatusResponse {
        success: true,
        message: "System test complete".to_string(),
        results: TestResults {
            timestamp: timestamp(),
            health,
            stats,
            tests,
        },
    })
}

#[derive(Deserialize)]
struct TestQueryRequest {
    #[serde(default)]
    query: String,
}

#[derive(Serialize)]
struct TestQueryResult {
    query: String,
    response: ChatResponse,
    response_time_ms: u64,
    timestamp: String,
}

#[derive(Serialize)]
struct TestQueryResponse {
    success: bool,
    message: String,
    result: TestQueryResult,
}

async fn handle_test_query(
    State(state): State<AppState>,
    Json(req): Json<TestQueryRequest>,
) -> Result<Json<TestQueryResponse>, AppError> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err(bad_request("query must not be empty"));
    }
    state.engine.initialize().await?;

    let started = Instant::now();
    let response = state.engine.ask(query).await?;
    let response_time_ms = started.elapsed().as_millis() as u64;
    tracing::info!(response_time_ms, "test query complete");

    Ok(Json(TestQueryResponse {
        success: true,
        message: "Test query complete".to_string(),
        result: TestQueryResult {
            query: query.to_string(),
            response: response.into(),
            response_time_ms,
            timestamp: timestamp(),
        },
    }))
}
