use crate::document::Document;
use crate::error::Error;
use crate::index::{IndexStats, Posting};
use crate::ranking::{rank_documents, ScoredDocument};
use crate::worker::NoteSearchWorker;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

// ========== Request/Response Types ==========

#[derive(Debug, Deserialize)]
pub struct IndexRequest {
    pub notes: Vec<Document>,
}

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub terms: Vec<String>,
    #[serde(default)]
    pub ranked: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub result: HashMap<String, Vec<Posting>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ranking: Option<Vec<ScoredDocument>>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    fn error(message: String) -> ApiResponse<()> {
        ApiResponse {
            success: false,
            data: None,
            message: Some(message),
        }
    }
}

// ========== Error Handling ==========

struct AppError(anyhow::Error);

impl AppError {
    fn status(&self) -> StatusCode {
        match self.0.downcast_ref::<Error>() {
            Some(Error::MalformedDocument { .. }) => StatusCode::BAD_REQUEST,
            Some(Error::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
            Some(Error::Transport(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Some(Error::Cancelled { .. }) | None => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = format!("{:#}", self.0);
        tracing::error!(%status, "API error: {}", message);

        (status, Json(ApiResponse::<()>::error(message))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

// ========== Handlers ==========

async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::success("OK"))
}

async fn index_notes(
    State(worker): State<Arc<NoteSearchWorker>>,
    Json(req): Json<IndexRequest>,
) -> Result<impl IntoResponse, AppError> {
    let count = req.notes.len();
    worker.index(req.notes).await?;

    Ok(Json(ApiResponse::success(format!("Indexed {} notes", count))))
}

async fn search_notes(
    State(worker): State<Arc<NoteSearchWorker>>,
    Json(req): Json<SearchRequest>,
) -> Result<impl IntoResponse, AppError> {
    let result = worker.search(req.terms.clone()).await?;
    let ranking = req.ranked.then(|| rank_documents(&req.terms, &result));

    Ok(Json(ApiResponse::success(SearchResponse { result, ranking })))
}

async fn flush_index(
    State(worker): State<Arc<NoteSearchWorker>>,
) -> Result<impl IntoResponse, AppError> {
    worker.flush().await?;
    Ok(Json(ApiResponse::success("Index flushed")))
}

async fn get_stats(
    State(worker): State<Arc<NoteSearchWorker>>,
) -> Result<Json<ApiResponse<IndexStats>>, AppError> {
    let stats = worker.stats().await?;
    Ok(Json(ApiResponse::success(stats)))
}

// ========== Router ==========

pub fn create_router(worker: Arc<NoteSearchWorker>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/notes", post(index_notes))
        .route("/search", post(search_notes))
        .route("/flush", post(flush_index))
        .route("/stats", get(get_stats))
        .layer(TraceLayer::new_for_http())
        .with_state(worker)
}
