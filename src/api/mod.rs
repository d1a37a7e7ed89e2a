use std::sync::Arc;

use axum::{
    Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde_json::{Value, json};

use crate::error::DiscoveryError;
use crate::models::{SearchRequest, SearchResponse};
use crate::orchestrator::{Diagnostics, Orchestrator};

pub enum ApiError {
    BadRequest(String),
    Internal(DiscoveryError),
}

impl From<DiscoveryError> for ApiError {
    fn from(err: DiscoveryError) -> Self {
        if err.is_validation() {
            ApiError::BadRequest(err.user_message())
        } else {
            ApiError::Internal(err)
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Internal(e) => {
                tracing::error!("Search failed: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, e.user_message())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

pub fn router(orchestrator: Arc<Orchestrator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/ai/search", post(search))
        .route("/v1/ai/debug", get(debug))
        .with_state(orchestrator)
}

async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

async fn search(
    State(orchestrator): State<Arc<Orchestrator>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload?;
    let response = orchestrator.search(request).await?;
    Ok(Json(response))
}

async fn debug(State(orchestrator): State<Arc<Orchestrator>>) -> Json<Diagnostics> {
    Json(orchestrator.diagnostics().await)
}
