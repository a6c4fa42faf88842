//! JSON API handlers for the AgriVoice server.

use crate::{retention, AppState};
use agrivoice_pipeline::PipelineError;
use agrivoice_types::{Language, TextAnswer};
use axum::{
    extract::{rejection::JsonRejection, Extension, Json},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Request body for `POST /ask_text`.
#[derive(Debug, Deserialize)]
pub struct AskTextRequest {
    #[serde(default)]
    pub text: Option<String>,
    /// Target language code; unknown or missing means English.
    #[serde(default)]
    pub language: Option<String>,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("method not allowed: {0}")]
    MethodNotAllowed(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::MethodNotAllowed(msg) => (StatusCode::METHOD_NOT_ALLOWED, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        match e {
            PipelineError::NotUnderstood | PipelineError::Synthesis(_) => {
                ApiError::InternalServerError(e.to_string())
            }
            PipelineError::Storage(_) | PipelineError::Transcription(_) => {
                ApiError::InternalServerError(format!("Processing failed: {}", e))
            }
        }
    }
}

fn timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Handler for `GET /health`.
pub async fn health_handler() -> Json<Value> {
    let codes: Vec<&str> = Language::ALL.iter().map(|l| l.code()).collect();
    Json(json!({
        "status": "healthy",
        "message": "Voice Assistant API is running",
        "available_languages": codes,
        "timestamp": timestamp(),
    }))
}

/// Handler for `GET /languages`.
pub async fn languages_handler() -> Json<Value> {
    let mut names = Map::new();
    for language in Language::ALL {
        names.insert(
            language.code().to_string(),
            Value::from(language.display_name()),
        );
    }
    let codes: Vec<&str> = Language::ALL.iter().map(|l| l.code()).collect();
    Json(json!({
        "languages": names,
        "tts_supported": codes,
    }))
}

/// Handler for `POST /ask_text`.
pub async fn ask_text_handler(
    Extension(state): Extension<Arc<AppState>>,
    payload: Result<Json<AskTextRequest>, JsonRejection>,
) -> Result<Json<TextAnswer>, ApiError> {
    let no_text = || ApiError::BadRequest("No text provided".to_string());

    let Json(request) = payload.map_err(|e| {
        tracing::debug!(error = %e, "rejected ask_text body");
        no_text()
    })?;
    let text = request
        .text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(no_text)?;
    let language = request.language.unwrap_or_else(|| "en".to_string());

    tracing::info!(language = %language, chars = text.chars().count(), "processing text request");
    let answer = state.pipeline.answer_text_question(&text, &language).await;
    Ok(Json(answer))
}

/// Handler for `POST /cleanup`.
pub async fn cleanup_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let removed = retention::sweep_artifacts(state.pipeline.store().clone(), state.retention)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "cleanup failed");
            ApiError::InternalServerError(format!("Cleanup failed: {}", e))
        })?;

    tracing::info!(removed, "manual cleanup finished");
    Ok(Json(json!({
        "message": format!("Cleaned up {} old files", removed),
        "timestamp": timestamp(),
    })))
}
