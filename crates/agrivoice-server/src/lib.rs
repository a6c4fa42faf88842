//! AgriVoice HTTP server library logic.

pub mod api;
pub mod api_audio;
pub mod config;
pub mod retention;
pub mod services;

use agrivoice_pipeline::Pipeline;
use api::ApiError;
use axum::{
    extract::DefaultBodyLimit,
    http::{header::CONTENT_TYPE, HeaderValue, Response, StatusCode},
    routing::{get, post},
    Extension, Router,
};
use std::any::Any;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Room left for multipart boundaries and the `lang` field on top of the
/// audio cap.
pub const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Question pipeline with its engines and artifact store.
    pub pipeline: Arc<Pipeline>,
    /// Largest accepted recording, in bytes.
    pub max_audio_bytes: usize,
    /// Age after which `/cleanup` deletes an artifact.
    pub retention: Duration,
}

/// Startup failures of the server binary.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error("failed to initialise {service}: {message}")]
    Service {
        service: &'static str,
        message: String,
    },

    #[error("failed to prepare artifact directories: {0}")]
    Storage(#[source] std::io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    let body_limit = state.max_audio_bytes.saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(api::health_handler))
        .route("/languages", get(api::languages_handler))
        .route("/ask_audio", post(api_audio::ask_audio_handler))
        .route("/ask_text", post(api::ask_text_handler))
        .route("/cleanup", post(api::cleanup_handler))
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(
            CorsLayer::new()
                .allow_origin(AnyOrigin)
                .allow_methods(AnyOrigin)
                .allow_headers(AnyOrigin),
        )
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}

async fn not_found() -> ApiError {
    ApiError::NotFound("Endpoint not found".to_string())
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed("Method not allowed".to_string())
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response<String> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!(panic = %detail, "request handler panicked");

    let body = serde_json::json!({ "error": "Internal server error" }).to_string();
    let mut response = Response::new(body);
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
