//! AgriVoice server binary.
//!
//! Starts an axum HTTP server with structured logging, artifact retention and
//! graceful shutdown on SIGTERM/SIGINT.

use agrivoice_server::config::{self, Config, ConfigOrigin, DEFAULT_CONFIG_PATH};
use agrivoice_server::{app, retention, services, AppState, ServerError};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn resolve_config_path() -> (Option<String>, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (Some(path), "cli-arg");
    }

    if let Ok(path) = std::env::var("AGRIVOICE_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (Some(path), "env-var");
        }
    }

    (None, "default")
}

fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[tokio::main]
async fn main() {
    let (resolved_config_path, config_source) = resolve_config_path();
    let selected_config_path = resolved_config_path.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);

    let (config, origin) = match config::load_config(Some(selected_config_path)) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("agrivoice-server: {}", ServerError::from(e));
            std::process::exit(1);
        }
    };
    init_tracing(&config);

    tracing::info!(
        source = config_source,
        path = selected_config_path,
        "resolved startup configuration path"
    );
    if origin == ConfigOrigin::Defaults {
        tracing::info!(path = selected_config_path, "config file not found, using defaults");
    }

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "agrivoice server failed");
        std::process::exit(1);
    }

    tracing::info!("agrivoice server shut down");
}

async fn run(config: Config) -> Result<(), ServerError> {
    let pipeline = services::build_pipeline(&config)?;
    pipeline.store().ensure_dirs().map_err(ServerError::Storage)?;

    tokio::spawn(retention::start_cleanup_task(
        pipeline.store().clone(),
        config.storage.cleanup_interval_seconds,
        config.storage.retention(),
    ));

    let state = AppState {
        pipeline: Arc::new(pipeline),
        max_audio_bytes: config.limits.max_audio_bytes,
        retention: config.storage.retention(),
    };
    let app = app(state);
    let addr = SocketAddr::new(config.server.host, config.server.port);

    tracing::info!(%addr, "starting agrivoice server");

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(ServerError::Serve)
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}
