pub mod api;
pub mod app_state;
pub mod config;
pub mod log_buffer;
pub mod media;
pub mod net;
pub mod stream;

use axum::Router;
use axum::extract::{DefaultBodyLimit, Extension};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

//
// Re-export
//
pub use app_state::AppState;
pub use config::Config;
pub use log_buffer::{LogBuffer, SharedLog};
pub use stream::{
    EncodeHandle, EncoderProfile, FallbackKiller, OsFamily, StopOutcome, StopReport,
    StreamController, StreamError, StreamRequest, StreamStatus, SystemKiller,
};

/// Control page: source selection, stream settings, start/stop, log.
pub fn control_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/start", post(api::start_stream))
        .route("/stop", post(api::stop_stream))
        .route("/logs", get(api::logs))
        .route("/status", get(api::status))
        .layer(axum::middleware::from_fn(api::log_request_errors))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(state))
}

/// Large-file upload page, served on its own port.
pub fn upload_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(api::upload_page))
        .route("/upload", post(api::upload_file))
        .layer(DefaultBodyLimit::disable())
        .layer(axum::middleware::from_fn(api::log_request_errors))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(Extension(state))
}

/// Runs both servers until Ctrl+C / SIGTERM.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_token.cancel();
    });

    run_until(config, shutdown).await
}

/// Runs both servers until `shutdown` is cancelled, then stops any encoder
/// that is still tracked.
pub async fn run_until(config: Config, shutdown: CancellationToken) -> anyhow::Result<()> {
    let state = AppState::new(&config, shutdown).await?;
    serve(&config, state).await
}

/// Serves the control page until `state.shutdown` is cancelled, with the
/// upload page alongside it when its port can be bound.
///
/// Only a control listener failure is fatal. A dead upload server is logged
/// and the control page reports it as not running.
pub async fn serve(config: &Config, state: AppState) -> anyhow::Result<()> {
    let shutdown = state.shutdown.clone();

    let control_addr = format!("0.0.0.0:{}", config.control_port);
    let control_listener = TcpListener::bind(&control_addr).await?;
    info!("Control page listening on {control_addr}");

    let upload_addr = format!("0.0.0.0:{}", config.upload_port);
    let upload_server = match TcpListener::bind(&upload_addr).await {
        Ok(listener) => {
            info!(url = %state.upload_url, "Upload page listening on {upload_addr}");
            state.set_upload_online(true);
            state
                .log
                .push(format!("Upload page available at {}", state.upload_url))
                .await;
            Some(tokio::spawn(serve_uploads(listener, state.clone())))
        }
        Err(error) => {
            error!(?error, %upload_addr, "Upload server failed to start");
            state
                .log
                .push(format!("Upload server failed to start on {upload_addr}: {error}"))
                .await;
            None
        }
    };

    let result = axum::serve(control_listener, control_router(state.clone()))
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .await
        .inspect_err(|error| error!(?error, "Control server error"));
    shutdown.cancel();

    if let Some(upload_server) = upload_server
        && let Err(error) = upload_server.await
    {
        error!(?error, "Upload server task failed");
    }

    state.controller.lock().await.shutdown().await;
    info!("Servers stopped");
    Ok(result?)
}

async fn serve_uploads(listener: TcpListener, state: AppState) {
    let result = axum::serve(listener, upload_router(state.clone()))
        .with_graceful_shutdown(state.shutdown.clone().cancelled_owned())
        .await;
    state.set_upload_online(false);

    if let Err(error) = result {
        error!(?error, "Upload server error");
        state.log.push(format!("Upload server stopped: {error}")).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(?error, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(?error, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
