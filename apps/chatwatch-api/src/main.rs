use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatwatch_api::config::Config;
use chatwatch_api::error::panic_response;
use chatwatch_api::observer::relay::RelaySource;
use chatwatch_api::AppState;

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing; env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    let source = Arc::new(RelaySource::new(config.source_url.clone()));
    tracing::info!(source_url = %config.source_url, "chatwatch-api configured");

    let state = AppState::new(config, source);
    if state.observer.keywords().is_empty() {
        tracing::warn!("no KEYWORDS configured; every message will be dropped");
    } else {
        tracing::info!(keywords = ?state.observer.keywords(), "keyword gate loaded");
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let shutdown_state = state.clone();
    let app = Router::new()
        .merge(chatwatch_api::routes::router())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "chatwatch-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_state))
        .await
        .expect("server error");

    tracing::info!("chatwatch-api shut down");
}

/// Resolves on Ctrl-C after stopping the observer and ending every open
/// stream, so in-flight SSE connections let the server drain.
async fn shutdown_signal(state: AppState) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    let outcome = state.observer.stop();
    let streams = state.hub.disconnect_all();
    tracing::info!(msg = %outcome.msg, streams, "shutdown signal received");
}
