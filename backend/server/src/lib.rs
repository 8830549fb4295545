//! # Feedback Wall Data Service
//!
//! The hosted database behind the wall: stores posts and comments, counts votes, and
//! pushes change notifications to connected walls.
//!
//! ## Routes
//!
//! - `GET /health`
//! - `GET /feedback?order=new|top`
//! - `POST /feedback`
//! - `POST /feedback/{id}/upvote`
//! - `GET /feedback/{id}/comments`
//! - `POST /feedback/{id}/comments`
//! - `GET /realtime?table=feedback|comments&post_id=N` (websocket)
//!
//! ## Storage
//!
//! Redis when `REDIS_URL` is set (env or `/run/secrets/REDIS_URL`), otherwise in memory.
//!
//! ## Trust
//!
//! The service never decides who may vote. Any request to the upvote route counts. The
//! per-visitor gating in the wall is advisory.
use std::{sync::Arc, time::Duration};

use axum::{
    Router,
    http::{Method, header::CONTENT_TYPE},
    routing::{get, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod realtime;
pub mod routes;
pub mod state;

use config::Config;
use realtime::realtime_handler;
use routes::{
    create_comment_handler, create_feedback_handler, health_handler, list_comments_handler,
    list_feedback_handler, upvote_handler,
};
use state::State;

pub async fn start_server() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let config = Config::load()?;
    let state = State::new(config).await?;

    info!("Starting server...");

    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

pub fn router(state: Arc<State>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/health", get(health_handler))
        .route("/feedback", get(list_feedback_handler).post(create_feedback_handler))
        .route("/feedback/{id}/upvote", post(upvote_handler))
        .route(
            "/feedback/{id}/comments",
            get(list_comments_handler).post(create_comment_handler),
        )
        .route("/realtime", get(realtime_handler))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
