mod handlers;
mod routes;

pub use routes::resolve_user_id;

use crate::config::Config;
use crate::db::Database;
use crate::tracking::InteractionRecorder;
use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared handler state: the pool for reads and the recorder for writes.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub recorder: Arc<InteractionRecorder>,
}

/// Start the API server
pub async fn start_api_server(db: Arc<Database>) -> Result<()> {
    let config = Config::get();

    // Set up CORS
    let cors = if config.api.enable_cors {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::permissive()
    };

    let state = AppState {
        recorder: Arc::new(InteractionRecorder::new(db.clone())),
        db,
    };

    // Create router with all routes
    let app = Router::new()
        // General routes
        .route("/health", get(handlers::health::health_check))
        // Interaction routes
        .route(
            "/api/interactions",
            post(handlers::interactions::record_interaction),
        )
        .route(
            "/api/interactions/toggle",
            post(handlers::interactions::toggle_interaction),
        )
        .route(
            "/api/interactions/user-flags",
            get(handlers::interactions::get_user_flags),
        )
        // User statistics routes
        .route("/api/users/:id/stats", get(handlers::stats::get_user_stats))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Get bind address
    let addr = format!("{}:{}", config.api.host, config.api.port).parse::<SocketAddr>()?;

    // Start server, draining in-flight requests on shutdown
    info!("Starting API server on {}", addr);
    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining in-flight requests"),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
