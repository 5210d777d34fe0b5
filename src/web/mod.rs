//! Web server module.

mod handlers;

pub use handlers::*;

use crate::alerts::AlarmRecorder;
use crate::config::ServerConfig;
use crate::db::Store;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub recorder: AlarmRecorder,
}

/// Build the router with all routes.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

    Router::new()
        .route(
            "/api/targets",
            get(handlers::handle_list_targets).post(handlers::handle_create_target),
        )
        .route(
            "/api/targets/{id}",
            get(handlers::handle_get_target)
                .put(handlers::handle_update_target)
                .delete(handlers::handle_delete_target),
        )
        .route("/api/alarms/notify", post(handlers::handle_notify))
        .route("/api/alarms/{name}", get(handlers::handle_alarm_history))
        .route("/api/metrics", get(handlers::handle_get_samples))
        .layer(cors)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1MB
        .with_state(state)
}

/// Web server for sitewatch.
pub struct Server {
    config: ServerConfig,
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>, recorder: AlarmRecorder) -> Self {
        Self {
            config,
            state: AppState { store, recorder },
        }
    }

    /// Start the server on the configured port.
    pub async fn start(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.config.http_port));
        let router = router(self.state.clone());

        tracing::info!("Web server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).await?;

        Ok(())
    }
}
