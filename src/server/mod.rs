//! HTTP + WebSocket server
//!
//! Hosts the viewer transport and the read-only status endpoint:
//! - `GET /`: static viewer files (when the web root exists)
//! - `GET /api/status`: `{streaming, clients, camera}` snapshot
//! - `WS /ws`: per-viewer event channel and video byte stream

pub mod config;
pub mod ws;

pub use config::ServerConfig;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::{State, WebSocketUpgrade};
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::control::StreamController;
use crate::error::Result;
use crate::registry::SubscriberId;

/// Shared state handed to every request handler
pub struct AppState {
    /// Control-plane dispatcher
    pub controller: Arc<StreamController>,
    next_subscriber_id: AtomicU64,
}

impl AppState {
    fn new(controller: Arc<StreamController>) -> Self {
        Self {
            controller,
            next_subscriber_id: AtomicU64::new(1),
        }
    }

    /// Allocate a session identifier for a new viewer
    pub fn allocate_subscriber_id(&self) -> SubscriberId {
        self.next_subscriber_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// The streaming web server
pub struct StreamServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl StreamServer {
    /// Create a server over an existing controller
    pub fn new(config: ServerConfig, controller: Arc<StreamController>) -> Self {
        Self {
            config,
            state: Arc::new(AppState::new(controller)),
        }
    }

    /// Build the router (exposed for tests)
    pub fn router(&self) -> Router {
        let mut app = Router::new()
            .route("/ws", get(ws_upgrade))
            .route("/api/status", get(api_status))
            .layer(CorsLayer::permissive())
            .layer(TraceLayer::new_for_http())
            .with_state(Arc::clone(&self.state));

        if let Some(ref dir) = self.config.static_dir {
            if dir.exists() {
                tracing::info!(dir = %dir.display(), "Serving viewer files");
                app = app
                    .fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
            } else {
                tracing::warn!(
                    dir = %dir.display(),
                    "Web root does not exist, skipping static file serving"
                );
            }
        }

        app
    }

    /// Run the server until the shutdown future resolves
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }

    /// Run the server forever
    pub async fn run(&self) -> Result<()> {
        self.run_until(std::future::pending()).await
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> std::net::SocketAddr {
        self.config.bind_addr
    }
}

/// WebSocket upgrade handler
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| ws::handle_socket(socket, state))
}

/// `GET /api/status`
async fn api_status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let status = state.controller.status().await;

    Json(serde_json::json!({
        "streaming": status.streaming,
        "clients": status.clients,
        "camera": if status.camera { "available" } else { "not found" },
    }))
}
