//! Journal HTTP API
//!
//! axum service exposing the journal's entry operations over the storage
//! client. When an [`AuthClient`] is configured every `/entries` request
//! must carry a bearer token; otherwise requests act as a fixed user.

pub mod handlers;
pub mod middleware;
pub mod routes;

use axum::{extract::Extension, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info, warn};

use crate::auth::AuthClient;
use crate::storage::StorageClient;

/// User id used when authorization is disabled
pub const DEFAULT_USER_ID: &str = "test-user-id";

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP server bind address
    pub http_addr: String,
    /// HTTP port
    pub http_port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0".to_string(),
            http_port: 8080,
            enable_cors: true,
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<StorageClient>,
    pub auth: Option<Arc<AuthClient>>,
    pub default_user_id: String,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.storage)
            .field("auth", &self.auth.is_some())
            .field("default_user_id", &self.default_user_id)
            .finish()
    }
}

impl AppState {
    /// State without authorization, acting as [`DEFAULT_USER_ID`]
    pub fn new(storage: StorageClient) -> Self {
        Self {
            storage: Arc::new(storage),
            auth: None,
            default_user_id: DEFAULT_USER_ID.to_string(),
        }
    }

    pub fn with_auth(mut self, auth: AuthClient) -> Self {
        self.auth = Some(Arc::new(auth));
        self
    }

    pub fn with_default_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.default_user_id = user_id.into();
        self
    }
}

/// The full application router
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::entry_routes())
        .merge(routes::health_routes())
        .layer(Extension(Arc::new(state)))
        .layer(TraceLayer::new_for_http())
}

/// Start the journal server
pub async fn start_server(config: ServerConfig, state: AppState) -> anyhow::Result<()> {
    info!(
        addr = %config.http_addr,
        port = config.http_port,
        "Starting diary HTTP server"
    );

    if state.auth.is_some() {
        info!("Authorization enabled");
    } else {
        warn!(user_id = %state.default_user_id, "Authorization disabled");
    }

    let app = app(state);
    let app = if config.enable_cors {
        app.layer(CorsLayer::permissive())
    } else {
        app
    };

    let addr = format!("{}:{}", config.http_addr, config.http_port);
    let listener = TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await.map_err(|e| {
        error!(error = %e, "Server error");
        anyhow::anyhow!("Server failed: {}", e)
    })
}
