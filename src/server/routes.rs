//! HTTP routes definition

use axum::{
    middleware,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::{handlers, middleware::resolve_user};

/// Journal entry routes, behind the user resolver
pub fn entry_routes() -> Router {
    Router::new()
        .route(
            "/entries",
            get(handlers::list_entries).post(handlers::save_entry),
        )
        .route_layer(middleware::from_fn(resolve_user))
}

/// Health check routes
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": crate::VERSION,
    }))
}
