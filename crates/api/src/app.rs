//! Application wiring: router construction and backend selection.

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{extract::Extension, routing::get, Json, Router};

use services::AppServices;

/// Build the full router over already-constructed services.
///
/// Tests construct in-memory services with a recording notification gateway
/// and reuse the exact production routing tree.
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/bookings", routes::bookings::router())
        .nest("/items", routes::items::router())
        .nest("/shops", routes::shops::router())
        .nest("/customers", routes::customers::router())
        .layer(Extension(services))
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
