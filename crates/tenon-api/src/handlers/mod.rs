//! Handler modules for tenon-api.

pub mod disassembly;

use axum::response::IntoResponse;
use axum::Json;

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
