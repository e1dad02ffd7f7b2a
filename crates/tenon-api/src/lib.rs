//! # tenon-api
//!
//! HTTP surface for the tenon asset disassembly engine.
//!
//! Routes:
//! - `POST /api/v1/assets/:id/disassemble`
//! - `GET /api/v1/disassemble-operations/:token`
//! - `GET /health`
//!
//! Callers are identified by the `X-Tenant-Id` and `X-Actor-Id` headers set
//! by the session layer in front of this service.

pub mod context;
pub mod error;
pub mod handlers;

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use tenon_engine::Disassembler;

pub use error::ApiError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub engine: Disassembler,
}

/// Generates time-ordered UUIDv7 request correlation IDs.
#[derive(Clone, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Build the application router.
///
/// `request_timeout` bounds a whole request. Disassembly of a large tree can
/// run for minutes, so this is far above CRUD latencies.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/api/v1/assets/:id/disassemble",
            post(handlers::disassembly::disassemble_asset),
        )
        .route(
            "/api/v1/disassemble-operations/:token",
            get(handlers::disassembly::get_operation),
        )
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}
