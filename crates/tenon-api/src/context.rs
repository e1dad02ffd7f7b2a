//! Caller identity extracted from request headers.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use tenon_core::RequestContext;

use crate::error::ApiError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const ACTOR_HEADER: &str = "x-actor-id";

/// Tenant and actor resolved by the upstream session layer.
///
/// Both headers must be present and hold a positive integer; anything else
/// is rejected with 401 before the handler runs.
#[derive(Debug, Clone, Copy)]
pub struct Caller(pub RequestContext);

#[async_trait]
impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Caller(RequestContext {
            tenant_id: id_header(&parts.headers, TENANT_HEADER)?,
            actor_id: id_header(&parts.headers, ACTOR_HEADER)?,
        }))
    }
}

fn id_header(headers: &HeaderMap, name: &str) -> Result<i64, ApiError> {
    let raw = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized(format!("missing {} header", name)))?;
    match raw.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(ApiError::Unauthorized(format!("malformed {} header", name))),
    }
}
