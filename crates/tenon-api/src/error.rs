//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use tenon_core::{Error, ErrorKind};

#[derive(Debug)]
pub enum ApiError {
    /// Engine or storage error, mapped through the error taxonomy.
    Engine(Error),
    /// Request carried no usable caller identity.
    Unauthorized(String),
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError::Engine(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Engine(err) => match err.kind() {
                ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
                ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::Conflict => StatusCode::CONFLICT,
                ErrorKind::TransactionFailure => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Unauthorized(msg) => json!({
                "error": msg,
                "kind": "unauthorized",
                "retryable": false,
            }),
            ApiError::Engine(err) => json!({
                "error": err.to_string(),
                "kind": err.kind(),
                "retryable": err.is_retryable(),
            }),
        };

        (status, Json(body)).into_response()
    }
}
