//! The controller's single error type, carrying the kinds from spec.md §7.
//! Each variant maps to an HTTP status via [`Error::status`], the same
//! `{Cause, Detail, Status}` shape as the original's
//! `server/models/errors.go` `HTTPError`.

use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0} not found")]
    NotFound(String),

    #[error("method not allowed")]
    MethodNotAllowed,

    #[error("{0}")]
    BadRequest(String),

    #[error("state corruption: {0}")]
    StateCorruption(String),

    #[error("transport error: {0}")]
    TransportError(#[from] kube::Error),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Error::BadRequest(_) => StatusCode::BAD_REQUEST,
            Error::StateCorruption(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::TransportError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Every variant of this enum is a typed, known error and always carries a
/// `detail` message over the wire (`router.go`'s `handlerFunc` wrapper
/// serializes every `models.HTTPError`'s `Detail` field regardless of its
/// status, including 500s). A bare status with an empty body is for values
/// that never become an `Error` at all, e.g. a panic caught above this layer.
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::to_vec(&ErrorBody {
            detail: self.to_string(),
        })
        .unwrap_or_else(|_| b"{}".to_vec());

        let mut response = (status, body).into_response();
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        response
    }
}
