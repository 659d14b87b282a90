use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::{fmt, io};
use thiserror::Error;

/// Failures raised by the metadata store, the object store or the URL signer.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("image `{0}` not found")]
    RecordNotFound(String),
    #[error("object `{0}` not found")]
    ObjectNotFound(String),
    #[error("invalid object key `{0}`")]
    InvalidObjectKey(String),
    #[error("signing failed: {0}")]
    Signing(String),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A lightweight wrapper for request errors that keeps the message local.
///
/// Rendered as `text/plain` so callers see the raw error text.
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, msg: impl Into<String>) -> Self {
        Self {
            status,
            message: msg.into(),
        }
    }

    /// Shortcut for a 500 Internal Server Error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, msg)
    }

    /// Shortcut for 404 Not Found
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, msg)
    }

    /// Shortcut for 403 Forbidden
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, msg)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (
            self.status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.message,
        )
            .into_response()
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::internal(err.to_string())
    }
}

/// Renders the whole context chain so the root cause reaches the caller.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(format!("{:#}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anyhow_conversion_keeps_root_cause() {
        let err = anyhow::anyhow!("length limit exceeded").context("reading multipart form");
        let app = AppError::from(err);
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.message, "reading multipart form: length limit exceeded");
    }

    #[test]
    fn store_errors_map_to_internal_error() {
        let app = AppError::from(StoreError::RecordNotFound("abc".into()));
        assert_eq!(app.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.message, "image `abc` not found");
    }
}
