//! HTTP-facing error taxonomy
//!
//! Every handler returns `Result<HttpResponse, ApiError>`; actix-web renders
//! the error through `ResponseError` as `{ "error": ..., "details": ... }`.

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use log::{error, warn};
use thiserror::Error;

use crate::api::models::ErrorBody;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Missing parameter, malformed multipart body, unusable file name
    #[error("{0}")]
    InvalidRequest(String),
    #[error("File not found")]
    NotFound(String),
    #[error("Method not allowed")]
    MethodNotAllowed,
    /// Medium-level I/O failure
    #[error("Storage unavailable")]
    StorageUnavailable(String),
}

impl ApiError {
    fn details(&self) -> Option<String> {
        match self {
            ApiError::InvalidRequest(_) | ApiError::MethodNotAllowed => None,
            ApiError::NotFound(name) => Some(name.clone()),
            ApiError::StorageUnavailable(msg) => Some(msg.clone()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => ApiError::NotFound(name),
            StorageError::InvalidName(name) => ApiError::InvalidRequest(format!("Invalid filename: {}", name)),
            StorageError::Unavailable(msg) => ApiError::StorageUnavailable(msg),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::StorageUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {} ({:?})", self, self.details());
        } else {
            warn!("Rejected request: {} ({:?})", self, self.details());
        }
        HttpResponse::build(status).json(ErrorBody {
            error: self.to_string(),
            details: self.details(),
        })
    }
}
