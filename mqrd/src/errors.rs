use std::any::Any;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error as ThisError;

use crate::api::models::decode::ErrorDetail;

/// Request-level failures. Anything that only concerns one uploaded file is reported inside that
/// file's result instead (see [`crate::pipeline::DecodeError`]).
#[derive(ThisError, Debug)]
pub enum Error {
    /// No files, or the first file part is empty
    #[error("No files provided")]
    EmptyBatch,

    /// More files than the configured ceiling
    #[error("Maximum number of files ({max}) exceeded.")]
    TooManyFiles { max: usize },

    /// Malformed request, e.g. an unparseable multipart body
    #[error("{message}")]
    BadRequest { message: String },

    /// Request body larger than the router accepts
    #[error("{message}")]
    PayloadTooLarge { message: String },

    /// Generic internal service error
    #[error("Failed to {operation}")]
    Internal { operation: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::EmptyBatch | Error::TooManyFiles { .. } | Error::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Error::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Error::Internal { .. } | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message placed in the `detail` field of the response body
    pub fn detail(&self) -> String {
        match self {
            Error::Internal { .. } | Error::Other(_) => format!("Internal Server Error: {self}"),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::Internal { .. } | Error::Other(_) => {
                tracing::error!("Internal service error: {:#}", self);
            }
            Error::PayloadTooLarge { .. } => {
                tracing::warn!("Rejected oversized request: {}", self);
            }
            Error::EmptyBatch | Error::TooManyFiles { .. } | Error::BadRequest { .. } => {
                tracing::debug!("Client error: {}", self);
            }
        }

        let body = ErrorDetail { detail: self.detail() };
        (self.status_code(), Json(body)).into_response()
    }
}

/// Response for a panic that escaped a request handler
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else {
        "unknown panic".to_string()
    };

    Error::Internal {
        operation: format!("handle request: {message}"),
    }
    .into_response()
}

/// Type alias for service operation results
pub type Result<T> = std::result::Result<T, Error>;
