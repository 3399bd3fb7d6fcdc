//! API error types.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chunkdrop_protocol::ApiResponse;
use chunkdrop_transfer::TransferError;

/// API error type.
///
/// Every variant renders as the `{code, msg, data}` envelope with `code`
/// equal to the HTTP status and the full error text in `data`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Malformed multipart or JSON body.
    #[error("parse error: {0}")]
    Parse(String),

    /// A required multipart field was absent. Reported as 500 to match the
    /// documented client contract, although it is a client error.
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Transfer(#[from] TransferError),
}

impl ApiError {
    /// Error code for programmatic handling, sent as `msg`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Parse(_) => "parse_error",
            Self::MissingField(_) => "missing_field",
            Self::BadRequest(_) => "bad_request",
            Self::NotFound(_) => "not_found",
            Self::Transfer(e) => match e {
                TransferError::Io(_) => "io_error",
                TransferError::Json(_) => "metadata_corrupt",
                TransferError::MetadataMissing(_) => "metadata_missing",
                TransferError::IncompleteUpload { .. } => "incomplete_upload",
                TransferError::UnexpectedChunks { .. } => "unexpected_chunks",
                TransferError::InvalidPath(_) => "invalid_path",
                TransferError::Task(_) => "internal_error",
            },
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Parse(_) | Self::MissingField(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Transfer(e) => match e {
                TransferError::IncompleteUpload { .. }
                | TransferError::UnexpectedChunks { .. }
                | TransferError::InvalidPath(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Short message for the envelope's `msg` field.
    fn message(&self) -> String {
        match self {
            Self::BadRequest(m) | Self::NotFound(m) => m.clone(),
            _ => self.code().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "request failed");
        } else {
            tracing::debug!(code = self.code(), error = %self, "request rejected");
        }
        let body = ApiResponse::error(status.as_u16(), self.message(), self.to_string());
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;
