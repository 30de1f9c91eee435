use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::document::DocumentError;

/// Errors that reach the HTTP layer. Generation failures never do: they
/// are rendered into the document instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Invalid upload: {0}")]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Document(#[from] DocumentError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::Multipart(_) => StatusCode::BAD_REQUEST,
            Self::Document(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        tracing::error!(error = %self, status = status.as_u16(), "Request failed");
        (status, self.to_string()).into_response()
    }
}
