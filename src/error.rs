use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{models::ErrorBody, repository::StoreError};

/// AppError
///
/// The error taxonomy every handler and gate stage returns. The first three variants are the
/// access-control outcomes; the rest are service failures that must never be reported as
/// 401/403.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Malformed issuance or write request (400).
    #[error("{0}")]
    InvalidInput(String),
    /// Missing, malformed, expired or foreign token (401).
    #[error("unauthorized access")]
    Unauthorized,
    /// Valid token, insufficient role (403).
    #[error("forbidden access")]
    Forbidden,
    #[error("not found")]
    NotFound,
    /// Store connectivity or decoding failure (500).
    #[error("store failure: {0}")]
    Store(#[from] StoreError),
    /// Token signing failure (500).
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Store(_) | AppError::Signing(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Store(e) => {
                tracing::error!(error = %e, "store failure while serving request");
                "internal server error".to_string()
            }
            AppError::Signing(e) => {
                tracing::error!(error = %e, "failed to sign token");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(ErrorBody { message })).into_response()
    }
}
