use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Errors surfaced at the HTTP boundary.
///
/// Everything past signature verification and token issuance is logged and
/// swallowed by the event handlers, so only request-shape, credential and
/// OAuth problems reach this type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Missing signature header")]
    MissingSignature,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("No payload provided")]
    MissingPayload,

    #[error("No installation ID found in payload")]
    MissingInstallation,

    #[error("Failed to generate installation token")]
    TokenUnavailable,

    #[error("No authorization code provided.")]
    MissingCode,

    #[error("{0}")]
    OAuth(String),

    #[error("No installations found or an error occurred.")]
    NoInstallations,

    #[error("An error occurred: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::MissingSignature | AppError::InvalidSignature => StatusCode::FORBIDDEN,
            AppError::MissingPayload
            | AppError::MissingInstallation
            | AppError::MissingCode
            | AppError::OAuth(_) => StatusCode::BAD_REQUEST,
            AppError::NoInstallations => StatusCode::NOT_FOUND,
            AppError::TokenUnavailable | AppError::Upstream(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let msg = match &self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": msg }))).into_response()
    }
}
