use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by services and HTTP handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("an invoice reference or a BL number is required")]
    MissingReference,

    #[error("invoice verification is not configured for store '{store}'")]
    VerificationUnavailable { store: String },

    #[error("ledger lookup failed: {0}")]
    ExternalLookup(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("{0}")]
    Conflict(String),

    #[error("invoice processing timed out after {0} seconds, please retry")]
    WebhookTimeout(u64),

    #[error("invoice upload failed: {0}")]
    WebhookFailed(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::MissingReference | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::PermissionDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidTransition(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::VerificationUnavailable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ExternalLookup(_) | Self::WebhookFailed(_) => StatusCode::BAD_GATEWAY,
            Self::WebhookTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::warn!(error = %self, "request rejected");
        }

        // Do not leak SQL details to the client.
        let message = match &self {
            Self::Database(_) => "database error".to_string(),
            other => other.to_string(),
        };

        (
            status,
            Json(ErrorBody {
                success: false,
                message,
            }),
        )
            .into_response()
    }
}
