//! API error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use loanpilot_billing::BillingError;
use thiserror::Error;

/// Errors surfaced by the API layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Billing(#[from] BillingError),

    /// Request failed validation before reaching the engine.
    #[error("{0}")]
    BadRequest(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Billing(BillingError::PlanNotFound(_))
            | ApiError::Billing(BillingError::TenantNotFound(_))
            | ApiError::Billing(BillingError::SubscriptionNotFound(_))
            | ApiError::Billing(BillingError::ProductSubscriptionNotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            ApiError::Billing(BillingError::UnknownProductScope { .. }) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::Billing(BillingError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Persistence details stay in the logs, not in the response body.
        let message = match &self {
            ApiError::Billing(BillingError::Database(err)) => {
                tracing::error!(error = %err, "Database error while handling request");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
