use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use sea_orm::error::DbErr;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Standard error body returned by every failing endpoint.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    #[schema(example = "Conflict")]
    pub error: String,
    /// Human-readable error description
    #[schema(example = "Insufficient availability on 2024-06-02")]
    pub message: String,
    /// Additional detail (validation errors)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// ISO 8601 timestamp when the error occurred
    pub timestamp: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid date range: {0}")]
    InvalidDateRange(String),

    /// A date in the requested range has no availability slot row. Missing
    /// rows mean the window has not been orchestrated yet, never "free".
    #[error("No availability data for item {item_id} on {date}")]
    IncompleteAvailabilityData { item_id: Uuid, date: NaiveDate },

    #[error("Insufficient availability for item {item_id} on {date}: requested {requested}, available {available}")]
    InsufficientAvailability {
        item_id: Uuid,
        date: NaiveDate,
        requested: i32,
        available: i32,
    },

    /// Could not acquire the per-item allocation lock within the configured
    /// bound. Safe to retry with backoff.
    #[error("Allocation timed out for item {0}")]
    AllocationTimeout(Uuid),

    #[error("Invalid booking transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Event error: {0}")]
    EventError(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) | Self::InvalidDateRange(_) => StatusCode::BAD_REQUEST,
            Self::IncompleteAvailabilityData { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InsufficientAvailability { .. } | Self::InvalidTransition { .. } => {
                StatusCode::CONFLICT
            }
            Self::AllocationTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::DatabaseError(_)
            | Self::EventError(_)
            | Self::InternalError(_)
            | Self::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message suitable for HTTP responses. Internal failures are redacted.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::EventError(_) | Self::InternalError(_) | Self::Other(_) => {
                "Internal server error".to_string()
            }
            Self::IncompleteAvailabilityData { .. } => {
                "Item is not bookable for the requested dates".to_string()
            }
            Self::AllocationTimeout(_) => {
                "Allocation is busy for this item, please retry".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            details: None,
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_for_domain_failures() {
        let item_id = Uuid::new_v4();
        let date = NaiveDate::from_ymd_opt(2024, 6, 2).unwrap();

        assert_eq!(
            ServiceError::InsufficientAvailability {
                item_id,
                date,
                requested: 2,
                available: 1
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::IncompleteAvailabilityData { item_id, date }.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ServiceError::AllocationTimeout(item_id).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServiceError::InvalidTransition {
                from: "completed".into(),
                to: "confirmed".into()
            }
            .status_code(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn internal_errors_are_redacted() {
        let err = ServiceError::InternalError("connection pool exhausted".into());
        assert_eq!(err.response_message(), "Internal server error");

        let err = ServiceError::DatabaseError(DbErr::Custom("secret dsn".into()));
        assert_eq!(err.response_message(), "Database error");
    }

    #[test]
    fn insufficient_availability_names_the_conflicting_date() {
        let err = ServiceError::InsufficientAvailability {
            item_id: Uuid::nil(),
            date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
            requested: 1,
            available: 0,
        };
        assert!(err.response_message().contains("2024-06-02"));
    }
}
