use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use sea_orm::error::{DbErr, SqlErr};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Standard error body returned by every HTTP handler.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// HTTP status category (e.g., "Not Found", "Conflict")
    pub error: String,
    /// Human-readable error description
    pub message: String,
    /// Structured shortfall when the failure is a stock conflict
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<StockShortfall>,
    /// Whether the caller may resubmit the same request
    pub retryable: bool,
    /// RFC 3339 timestamp when the error occurred
    pub timestamp: String,
}

/// What could not be covered when an order was rejected for stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StockShortfall {
    /// Finished-goods stock is lower than the requested quantity.
    Product {
        product_id: Uuid,
        requested: i32,
        available: i32,
    },
    /// Unused, unexpired batches do not cover the material requirement.
    Material {
        material_id: Uuid,
        required: Decimal,
        shortage: Decimal,
    },
}

impl fmt::Display for StockShortfall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StockShortfall::Product {
                product_id,
                requested,
                available,
            } => write!(
                f,
                "product {} has {} in stock, {} requested",
                product_id, available, requested
            ),
            StockShortfall::Material {
                material_id,
                required,
                shortage,
            } => write!(
                f,
                "material {} is short by {} (required {})",
                material_id, shortage, required
            ),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Insufficient stock: {0}")]
    InsufficientStock(StockShortfall),

    #[error("Concurrency conflict: {0}")]
    ConcurrencyConflict(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

impl ServiceError {
    /// Wraps a driver error, promoting unique-key races to a concurrency conflict.
    pub fn db_error(error: DbErr) -> Self {
        match error.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => {
                ServiceError::ConcurrencyConflict(format!("unique key raced: {}", detail))
            }
            _ => ServiceError::DatabaseError(error),
        }
    }

    /// Only lock contention is worth a second attempt; shortages are definitive.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ServiceError::ConcurrencyConflict(_) | ServiceError::Timeout(_)
        )
    }

    pub fn shortfall(&self) -> Option<&StockShortfall> {
        match self {
            ServiceError::InsufficientStock(shortfall) => Some(shortfall),
            _ => None,
        }
    }

    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::DatabaseError(_) | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ValidationError(_) => StatusCode::BAD_REQUEST,
            Self::InsufficientStock(_) | Self::ConcurrencyConflict(_) => StatusCode::CONFLICT,
            Self::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Storage failures return a generic message so driver details stay in the logs.
    pub fn response_message(&self) -> String {
        match self {
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::InternalError(_) => "Internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: status.canonical_reason().unwrap_or("Error").to_string(),
            message: self.response_message(),
            shortfall: self.shortfall().cloned(),
            retryable: self.is_retryable(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use rust_decimal_macros::dec;

    #[test]
    fn service_error_status_code_mapping() {
        assert_eq!(
            ServiceError::ValidationError("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ConcurrencyConflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ServiceError::Timeout("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServiceError::DatabaseError(DbErr::Custom("boom".into())).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn only_contention_is_retryable() {
        assert!(ServiceError::ConcurrencyConflict("batch".into()).is_retryable());
        assert!(ServiceError::Timeout("lock".into()).is_retryable());
        assert!(!ServiceError::InsufficientStock(StockShortfall::Product {
            product_id: Uuid::nil(),
            requested: 2,
            available: 1,
        })
        .is_retryable());
        assert!(!ServiceError::ValidationError("empty".into()).is_retryable());
    }

    #[test]
    fn database_errors_hide_driver_text() {
        let err = ServiceError::DatabaseError(DbErr::Custom("relation \"x\" missing".into()));
        assert_eq!(err.response_message(), "Database error");
    }

    #[tokio::test]
    async fn stock_conflict_response_carries_shortfall() {
        let material_id = Uuid::new_v4();
        let response = ServiceError::InsufficientStock(StockShortfall::Material {
            material_id,
            required: dec!(20),
            shortage: dec!(10),
        })
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let payload: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert!(!payload.retryable);
        assert_eq!(
            payload.shortfall,
            Some(StockShortfall::Material {
                material_id,
                required: dec!(20),
                shortage: dec!(10),
            })
        );
    }
}
