use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::response::{ApiResponse, Meta};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not Found")]
    NotFound,

    #[error("Bad Request: {0}")]
    Validation(String),

    #[error("Cart cannot hold more than {0} distinct products")]
    CartLimitExceeded(usize),

    #[error("Item unavailable: {0}")]
    ItemUnavailable(String),

    #[error("Order total {total} is below the minimum chargeable amount {minimum}")]
    BelowMinimumCharge { total: i64, minimum: i64 },

    #[error("Invalid price for product {0}")]
    InvalidPrice(uuid::Uuid),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Illegal status transition from {from} to {to}")]
    IllegalStatusTransition { from: String, to: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Payment provider error")]
    PaymentUpstream(#[from] reqwest::Error),

    #[error("Database error")]
    DbError(#[from] sqlx::Error),

    #[error("ORM error")]
    OrmError(#[from] sea_orm::DbErr),

    #[error("Internal Server Error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Stable machine-readable code surfaced alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::NotFound => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION",
            AppError::CartLimitExceeded(_) => "CART_LIMIT_EXCEEDED",
            AppError::ItemUnavailable(_) => "ITEM_UNAVAILABLE",
            AppError::BelowMinimumCharge { .. } => "BELOW_MINIMUM_CHARGE",
            AppError::InvalidPrice(_) => "INVALID_PRICE",
            AppError::InvalidSignature => "INVALID_SIGNATURE",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::Forbidden => "FORBIDDEN",
            AppError::IllegalStatusTransition { .. } => "ILLEGAL_STATUS_TRANSITION",
            AppError::Conflict(_) => "CONFLICT",
            AppError::PaymentUpstream(_) => "UPSTREAM_PAYMENT",
            AppError::DbError(_) | AppError::OrmError(_) => "UPSTREAM_DATABASE",
            AppError::Internal(_) => "INTERNAL",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Validation(_)
            | AppError::CartLimitExceeded(_)
            | AppError::ItemUnavailable(_)
            | AppError::BelowMinimumCharge { .. }
            | AppError::InvalidPrice(_)
            | AppError::InvalidSignature => StatusCode::BAD_REQUEST,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::IllegalStatusTransition { .. } | AppError::Conflict(_) => {
                StatusCode::CONFLICT
            }
            AppError::PaymentUpstream(_) => StatusCode::BAD_GATEWAY,
            AppError::DbError(_) | AppError::OrmError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Serialize)]
struct ErrorData {
    code: &'static str,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Driver-level detail stays in the logs, not in the response body.
        let message = match &self {
            AppError::DbError(err) => {
                tracing::error!(error = %err, "database error");
                "Database error".to_string()
            }
            AppError::OrmError(err) => {
                tracing::error!(error = %err, "orm error");
                "Database error".to_string()
            }
            AppError::PaymentUpstream(err) => {
                tracing::error!(error = %err, "payment provider error");
                "Payment provider error".to_string()
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal error");
                "Internal Server Error".to_string()
            }
            other => other.to_string(),
        };

        let body = ApiResponse {
            message: message.clone(),
            data: Some(ErrorData {
                code: self.code(),
                error: message,
            }),
            meta: Some(Meta::empty()),
        };

        (status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_family_maps_to_409() {
        let err = AppError::IllegalStatusTransition {
            from: "shipped".into(),
            to: "cancelled".into(),
        };
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "ILLEGAL_STATUS_TRANSITION");
        assert!(err.to_string().contains("shipped"));
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn checkout_failures_are_bad_requests() {
        assert_eq!(
            AppError::BelowMinimumCharge {
                total: 10,
                minimum: 50
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::CartLimitExceeded(50).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(AppError::InvalidSignature.status(), StatusCode::BAD_REQUEST);
    }
}
