//! Core error taxonomy.
//!
//! Every fallible operation in the engagement/moderation/verification core
//! returns one of these variants. Reason strings surfaced to callers are
//! drawn from this taxonomy only; raw storage or gateway messages never
//! leave the process.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use uuid::Uuid;

use crate::directory::ProductStatus;
use crate::billing::PaymentStatus;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// No resolvable identity behind the request.
    #[error("Authentication required")]
    Unauthenticated,

    /// Valid identity, insufficient role for the operation.
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error("Payment not found: {0}")]
    PaymentNotFound(Uuid),

    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Unknown, inactive or expired coupon code.
    #[error("Coupon is not valid: {0}")]
    CouponInvalid(String),

    /// Request payload failed a basic shape check.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Illegal product state-machine move.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: ProductStatus,
        to: ProductStatus,
    },

    /// Featured flag only applies to accepted products.
    #[error("Cannot change featured flag while product is {status}")]
    InvalidFeatureTransition { status: ProductStatus },

    /// Confirm disagreed with a payment already in a terminal state.
    #[error("Payment already {current}, cannot mark {requested}")]
    ConflictingTerminalState {
        current: PaymentStatus,
        requested: PaymentStatus,
    },

    /// Payment provider unreachable or rejected the charge.
    #[error("Payment gateway error: {0}")]
    UpstreamGateway(String),

    #[error("Storage error")]
    Storage(String),
}

impl CoreError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
            CoreError::Unauthorized(_) => StatusCode::FORBIDDEN,
            CoreError::ProductNotFound(_)
            | CoreError::PaymentNotFound(_)
            | CoreError::UserNotFound(_) => StatusCode::NOT_FOUND,
            CoreError::CouponInvalid(_) | CoreError::InvalidInput(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            CoreError::InvalidTransition { .. }
            | CoreError::InvalidFeatureTransition { .. }
            | CoreError::ConflictingTerminalState { .. } => StatusCode::CONFLICT,
            CoreError::UpstreamGateway(_) => StatusCode::BAD_GATEWAY,
            CoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage details stay in the logs, not the response body.
        let body = match &self {
            CoreError::Storage(detail) => {
                tracing::error!(detail = %detail, "Storage failure");
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };

        (status, body).into_response()
    }
}
