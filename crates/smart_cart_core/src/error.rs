//! crates/smart_cart_core/src/error.rs
//!
//! The error type returned by every cart core operation.

use crate::domain::CartId;
use crate::ports::{GatewayFailure, PortError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CartError {
    /// A required field is missing or invalid. Not retried.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// The cart belongs to another account.
    #[error("Cart {cart_id} is already bound to another account")]
    AlreadyBound { cart_id: CartId },

    #[error("Insufficient points: requested {requested}, available {available}")]
    InsufficientPoints { requested: u64, available: u64 },

    /// The payment gateway rejected the call or could not be reached.
    /// Cart state is preserved so the shopper can retry.
    #[error("Payment gateway error [{code}]: {message}")]
    Gateway { code: String, message: String },

    /// The payment went through but a post-payment effect could not be applied.
    #[error("Order {order_id} completed but '{step}' failed: {message}")]
    SideEffect {
        order_id: String,
        step: &'static str,
        message: String,
    },

    #[error("Store error: {0}")]
    Store(PortError),
}

impl CartError {
    /// Stable error kind exposed to callers.
    pub fn kind(&self) -> &'static str {
        match self {
            CartError::Validation(_) => "ValidationError",
            CartError::NotFound(_) => "NotFound",
            CartError::AlreadyBound { .. } => "AlreadyBound",
            CartError::InsufficientPoints { .. } => "InsufficientPoints",
            CartError::Gateway { .. } => "GatewayError",
            CartError::SideEffect { .. } => "SideEffectFailed",
            CartError::Store(_) => "StoreError",
        }
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        CartError::Validation(message.into())
    }

    pub(crate) fn gateway_unreachable(err: PortError) -> Self {
        CartError::Gateway {
            code: "TRANSPORT".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<PortError> for CartError {
    fn from(err: PortError) -> Self {
        match err {
            PortError::NotFound(what) => CartError::NotFound(what),
            other => CartError::Store(other),
        }
    }
}

impl From<GatewayFailure> for CartError {
    fn from(failure: GatewayFailure) -> Self {
        CartError::Gateway {
            code: failure.code,
            message: failure.message,
        }
    }
}

pub type CartResult<T> = Result<T, CartError>;
