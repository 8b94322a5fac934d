//! Storefront Orders
//!
//! Back end for a storefront and its admin console.
//!
//! ## Features
//! - Product catalog lookups
//! - Shopping cart
//! - Checkout (cash on delivery or hosted payment gateway)
//! - Order lifecycle and payment reconciliation (webhook + session polling)
//! - Bearer-token authorization with role capabilities

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod payments;
pub mod services;
pub mod store;

use thiserror::Error;

use crate::domain::aggregates::OrderStatus;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden")]
    Forbidden,

    #[error("Product {product_id} is out of stock (requested {requested}, available {available})")]
    OutOfStock {
        product_id: uuid::Uuid,
        requested: u32,
        available: u32,
    },

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Payment gateway error: {0}")]
    PaymentGateway(String),

    #[error("Invalid webhook signature")]
    InvalidSignature,

    #[error("Invalid transition from {from} to {to}: {reason}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
        reason: &'static str,
    },

    #[error("Order is already {0}")]
    AlreadyInTerminalState(OrderStatus),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for EcommerceError {
    fn from(error: sqlx::Error) -> Self {
        if matches!(error, sqlx::Error::RowNotFound) {
            return Self::NotFound("record");
        }

        match error.as_database_error().map(|e| e.kind()) {
            Some(sqlx::error::ErrorKind::UniqueViolation) => Self::Conflict(error.to_string()),
            _ => Self::Storage(error.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
