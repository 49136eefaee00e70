//! Shop Orders
//!
//! Online shop backend built around a stock-safe order path.
//!
//! ## Features
//! - Catalog browsing of in-stock listings
//! - Session-scoped cart
//! - Order placement with row-level stock reservation (no oversell)
//! - Supplier feed import (YAML, JSON, Excel) with idempotent upserts
//! - Fire-and-forget order confirmation emails

pub mod api;
pub mod auth;
pub mod config;
pub mod domain;
pub mod notify;
pub mod services;
pub mod session;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

use crate::store::StoreError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum ShopError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("insufficient stock for {product_info_id}: requested {requested}, available {available}")]
    InsufficientStock { product_info_id: Uuid, requested: u32, available: u32 },

    #[error("{0}")]
    Forbidden(String),

    #[error("unsupported feed format: {0}")]
    UnsupportedFormat(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl ShopError {
    pub fn validation(msg: impl Into<String>) -> Self { Self::Validation(msg.into()) }
    pub fn not_found(what: impl Into<String>) -> Self { Self::NotFound(what.into()) }

    /// Stable machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::NotFound(_) => "not_found",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::Forbidden(_) => "forbidden",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::Conflict(_) => "conflict",
            Self::Storage(_) => "storage_error",
        }
    }
}

impl From<StoreError> for ShopError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::UniqueViolation(what) => Self::Conflict(what),
            other => Self::Storage(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, ShopError>;

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn test_error_kinds_are_stable() {
        let stock = ShopError::InsufficientStock { product_info_id: Uuid::nil(), requested: 2, available: 1 };
        assert_eq!(stock.kind(), "insufficient_stock");
        assert!(stock.to_string().contains("available 1"));
        assert_eq!(ShopError::not_found("contact").to_string(), "contact not found");
        assert_eq!(ShopError::from(StoreError::UniqueViolation("shops.name".into())).kind(), "conflict");
    }
}
