//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// missing references, stock exhaustion). Infrastructure concerns belong
/// elsewhere.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, empty cart).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A referenced entity does not exist (names the entity).
    #[error("{0} not found")]
    NotFound(String),

    /// An item belongs to a different shop than the one stated in the request.
    #[error("item {item} does not belong to the specified shop")]
    ShopMismatch { item: String },

    /// Requested quantity exceeds the item's available quantity.
    #[error("insufficient stock for {item}: {available} available, {requested} requested")]
    InsufficientStock {
        item: String,
        available: u32,
        requested: u32,
    },

    /// A conflict occurred (e.g. concurrent writer, terminal booking status).
    #[error("conflict: {0}")]
    Conflict(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }
}
