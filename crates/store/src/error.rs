use thiserror::Error;

use crate::Version;

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// An insert collided with a uniqueness constraint.
    #[error("Unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    /// A compare-and-swap update found a different version than expected.
    #[error("Concurrency conflict for {entity} {id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        entity: &'static str,
        id: String,
        expected: Version,
        actual: Version,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A cart write would push a line past `MAX_CART_QUANTITY`.
    #[error("Cart line quantity would exceed the limit of {max}")]
    QuantityLimit { max: u32 },

    /// A value could not be converted between its domain and storage types.
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
