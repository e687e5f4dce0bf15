//! Domain error types.

use chrono::{DateTime, Utc};
use common::{CommissionStatus, GrantId};
use store::StoreError;
use thiserror::Error;

/// Errors surfaced by core operations.
///
/// Every variant except `Store` is a business-rule rejection the caller can
/// translate into a user-facing response.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The actor lacks the role or ownership required.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Optimistic-concurrency re-validation kept failing; the caller may retry.
    #[error("Conflict: {entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: String },

    /// A time-bounded entitlement lapsed.
    #[error("Download grant {grant_id} expired at {expired_at}")]
    Expired {
        grant_id: GrantId,
        expired_at: DateTime<Utc>,
    },

    /// A count-bounded entitlement is exhausted.
    #[error("Download grant {grant_id} has no downloads left (max {max_downloads})")]
    QuotaExceeded {
        grant_id: GrantId,
        max_downloads: u32,
    },

    /// The requested status change is not permitted from the current status.
    #[error("Invalid transition: cannot {action} from {status} status")]
    InvalidTransition {
        action: String,
        status: CommissionStatus,
    },

    /// Malformed input reached the core.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An infrastructure error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[source] StoreError),
}

impl From<StoreError> for DomainError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound { entity, id } => DomainError::NotFound { entity, id },
            StoreError::ConcurrencyConflict { entity, id, .. } => {
                DomainError::Conflict { entity, id }
            }
            StoreError::QuantityLimit { max } => {
                DomainError::Validation(format!("quantity must be at most {max}"))
            }
            other => DomainError::Store(other),
        }
    }
}

/// Coarse classification of a [`DomainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    Conflict,
    Expired,
    QuotaExceeded,
    InvalidTransition,
    Validation,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Expired => "expired",
            ErrorKind::QuotaExceeded => "quota_exceeded",
            ErrorKind::InvalidTransition => "invalid_transition",
            ErrorKind::Validation => "validation_failure",
            ErrorKind::Internal => "internal",
        }
    }
}

impl DomainError {
    /// Returns the error's classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::Forbidden(_) => ErrorKind::Forbidden,
            DomainError::Conflict { .. } => ErrorKind::Conflict,
            DomainError::Expired { .. } => ErrorKind::Expired,
            DomainError::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            DomainError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::Store(_) => ErrorKind::Internal,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: impl ToString) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}
