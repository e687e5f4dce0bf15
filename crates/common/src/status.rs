//! Commission lifecycle status.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The status of a commission in its lifecycle.
///
/// ```text
/// Requested ──► Accepted ──► InProgress ──► Delivered ──► Completed
///     │             │             │          │    ▲
///     │             │             │          ▼    │
///     │             │             │    RevisionRequested
///     │             │             │          │
///     └─────────────┴─────────────┴──────────┴──► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommissionStatus {
    /// Submitted by the customer, awaiting the vendor.
    #[default]
    Requested,

    /// Vendor agreed to do the work.
    Accepted,

    /// Vendor is working on it.
    InProgress,

    /// Customer asked for changes after a delivery.
    RevisionRequested,

    /// Vendor handed over the work.
    Delivered,

    /// Customer accepted the delivery (terminal state).
    Completed,

    /// Commission was cancelled (terminal state).
    Cancelled,
}

impl CommissionStatus {
    pub const ALL: [CommissionStatus; 7] = [
        CommissionStatus::Requested,
        CommissionStatus::Accepted,
        CommissionStatus::InProgress,
        CommissionStatus::RevisionRequested,
        CommissionStatus::Delivered,
        CommissionStatus::Completed,
        CommissionStatus::Cancelled,
    ];

    /// Returns true if this is a terminal state (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommissionStatus::Completed | CommissionStatus::Cancelled
        )
    }

    /// Returns the status name as stored and serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Requested => "REQUESTED",
            CommissionStatus::Accepted => "ACCEPTED",
            CommissionStatus::InProgress => "IN_PROGRESS",
            CommissionStatus::RevisionRequested => "REVISION_REQUESTED",
            CommissionStatus::Delivered => "DELIVERED",
            CommissionStatus::Completed => "COMPLETED",
            CommissionStatus::Cancelled => "CANCELLED",
        }
    }
}

impl std::fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error returned when parsing an unknown status name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown commission status: {0}")]
pub struct ParseStatusError(pub String);

impl std::str::FromStr for CommissionStatus {
    type Err = ParseStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CommissionStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseStatusError(s.to_string()))
    }
}
