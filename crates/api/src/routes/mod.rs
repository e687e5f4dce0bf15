//! HTTP route handlers.

pub mod cart;
pub mod commissions;
pub mod downloads;
pub mod earnings;
pub mod health;
pub mod metrics;
pub mod wishlist;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path identifier, naming `what` in the error.
pub(crate) fn parse_id<T>(what: &str, raw: &str) -> Result<T, ApiError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {what}: {e}")))
}
