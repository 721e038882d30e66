//! HTTP route handlers.

pub mod admin;
pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod payment;
pub mod shipping;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path identifier, rejecting malformed values as bad requests.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what}: {raw}")))
}
