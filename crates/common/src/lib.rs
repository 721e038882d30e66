//! Shared identifiers and identity types used across the commerce crates.

pub mod identity;
pub mod types;

pub use identity::{AccountStatus, Actor, ParseRoleError, Role};
pub use types::{CartId, OrderId, ProductId, UserId};
