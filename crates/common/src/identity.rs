//! Identity types supplied by the external authentication collaborator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::UserId;

/// Role of an authenticated user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
    Superadmin,
}

impl Role {
    /// Returns true for roles allowed into back-office operations.
    pub fn is_staff(&self) -> bool {
        matches!(self, Role::Admin | Role::Superadmin)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Customer => "customer",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role string is not recognised.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("unknown role: {0}")]
pub struct ParseRoleError(pub String);

impl std::str::FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(Role::Customer),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            other => Err(ParseRoleError(other.to_string())),
        }
    }
}

/// Whether an account may act at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Suspended,
}

/// The authenticated principal behind a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    #[serde(default)]
    pub status: AccountStatus,
}

impl Actor {
    /// Creates an active actor with the given role.
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            status: AccountStatus::Active,
        }
    }

    /// Shorthand for an active customer.
    pub fn customer(user_id: UserId) -> Self {
        Self::new(user_id, Role::Customer)
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}
