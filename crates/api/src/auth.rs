//! Request identity.
//!
//! Authentication happens upstream; the gateway in front of this service
//! forwards the verified principal as `x-user-*` headers.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use common::{AccountStatus, Actor, Role, UserId};
use fulfillment::CustomerContact;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_STATUS_HEADER: &str = "x-user-status";
pub const USER_NAME_HEADER: &str = "x-user-name";
pub const USER_EMAIL_HEADER: &str = "x-user-email";
pub const USER_PHONE_HEADER: &str = "x-user-phone";

/// The authenticated caller and their contact details.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub actor: Actor,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl CurrentUser {
    /// Contact details for payment sessions.
    pub fn contact(&self) -> CustomerContact {
        CustomerContact {
            name: self.name.clone().unwrap_or_default(),
            email: self.email.clone().unwrap_or_default(),
            phone: self.phone.clone().unwrap_or_default(),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        let user_id: UserId = header(USER_ID_HEADER)
            .ok_or_else(|| ApiError::Unauthorized("missing user identity".to_string()))?
            .parse()
            .map_err(|_| ApiError::Unauthorized("malformed user id".to_string()))?;

        let role = match header(USER_ROLE_HEADER) {
            Some(raw) => raw
                .parse::<Role>()
                .map_err(|e| ApiError::Unauthorized(e.to_string()))?,
            None => Role::Customer,
        };

        let status = match header(USER_STATUS_HEADER).as_deref() {
            Some("suspended") => AccountStatus::Suspended,
            _ => AccountStatus::Active,
        };

        Ok(Self {
            actor: Actor {
                user_id,
                role,
                status,
            },
            name: header(USER_NAME_HEADER),
            email: header(USER_EMAIL_HEADER),
            phone: header(USER_PHONE_HEADER),
        })
    }
}
