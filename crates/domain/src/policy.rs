//! Authorization policy.
//!
//! Every boundary call asks [`authorize`] once with the acting principal, the
//! action and what it targets. There are no role checks anywhere else.

use common::{Actor, Role, UserId};
use serde::{Deserialize, Serialize};

/// Operations subject to authorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    ManageCart,
    PlaceOrder,
    ViewOrder,
    PayOrder,
    CancelOrder,
    UpdateOrderStatus,
    UpdateTracking,
    ManageCatalog,
    ManageUsers,
    ManageAdmins,
}

/// What an action is applied to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Resources with no owner, or the actor's own cart.
    Global,
    /// An order and the user who placed it.
    Order { owner: UserId },
    /// A user account with the given role.
    Account { role: Role },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    AccountSuspended,
    NotOwner,
    StaffOnly,
    SuperadminOnly,
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            DenyReason::AccountSuspended => "account is suspended",
            DenyReason::NotOwner => "resource belongs to another user",
            DenyReason::StaffOnly => "requires admin or superadmin role",
            DenyReason::SuperadminOnly => "requires superadmin role",
        };
        f.write_str(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

/// Decides whether `actor` may perform `action` on `target`.
pub fn authorize(actor: &Actor, action: Action, target: Target) -> Decision {
    if !actor.is_active() {
        return Decision::Deny(DenyReason::AccountSuspended);
    }

    let is_owner = match target {
        Target::Order { owner } => owner == actor.user_id,
        _ => false,
    };

    match action {
        Action::ManageCart | Action::PlaceOrder => Decision::Allow,
        Action::PayOrder => owner_only(is_owner),
        Action::ViewOrder | Action::CancelOrder => {
            if is_owner || actor.role.is_staff() {
                Decision::Allow
            } else {
                Decision::Deny(DenyReason::NotOwner)
            }
        }
        Action::UpdateOrderStatus | Action::UpdateTracking | Action::ManageCatalog => {
            staff_only(actor.role)
        }
        Action::ManageUsers => match target {
            Target::Account { role } if role.is_staff() => superadmin_only(actor.role),
            _ => staff_only(actor.role),
        },
        Action::ManageAdmins => superadmin_only(actor.role),
    }
}

fn owner_only(is_owner: bool) -> Decision {
    if is_owner {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::NotOwner)
    }
}

fn staff_only(role: Role) -> Decision {
    if role.is_staff() {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::StaffOnly)
    }
}

fn superadmin_only(role: Role) -> Decision {
    if role == Role::Superadmin {
        Decision::Allow
    } else {
        Decision::Deny(DenyReason::SuperadminOnly)
    }
}
