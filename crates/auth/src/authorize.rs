use std::collections::HashSet;

use thiserror::Error;

use classbook_core::UserId;

use crate::{Permission, UserRole, permissions_for_role};

/// A fully resolved principal for authorization decisions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub role: UserRole,
    pub permissions: Vec<Permission>,
}

impl Principal {
    /// Resolve permissions from the role policy.
    pub fn from_role(user_id: UserId, role: UserRole) -> Self {
        Self {
            user_id,
            role,
            permissions: permissions_for_role(role),
        }
    }

    /// Identity passed to ownership-checked core operations.
    ///
    /// Administrators act without one and so bypass ownership and owner-only
    /// deadlines; students always act as themselves.
    pub fn acting_user(&self) -> Option<UserId> {
        if self.role.is_admin() {
            None
        } else {
            Some(self.user_id)
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure capability check. No IO.
pub fn authorize(principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let perms: HashSet<&str> = principal.permissions.iter().map(|p| p.as_str()).collect();

    if perms.contains("*") || perms.contains(required.as_str()) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}
