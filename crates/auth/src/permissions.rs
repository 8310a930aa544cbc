use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::UserRole;

/// Permission identifier, e.g. `"bookings.create"`.
///
/// The wildcard `"*"` grants everything.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const CLASSES_READ: Permission = Permission(Cow::Borrowed("classes.read"));
    pub const CLASSES_WRITE: Permission = Permission(Cow::Borrowed("classes.write"));
    pub const SESSIONS_READ: Permission = Permission(Cow::Borrowed("sessions.read"));
    pub const SESSIONS_WRITE: Permission = Permission(Cow::Borrowed("sessions.write"));
    pub const BOOKINGS_READ_OWN: Permission = Permission(Cow::Borrowed("bookings.read_own"));
    pub const BOOKINGS_CREATE: Permission = Permission(Cow::Borrowed("bookings.create"));
    pub const BOOKINGS_UPDATE_OWN: Permission = Permission(Cow::Borrowed("bookings.update_own"));
    pub const BOOKINGS_MANAGE: Permission = Permission(Cow::Borrowed("bookings.manage"));
    pub const USERS_MANAGE: Permission = Permission(Cow::Borrowed("users.manage"));
    pub const STATS_READ: Permission = Permission(Cow::Borrowed("stats.read"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Role → permission policy.
///
/// Admins hold the wildcard. Students get read access plus booking
/// self-service; ownership of the bookings they touch is enforced by the core.
pub fn permissions_for_role(role: UserRole) -> Vec<Permission> {
    match role {
        UserRole::Admin => vec![Permission::WILDCARD],
        UserRole::Student => vec![
            Permission::CLASSES_READ,
            Permission::SESSIONS_READ,
            Permission::BOOKINGS_READ_OWN,
            Permission::BOOKINGS_CREATE,
            Permission::BOOKINGS_UPDATE_OWN,
        ],
    }
}
