use classbook_auth::{Principal, UserRole};
use classbook_core::UserId;

/// Principal context for a request (authenticated identity + role).
///
/// The role is the one stored on the account at request time, not the one
/// baked into the token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(user_id: UserId, role: UserRole) -> Self {
        Self {
            principal: Principal::from_role(user_id, role),
        }
    }

    pub fn user_id(&self) -> UserId {
        self.principal.user_id
    }

    pub fn role(&self) -> UserRole {
        self.principal.role
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// `Some(self)` for students, `None` for administrators.
    pub fn acting_user(&self) -> Option<UserId> {
        self.principal.acting_user()
    }
}
