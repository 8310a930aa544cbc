//! API-side authorization guard.
//!
//! Capabilities are checked here, before a service is called. Ownership of
//! individual bookings is left to the booking engine.

use axum::http::StatusCode;
use axum::response::Response;

use classbook_auth::{AuthzError, Permission, authorize};

use crate::app::errors;
use crate::context::PrincipalContext;

/// Check every permission in `required` for the current principal.
pub fn authorize_request(
    principal: &PrincipalContext,
    required: &[Permission],
) -> Result<(), AuthzError> {
    for perm in required {
        authorize(principal.principal(), perm)?;
    }
    Ok(())
}

/// [`authorize_request`] mapped to a `403` response.
pub fn require(principal: &PrincipalContext, required: &[Permission]) -> Result<(), Response> {
    authorize_request(principal, required).map_err(|e| {
        tracing::warn!(user_id = %principal.user_id(), error = %e, "request denied");
        errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use classbook_auth::UserRole;
    use classbook_core::UserId;

    #[test]
    fn students_cannot_manage_sessions() {
        let student = PrincipalContext::new(UserId::new(), UserRole::Student);
        assert!(authorize_request(&student, &[Permission::SESSIONS_READ]).is_ok());
        assert!(
            authorize_request(&student, &[Permission::SESSIONS_READ, Permission::SESSIONS_WRITE])
                .is_err()
        );
    }

    #[test]
    fn admins_pass_every_check() {
        let admin = PrincipalContext::new(UserId::new(), UserRole::Admin);
        assert!(authorize_request(&admin, &[Permission::USERS_MANAGE, Permission::STATS_READ]).is_ok());
        assert_eq!(admin.acting_user(), None);
    }
}
