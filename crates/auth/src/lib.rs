//! `classbook-auth` — identity and authorization boundary.
//!
//! Decoupled from HTTP and storage: user model, role policy, password rules
//! and token claims. The booking core only ever sees a `UserId`.

pub mod authorize;
pub mod claims;
pub mod password;
pub mod permissions;
pub mod roles;
pub mod user;

pub use authorize::{AuthzError, Principal, authorize};
pub use claims::{JwtClaims, TokenError, TokenService, TokenValidationError, validate_claims};
pub use password::{PasswordError, PasswordPolicy, hash_password, verify_password};
pub use permissions::{Permission, permissions_for_role};
pub use roles::UserRole;
pub use user::{NewUser, User, UserPatch, normalize_email};
