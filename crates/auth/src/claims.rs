use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use classbook_core::UserId;

use crate::UserRole;

/// Bearer token claims. Timestamps are seconds since the Unix epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject / user identifier.
    pub sub: UserId,

    pub role: UserRole,

    /// Issued-at.
    pub iat: i64,

    /// Expiration.
    pub exp: i64,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to encode token: {0}")]
    Encoding(String),

    #[error("invalid token: {0}")]
    Invalid(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Deterministically validate the time window of decoded claims.
pub fn validate_claims(claims: &JwtClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// HS256 token issuer and verifier sharing one secret.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl core::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenService").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, user_id: UserId, role: UserRole, now: DateTime<Utc>) -> Result<String, TokenError> {
        let claims = JwtClaims {
            sub: user_id,
            role,
            iat: now.timestamp(),
            exp: (now + self.ttl).timestamp(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| TokenError::Encoding(e.to_string()))
    }

    /// Verify the signature, then check the time window against `now`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the injected clock below.
        validation.validate_exp = false;

        let data = decode::<JwtClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn issued_token_verifies() {
        let tokens = TokenService::new(b"test-secret", Duration::minutes(30));
        let user = UserId::new();
        let token = tokens.issue(user, UserRole::Student, now()).unwrap();

        let claims = tokens.verify(&token, now() + Duration::minutes(5)).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, UserRole::Student);
    }

    #[test]
    fn expired_token_is_rejected() {
        let tokens = TokenService::new(b"test-secret", Duration::minutes(30));
        let token = tokens.issue(UserId::new(), UserRole::Admin, now()).unwrap();
        let err = tokens.verify(&token, now() + Duration::minutes(30)).unwrap_err();
        assert!(matches!(err, TokenError::Claims(TokenValidationError::Expired)));
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let ours = TokenService::new(b"test-secret", Duration::minutes(30));
        let theirs = TokenService::new(b"other-secret", Duration::minutes(30));
        let token = theirs.issue(UserId::new(), UserRole::Admin, now()).unwrap();
        assert!(matches!(ours.verify(&token, now()), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn inverted_window_is_invalid() {
        let claims = JwtClaims {
            sub: UserId::new(),
            role: UserRole::Student,
            iat: 100,
            exp: 100,
        };
        assert_eq!(
            validate_claims(&claims, now()),
            Err(TokenValidationError::InvalidTimeWindow)
        );
    }
}
