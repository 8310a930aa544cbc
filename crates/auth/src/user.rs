//! User accounts as seen by the identity collaborator.
//!
//! Bookings reference users by id only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classbook_core::{DomainError, DomainResult, Entity, UserId};

use crate::UserRole;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    /// Stored lower-cased; unique.
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub is_active: bool,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}

impl Entity for User {
    type Id = UserId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Registration input. `password` is plain text and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub password: String,
    #[serde(default)]
    pub role: UserRole,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub email: Option<String>,
    pub name: Option<String>,
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn validate_email(email: &str) -> DomainResult<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation(format!("invalid email address '{email}'")));
    }
    Ok(())
}

fn validate_name(name: &str) -> DomainResult<()> {
    let len = name.trim().chars().count();
    if !(2..=100).contains(&len) {
        return Err(DomainError::validation("name must be between 2 and 100 characters"));
    }
    Ok(())
}

impl User {
    /// Build an active account. The password must already be hashed.
    pub fn register(
        id: UserId,
        input: &NewUser,
        password_hash: String,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let email = normalize_email(&input.email);
        validate_email(&email)?;
        validate_name(&input.name)?;

        Ok(Self {
            id,
            email,
            name: input.name.trim().to_string(),
            role: input.role,
            is_active: true,
            password_hash,
            created_at: now,
            updated_at: None,
            last_login: None,
        })
    }

    /// Validate then apply. Email uniqueness is the store's concern.
    pub fn apply_patch(&mut self, patch: UserPatch, now: DateTime<Utc>) -> DomainResult<()> {
        let email = patch.email.as_deref().map(normalize_email);
        if let Some(email) = &email {
            validate_email(email)?;
        }
        if let Some(name) = &patch.name {
            validate_name(name)?;
        }

        if let Some(email) = email {
            self.email = email;
        }
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        self.updated_at = Some(now);
        Ok(())
    }

    pub fn set_active(&mut self, active: bool, now: DateTime<Utc>) {
        self.is_active = active;
        self.updated_at = Some(now);
    }

    pub fn set_role(&mut self, role: UserRole, now: DateTime<Utc>) {
        self.role = role;
        self.updated_at = Some(now);
    }

    pub fn set_password_hash(&mut self, password_hash: String, now: DateTime<Utc>) {
        self.password_hash = password_hash;
        self.updated_at = Some(now);
    }

    pub fn record_login(&mut self, now: DateTime<Utc>) {
        self.last_login = Some(now);
    }
}
