//! Identity collaborator: registration, credentials, tokens and the account
//! lifecycle as it affects bookings.

use tracing::instrument;

use classbook_auth::{
    NewUser, PasswordPolicy, TokenService, User, UserPatch, UserRole, hash_password,
    normalize_email, verify_password,
};
use classbook_core::{DomainError, Page, PageRequest, UserId};

use crate::audit::{AuditAction, AuditEvent};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{StoreTx, UserFilter};

use super::{ServiceContext, observe, unique_as};

fn email_taken(email: &str) -> DomainError {
    DomainError::validation(format!("email {email} is already registered"))
}

fn hash(password: &str) -> ServiceResult<String> {
    hash_password(password).map_err(|e| ServiceError::Internal(e.to_string()))
}

async fn load_user(tx: &mut dyn StoreTx, id: UserId) -> ServiceResult<User> {
    Ok(tx
        .get_user(id)
        .await?
        .ok_or_else(|| DomainError::not_found("user", id))?)
}

#[derive(Debug, Clone)]
pub struct AccountService {
    ctx: ServiceContext,
    password_policy: PasswordPolicy,
    tokens: TokenService,
}

impl AccountService {
    pub fn new(ctx: ServiceContext, password_policy: PasswordPolicy, tokens: TokenService) -> Self {
        Self {
            ctx,
            password_policy,
            tokens,
        }
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    /// Create an active account. Emails are unique case-insensitively.
    #[instrument(skip(self, input), fields(email = %input.email, role = input.role.as_str()))]
    pub async fn register(&self, input: NewUser) -> ServiceResult<User> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<User> = async {
            self.password_policy.validate(&input.password)?;
            let user = User::register(UserId::new(), &input, hash(&input.password)?, now)?;

            let mut tx = self.ctx.store().begin().await?;
            if tx.find_user_by_email(&user.email).await?.is_some() {
                return Err(email_taken(&user.email).into());
            }
            tx.insert_user(&user)
                .await
                .map_err(|e| unique_as(e, || email_taken(&user.email)))?;
            tx.commit().await?;
            Ok(user)
        }
        .await;

        let user = observe("register", result)?;
        tracing::info!(user_id = %user.id, "account created");
        self.ctx.record(
            AuditEvent::new(AuditAction::AccountCreated, "user", user.id, now)
                .by(Some(user.id))
                .with_details(user.role.as_str()),
        );
        Ok(user)
    }

    /// Register `input` as an administrator unless its email is taken.
    ///
    /// Returns the new account, or `None` when one already exists.
    pub async fn ensure_admin(&self, mut input: NewUser) -> ServiceResult<Option<User>> {
        let existing: ServiceResult<Option<User>> = async {
            let mut tx = self.ctx.store().begin().await?;
            let found = tx.find_user_by_email(&normalize_email(&input.email)).await?;
            tx.commit().await?;
            Ok(found)
        }
        .await;
        if observe("ensure_admin", existing)?.is_some() {
            return Ok(None);
        }
        input.role = UserRole::Admin;
        self.register(input).await.map(Some)
    }

    /// Check credentials and stamp the last login.
    ///
    /// Unknown email, inactive account and wrong password all fail the same
    /// way with `AuthenticationFailed`.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<User> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<User> = async {
            let mut tx = self.ctx.store().begin().await?;
            let Some(mut user) = tx.find_user_by_email(&normalize_email(email)).await? else {
                return Err(DomainError::AuthenticationFailed.into());
            };
            if !user.is_active {
                return Err(DomainError::AuthenticationFailed.into());
            }
            match verify_password(password, &user.password_hash) {
                Ok(true) => {}
                Ok(false) => return Err(DomainError::AuthenticationFailed.into()),
                Err(err) => {
                    tracing::warn!(user_id = %user.id, error = %err, "stored password hash unusable");
                    return Err(DomainError::AuthenticationFailed.into());
                }
            }
            user.record_login(now);
            tx.update_user(&user).await?;
            tx.commit().await?;
            Ok(user)
        }
        .await;

        let user = observe("authenticate", result)?;
        tracing::info!(user_id = %user.id, "login");
        self.ctx
            .record(AuditEvent::new(AuditAction::Login, "user", user.id, now).by(Some(user.id)));
        Ok(user)
    }

    /// Signed bearer token for `user`.
    pub fn issue_token(&self, user: &User) -> ServiceResult<String> {
        let now = self.ctx.clock().now();
        self.tokens
            .issue(user.id, user.role, now)
            .map_err(|e| ServiceError::Internal(e.to_string()))
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn get_user(&self, id: UserId) -> ServiceResult<User> {
        let result: ServiceResult<User> = async {
            let mut tx = self.ctx.store().begin().await?;
            let user = load_user(tx.as_mut(), id).await?;
            tx.commit().await?;
            Ok(user)
        }
        .await;
        observe("get_user", result)
    }

    /// Newest accounts first.
    #[instrument(skip(self))]
    pub async fn list_users(&self, filter: UserFilter, page: PageRequest) -> ServiceResult<Page<User>> {
        let result: ServiceResult<Page<User>> = async {
            let mut tx = self.ctx.store().begin().await?;
            let page = tx.list_users(&filter, page).await?;
            tx.commit().await?;
            Ok(page)
        }
        .await;
        observe("list_users", result)
    }

    #[instrument(skip(self, patch), fields(user_id = %id))]
    pub async fn update_user(&self, id: UserId, patch: UserPatch) -> ServiceResult<User> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<User> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut user = load_user(tx.as_mut(), id).await?;
            user.apply_patch(patch, now)?;
            if let Some(other) = tx.find_user_by_email(&user.email).await? {
                if other.id != id {
                    return Err(email_taken(&user.email).into());
                }
            }
            tx.update_user(&user)
                .await
                .map_err(|e| unique_as(e, || email_taken(&user.email)))?;
            tx.commit().await?;
            Ok(user)
        }
        .await;

        let user = observe("update_user", result)?;
        tracing::info!("account updated");
        self.ctx
            .record(AuditEvent::new(AuditAction::AccountUpdated, "user", id, now));
        Ok(user)
    }

    /// Requires the current password; the new one must satisfy the policy.
    #[instrument(skip(self, current, new), fields(user_id = %id))]
    pub async fn change_password(&self, id: UserId, current: &str, new: &str) -> ServiceResult<()> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<()> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut user = load_user(tx.as_mut(), id).await?;
            if !verify_password(current, &user.password_hash).unwrap_or(false) {
                return Err(DomainError::AuthenticationFailed.into());
            }
            self.password_policy.validate(new)?;
            user.set_password_hash(hash(new)?, now);
            tx.update_user(&user).await?;
            tx.commit().await?;
            Ok(())
        }
        .await;

        observe("change_password", result)?;
        tracing::info!("password changed");
        self.ctx.record(
            AuditEvent::new(AuditAction::PasswordChanged, "user", id, now).by(Some(id)),
        );
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn activate_user(&self, id: UserId) -> ServiceResult<User> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<User> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut user = load_user(tx.as_mut(), id).await?;
            user.set_active(true, now);
            tx.update_user(&user).await?;
            tx.commit().await?;
            Ok(user)
        }
        .await;

        let user = observe("activate_user", result)?;
        tracing::info!("account activated");
        self.ctx
            .record(AuditEvent::new(AuditAction::AccountActivated, "user", id, now));
        Ok(user)
    }

    /// Deactivate the account and cancel its active bookings on sessions
    /// that have not started yet.
    #[instrument(skip(self), fields(user_id = %id))]
    pub async fn deactivate_user(&self, id: UserId) -> ServiceResult<User> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<(User, usize)> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut user = load_user(tx.as_mut(), id).await?;
            user.set_active(false, now);
            tx.update_user(&user).await?;

            let mut cascaded = 0;
            for (mut booking, _) in tx.active_bookings_with_sessions(id, Some(now)).await? {
                if booking.cascade_cancel(now) {
                    tx.update_booking(&booking).await?;
                    cascaded += 1;
                }
            }
            tx.commit().await?;
            Ok((user, cascaded))
        }
        .await;

        let (user, cascaded) = observe("deactivate_user", result)?;
        tracing::info!(cancelled_bookings = cascaded, "account deactivated");
        self.ctx.record(
            AuditEvent::new(AuditAction::AccountDeactivated, "user", id, now)
                .with_details(format!("{cascaded} booking(s) cancelled")),
        );
        Ok(user)
    }

    pub async fn promote_to_admin(&self, id: UserId) -> ServiceResult<User> {
        self.set_role(id, UserRole::Admin).await
    }

    pub async fn demote_to_student(&self, id: UserId) -> ServiceResult<User> {
        self.set_role(id, UserRole::Student).await
    }

    #[instrument(skip(self), fields(user_id = %id, role = role.as_str()))]
    async fn set_role(&self, id: UserId, role: UserRole) -> ServiceResult<User> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<User> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut user = load_user(tx.as_mut(), id).await?;
            user.set_role(role, now);
            tx.update_user(&user).await?;
            tx.commit().await?;
            Ok(user)
        }
        .await;

        let user = observe("set_role", result)?;
        tracing::info!("role changed");
        self.ctx.record(
            AuditEvent::new(AuditAction::RoleChanged, "user", id, now).with_details(role.as_str()),
        );
        Ok(user)
    }
}
