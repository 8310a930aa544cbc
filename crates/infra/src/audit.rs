//! Audit trail for state-changing operations.
//!
//! Services record an [`AuditEvent`] after their transaction commits. Sinks
//! are fire-and-forget: a sink never fails the operation that produced the
//! event.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classbook_core::UserId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    BookingCreated,
    BookingUpdated,
    BookingCancelled,
    BookingConfirmed,
    AttendanceMarked,
    SessionCreated,
    SessionUpdated,
    SessionCancelled,
    SessionCompleted,
    ClassCreated,
    ClassUpdated,
    AccountCreated,
    AccountUpdated,
    AccountActivated,
    AccountDeactivated,
    RoleChanged,
    PasswordChanged,
    Login,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::BookingCreated => "BOOKING_CREATED",
            AuditAction::BookingUpdated => "BOOKING_UPDATED",
            AuditAction::BookingCancelled => "BOOKING_CANCELLED",
            AuditAction::BookingConfirmed => "BOOKING_CONFIRMED",
            AuditAction::AttendanceMarked => "ATTENDANCE_MARKED",
            AuditAction::SessionCreated => "SESSION_CREATED",
            AuditAction::SessionUpdated => "SESSION_UPDATED",
            AuditAction::SessionCancelled => "SESSION_CANCELLED",
            AuditAction::SessionCompleted => "SESSION_COMPLETED",
            AuditAction::ClassCreated => "CLASS_CREATED",
            AuditAction::ClassUpdated => "CLASS_UPDATED",
            AuditAction::AccountCreated => "ACCOUNT_CREATED",
            AuditAction::AccountUpdated => "ACCOUNT_UPDATED",
            AuditAction::AccountActivated => "ACCOUNT_ACTIVATED",
            AuditAction::AccountDeactivated => "ACCOUNT_DEACTIVATED",
            AuditAction::RoleChanged => "ROLE_CHANGED",
            AuditAction::PasswordChanged => "PASSWORD_CHANGED",
            AuditAction::Login => "LOGIN",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEvent {
    pub action: AuditAction,
    /// Entity kind, e.g. `"booking"`.
    pub entity: &'static str,
    pub entity_id: String,
    /// `None` for administrative or system-driven changes without a known actor.
    pub actor: Option<UserId>,
    pub details: Option<String>,
    pub at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: AuditAction,
        entity: &'static str,
        entity_id: impl fmt::Display,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            action,
            entity,
            entity_id: entity_id.to_string(),
            actor: None,
            details: None,
            at,
        }
    }

    #[must_use]
    pub fn by(mut self, actor: Option<UserId>) -> Self {
        self.actor = actor;
        self
    }

    #[must_use]
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    fn record(&self, event: AuditEvent) {
        (**self).record(event)
    }
}

/// Writes each event as a structured log line under the `audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, event: AuditEvent) {
        tracing::info!(
            target: "audit",
            action = %event.action,
            entity = event.entity,
            entity_id = %event.entity_id,
            actor = ?event.actor.map(|id| id.to_string()),
            details = ?event.details,
            at = %event.at,
            "audit event"
        );
    }
}

/// Keeps events in memory; for tests and local runs.
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn actions(&self) -> Vec<AuditAction> {
        self.events().into_iter().map(|e| e.action).collect()
    }
}

impl AuditSink for InMemoryAuditSink {
    fn record(&self, event: AuditEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}
