//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every variant is a recoverable, caller-visible condition. Infrastructure
/// failures (connection loss, aborted transactions) are not modelled here;
/// they travel next to these as store errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. malformed input, duplicate email).
    #[error("validation failed: {0}")]
    Validation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// A time interval whose end is not after its start.
    #[error("invalid time range: end must be after start")]
    InvalidRange,

    /// The session overlaps another active session.
    #[error("scheduling conflict: {0}")]
    SchedulingConflict(String),

    /// The session is not in a bookable state.
    #[error("session is not bookable (status: {0})")]
    NotBookable(String),

    /// The session has already started.
    #[error("session has already started")]
    PastSession,

    /// The session is full.
    #[error("session is fully booked (capacity {capacity})")]
    CapacityExceeded { capacity: u32 },

    /// The user already holds an active booking for the session.
    #[error("user already has an active booking for this session")]
    DuplicateBooking,

    /// A booking or cancellation cutoff has passed.
    #[error("{0} deadline has passed")]
    DeadlinePassed(&'static str),

    /// The acting user does not own the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A status change the state machine does not allow.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// Attendance marked before the session started.
    #[error("session has not started yet")]
    TooEarly,

    /// Credentials were rejected by the identity collaborator.
    #[error("authentication failed")]
    AuthenticationFailed,
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl core::fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::SchedulingConflict(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_transition(msg: impl Into<String>) -> Self {
        Self::InvalidTransition(msg.into())
    }

    /// Stable machine-readable code for the failure kind.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "validation_error",
            DomainError::InvalidId(_) => "invalid_id",
            DomainError::NotFound { .. } => "not_found",
            DomainError::InvalidRange => "invalid_range",
            DomainError::SchedulingConflict(_) => "scheduling_conflict",
            DomainError::NotBookable(_) => "not_bookable",
            DomainError::PastSession => "past_session",
            DomainError::CapacityExceeded { .. } => "capacity_exceeded",
            DomainError::DuplicateBooking => "duplicate_booking",
            DomainError::DeadlinePassed(_) => "deadline_passed",
            DomainError::Forbidden(_) => "forbidden",
            DomainError::InvalidTransition(_) => "invalid_transition",
            DomainError::TooEarly => "too_early",
            DomainError::AuthenticationFailed => "authentication_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_message_names_entity_and_id() {
        let err = DomainError::not_found("session", 42);
        assert_eq!(err.to_string(), "session not found: 42");
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn deadline_message_names_the_cutoff() {
        assert_eq!(
            DomainError::DeadlinePassed("cancellation").to_string(),
            "cancellation deadline has passed"
        );
    }
}
