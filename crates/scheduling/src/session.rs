use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classbook_core::{ClassId, DomainError, DomainResult, Entity, SessionId, TimeRange};

use crate::conflict::SessionSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Scheduled,
    Ongoing,
    Completed,
    Cancelled,
    Postponed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Scheduled => "SCHEDULED",
            SessionStatus::Ongoing => "ONGOING",
            SessionStatus::Completed => "COMPLETED",
            SessionStatus::Cancelled => "CANCELLED",
            SessionStatus::Postponed => "POSTPONED",
        }
    }

    /// Statuses that occupy their time slot for conflict detection.
    pub fn occupies_slot(&self) -> bool {
        matches!(self, SessionStatus::Scheduled | SessionStatus::Ongoing)
    }

    pub fn is_bookable(&self) -> bool {
        matches!(self, SessionStatus::Scheduled)
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SCHEDULED" => Ok(SessionStatus::Scheduled),
            "ONGOING" => Ok(SessionStatus::Ongoing),
            "COMPLETED" => Ok(SessionStatus::Completed),
            "CANCELLED" => Ok(SessionStatus::Cancelled),
            "POSTPONED" => Ok(SessionStatus::Postponed),
            other => Err(DomainError::validation(format!("unknown session status '{other}'"))),
        }
    }
}

/// One scheduled occurrence of a class.
///
/// Capacity is not stored here; it is read from the owning class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub class_id: ClassId,
    pub start_time: DateTime<Utc>,
    /// Always strictly after `start_time`.
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub status: SessionStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Session {
    type Id = SessionId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSession {
    pub class_id: ClassId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub location: Option<String>,
    pub notes: Option<String>,
}

impl NewSession {
    pub fn slot(&self) -> DomainResult<SessionSlot> {
        Ok(SessionSlot {
            range: TimeRange::new(self.start_time, self.end_time)?,
            location: self.location.clone(),
        })
    }
}

/// Partial session update. Unset fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPatch {
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub status: Option<SessionStatus>,
    pub notes: Option<String>,
}

impl SessionPatch {
    /// Whether the patch moves the session in time or space.
    pub fn moves_slot(&self) -> bool {
        self.start_time.is_some() || self.end_time.is_some() || self.location.is_some()
    }
}

impl Session {
    /// Build a `SCHEDULED` session from validated input.
    pub fn schedule(id: SessionId, input: NewSession, now: DateTime<Utc>) -> DomainResult<Self> {
        let slot = input.slot()?;
        Ok(Self {
            id,
            class_id: input.class_id,
            start_time: slot.range.start(),
            end_time: slot.range.end(),
            location: input.location,
            status: SessionStatus::Scheduled,
            notes: input.notes,
            created_at: now,
            updated_at: None,
        })
    }

    pub fn overlaps(&self, range: &TimeRange) -> bool {
        self.start_time < range.end() && range.start() < self.end_time
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }

    /// The slot this session would occupy after `patch` is merged in.
    pub fn merged_slot(&self, patch: &SessionPatch) -> DomainResult<SessionSlot> {
        let start = patch.start_time.unwrap_or(self.start_time);
        let end = patch.end_time.unwrap_or(self.end_time);
        Ok(SessionSlot {
            range: TimeRange::new(start, end)?,
            location: patch.location.clone().or_else(|| self.location.clone()),
        })
    }

    pub fn apply_patch(&mut self, patch: SessionPatch, now: DateTime<Utc>) -> DomainResult<()> {
        let slot = self.merged_slot(&patch)?;
        self.start_time = slot.range.start();
        self.end_time = slot.range.end();
        self.location = slot.location;
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
        self.updated_at = Some(now);
        Ok(())
    }

    /// Transition to `CANCELLED` and append the reason to the notes.
    ///
    /// Returns `false` when the session was already cancelled; the notes are
    /// left alone in that case.
    pub fn cancel(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> bool {
        if self.status == SessionStatus::Cancelled {
            return false;
        }
        let previous = self.notes.as_deref().unwrap_or_default();
        let reason = reason.unwrap_or("No reason provided");
        self.notes = Some(format!("{previous}\nCancelled: {reason}"));
        self.status = SessionStatus::Cancelled;
        self.updated_at = Some(now);
        true
    }

    /// Mark completed. No start-time check is applied.
    pub fn complete(&mut self, now: DateTime<Utc>) {
        self.status = SessionStatus::Completed;
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 3, 1, hour, 0, 0).unwrap()
    }

    fn test_session() -> Session {
        Session::schedule(
            SessionId::new(),
            NewSession {
                class_id: ClassId::new(),
                start_time: at(9),
                end_time: at(10),
                location: Some("Studio A".to_string()),
                notes: None,
            },
            at(0),
        )
        .unwrap()
    }

    #[test]
    fn schedule_rejects_inverted_range() {
        let err = Session::schedule(
            SessionId::new(),
            NewSession {
                class_id: ClassId::new(),
                start_time: at(10),
                end_time: at(9),
                location: None,
                notes: None,
            },
            at(0),
        )
        .unwrap_err();
        assert_eq!(err, DomainError::InvalidRange);
    }

    #[test]
    fn merged_slot_keeps_unset_fields() {
        let session = test_session();
        let patch = SessionPatch {
            end_time: Some(at(11)),
            ..SessionPatch::default()
        };
        let slot = session.merged_slot(&patch).unwrap();
        assert_eq!(slot.range.start(), at(9));
        assert_eq!(slot.range.end(), at(11));
        assert_eq!(slot.location.as_deref(), Some("Studio A"));
    }

    #[test]
    fn patch_moving_start_past_end_is_invalid_range() {
        let mut session = test_session();
        let patch = SessionPatch {
            start_time: Some(at(10) + Duration::minutes(30)),
            ..SessionPatch::default()
        };
        assert_eq!(session.apply_patch(patch, at(1)), Err(DomainError::InvalidRange));
        assert_eq!(session.start_time, at(9));
    }

    #[test]
    fn cancel_appends_reason_once() {
        let mut session = test_session();
        assert!(session.cancel(Some("instructor ill"), at(1)));
        assert_eq!(session.status, SessionStatus::Cancelled);
        assert_eq!(session.notes.as_deref(), Some("\nCancelled: instructor ill"));

        assert!(!session.cancel(Some("again"), at(2)));
        assert_eq!(session.notes.as_deref(), Some("\nCancelled: instructor ill"));
        assert_eq!(session.updated_at, Some(at(1)));
    }

    #[test]
    fn cancel_without_reason_uses_placeholder() {
        let mut session = test_session();
        session.notes = Some("Bring a mat".to_string());
        session.cancel(None, at(1));
        assert_eq!(
            session.notes.as_deref(),
            Some("Bring a mat\nCancelled: No reason provided")
        );
    }

    #[test]
    fn only_scheduled_and_ongoing_occupy_slots() {
        assert!(SessionStatus::Scheduled.occupies_slot());
        assert!(SessionStatus::Ongoing.occupies_slot());
        assert!(!SessionStatus::Cancelled.occupies_slot());
        assert!(!SessionStatus::Completed.occupies_slot());
        assert!(!SessionStatus::Postponed.occupies_slot());
    }
}
