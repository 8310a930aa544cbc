use core::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classbook_core::{BookingId, DomainError, DomainResult, Entity, SessionId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl BookingStatus {
    pub const ACTIVE: [BookingStatus; 2] = [BookingStatus::Pending, BookingStatus::Confirmed];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::NoShow => "NO_SHOW",
        }
    }

    /// `PENDING` or `CONFIRMED`: holds a seat.
    pub fn is_active(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_active()
    }
}

impl FromStr for BookingStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PENDING" => Ok(BookingStatus::Pending),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "NO_SHOW" => Ok(BookingStatus::NoShow),
            other => Err(DomainError::validation(format!("unknown booking status '{other}'"))),
        }
    }
}

/// A user's reservation for one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Entity for Booking {
    type Id = BookingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Generic partial update.
///
/// Deliberately unguarded: any status may be written through this path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingPatch {
    pub status: Option<BookingStatus>,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
}

impl Booking {
    pub fn reserve(
        id: BookingId,
        user_id: UserId,
        session_id: SessionId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            user_id,
            session_id,
            status: BookingStatus::Pending,
            booked_at: now,
            notes,
            admin_notes: None,
            updated_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Ownership check. `None` means an administrative caller.
    pub fn ensure_owned_by(&self, acting: Option<UserId>) -> DomainResult<()> {
        match acting {
            Some(user) if user != self.user_id => Err(DomainError::forbidden(format!(
                "booking {} belongs to another user",
                self.id
            ))),
            _ => Ok(()),
        }
    }

    pub fn apply_patch(&mut self, patch: BookingPatch, now: DateTime<Utc>) {
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(notes) = patch.notes {
            self.notes = Some(notes);
        }
        if let Some(admin_notes) = patch.admin_notes {
            self.admin_notes = Some(admin_notes);
        }
        self.updated_at = Some(now);
    }

    pub fn confirm(&mut self, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status != BookingStatus::Pending {
            return Err(DomainError::invalid_transition(format!(
                "only pending bookings can be confirmed (status: {})",
                self.status.as_str()
            )));
        }
        self.status = BookingStatus::Confirmed;
        self.updated_at = Some(now);
        Ok(())
    }

    /// Cancel an active booking, recording the reason in the admin notes.
    pub fn cancel(&mut self, reason: Option<&str>, now: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_active("cancelled")?;
        if let Some(reason) = reason {
            let previous = self.admin_notes.as_deref().unwrap_or_default();
            self.admin_notes = Some(format!("{previous}\nCancellation reason: {reason}"));
        }
        self.status = BookingStatus::Cancelled;
        self.updated_at = Some(now);
        Ok(())
    }

    /// Cancellation driven by the session or the owner going away.
    ///
    /// Returns whether the booking changed; terminal bookings are left alone.
    pub fn cascade_cancel(&mut self, now: DateTime<Utc>) -> bool {
        if !self.is_active() {
            return false;
        }
        self.status = BookingStatus::Cancelled;
        self.updated_at = Some(now);
        true
    }

    /// `COMPLETED` when attended, otherwise `NO_SHOW`. Refused before the session starts.
    pub fn mark_attendance(
        &mut self,
        session_start: DateTime<Utc>,
        attended: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if session_start > now {
            return Err(DomainError::TooEarly);
        }
        self.ensure_active("marked for attendance")?;
        self.status = if attended {
            BookingStatus::Completed
        } else {
            BookingStatus::NoShow
        };
        self.updated_at = Some(now);
        Ok(())
    }

    fn ensure_active(&self, action: &str) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "{} booking cannot be {action}",
                self.status.as_str().to_ascii_lowercase()
            )));
        }
        Ok(())
    }
}
