use chrono::{DateTime, Duration, Utc};

use classbook_core::{DomainError, DomainResult};

/// Booking cutoffs and optional rules, fixed at service construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookingPolicy {
    /// New bookings are refused once `now > start - booking_deadline`.
    pub booking_deadline: Duration,
    /// Owner cancellations are refused once `now > start - cancellation_deadline`.
    pub cancellation_deadline: Duration,
    /// Refuse a booking that overlaps another active booking of the same user.
    pub reject_overlapping_bookings: bool,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            booking_deadline: Duration::hours(2),
            cancellation_deadline: Duration::hours(4),
            reject_overlapping_bookings: false,
        }
    }
}

impl BookingPolicy {
    pub fn from_hours(booking_deadline_hours: i64, cancellation_deadline_hours: i64) -> Self {
        Self {
            booking_deadline: Duration::hours(booking_deadline_hours),
            cancellation_deadline: Duration::hours(cancellation_deadline_hours),
            ..Self::default()
        }
    }

    pub fn booking_cutoff(&self, session_start: DateTime<Utc>) -> DateTime<Utc> {
        session_start - self.booking_deadline
    }

    pub fn cancellation_cutoff(&self, session_start: DateTime<Utc>) -> DateTime<Utc> {
        session_start - self.cancellation_deadline
    }

    pub fn check_booking_deadline(
        &self,
        session_start: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if now > self.booking_cutoff(session_start) {
            return Err(DomainError::DeadlinePassed("booking"));
        }
        Ok(())
    }

    /// Administrative cancellations (`acting_user == false`) bypass the cutoff.
    pub fn check_cancellation_deadline(
        &self,
        session_start: DateTime<Utc>,
        acting_user: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        if acting_user && now > self.cancellation_cutoff(session_start) {
            return Err(DomainError::DeadlinePassed("cancellation"));
        }
        Ok(())
    }
}
