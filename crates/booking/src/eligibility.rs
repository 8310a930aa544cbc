//! Ordered checks a session must pass before a seat is reserved.

use chrono::{DateTime, Utc};

use classbook_core::{DomainError, DomainResult, TimeRange};
use classbook_scheduling::Session;

use crate::policy::BookingPolicy;

/// Seat accounting for one session, read under the session lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatSnapshot {
    pub max_capacity: u32,
    pub active_bookings: u64,
    /// The requesting user already holds an active booking here.
    pub user_has_active_booking: bool,
}

impl SeatSnapshot {
    pub fn is_full(&self) -> bool {
        self.active_bookings >= u64::from(self.max_capacity)
    }
}

/// Run the eligibility checks in their fixed order.
///
/// Session existence is checked by the caller; the remaining order is
/// `NotBookable`, `PastSession`, `CapacityExceeded`, `DuplicateBooking`,
/// `DeadlinePassed`.
pub fn check_eligibility(
    session: &Session,
    seats: &SeatSnapshot,
    policy: &BookingPolicy,
    now: DateTime<Utc>,
) -> DomainResult<()> {
    if !session.status.is_bookable() {
        return Err(DomainError::NotBookable(session.status.as_str().to_string()));
    }
    if session.has_started(now) {
        return Err(DomainError::PastSession);
    }
    if seats.is_full() {
        return Err(DomainError::CapacityExceeded {
            capacity: seats.max_capacity,
        });
    }
    if seats.user_has_active_booking {
        return Err(DomainError::DuplicateBooking);
    }
    policy.check_booking_deadline(session.start_time, now)
}

/// Whether any of `held` (sessions behind the user's active bookings)
/// overlaps `target`. The target itself is ignored.
pub fn has_overlapping_booking(target: &Session, held: &[Session]) -> bool {
    let Ok(range) = TimeRange::new(target.start_time, target.end_time) else {
        return false;
    };
    held.iter()
        .any(|session| session.id != target.id && session.overlaps(&range))
}
