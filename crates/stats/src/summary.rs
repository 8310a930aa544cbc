use serde::{Deserialize, Serialize};

use classbook_booking::BookingStatus;
use classbook_core::{SessionId, UserId};

use crate::rates::percentage;

/// Booking counts by status over a window of booking creation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookingStats {
    pub total_bookings: u64,
    pub pending_bookings: u64,
    pub confirmed_bookings: u64,
    pub cancelled_bookings: u64,
    pub completed_bookings: u64,
    pub no_shows: u64,
    pub completion_rate: f64,
    pub no_show_rate: f64,
}

impl BookingStats {
    pub fn from_statuses(statuses: impl IntoIterator<Item = BookingStatus>) -> Self {
        let mut stats = Self::default();
        for status in statuses {
            stats.total_bookings += 1;
            match status {
                BookingStatus::Pending => stats.pending_bookings += 1,
                BookingStatus::Confirmed => stats.confirmed_bookings += 1,
                BookingStatus::Cancelled => stats.cancelled_bookings += 1,
                BookingStatus::Completed => stats.completed_bookings += 1,
                BookingStatus::NoShow => stats.no_shows += 1,
            }
        }
        stats.completion_rate = percentage(stats.completed_bookings, stats.total_bookings);
        stats.no_show_rate = percentage(stats.no_shows, stats.total_bookings);
        stats
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionAttendance {
    pub session_id: SessionId,
    pub total_bookings: u64,
    pub attended: u64,
    pub no_shows: u64,
    pub attendance_rate: f64,
}

impl SessionAttendance {
    /// Counts every booking of the session, cancelled ones included.
    pub fn from_statuses(
        session_id: SessionId,
        statuses: impl IntoIterator<Item = BookingStatus>,
    ) -> Self {
        let (mut total, mut attended, mut no_shows) = (0u64, 0u64, 0u64);
        for status in statuses {
            total += 1;
            match status {
                BookingStatus::Completed => attended += 1,
                BookingStatus::NoShow => no_shows += 1,
                _ => {}
            }
        }
        Self {
            session_id,
            total_bookings: total,
            attended,
            no_shows,
            attendance_rate: percentage(attended, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserStats {
    pub user_id: UserId,
    pub total_bookings: u64,
    pub completed_bookings: u64,
    pub cancelled_bookings: u64,
    /// Active bookings on sessions that have not started yet.
    pub upcoming_bookings: u64,
    pub completion_rate: f64,
}

impl UserStats {
    pub fn new(
        user_id: UserId,
        total_bookings: u64,
        completed_bookings: u64,
        cancelled_bookings: u64,
        upcoming_bookings: u64,
    ) -> Self {
        Self {
            user_id,
            total_bookings,
            completed_bookings,
            cancelled_bookings,
            upcoming_bookings,
            completion_rate: percentage(completed_bookings, total_bookings),
        }
    }
}

/// System-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemStats {
    pub total_users: u64,
    pub active_users: u64,
    pub total_classes: u64,
    pub active_classes: u64,
    pub total_sessions: u64,
    pub upcoming_sessions: u64,
    pub total_bookings: u64,
}
