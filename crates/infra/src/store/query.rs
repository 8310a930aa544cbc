//! Filters and joined read shapes for store queries.
//!
//! Every filter field is optional; present fields are combined as a
//! conjunction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classbook_auth::UserRole;
use classbook_booking::BookingStatus;
use classbook_classes::{ClassCategory, ClassStatus};
use classbook_core::{ClassId, UserId};
use classbook_scheduling::{Session, SessionStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub role: Option<UserRole>,
    pub is_active: Option<bool>,
    /// Case-insensitive substring of name or email.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassFilter {
    pub status: Option<ClassStatus>,
    pub category: Option<ClassCategory>,
    /// Case-insensitive substring of name or instructor.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionFilter {
    pub class_id: Option<ClassId>,
    pub status: Option<SessionStatus>,
    /// `start_time >= start_from`.
    pub start_from: Option<DateTime<Utc>>,
    /// `start_time <= start_to`.
    pub start_to: Option<DateTime<Utc>>,
    /// `start_time > starts_after`.
    pub starts_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingFilter {
    pub user_id: Option<UserId>,
    pub status: Option<BookingStatus>,
    /// Restrict to `PENDING`/`CONFIRMED`.
    pub active_only: bool,
    pub class_id: Option<ClassId>,
    /// Session `start_time >= session_start_from`.
    pub session_start_from: Option<DateTime<Utc>>,
    /// Session `start_time <= session_start_to`.
    pub session_start_to: Option<DateTime<Utc>>,
    /// Session `start_time > session_starts_after`.
    pub session_starts_after: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BookingOrder {
    /// Administrative listings.
    #[default]
    BookedAtDesc,
    /// A user's own history.
    SessionStartDesc,
    /// Upcoming bookings.
    SessionStartAsc,
}

/// Bookings whose statuses feed the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookingStatusFilter {
    pub user_id: Option<UserId>,
    /// `booked_at >= booked_from`.
    pub booked_from: Option<DateTime<Utc>>,
    /// `booked_at <= booked_to`.
    pub booked_to: Option<DateTime<Utc>>,
}

/// A session joined with its class and live seat count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDetails {
    #[serde(flatten)]
    pub session: Session,
    pub class_name: String,
    pub class_category: ClassCategory,
    pub instructor_name: String,
    pub price_cents: u64,
    pub duration_minutes: u32,
    pub max_capacity: u32,
    pub current_bookings: u64,
    pub available_spots: u64,
    /// `current_bookings / max_capacity`.
    pub occupancy: f64,
}

/// An upcoming session as offered to students.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookableSession {
    pub session_id: classbook_core::SessionId,
    pub session_title: String,
    pub start_time: DateTime<Utc>,
    pub available_spots: u64,
    pub is_bookable: bool,
    pub booking_deadline: DateTime<Utc>,
}
