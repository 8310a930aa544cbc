use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use classbook_core::{BookingId, SessionId, UserId};

use crate::booking::{Booking, BookingStatus};

/// A booking joined with its session, class and user for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingDetails {
    pub id: BookingId,
    pub user_id: UserId,
    pub session_id: SessionId,
    pub status: BookingStatus,
    pub booked_at: DateTime<Utc>,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub user_name: String,
    pub user_email: String,
    pub class_name: String,
    pub session_title: String,
    pub session_date: DateTime<Utc>,
}

impl BookingDetails {
    pub fn new(
        booking: Booking,
        user_name: String,
        user_email: String,
        class_name: String,
        session_start: DateTime<Utc>,
    ) -> Self {
        Self {
            session_title: session_title(&class_name, session_start),
            id: booking.id,
            user_id: booking.user_id,
            session_id: booking.session_id,
            status: booking.status,
            booked_at: booking.booked_at,
            notes: booking.notes,
            admin_notes: booking.admin_notes,
            updated_at: booking.updated_at,
            user_name,
            user_email,
            class_name,
            session_date: session_start,
        }
    }
}

/// `"<class name> - YYYY-MM-DD HH:MM"`.
pub fn session_title(class_name: &str, start: DateTime<Utc>) -> String {
    format!("{class_name} - {}", start.format("%Y-%m-%d %H:%M"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn title_uses_minute_precision() {
        let start = Utc.with_ymd_and_hms(2030, 1, 2, 7, 5, 59).unwrap();
        assert_eq!(session_title("Pilates", start), "Pilates - 2030-01-02 07:05");
    }
}
