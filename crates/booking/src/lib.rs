//! Booking domain module.
//!
//! Pure booking rules: status transitions, ownership, deadlines and the
//! ordered eligibility checks run before a seat is reserved. Counting and
//! locking happen in the store transaction that calls into these rules.

pub mod booking;
pub mod details;
pub mod eligibility;
pub mod policy;

pub use booking::{Booking, BookingPatch, BookingStatus};
pub use details::{BookingDetails, session_title};
pub use eligibility::{SeatSnapshot, check_eligibility, has_overlapping_booking};
pub use policy::BookingPolicy;
