//! Statistics aggregator.
//!
//! Read-side arithmetic over booking and session snapshots. Every rate is a
//! percentage in `0.0..=100.0` and is `0.0` when its denominator is zero.

pub mod rates;
pub mod summary;

pub use rates::{available_spots, occupancy, percentage};
pub use summary::{BookingStats, SessionAttendance, SystemStats, UserStats};
