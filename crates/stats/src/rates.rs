/// `part / total * 100`, or `0.0` when `total == 0`.
pub fn percentage(part: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    part as f64 / total as f64 * 100.0
}

/// Fraction of seats taken, `current / max_capacity`; `0.0` for a zero capacity.
pub fn occupancy(current_bookings: u64, max_capacity: u32) -> f64 {
    if max_capacity == 0 {
        return 0.0;
    }
    current_bookings as f64 / f64::from(max_capacity)
}

pub fn available_spots(current_bookings: u64, max_capacity: u32) -> u64 {
    u64::from(max_capacity).saturating_sub(current_bookings)
}
