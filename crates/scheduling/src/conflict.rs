//! Session-vs-session conflict rules.

use classbook_core::{SessionId, TimeRange};

use crate::session::Session;

/// A candidate time slot, optionally pinned to a location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSlot {
    pub range: TimeRange,
    pub location: Option<String>,
}

/// Whether `existing` blocks `slot`.
///
/// Only `SCHEDULED`/`ONGOING` sessions block. Locations are compared only
/// when both sides name one; otherwise time overlap alone is a conflict.
pub fn conflicts_with(slot: &SessionSlot, existing: &Session) -> bool {
    if !existing.status.occupies_slot() || !existing.overlaps(&slot.range) {
        return false;
    }
    match (slot.location.as_deref(), existing.location.as_deref()) {
        (Some(wanted), Some(taken)) => wanted == taken,
        _ => true,
    }
}

/// First session in `existing` that blocks `slot`, skipping `exclude`.
pub fn find_conflict<'a>(
    slot: &SessionSlot,
    existing: &'a [Session],
    exclude: Option<SessionId>,
) -> Option<&'a Session> {
    existing
        .iter()
        .filter(|s| Some(s.id) != exclude)
        .find(|s| conflicts_with(slot, s))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{NewSession, SessionStatus};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use classbook_core::ClassId;
    use proptest::prelude::*;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2030, 5, 10, 0, 0, 0).unwrap()
    }

    fn test_session(start_min: i64, len_min: i64, location: Option<&str>) -> Session {
        Session::schedule(
            SessionId::new(),
            NewSession {
                class_id: ClassId::new(),
                start_time: base() + Duration::minutes(start_min),
                end_time: base() + Duration::minutes(start_min + len_min),
                location: location.map(str::to_string),
                notes: None,
            },
            base(),
        )
        .unwrap()
    }

    fn test_slot(start_min: i64, len_min: i64, location: Option<&str>) -> SessionSlot {
        SessionSlot {
            range: TimeRange::new(
                base() + Duration::minutes(start_min),
                base() + Duration::minutes(start_min + len_min),
            )
            .unwrap(),
            location: location.map(str::to_string),
        }
    }

    #[test]
    fn overlapping_same_location_conflicts() {
        let existing = test_session(600, 60, Some("Studio A"));
        assert!(conflicts_with(&test_slot(630, 60, Some("Studio A")), &existing));
    }

    #[test]
    fn overlapping_different_location_is_fine() {
        let existing = test_session(600, 60, Some("Studio A"));
        assert!(!conflicts_with(&test_slot(630, 60, Some("Studio B")), &existing));
    }

    #[test]
    fn missing_location_falls_back_to_time_only() {
        let existing = test_session(600, 60, Some("Studio A"));
        assert!(conflicts_with(&test_slot(630, 60, None), &existing));

        let unplaced = test_session(600, 60, None);
        assert!(conflicts_with(&test_slot(630, 60, Some("Studio B")), &unplaced));
    }

    #[test]
    fn back_to_back_sessions_do_not_conflict() {
        let existing = test_session(600, 60, Some("Studio A"));
        assert!(!conflicts_with(&test_slot(660, 60, Some("Studio A")), &existing));
        assert!(!conflicts_with(&test_slot(540, 60, Some("Studio A")), &existing));
    }

    #[test]
    fn cancelled_sessions_free_their_slot() {
        let mut existing = test_session(600, 60, Some("Studio A"));
        existing.status = SessionStatus::Cancelled;
        assert!(!conflicts_with(&test_slot(600, 60, Some("Studio A")), &existing));
    }

    #[test]
    fn find_conflict_skips_excluded_session() {
        let existing = vec![test_session(600, 60, Some("Studio A"))];
        let slot = test_slot(610, 30, Some("Studio A"));
        assert!(find_conflict(&slot, &existing, None).is_some());
        assert!(find_conflict(&slot, &existing, Some(existing[0].id)).is_none());
    }

    proptest! {
        #![proptest_config(ProptestConfig { cases: 256, ..ProptestConfig::default() })]

        /// Property: in a shared location, a conflict is exactly a half-open overlap.
        #[test]
        fn same_location_conflict_matches_overlap(
            s1 in 0i64..2_000, l1 in 1i64..240,
            s2 in 0i64..2_000, l2 in 1i64..240,
        ) {
            let existing = test_session(s1, l1, Some("Hall"));
            let slot = test_slot(s2, l2, Some("Hall"));
            prop_assert_eq!(conflicts_with(&slot, &existing), s1 < s2 + l2 && s2 < s1 + l1);
        }

        /// Property: sessions in different locations never conflict.
        #[test]
        fn different_locations_never_conflict(s1 in 0i64..2_000, l1 in 1i64..240, s2 in 0i64..2_000, l2 in 1i64..240) {
            let existing = test_session(s1, l1, Some("Hall"));
            let slot = test_slot(s2, l2, Some("Pool"));
            prop_assert!(!conflicts_with(&slot, &existing));
        }
    }
}
