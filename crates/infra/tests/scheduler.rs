mod common;

use chrono::Duration;

use classbook_booking::BookingStatus;
use classbook_core::{ClassId, DomainError, PageRequest, SessionId};
use classbook_infra::AuditAction;
use classbook_infra::store::SessionFilter;
use classbook_scheduling::{NewSession, SessionPatch, SessionStatus};

use common::{Harness, domain};

fn one_hour(h: &Harness, class_id: ClassId, hours_ahead: i64, location: Option<&str>) -> NewSession {
    let start = h.now() + Duration::hours(hours_ahead);
    NewSession {
        class_id,
        start_time: start,
        end_time: start + Duration::hours(1),
        location: location.map(str::to_string),
        notes: None,
    }
}

#[tokio::test]
async fn unknown_class_is_reported_before_range() {
    let h = Harness::new();
    let mut input = one_hour(&h, ClassId::new(), 24, None);
    input.end_time = input.start_time;

    let err = domain(h.scheduler.create_session(input).await.unwrap_err());
    assert!(matches!(err, DomainError::NotFound { entity: "class", .. }));
}

#[tokio::test]
async fn empty_or_inverted_range_is_rejected() {
    let h = Harness::new();
    let class = h.class(10).await;
    let mut input = one_hour(&h, class.id, 24, Some("Studio A"));
    input.end_time = input.start_time - Duration::minutes(5);

    let err = domain(h.scheduler.create_session(input).await.unwrap_err());
    assert_eq!(err, DomainError::InvalidRange);
}

#[tokio::test]
async fn overlap_in_same_location_conflicts() {
    let h = Harness::new();
    let class = h.class(10).await;
    h.scheduler
        .create_session(one_hour(&h, class.id, 24, Some("Studio A")))
        .await
        .unwrap();

    let mut clash = one_hour(&h, class.id, 24, Some("Studio A"));
    clash.start_time += Duration::minutes(30);
    clash.end_time += Duration::minutes(30);
    let err = domain(h.scheduler.create_session(clash).await.unwrap_err());
    assert!(matches!(err, DomainError::SchedulingConflict(_)));

    let mut elsewhere = one_hour(&h, class.id, 24, Some("Studio B"));
    elsewhere.start_time += Duration::minutes(30);
    elsewhere.end_time += Duration::minutes(30);
    assert!(h.scheduler.create_session(elsewhere).await.is_ok());
}

#[tokio::test]
async fn missing_location_conflicts_with_any_overlap() {
    let h = Harness::new();
    let class = h.class(10).await;
    h.scheduler
        .create_session(one_hour(&h, class.id, 24, Some("Studio A")))
        .await
        .unwrap();

    let err = domain(
        h.scheduler
            .create_session(one_hour(&h, class.id, 24, None))
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, DomainError::SchedulingConflict(_)));
}

#[tokio::test]
async fn back_to_back_sessions_do_not_conflict() {
    let h = Harness::new();
    let class = h.class(10).await;
    h.session_in(class.id, 24, Some("Studio A")).await;
    h.session_in(class.id, 25, Some("Studio A")).await;
    h.session_in(class.id, 23, Some("Studio A")).await;
}

#[tokio::test]
async fn cancelled_and_completed_sessions_free_their_slot() {
    let h = Harness::new();
    let class = h.class(10).await;
    let cancelled = h.session_in(class.id, 24, Some("Studio A")).await;
    h.scheduler.cancel_session(cancelled.id, None).await.unwrap();
    let completed = h.session_in(class.id, 24, Some("Studio A")).await;
    h.scheduler.mark_completed(completed.id).await.unwrap();

    assert!(h
        .scheduler
        .create_session(one_hour(&h, class.id, 24, Some("Studio A")))
        .await
        .is_ok());
}

#[tokio::test]
async fn update_checks_conflicts_but_ignores_itself() {
    let h = Harness::new();
    let class = h.class(10).await;
    let first = h.session_in(class.id, 24, Some("Studio A")).await;
    let second = h.session_in(class.id, 26, Some("Studio A")).await;

    let nudged = h
        .scheduler
        .update_session(
            first.id,
            SessionPatch {
                end_time: Some(first.end_time + Duration::minutes(30)),
                ..SessionPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(nudged.end_time, first.end_time + Duration::minutes(30));

    let err = domain(
        h.scheduler
            .update_session(
                second.id,
                SessionPatch {
                    start_time: Some(first.start_time),
                    end_time: Some(first.end_time),
                    ..SessionPatch::default()
                },
            )
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, DomainError::SchedulingConflict(_)));

    // Notes alone never trigger the check.
    let noted = h
        .scheduler
        .update_session(
            second.id,
            SessionPatch {
                notes: Some("bring mats".to_string()),
                ..SessionPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(noted.notes.as_deref(), Some("bring mats"));
}

#[tokio::test]
async fn update_rejects_inverted_range() {
    let h = Harness::new();
    let class = h.class(10).await;
    let session = h.session_in(class.id, 24, Some("Studio A")).await;

    let err = domain(
        h.scheduler
            .update_session(
                session.id,
                SessionPatch {
                    end_time: Some(session.start_time),
                    ..SessionPatch::default()
                },
            )
            .await
            .unwrap_err(),
    );
    assert_eq!(err, DomainError::InvalidRange);
}

#[tokio::test]
async fn cancel_cascades_to_active_bookings_only() {
    let h = Harness::new();
    let session = h.bookable_session(10).await;
    let pending = h.student("Student One").await;
    let confirmed = h.student("Student Two").await;
    let withdrawn = h.student("Student Three").await;

    let pending = h.engine.create_booking(session, pending, None).await.unwrap();
    let confirmed = h.engine.create_booking(session, confirmed, None).await.unwrap();
    h.engine.confirm_booking(confirmed.id).await.unwrap();
    let withdrawn = h.engine.create_booking(session, withdrawn, None).await.unwrap();
    h.engine
        .cancel_booking(withdrawn.id, None, Some("changed plans"))
        .await
        .unwrap();

    // Past every deadline: the cascade ignores them.
    h.clock.advance(Duration::hours(23));
    let cancelled = h
        .scheduler
        .cancel_session(session, Some("studio flooded"))
        .await
        .unwrap();
    assert_eq!(cancelled.status, SessionStatus::Cancelled);
    assert!(cancelled.notes.as_deref().unwrap().ends_with("Cancelled: studio flooded"));

    for id in [pending.id, confirmed.id] {
        let booking = h.engine.get_booking(id, None).await.unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
        assert_eq!(booking.updated_at, Some(h.now()));
    }
    let untouched = h.engine.get_booking(withdrawn.id, None).await.unwrap();
    assert!(untouched.admin_notes.unwrap().contains("changed plans"));
    assert_ne!(untouched.updated_at, Some(h.now()));
}

#[tokio::test]
async fn recancel_keeps_notes_and_still_sweeps_bookings() {
    let h = Harness::new();
    let class = h.class(10).await;
    let session = h.session_in(class.id, 24, Some("Studio A")).await;

    let first = h.scheduler.cancel_session(session.id, None).await.unwrap();
    assert_eq!(first.notes.as_deref(), Some("\nCancelled: No reason provided"));

    let again = h
        .scheduler
        .cancel_session(session.id, Some("second thoughts"))
        .await
        .unwrap();
    assert_eq!(again.notes, first.notes);
    assert_eq!(
        h.audit
            .actions()
            .iter()
            .filter(|a| **a == AuditAction::SessionCancelled)
            .count(),
        2
    );
}

#[tokio::test]
async fn cancel_unknown_session_is_not_found() {
    let h = Harness::new();
    let err = domain(h.scheduler.cancel_session(SessionId::new(), None).await.unwrap_err());
    assert!(matches!(err, DomainError::NotFound { entity: "session", .. }));
}

#[tokio::test]
async fn sessions_can_be_completed_before_they_start() {
    let h = Harness::new();
    let class = h.class(10).await;
    let session = h.session_in(class.id, 48, None).await;

    let done = h.scheduler.mark_completed(session.id).await.unwrap();
    assert_eq!(done.status, SessionStatus::Completed);
    assert_eq!(done.updated_at, Some(h.now()));
}

#[tokio::test]
async fn details_carry_live_seat_counts() {
    let h = Harness::new();
    let session = h.bookable_session(3).await;
    let one = h.student("Student One").await;
    let two = h.student("Student Two").await;
    h.engine.create_booking(session, one, None).await.unwrap();
    let cancelled = h.engine.create_booking(session, two, None).await.unwrap();
    h.engine.cancel_booking(cancelled.id, None, None).await.unwrap();

    let details = h.scheduler.get_session(session).await.unwrap();
    assert_eq!(details.class_name, "Morning Yoga");
    assert_eq!(details.max_capacity, 3);
    assert_eq!(details.current_bookings, 1);
    assert_eq!(details.available_spots, 2);
    assert!((details.occupancy - 1.0 / 3.0).abs() < 1e-9);
}

#[tokio::test]
async fn upcoming_sessions_flag_bookability() {
    let h = Harness::new();
    let class = h.class(1).await;
    let soon = h.session_in(class.id, 1, Some("Studio A")).await;
    let full = h.session_in(class.id, 24, Some("Studio A")).await;
    let open = h.session_in(class.id, 48, Some("Studio A")).await;
    let past = h.session_in(class.id, 0, Some("Studio B")).await;
    let gone = h.session_in(class.id, 72, Some("Studio A")).await;
    h.scheduler.cancel_session(gone.id, None).await.unwrap();
    let student = h.student("Student One").await;
    h.engine.create_booking(full.id, student, None).await.unwrap();
    h.clock.advance(Duration::minutes(1));

    let upcoming = h.scheduler.upcoming_sessions(10).await.unwrap();
    let ids: Vec<SessionId> = upcoming.iter().map(|s| s.session_id).collect();
    assert_eq!(ids, vec![soon.id, full.id, open.id]);
    assert!(!ids.contains(&past.id));

    let flags: Vec<bool> = upcoming.iter().map(|s| s.is_bookable).collect();
    assert_eq!(flags, vec![false, false, true]);
    assert_eq!(upcoming[2].booking_deadline, open.start_time - Duration::hours(2));
    assert_eq!(upcoming[1].available_spots, 0);

    assert_eq!(h.scheduler.upcoming_sessions(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn listing_filters_and_orders_by_start() {
    let h = Harness::new();
    let yoga = h.class(10).await;
    let other = h.class(10).await;
    let late = h.session_in(yoga.id, 48, Some("Studio A")).await;
    let early = h.session_in(yoga.id, 24, Some("Studio A")).await;
    h.session_in(other.id, 36, Some("Studio A")).await;

    let page = h
        .scheduler
        .list_sessions(
            SessionFilter {
                class_id: Some(yoga.id),
                ..SessionFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    let ids: Vec<SessionId> = page.items.iter().map(|d| d.session.id).collect();
    assert_eq!(ids, vec![early.id, late.id]);

    let window = h
        .scheduler
        .list_sessions(
            SessionFilter {
                start_from: Some(h.now() + Duration::hours(30)),
                start_to: Some(h.now() + Duration::hours(40)),
                ..SessionFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(window.total, 1);
    assert_eq!(window.items[0].session.class_id, other.id);
}

#[tokio::test]
async fn sessions_for_class_can_hide_past_ones() {
    let h = Harness::new();
    let class = h.class(10).await;
    let past = h.session_in(class.id, 1, Some("Studio A")).await;
    let future = h.session_in(class.id, 24, Some("Studio A")).await;
    h.clock.advance(Duration::hours(2));

    let all = h.scheduler.sessions_for_class(class.id, true).await.unwrap();
    assert_eq!(all.len(), 2);
    let ahead = h.scheduler.sessions_for_class(class.id, false).await.unwrap();
    assert_eq!(ahead.iter().map(|s| s.id).collect::<Vec<_>>(), vec![future.id]);
    assert!(!ahead.iter().any(|s| s.id == past.id));

    let err = domain(h.scheduler.sessions_for_class(ClassId::new(), true).await.unwrap_err());
    assert!(matches!(err, DomainError::NotFound { entity: "class", .. }));
}

#[tokio::test]
async fn attendance_summarises_every_booking() {
    let h = Harness::new();
    let session = h.bookable_session(10).await;
    let mut ids = Vec::new();
    for i in 0..4 {
        let user = h.student(&format!("Student {i}")).await;
        ids.push(h.engine.create_booking(session, user, None).await.unwrap().id);
    }
    h.engine.cancel_booking(ids[3], None, None).await.unwrap();
    h.clock.advance(Duration::hours(25));
    h.engine.mark_attendance(ids[0], true).await.unwrap();
    h.engine.mark_attendance(ids[1], true).await.unwrap();
    h.engine.mark_attendance(ids[2], false).await.unwrap();

    let attendance = h.stats.session_attendance(session).await.unwrap();
    assert_eq!(attendance.total_bookings, 4);
    assert_eq!(attendance.attended, 2);
    assert_eq!(attendance.no_shows, 1);
    assert_eq!(attendance.attendance_rate, 50.0);

    let err = domain(h.stats.session_attendance(SessionId::new()).await.unwrap_err());
    assert!(matches!(err, DomainError::NotFound { entity: "session", .. }));
}
