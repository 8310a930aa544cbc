mod common;

use chrono::Duration;

use classbook_booking::BookingStatus;
use classbook_core::DomainError;
use classbook_infra::AuditAction;

use common::{Harness, domain};

/// A one-seat class: the seat is taken, refused, released and taken again.
#[tokio::test]
async fn single_seat_changes_hands_after_timely_cancellation() {
    let h = Harness::new();
    let session = h.bookable_session(1).await;
    let u1 = h.student("First Student").await;
    let u2 = h.student("Second Student").await;

    let held = h.engine.create_booking(session, u1, None).await.unwrap();
    assert_eq!(held.status, BookingStatus::Pending);

    let err = domain(h.engine.create_booking(session, u2, None).await.unwrap_err());
    assert_eq!(err, DomainError::CapacityExceeded { capacity: 1 });

    // Still more than four hours before the start.
    h.clock.advance(Duration::hours(19));
    let released = h.engine.cancel_booking(held.id, Some(u1), None).await.unwrap();
    assert_eq!(released.status, BookingStatus::Cancelled);

    let taken = h.engine.create_booking(session, u2, None).await.unwrap();
    assert_eq!(taken.status, BookingStatus::Pending);

    let details = h.scheduler.get_session(session).await.unwrap();
    assert_eq!(details.current_bookings, 1);
    assert_eq!(details.available_spots, 0);

    let actions = h.audit.actions();
    let booking_actions: Vec<_> = actions
        .iter()
        .filter(|a| {
            matches!(
                a,
                AuditAction::BookingCreated | AuditAction::BookingCancelled
            )
        })
        .collect();
    assert_eq!(
        booking_actions,
        vec![
            &AuditAction::BookingCreated,
            &AuditAction::BookingCancelled,
            &AuditAction::BookingCreated,
        ]
    );
}
