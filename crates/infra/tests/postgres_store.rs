//! Runs against a live database when `DATABASE_URL` is set; otherwise each
//! test returns early.

mod common;

use std::sync::Arc;

use chrono::Duration;
use tokio::task::JoinSet;

use classbook_booking::{BookingPolicy, BookingStatus};
use classbook_core::DomainError;
use classbook_infra::store::{EntityStore, PostgresStore};
use classbook_scheduling::NewSession;

use common::{Harness, domain};

async fn harness() -> Option<Harness> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let store = PostgresStore::connect(&url, 16).await.unwrap();
    store.migrate().await.unwrap();
    let store: Arc<dyn EntityStore> = Arc::new(store);
    let tag = format!("-{}", &uuid::Uuid::now_v7().simple().to_string()[20..]);
    Some(Harness::with_store(store, BookingPolicy::default(), tag))
}

#[tokio::test]
async fn booking_lifecycle_persists() {
    let Some(h) = harness().await else { return };
    let session = h.bookable_session(2).await;
    let user = h.student("Persisted Student").await;

    let booking = h.engine.create_booking(session, user, Some("aisle".to_string())).await.unwrap();
    let fetched = h.engine.get_booking(booking.id, Some(user)).await.unwrap();
    assert_eq!(fetched.notes.as_deref(), Some("aisle"));
    assert_eq!(fetched.status, BookingStatus::Pending);

    let err = domain(h.engine.create_booking(session, user, None).await.unwrap_err());
    assert_eq!(err, DomainError::DuplicateBooking);

    h.engine.confirm_booking(booking.id).await.unwrap();
    h.engine.cancel_booking(booking.id, None, Some("moved away")).await.unwrap();
    let cancelled = h.engine.get_booking(booking.id, None).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert!(cancelled.admin_notes.unwrap().contains("moved away"));

    let details = h.scheduler.get_session(session).await.unwrap();
    assert_eq!(details.current_bookings, 0);
    assert_eq!(details.available_spots, 2);
}

#[tokio::test]
async fn overlapping_session_in_same_room_is_refused() {
    let Some(h) = harness().await else { return };
    let class = h.class(5).await;
    let room = format!("Hall{}", h.tag);
    let first = h.session_in(class.id, 24, Some(&room)).await;

    let err = domain(
        h.scheduler
            .create_session(NewSession {
                class_id: class.id,
                start_time: first.start_time + Duration::minutes(15),
                end_time: first.end_time + Duration::minutes(15),
                location: Some(room.clone()),
                notes: None,
            })
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, DomainError::SchedulingConflict(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_bookings_respect_capacity() {
    let Some(h) = harness().await else { return };
    let session = h.bookable_session(2).await;
    let mut users = Vec::new();
    for i in 0..10 {
        users.push(h.student(&format!("Pg Racer {i}")).await);
    }

    let mut set = JoinSet::new();
    for user in users {
        let engine = h.engine.clone();
        set.spawn(async move { engine.create_booking(session, user, None).await });
    }
    let mut granted = 0;
    while let Some(joined) = set.join_next().await {
        match joined.unwrap() {
            Ok(_) => granted += 1,
            Err(err) => assert_eq!(domain(err), DomainError::CapacityExceeded { capacity: 2 }),
        }
    }
    assert_eq!(granted, 2);
}
