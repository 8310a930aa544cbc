mod common;

use proptest::prelude::*;

use classbook_core::DomainError;

use common::{Harness, domain};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn seats_taken_never_exceed_capacity(capacity in 1u32..5, students in 0usize..9) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let (booked, refused, details) = rt.block_on(async {
            let h = Harness::new();
            let session = h.bookable_session(capacity).await;
            let mut booked = 0u64;
            let mut refused = 0u64;
            for i in 0..students {
                let user = h.student(&format!("Student {i}")).await;
                match h.engine.create_booking(session, user, None).await {
                    Ok(_) => booked += 1,
                    Err(e) => {
                        assert!(matches!(domain(e), DomainError::CapacityExceeded { .. }));
                        refused += 1;
                    }
                }
            }
            (booked, refused, h.scheduler.get_session(session).await.unwrap())
        });

        let expected = (students as u64).min(u64::from(capacity));
        prop_assert_eq!(booked, expected);
        prop_assert_eq!(refused, students as u64 - expected);
        prop_assert_eq!(details.current_bookings, expected);
        prop_assert_eq!(details.available_spots, u64::from(capacity) - expected);
        prop_assert!(details.occupancy <= 1.0);
    }
}
