mod common;

use chrono::Duration;

use classbook_auth::{NewUser, UserPatch, UserRole};
use classbook_booking::BookingStatus;
use classbook_classes::{ClassCategory, ClassPatch, ClassStatus, NewClass};
use classbook_core::{ClassId, DomainError, PageRequest, UserId};
use classbook_infra::AuditAction;
use classbook_infra::store::{ClassFilter, UserFilter};

use common::{Harness, domain};

const PASSWORD: &str = "Sunrise2030";

fn signup(email: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        name: "Jordan Reyes".to_string(),
        password: PASSWORD.to_string(),
        role: UserRole::Student,
    }
}

#[tokio::test]
async fn registration_normalises_email_and_rejects_duplicates() {
    let h = Harness::new();
    let user = h.accounts.register(signup("  Jordan@Example.com ")).await.unwrap();
    assert_eq!(user.email, "jordan@example.com");
    assert!(user.is_active);
    assert_ne!(user.password_hash, PASSWORD);

    let err = domain(h.accounts.register(signup("JORDAN@example.com")).await.unwrap_err());
    assert!(matches!(err, DomainError::Validation(msg) if msg.contains("already registered")));
}

#[tokio::test]
async fn weak_password_is_rejected() {
    let h = Harness::new();
    let mut input = signup("weak@example.com");
    input.password = "password".to_string();

    let err = domain(h.accounts.register(input).await.unwrap_err());
    assert!(matches!(err, DomainError::Validation(_)));
    assert!(h.audit.actions().is_empty());
}

#[tokio::test]
async fn bootstrap_admin_is_created_once() {
    let h = Harness::new();
    let admin = h
        .accounts
        .ensure_admin(signup("Root@Example.com"))
        .await
        .unwrap()
        .expect("first call creates the account");
    assert_eq!(admin.role, UserRole::Admin);
    assert_eq!(admin.email, "root@example.com");

    let again = h.accounts.ensure_admin(signup("root@example.com")).await.unwrap();
    assert!(again.is_none());
    assert_eq!(h.audit.actions(), vec![AuditAction::AccountCreated]);
}

#[tokio::test]
async fn authentication_accepts_only_active_accounts_with_the_right_password() {
    let h = Harness::new();
    let user = h.accounts.register(signup("jordan@example.com")).await.unwrap();

    let logged_in = h.accounts.authenticate("Jordan@example.com", PASSWORD).await.unwrap();
    assert_eq!(logged_in.id, user.id);
    assert_eq!(logged_in.last_login, Some(h.now()));

    let wrong = domain(h.accounts.authenticate("jordan@example.com", "Sunset2030").await.unwrap_err());
    assert_eq!(wrong, DomainError::AuthenticationFailed);
    let unknown = domain(h.accounts.authenticate("nobody@example.com", PASSWORD).await.unwrap_err());
    assert_eq!(unknown, DomainError::AuthenticationFailed);

    h.accounts.deactivate_user(user.id).await.unwrap();
    let inactive = domain(h.accounts.authenticate("jordan@example.com", PASSWORD).await.unwrap_err());
    assert_eq!(inactive, DomainError::AuthenticationFailed);
}

#[tokio::test]
async fn issued_tokens_carry_identity_and_expire() {
    let h = Harness::new();
    let user = h.accounts.register(signup("jordan@example.com")).await.unwrap();
    let admin = h.accounts.promote_to_admin(user.id).await.unwrap();

    let token = h.accounts.issue_token(&admin).unwrap();
    let claims = h.accounts.tokens().verify(&token, h.now()).unwrap();
    assert_eq!(claims.sub, user.id);
    assert_eq!(claims.role, UserRole::Admin);

    assert!(h.accounts.tokens().verify(&token, h.now() + Duration::hours(1)).is_err());
}

#[tokio::test]
async fn password_change_requires_current_password() {
    let h = Harness::new();
    let user = h.accounts.register(signup("jordan@example.com")).await.unwrap();

    let err = domain(
        h.accounts
            .change_password(user.id, "Wrong2030x", "Moonrise2031")
            .await
            .unwrap_err(),
    );
    assert_eq!(err, DomainError::AuthenticationFailed);

    let err = domain(h.accounts.change_password(user.id, PASSWORD, "short").await.unwrap_err());
    assert!(matches!(err, DomainError::Validation(_)));

    h.accounts
        .change_password(user.id, PASSWORD, "Moonrise2031")
        .await
        .unwrap();
    assert!(h.accounts.authenticate("jordan@example.com", "Moonrise2031").await.is_ok());
    assert!(h.accounts.authenticate("jordan@example.com", PASSWORD).await.is_err());
}

#[tokio::test]
async fn email_update_respects_uniqueness() {
    let h = Harness::new();
    let taken = h.student("Taken Name").await;
    let user = h.student("Free Name").await;

    let err = domain(
        h.accounts
            .update_user(
                user,
                UserPatch {
                    email: Some("Taken.Name@example.com".to_string()),
                    ..UserPatch::default()
                },
            )
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, DomainError::Validation(_)));

    // Re-submitting one's own address is fine.
    let same = h
        .accounts
        .update_user(
            taken,
            UserPatch {
                email: Some("taken.name@example.com".to_string()),
                name: Some("Renamed".to_string()),
            },
        )
        .await
        .unwrap();
    assert_eq!(same.name, "Renamed");
}

#[tokio::test]
async fn deactivation_cancels_future_active_bookings_only() {
    let h = Harness::new();
    let class = h.class(10).await;
    let past = h.session_in(class.id, 3, Some("Studio A")).await;
    let future = h.session_in(class.id, 48, Some("Studio A")).await;
    let user = h.student("Leaving Student").await;

    let old = h.engine.create_booking(past.id, user, None).await.unwrap();
    let upcoming = h.engine.create_booking(future.id, user, None).await.unwrap();
    h.clock.advance(Duration::hours(4));

    let user_after = h.accounts.deactivate_user(user).await.unwrap();
    assert!(!user_after.is_active);

    let old = h.engine.get_booking(old.id, None).await.unwrap();
    let upcoming = h.engine.get_booking(upcoming.id, None).await.unwrap();
    assert_eq!(old.status, BookingStatus::Pending);
    assert_eq!(upcoming.status, BookingStatus::Cancelled);

    let reactivated = h.accounts.activate_user(user).await.unwrap();
    assert!(reactivated.is_active);
    assert!(h.audit.actions().contains(&AuditAction::AccountDeactivated));
}

#[tokio::test]
async fn role_changes_round_trip() {
    let h = Harness::new();
    let user = h.student("Future Admin").await;
    assert_eq!(h.accounts.promote_to_admin(user).await.unwrap().role, UserRole::Admin);
    assert_eq!(h.accounts.demote_to_student(user).await.unwrap().role, UserRole::Student);

    let err = domain(h.accounts.promote_to_admin(UserId::new()).await.unwrap_err());
    assert!(matches!(err, DomainError::NotFound { entity: "user", .. }));
}

#[tokio::test]
async fn user_listing_filters_by_role_and_search() {
    let h = Harness::new();
    h.user("Ada Admin", UserRole::Admin).await;
    h.student("Sam Student").await;
    h.student("Sara Student").await;

    let admins = h
        .accounts
        .list_users(
            UserFilter {
                role: Some(UserRole::Admin),
                ..UserFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(admins.total, 1);

    let found = h
        .accounts
        .list_users(
            UserFilter {
                search: Some("SARA".to_string()),
                ..UserFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(found.total, 1);
    assert_eq!(found.items[0].name, "Sara Student");
}

#[tokio::test]
async fn user_stats_count_history_and_upcoming() {
    let h = Harness::new();
    let class = h.class(10).await;
    let done = h.session_in(class.id, 3, Some("Studio A")).await;
    let dropped = h.session_in(class.id, 24, Some("Studio A")).await;
    let ahead = h.session_in(class.id, 48, Some("Studio A")).await;
    let user = h.student("Regular Student").await;

    let attended = h.engine.create_booking(done.id, user, None).await.unwrap();
    let withdrawn = h.engine.create_booking(dropped.id, user, None).await.unwrap();
    h.engine.create_booking(ahead.id, user, None).await.unwrap();
    h.engine.cancel_booking(withdrawn.id, Some(user), None).await.unwrap();
    h.clock.advance(Duration::hours(4));
    h.engine.mark_attendance(attended.id, true).await.unwrap();

    let stats = h.stats.user_stats(user).await.unwrap();
    assert_eq!(stats.total_bookings, 3);
    assert_eq!(stats.completed_bookings, 1);
    assert_eq!(stats.cancelled_bookings, 1);
    assert_eq!(stats.upcoming_bookings, 1);

    let err = domain(h.stats.user_stats(UserId::new()).await.unwrap_err());
    assert!(matches!(err, DomainError::NotFound { entity: "user", .. }));
}

#[tokio::test]
async fn system_stats_count_active_entities() {
    let h = Harness::new();
    let active = h.class(10).await;
    let archived = h.class(10).await;
    h.catalog.archive_class(archived.id).await.unwrap();
    let future = h.session_in(active.id, 24, Some("Studio A")).await;
    let cancelled = h.session_in(active.id, 48, Some("Studio A")).await;
    h.scheduler.cancel_session(cancelled.id, None).await.unwrap();
    let student = h.student("Counted Student").await;
    let inactive = h.student("Inactive Student").await;
    h.accounts.deactivate_user(inactive).await.unwrap();
    h.engine.create_booking(future.id, student, None).await.unwrap();

    let stats = h.stats.system_stats().await.unwrap();
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.active_users, 1);
    assert_eq!(stats.total_classes, 2);
    assert_eq!(stats.active_classes, 1);
    assert_eq!(stats.total_sessions, 2);
    assert_eq!(stats.upcoming_sessions, 1);
    assert_eq!(stats.total_bookings, 1);
}

#[tokio::test]
async fn catalog_validates_and_updates_classes() {
    let h = Harness::new();
    let err = domain(
        h.catalog
            .create_class(NewClass {
                name: "Spin".to_string(),
                description: None,
                category: ClassCategory::Fitness,
                duration_minutes: 45,
                max_capacity: 0,
                price_cents: 1200,
                instructor_name: "Lee Park".to_string(),
            })
            .await
            .unwrap_err(),
    );
    assert!(matches!(err, DomainError::Validation(_)));

    let class = h.class(12).await;
    let updated = h
        .catalog
        .update_class(
            class.id,
            ClassPatch {
                max_capacity: Some(20),
                instructor_name: Some("Noor Haddad".to_string()),
                ..ClassPatch::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.max_capacity, 20);
    assert_eq!(updated.instructor_name, "Noor Haddad");
    assert_eq!(h.catalog.get_class(class.id).await.unwrap(), updated);

    // A rejected patch leaves the stored class as it was.
    assert!(h
        .catalog
        .update_class(
            class.id,
            ClassPatch {
                name: Some("Renamed".to_string()),
                duration_minutes: Some(5),
                ..ClassPatch::default()
            },
        )
        .await
        .is_err());
    assert_eq!(h.catalog.get_class(class.id).await.unwrap().name, "Morning Yoga");

    let err = domain(h.catalog.get_class(ClassId::new()).await.unwrap_err());
    assert!(matches!(err, DomainError::NotFound { entity: "class", .. }));
}

#[tokio::test]
async fn archived_classes_stay_listed_by_status() {
    let h = Harness::new();
    let kept = h.class(10).await;
    let retired = h.class(10).await;
    h.catalog.archive_class(retired.id).await.unwrap();

    let active = h
        .catalog
        .list_classes(
            ClassFilter {
                status: Some(ClassStatus::Active),
                ..ClassFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(active.items.iter().map(|c| c.id).collect::<Vec<_>>(), vec![kept.id]);

    let archived = h.catalog.get_class(retired.id).await.unwrap();
    assert_eq!(archived.status, ClassStatus::Archived);

    let searched = h
        .catalog
        .list_classes(
            ClassFilter {
                search: Some("ana".to_string()),
                ..ClassFilter::default()
            },
            PageRequest::default(),
        )
        .await
        .unwrap();
    assert_eq!(searched.total, 2);
}
