#![allow(dead_code, unused_imports)]

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use classbook_auth::{NewUser, PasswordPolicy, TokenService, User, UserRole};
use classbook_booking::BookingPolicy;
use classbook_classes::{Class, ClassCategory, NewClass};
use classbook_core::{ClassId, ManualClock, SessionId, UserId};
use classbook_infra::services::{
    AccountService, BookingEngine, ClassCatalog, ServiceContext, SessionScheduler,
    StatisticsService,
};
use classbook_infra::store::{EntityStore, InMemoryStore, StoreTx};
use classbook_infra::{InMemoryAuditSink, ServiceError};
use classbook_scheduling::{NewSession, Session};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 1, 8, 0, 0).unwrap()
}

pub struct Harness {
    pub store: Arc<dyn EntityStore>,
    /// Appended to emails and locations so runs against a shared database stay apart.
    pub tag: String,
    pub clock: Arc<ManualClock>,
    pub audit: Arc<InMemoryAuditSink>,
    pub engine: BookingEngine,
    pub scheduler: SessionScheduler,
    pub stats: StatisticsService,
    pub accounts: AccountService,
    pub catalog: ClassCatalog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_policy(BookingPolicy::default())
    }

    pub fn with_policy(policy: BookingPolicy) -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()), policy, String::new())
    }

    pub fn with_store(store: Arc<dyn EntityStore>, policy: BookingPolicy, tag: String) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let audit = Arc::new(InMemoryAuditSink::new());
        let ctx = ServiceContext::new(store.clone(), clock.clone(), audit.clone());
        let tokens = TokenService::new(b"test-secret", Duration::minutes(30));

        Self {
            engine: BookingEngine::new(ctx.clone(), policy),
            scheduler: SessionScheduler::new(ctx.clone(), policy),
            stats: StatisticsService::new(ctx.clone()),
            accounts: AccountService::new(ctx.clone(), PasswordPolicy::default(), tokens),
            catalog: ClassCatalog::new(ctx),
            store,
            tag,
            clock,
            audit,
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        use classbook_core::Clock;
        self.clock.now()
    }

    /// Insert an account directly, skipping password hashing.
    pub async fn user(&self, name: &str, role: UserRole) -> UserId {
        let input = NewUser {
            email: format!(
                "{}{}@example.com",
                name.to_lowercase().replace(' ', "."),
                self.tag
            ),
            name: name.to_string(),
            password: String::new(),
            role,
        };
        let user = User::register(UserId::new(), &input, "not-a-real-hash".to_string(), self.now())
            .unwrap();
        let mut tx = self.store.begin().await.unwrap();
        tx.insert_user(&user).await.unwrap();
        tx.commit().await.unwrap();
        user.id
    }

    pub async fn student(&self, name: &str) -> UserId {
        self.user(name, UserRole::Student).await
    }

    pub async fn class(&self, capacity: u32) -> Class {
        self.catalog
            .create_class(NewClass {
                name: "Morning Yoga".to_string(),
                description: None,
                category: ClassCategory::Yoga,
                duration_minutes: 60,
                max_capacity: capacity,
                price_cents: 1500,
                instructor_name: "Ana Costa".to_string(),
            })
            .await
            .unwrap()
    }

    /// A one-hour session starting `hours_ahead` hours after now.
    pub async fn session_in(
        &self,
        class_id: ClassId,
        hours_ahead: i64,
        location: Option<&str>,
    ) -> Session {
        let start = self.now() + Duration::hours(hours_ahead);
        self.scheduler
            .create_session(NewSession {
                class_id,
                start_time: start,
                end_time: start + Duration::hours(1),
                location: location.map(str::to_string),
                notes: None,
            })
            .await
            .unwrap()
    }

    /// Class of `capacity` with one session a day ahead.
    pub async fn bookable_session(&self, capacity: u32) -> SessionId {
        let class = self.class(capacity).await;
        let room = format!("Studio A{}", self.tag);
        self.session_in(class.id, 24, Some(&room)).await.id
    }
}

pub fn domain(err: ServiceError) -> classbook_core::DomainError {
    match err {
        ServiceError::Domain(err) => err,
        other => panic!("expected a domain error, got {other:?}"),
    }
}
