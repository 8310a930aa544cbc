use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use classbook_auth::User;
use classbook_booking::{Booking, BookingDetails, BookingStatus};
use classbook_classes::Class;
use classbook_core::{BookingId, ClassId, Page, PageRequest, SessionId, TimeRange, UserId};
use classbook_scheduling::Session;
use classbook_stats::SystemStats;

use super::query::{
    BookingFilter, BookingOrder, BookingStatusFilter, ClassFilter, SessionDetails, SessionFilter,
    UserFilter,
};

/// Infrastructure failure. Never a domain refusal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    /// The transaction lost a serialization race and was aborted; retryable.
    #[error("serialization conflict: {0}")]
    SerializationConflict(String),

    /// A uniqueness backstop (email, active booking per user and session) tripped.
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Transactional entity store.
///
/// Every service operation opens exactly one transaction, and commits it once.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>>;
}

#[async_trait]
impl<S> EntityStore for Arc<S>
where
    S: EntityStore + ?Sized,
{
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        (**self).begin().await
    }
}

/// One open transaction. Dropping it without [`StoreTx::commit`] rolls back.
#[async_trait]
pub trait StoreTx: Send {
    // users
    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>>;
    /// Lookup by normalized (lower-cased) email.
    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>>;
    async fn insert_user(&mut self, user: &User) -> StoreResult<()>;
    async fn update_user(&mut self, user: &User) -> StoreResult<()>;
    /// Ordered by `created_at` descending.
    async fn list_users(&mut self, filter: &UserFilter, page: PageRequest) -> StoreResult<Page<User>>;

    // classes
    async fn get_class(&mut self, id: ClassId) -> StoreResult<Option<Class>>;
    async fn insert_class(&mut self, class: &Class) -> StoreResult<()>;
    async fn update_class(&mut self, class: &Class) -> StoreResult<()>;
    /// Ordered by name ascending.
    async fn list_classes(&mut self, filter: &ClassFilter, page: PageRequest) -> StoreResult<Page<Class>>;

    // sessions
    async fn get_session(&mut self, id: SessionId) -> StoreResult<Option<Session>>;
    /// Fetch and row-lock a session until commit.
    async fn lock_session(&mut self, id: SessionId) -> StoreResult<Option<Session>>;
    /// Serialize schedule changes until commit.
    async fn lock_schedule(&mut self) -> StoreResult<()>;
    async fn insert_session(&mut self, session: &Session) -> StoreResult<()>;
    async fn update_session(&mut self, session: &Session) -> StoreResult<()>;
    /// `SCHEDULED`/`ONGOING` sessions whose interval overlaps `range`.
    async fn sessions_overlapping(&mut self, range: TimeRange) -> StoreResult<Vec<Session>>;
    async fn session_details(&mut self, id: SessionId) -> StoreResult<Option<SessionDetails>>;
    /// Ordered by start time ascending.
    async fn list_session_details(
        &mut self,
        filter: &SessionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<SessionDetails>>;
    /// Ordered by start time ascending.
    async fn sessions_for_class(
        &mut self,
        class_id: ClassId,
        starts_after: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Session>>;

    // bookings
    async fn get_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>>;
    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()>;
    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()>;
    async fn count_active_bookings(&mut self, session_id: SessionId) -> StoreResult<u64>;
    async fn active_booking_for(
        &mut self,
        user_id: UserId,
        session_id: SessionId,
    ) -> StoreResult<Option<Booking>>;
    async fn bookings_for_session(&mut self, session_id: SessionId) -> StoreResult<Vec<Booking>>;
    /// Active bookings of `user_id` joined with their sessions, by start ascending.
    async fn active_bookings_with_sessions(
        &mut self,
        user_id: UserId,
        starts_after: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<(Booking, Session)>>;
    async fn list_booking_details(
        &mut self,
        filter: &BookingFilter,
        order: BookingOrder,
        page: PageRequest,
    ) -> StoreResult<Page<BookingDetails>>;
    async fn booking_statuses(&mut self, filter: &BookingStatusFilter) -> StoreResult<Vec<BookingStatus>>;

    async fn system_counts(&mut self, now: DateTime<Utc>) -> StoreResult<SystemStats>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
