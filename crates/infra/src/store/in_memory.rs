use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use classbook_auth::User;
use classbook_booking::{Booking, BookingDetails, BookingStatus};
use classbook_classes::{Class, ClassStatus};
use classbook_core::{BookingId, ClassId, Entity, Page, PageRequest, SessionId, TimeRange, UserId};
use classbook_scheduling::{Session, SessionStatus};
use classbook_stats::{SystemStats, available_spots, occupancy};

use super::query::{
    BookingFilter, BookingOrder, BookingStatusFilter, ClassFilter, SessionDetails, SessionFilter,
    UserFilter,
};
use super::r#trait::{EntityStore, StoreError, StoreResult, StoreTx};

#[derive(Debug, Clone, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    classes: HashMap<ClassId, Class>,
    sessions: HashMap<SessionId, Session>,
    bookings: HashMap<BookingId, Booking>,
}

/// In-memory entity store.
///
/// Intended for tests/dev. A transaction holds the single table lock from
/// `begin` until commit or drop, so transactions run one at a time. Writes
/// go to a private copy taken on the first write, which replaces the tables
/// on commit; read-only transactions copy nothing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        Ok(Box::new(InMemoryTx {
            guard,
            working: None,
        }))
    }
}

struct InMemoryTx {
    guard: OwnedMutexGuard<Tables>,
    /// Private copy of the tables, taken on the first write.
    working: Option<Tables>,
}

impl InMemoryTx {
    fn tables(&self) -> &Tables {
        self.working.as_ref().unwrap_or(&*self.guard)
    }

    fn tables_mut(&mut self) -> &mut Tables {
        let committed = &self.guard;
        self.working.get_or_insert_with(|| Tables::clone(committed))
    }
}

fn put<E: Entity + Clone>(table: &mut HashMap<E::Id, E>, entity: &E) {
    table.insert(entity.id().clone(), entity.clone());
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

impl Tables {
    fn active_count(&self, session_id: SessionId) -> u64 {
        self.bookings
            .values()
            .filter(|b| b.session_id == session_id && b.is_active())
            .count() as u64
    }

    fn class_of(&self, session: &Session) -> StoreResult<&Class> {
        self.classes.get(&session.class_id).ok_or_else(|| {
            StoreError::Database(format!(
                "session {} references missing class {}",
                session.id, session.class_id
            ))
        })
    }

    fn session_details(&self, session: &Session) -> StoreResult<SessionDetails> {
        let class = self.class_of(session)?;
        let current = self.active_count(session.id);
        Ok(SessionDetails {
            session: session.clone(),
            class_name: class.name.clone(),
            class_category: class.category,
            instructor_name: class.instructor_name.clone(),
            price_cents: class.price_cents,
            duration_minutes: class.duration_minutes,
            max_capacity: class.max_capacity,
            current_bookings: current,
            available_spots: available_spots(current, class.max_capacity),
            occupancy: occupancy(current, class.max_capacity),
        })
    }

    fn session_of(&self, booking: &Booking) -> StoreResult<&Session> {
        self.sessions.get(&booking.session_id).ok_or_else(|| {
            StoreError::Database(format!(
                "booking {} references missing session {}",
                booking.id, booking.session_id
            ))
        })
    }

    fn booking_details(&self, booking: &Booking) -> StoreResult<BookingDetails> {
        let session = self.session_of(booking)?;
        let class = self.class_of(session)?;
        let user = self.users.get(&booking.user_id).ok_or_else(|| {
            StoreError::Database(format!(
                "booking {} references missing user {}",
                booking.id, booking.user_id
            ))
        })?;
        Ok(BookingDetails::new(
            booking.clone(),
            user.name.clone(),
            user.email.clone(),
            class.name.clone(),
            session.start_time,
        ))
    }

    fn ensure_unique_email(&self, user: &User) -> StoreResult<()> {
        if self
            .users
            .values()
            .any(|u| u.id != user.id && u.email == user.email)
        {
            return Err(StoreError::UniqueViolation(format!("email {} already exists", user.email)));
        }
        Ok(())
    }

    fn ensure_single_active(&self, booking: &Booking) -> StoreResult<()> {
        if booking.is_active()
            && self.bookings.values().any(|b| {
                b.id != booking.id
                    && b.is_active()
                    && b.user_id == booking.user_id
                    && b.session_id == booking.session_id
            })
        {
            return Err(StoreError::UniqueViolation(format!(
                "active booking already exists for user {} and session {}",
                booking.user_id, booking.session_id
            )));
        }
        Ok(())
    }
}

fn session_matches(filter: &SessionFilter, session: &Session) -> bool {
    filter.class_id.is_none_or(|id| session.class_id == id)
        && filter.status.is_none_or(|status| session.status == status)
        && filter.start_from.is_none_or(|from| session.start_time >= from)
        && filter.start_to.is_none_or(|to| session.start_time <= to)
        && filter.starts_after.is_none_or(|after| session.start_time > after)
}

fn booking_matches(filter: &BookingFilter, booking: &Booking, session: &Session) -> bool {
    filter.user_id.is_none_or(|id| booking.user_id == id)
        && filter.status.is_none_or(|status| booking.status == status)
        && (!filter.active_only || booking.is_active())
        && filter.class_id.is_none_or(|id| session.class_id == id)
        && filter.session_start_from.is_none_or(|from| session.start_time >= from)
        && filter.session_start_to.is_none_or(|to| session.start_time <= to)
        && filter.session_starts_after.is_none_or(|after| session.start_time > after)
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.tables().users.get(&id).cloned())
    }

    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        Ok(self.tables().users.values().find(|u| u.email == email).cloned())
    }

    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        self.tables().ensure_unique_email(user)?;
        put(&mut self.tables_mut().users, user);
        Ok(())
    }

    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        self.tables().ensure_unique_email(user)?;
        put(&mut self.tables_mut().users, user);
        Ok(())
    }

    async fn list_users(&mut self, filter: &UserFilter, page: PageRequest) -> StoreResult<Page<User>> {
        let mut users: Vec<User> = self
            .tables()
            .users
            .values()
            .filter(|u| filter.role.is_none_or(|role| u.role == role))
            .filter(|u| filter.is_active.is_none_or(|active| u.is_active == active))
            .filter(|u| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|q| contains_ci(&u.name, q) || contains_ci(&u.email, q))
            })
            .cloned()
            .collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(Page::from_sorted(users, page))
    }

    async fn get_class(&mut self, id: ClassId) -> StoreResult<Option<Class>> {
        Ok(self.tables().classes.get(&id).cloned())
    }

    async fn insert_class(&mut self, class: &Class) -> StoreResult<()> {
        put(&mut self.tables_mut().classes, class);
        Ok(())
    }

    async fn update_class(&mut self, class: &Class) -> StoreResult<()> {
        put(&mut self.tables_mut().classes, class);
        Ok(())
    }

    async fn list_classes(&mut self, filter: &ClassFilter, page: PageRequest) -> StoreResult<Page<Class>> {
        let mut classes: Vec<Class> = self
            .tables()
            .classes
            .values()
            .filter(|c| filter.status.is_none_or(|status| c.status == status))
            .filter(|c| filter.category.is_none_or(|category| c.category == category))
            .filter(|c| {
                filter
                    .search
                    .as_deref()
                    .is_none_or(|q| contains_ci(&c.name, q) || contains_ci(&c.instructor_name, q))
            })
            .cloned()
            .collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        Ok(Page::from_sorted(classes, page))
    }

    async fn get_session(&mut self, id: SessionId) -> StoreResult<Option<Session>> {
        Ok(self.tables().sessions.get(&id).cloned())
    }

    async fn lock_session(&mut self, id: SessionId) -> StoreResult<Option<Session>> {
        // The transaction already owns every row.
        self.get_session(id).await
    }

    async fn lock_schedule(&mut self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_session(&mut self, session: &Session) -> StoreResult<()> {
        self.tables().class_of(session)?;
        put(&mut self.tables_mut().sessions, session);
        Ok(())
    }

    async fn update_session(&mut self, session: &Session) -> StoreResult<()> {
        put(&mut self.tables_mut().sessions, session);
        Ok(())
    }

    async fn sessions_overlapping(&mut self, range: TimeRange) -> StoreResult<Vec<Session>> {
        Ok(self
            .tables()
            .sessions
            .values()
            .filter(|s| s.status.occupies_slot() && s.overlaps(&range))
            .cloned()
            .collect())
    }

    async fn session_details(&mut self, id: SessionId) -> StoreResult<Option<SessionDetails>> {
        self.tables()
            .sessions
            .get(&id)
            .map(|s| self.tables().session_details(s))
            .transpose()
    }

    async fn list_session_details(
        &mut self,
        filter: &SessionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<SessionDetails>> {
        let mut sessions: Vec<&Session> = self
            .tables()
            .sessions
            .values()
            .filter(|s| session_matches(filter, s))
            .collect();
        sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        let details = sessions
            .into_iter()
            .map(|s| self.tables().session_details(s))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::from_sorted(details, page))
    }

    async fn sessions_for_class(
        &mut self,
        class_id: ClassId,
        starts_after: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Session>> {
        let mut sessions: Vec<Session> = self
            .tables()
            .sessions
            .values()
            .filter(|s| s.class_id == class_id)
            .filter(|s| starts_after.is_none_or(|after| s.start_time > after))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.start_time.cmp(&b.start_time).then(a.id.cmp(&b.id)));
        Ok(sessions)
    }

    async fn get_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        Ok(self.tables().bookings.get(&id).cloned())
    }

    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        self.tables().session_of(booking)?;
        self.tables().ensure_single_active(booking)?;
        put(&mut self.tables_mut().bookings, booking);
        Ok(())
    }

    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        self.tables().ensure_single_active(booking)?;
        put(&mut self.tables_mut().bookings, booking);
        Ok(())
    }

    async fn count_active_bookings(&mut self, session_id: SessionId) -> StoreResult<u64> {
        Ok(self.tables().active_count(session_id))
    }

    async fn active_booking_for(
        &mut self,
        user_id: UserId,
        session_id: SessionId,
    ) -> StoreResult<Option<Booking>> {
        Ok(self
            .tables()
            .bookings
            .values()
            .find(|b| b.user_id == user_id && b.session_id == session_id && b.is_active())
            .cloned())
    }

    async fn bookings_for_session(&mut self, session_id: SessionId) -> StoreResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .tables()
            .bookings
            .values()
            .filter(|b| b.session_id == session_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| a.booked_at.cmp(&b.booked_at).then(a.id.cmp(&b.id)));
        Ok(bookings)
    }

    async fn active_bookings_with_sessions(
        &mut self,
        user_id: UserId,
        starts_after: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<(Booking, Session)>> {
        let mut rows = Vec::new();
        for booking in self.tables().bookings.values() {
            if booking.user_id != user_id || !booking.is_active() {
                continue;
            }
            let session = self.tables().session_of(booking)?;
            if starts_after.is_none_or(|after| session.start_time > after) {
                rows.push((booking.clone(), session.clone()));
            }
        }
        rows.sort_by(|(a, sa), (b, sb)| sa.start_time.cmp(&sb.start_time).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn list_booking_details(
        &mut self,
        filter: &BookingFilter,
        order: BookingOrder,
        page: PageRequest,
    ) -> StoreResult<Page<BookingDetails>> {
        let mut rows: Vec<(&Booking, &Session)> = Vec::new();
        for booking in self.tables().bookings.values() {
            let session = self.tables().session_of(booking)?;
            if booking_matches(filter, booking, session) {
                rows.push((booking, session));
            }
        }
        rows.sort_by(|(a, sa), (b, sb)| {
            let primary = match order {
                BookingOrder::BookedAtDesc => b.booked_at.cmp(&a.booked_at),
                BookingOrder::SessionStartDesc => sb.start_time.cmp(&sa.start_time),
                BookingOrder::SessionStartAsc => sa.start_time.cmp(&sb.start_time),
            };
            primary.then(a.id.cmp(&b.id))
        });
        let details = rows
            .into_iter()
            .map(|(b, _)| self.tables().booking_details(b))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::from_sorted(details, page))
    }

    async fn booking_statuses(&mut self, filter: &BookingStatusFilter) -> StoreResult<Vec<BookingStatus>> {
        Ok(self
            .tables()
            .bookings
            .values()
            .filter(|b| filter.user_id.is_none_or(|id| b.user_id == id))
            .filter(|b| filter.booked_from.is_none_or(|from| b.booked_at >= from))
            .filter(|b| filter.booked_to.is_none_or(|to| b.booked_at <= to))
            .map(|b| b.status)
            .collect())
    }

    async fn system_counts(&mut self, now: DateTime<Utc>) -> StoreResult<SystemStats> {
        let t = self.tables();
        Ok(SystemStats {
            total_users: t.users.len() as u64,
            active_users: t.users.values().filter(|u| u.is_active).count() as u64,
            total_classes: t.classes.len() as u64,
            active_classes: t
                .classes
                .values()
                .filter(|c| c.status == ClassStatus::Active)
                .count() as u64,
            total_sessions: t.sessions.len() as u64,
            upcoming_sessions: t
                .sessions
                .values()
                .filter(|s| s.status == SessionStatus::Scheduled && s.start_time > now)
                .count() as u64,
            total_bookings: t.bookings.len() as u64,
        })
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let InMemoryTx { mut guard, working } = *self;
        if let Some(working) = working {
            *guard = working;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use classbook_auth::{NewUser, UserRole};

    fn user(email: &str) -> User {
        let input = NewUser {
            email: email.to_string(),
            name: "Store Tester".to_string(),
            password: "unused".to_string(),
            role: UserRole::Student,
        };
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 9, 0, 0).unwrap();
        User::register(UserId::new(), &input, "hash".to_string(), now).unwrap()
    }

    #[tokio::test]
    async fn writes_are_visible_inside_the_transaction_and_after_commit() {
        let store = InMemoryStore::new();
        let alice = user("alice@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&alice).await.unwrap();
        assert_eq!(tx.get_user(alice.id).await.unwrap(), Some(alice.clone()));
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get_user(alice.id).await.unwrap(), Some(alice));
    }

    #[tokio::test]
    async fn dropped_transaction_leaves_tables_untouched() {
        let store = InMemoryStore::new();
        let bob = user("bob@example.com");

        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&bob).await.unwrap();
        drop(tx);

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get_user(bob.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn read_only_commit_keeps_committed_rows() {
        let store = InMemoryStore::new();
        let carol = user("carol@example.com");
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(&carol).await.unwrap();
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert!(tx.find_user_by_email("carol@example.com").await.unwrap().is_some());
        tx.commit().await.unwrap();

        let mut tx = store.begin().await.unwrap();
        assert_eq!(tx.get_user(carol.id).await.unwrap(), Some(carol));
    }
}
