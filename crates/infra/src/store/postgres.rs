//! Postgres-backed entity store.
//!
//! ## Concurrency
//!
//! Transactions run at the default `READ COMMITTED` level. Check-then-act
//! sequences are protected by explicit locks taken inside the transaction:
//!
//! - `lock_session` issues `SELECT ... FOR UPDATE` on the session row. Any
//!   statement that runs after the lock is granted sees every booking that
//!   was committed by the previous lock holder, so the capacity count cannot
//!   go stale between check and insert.
//! - `lock_schedule` takes a transaction-scoped advisory lock so overlap
//!   queries and session inserts/updates are serialized.
//!
//! The partial unique index on active `(user_id, session_id)` is a backstop.
//!
//! ## Error Mapping
//!
//! | SQLx error | Code | StoreError |
//! |------------|------|------------|
//! | Database (serialization failure) | `40001` | `SerializationConflict` |
//! | Database (deadlock detected) | `40P01` | `SerializationConflict` |
//! | Database (unique violation) | `23505` | `UniqueViolation` |
//! | Database (other) | any | `Database` |
//! | PoolClosed / PoolTimedOut / Io | n/a | `Unavailable` |
//! | other | n/a | `Database` |

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{Executor, PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use classbook_auth::User;
use classbook_booking::{Booking, BookingDetails, BookingStatus};
use classbook_classes::Class;
use classbook_core::{
    BookingId, ClassId, DomainError, Page, PageRequest, SessionId, TimeRange, UserId,
};
use classbook_scheduling::Session;
use classbook_stats::{SystemStats, available_spots, occupancy};

use super::query::{
    BookingFilter, BookingOrder, BookingStatusFilter, ClassFilter, SessionDetails, SessionFilter,
    UserFilter,
};
use super::r#trait::{EntityStore, StoreError, StoreResult, StoreTx};

const MIGRATION: &str = include_str!("../../migrations/0001_init.sql");

/// Key for the schedule-wide advisory lock.
const SCHEDULE_LOCK_KEY: i64 = 0x636c_6173_7362_6b;

const USER_COLUMNS: &str =
    "id, email, name, role, is_active, password_hash, created_at, updated_at, last_login";

const CLASS_COLUMNS: &str = "id, name, description, category, duration_minutes, max_capacity, \
     price_cents, instructor_name, status, created_at, updated_at";

const SESSION_COLUMNS: &str = "s.id, s.class_id, s.start_time, s.end_time, s.location, s.status, \
     s.notes, s.created_at, s.updated_at";

const BOOKING_COLUMNS: &str =
    "b.id, b.user_id, b.session_id, b.status, b.booked_at, b.notes, b.admin_notes, b.updated_at";

const SESSION_DETAIL_SELECT: &str = "SELECT s.id, s.class_id, s.start_time, s.end_time, s.location, \
     s.status, s.notes, s.created_at, s.updated_at, \
     c.name AS class_name, c.category AS class_category, c.instructor_name, c.price_cents, \
     c.duration_minutes, c.max_capacity, \
     (SELECT COUNT(*) FROM bookings b \
        WHERE b.session_id = s.id AND b.status IN ('PENDING', 'CONFIRMED')) AS current_bookings \
     FROM sessions s JOIN classes c ON c.id = s.class_id";

const SESSION_FILTER: &str = "WHERE ($1::uuid IS NULL OR s.class_id = $1) \
     AND ($2::text IS NULL OR s.status = $2) \
     AND ($3::timestamptz IS NULL OR s.start_time >= $3) \
     AND ($4::timestamptz IS NULL OR s.start_time <= $4) \
     AND ($5::timestamptz IS NULL OR s.start_time > $5)";

const BOOKING_FILTER: &str = "WHERE ($1::uuid IS NULL OR b.user_id = $1) \
     AND ($2::text IS NULL OR b.status = $2) \
     AND (NOT $3::boolean OR b.status IN ('PENDING', 'CONFIRMED')) \
     AND ($4::uuid IS NULL OR s.class_id = $4) \
     AND ($5::timestamptz IS NULL OR s.start_time >= $5) \
     AND ($6::timestamptz IS NULL OR s.start_time <= $6) \
     AND ($7::timestamptz IS NULL OR s.start_time > $7)";

const USER_FILTER: &str = "WHERE ($1::text IS NULL OR role = $1) \
     AND ($2::boolean IS NULL OR is_active = $2) \
     AND ($3::text IS NULL OR name ILIKE $3 OR email ILIKE $3)";

const CLASS_FILTER: &str = "WHERE ($1::text IS NULL OR status = $1) \
     AND ($2::text IS NULL OR category = $2) \
     AND ($3::text IS NULL OR name ILIKE $3 OR instructor_name ILIKE $3)";

/// Postgres-backed entity store. `Send + Sync`; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Idempotent.
    #[instrument(skip(self), err)]
    pub async fn migrate(&self) -> StoreResult<()> {
        self.pool
            .execute(MIGRATION)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl EntityStore for PostgresStore {
    async fn begin(&self) -> StoreResult<Box<dyn StoreTx>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;
        Ok(Box::new(PgTx { tx }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn search_pattern(search: Option<&str>) -> Option<String> {
    search.map(|q| {
        let escaped = q.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
        format!("%{escaped}%")
    })
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Database(format!("failed to read column {name}: {e}")))
}

fn parsed<T>(row: &PgRow, name: &str) -> StoreResult<T>
where
    T: core::str::FromStr<Err = DomainError>,
{
    let raw: String = column(row, name)?;
    raw.parse()
        .map_err(|e: DomainError| StoreError::Database(format!("column {name}: {e}")))
}

fn narrow_u32(row: &PgRow, name: &str) -> StoreResult<u32> {
    let raw: i32 = column(row, name)?;
    u32::try_from(raw).map_err(|_| StoreError::Database(format!("column {name} is negative")))
}

fn user_from_row(row: &PgRow) -> StoreResult<User> {
    Ok(User {
        id: UserId::from_uuid(column(row, "id")?),
        email: column(row, "email")?,
        name: column(row, "name")?,
        role: parsed(row, "role")?,
        is_active: column(row, "is_active")?,
        password_hash: column(row, "password_hash")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
        last_login: column(row, "last_login")?,
    })
}

fn class_from_row(row: &PgRow) -> StoreResult<Class> {
    let price: i64 = column(row, "price_cents")?;
    Ok(Class {
        id: ClassId::from_uuid(column(row, "id")?),
        name: column(row, "name")?,
        description: column(row, "description")?,
        category: parsed(row, "category")?,
        duration_minutes: narrow_u32(row, "duration_minutes")?,
        max_capacity: narrow_u32(row, "max_capacity")?,
        price_cents: to_u64(price),
        instructor_name: column(row, "instructor_name")?,
        status: parsed(row, "status")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn session_from_row(row: &PgRow) -> StoreResult<Session> {
    Ok(Session {
        id: SessionId::from_uuid(column(row, "id")?),
        class_id: ClassId::from_uuid(column(row, "class_id")?),
        start_time: column(row, "start_time")?,
        end_time: column(row, "end_time")?,
        location: column(row, "location")?,
        status: parsed(row, "status")?,
        notes: column(row, "notes")?,
        created_at: column(row, "created_at")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn session_details_from_row(row: &PgRow) -> StoreResult<SessionDetails> {
    let max_capacity = narrow_u32(row, "max_capacity")?;
    let current = to_u64(column(row, "current_bookings")?);
    let price: i64 = column(row, "price_cents")?;
    Ok(SessionDetails {
        session: session_from_row(row)?,
        class_name: column(row, "class_name")?,
        class_category: parsed(row, "class_category")?,
        instructor_name: column(row, "instructor_name")?,
        price_cents: to_u64(price),
        duration_minutes: narrow_u32(row, "duration_minutes")?,
        max_capacity,
        current_bookings: current,
        available_spots: available_spots(current, max_capacity),
        occupancy: occupancy(current, max_capacity),
    })
}

fn booking_from_row(row: &PgRow) -> StoreResult<Booking> {
    Ok(Booking {
        id: BookingId::from_uuid(column(row, "id")?),
        user_id: UserId::from_uuid(column(row, "user_id")?),
        session_id: SessionId::from_uuid(column(row, "session_id")?),
        status: parsed(row, "status")?,
        booked_at: column(row, "booked_at")?,
        notes: column(row, "notes")?,
        admin_notes: column(row, "admin_notes")?,
        updated_at: column(row, "updated_at")?,
    })
}

fn booking_details_from_row(row: &PgRow) -> StoreResult<BookingDetails> {
    Ok(BookingDetails::new(
        booking_from_row(row)?,
        column(row, "user_name")?,
        column(row, "user_email")?,
        column(row, "class_name")?,
        column(row, "session_start")?,
    ))
}

fn count_from_row(row: &PgRow, name: &str) -> StoreResult<u64> {
    Ok(to_u64(column(row, name)?))
}

#[async_trait]
impl StoreTx for PgTx {
    #[instrument(skip(self), fields(user_id = %id), err)]
    async fn get_user(&mut self, id: UserId) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_user", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn find_user_by_email(&mut self, email: &str) -> StoreResult<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query(&sql)
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn insert_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, email, name, role, is_active, password_hash, created_at, updated_at, last_login
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(*user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.last_login)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_user", e))?;
        Ok(())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id), err)]
    async fn update_user(&mut self, user: &User) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE users
            SET email = $2, name = $3, role = $4, is_active = $5, password_hash = $6,
                updated_at = $7, last_login = $8
            WHERE id = $1
            "#,
        )
        .bind(*user.id.as_uuid())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.role.as_str())
        .bind(user.is_active)
        .bind(&user.password_hash)
        .bind(user.updated_at)
        .bind(user.last_login)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_users(&mut self, filter: &UserFilter, page: PageRequest) -> StoreResult<Page<User>> {
        let role = filter.role.map(|r| r.as_str());
        let pattern = search_pattern(filter.search.as_deref());

        let total_sql = format!("SELECT COUNT(*) AS total FROM users {USER_FILTER}");
        let total_row = sqlx::query(&total_sql)
            .bind(role)
            .bind(filter.is_active)
            .bind(pattern.as_deref())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_users", e))?;
        let total = count_from_row(&total_row, "total")?;

        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users {USER_FILTER} \
             ORDER BY created_at DESC, id DESC LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query(&sql)
            .bind(role)
            .bind(filter.is_active)
            .bind(pattern.as_deref())
            .bind(to_i64(page.limit()))
            .bind(to_i64(page.skip()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_users", e))?;
        let users = rows.iter().map(user_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(users, total, page))
    }

    #[instrument(skip(self), fields(class_id = %id), err)]
    async fn get_class(&mut self, id: ClassId) -> StoreResult<Option<Class>> {
        let sql = format!("SELECT {CLASS_COLUMNS} FROM classes WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_class", e))?;
        row.as_ref().map(class_from_row).transpose()
    }

    #[instrument(skip(self, class), fields(class_id = %class.id), err)]
    async fn insert_class(&mut self, class: &Class) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO classes (
                id, name, description, category, duration_minutes, max_capacity,
                price_cents, instructor_name, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(*class.id.as_uuid())
        .bind(&class.name)
        .bind(&class.description)
        .bind(class.category.as_str())
        .bind(class.duration_minutes as i32)
        .bind(class.max_capacity as i32)
        .bind(to_i64(class.price_cents))
        .bind(&class.instructor_name)
        .bind(class.status.as_str())
        .bind(class.created_at)
        .bind(class.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_class", e))?;
        Ok(())
    }

    #[instrument(skip(self, class), fields(class_id = %class.id), err)]
    async fn update_class(&mut self, class: &Class) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE classes
            SET name = $2, description = $3, category = $4, duration_minutes = $5,
                max_capacity = $6, price_cents = $7, instructor_name = $8, status = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(*class.id.as_uuid())
        .bind(&class.name)
        .bind(&class.description)
        .bind(class.category.as_str())
        .bind(class.duration_minutes as i32)
        .bind(class.max_capacity as i32)
        .bind(to_i64(class.price_cents))
        .bind(&class.instructor_name)
        .bind(class.status.as_str())
        .bind(class.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_class", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_classes(&mut self, filter: &ClassFilter, page: PageRequest) -> StoreResult<Page<Class>> {
        let status = filter.status.map(|s| s.as_str());
        let category = filter.category.map(|c| c.as_str());
        let pattern = search_pattern(filter.search.as_deref());

        let total_sql = format!("SELECT COUNT(*) AS total FROM classes {CLASS_FILTER}");
        let total_row = sqlx::query(&total_sql)
            .bind(status)
            .bind(category)
            .bind(pattern.as_deref())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_classes", e))?;
        let total = count_from_row(&total_row, "total")?;

        let sql = format!(
            "SELECT {CLASS_COLUMNS} FROM classes {CLASS_FILTER} \
             ORDER BY name ASC, id ASC LIMIT $4 OFFSET $5"
        );
        let rows = sqlx::query(&sql)
            .bind(status)
            .bind(category)
            .bind(pattern.as_deref())
            .bind(to_i64(page.limit()))
            .bind(to_i64(page.skip()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_classes", e))?;
        let classes = rows.iter().map(class_from_row).collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(classes, total, page))
    }

    #[instrument(skip(self), fields(session_id = %id), err)]
    async fn get_session(&mut self, id: SessionId) -> StoreResult<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_session", e))?;
        row.as_ref().map(session_from_row).transpose()
    }

    #[instrument(skip(self), fields(session_id = %id), err)]
    async fn lock_session(&mut self, id: SessionId) -> StoreResult<Option<Session>> {
        let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions s WHERE s.id = $1 FOR UPDATE");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_session", e))?;
        row.as_ref().map(session_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn lock_schedule(&mut self) -> StoreResult<()> {
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(SCHEDULE_LOCK_KEY)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("lock_schedule", e))?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(session_id = %session.id), err)]
    async fn insert_session(&mut self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sessions (
                id, class_id, start_time, end_time, location, status, notes, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(*session.id.as_uuid())
        .bind(*session.class_id.as_uuid())
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(&session.location)
        .bind(session.status.as_str())
        .bind(&session.notes)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_session", e))?;
        Ok(())
    }

    #[instrument(skip(self, session), fields(session_id = %session.id), err)]
    async fn update_session(&mut self, session: &Session) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE sessions
            SET start_time = $2, end_time = $3, location = $4, status = $5, notes = $6,
                updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(*session.id.as_uuid())
        .bind(session.start_time)
        .bind(session.end_time)
        .bind(&session.location)
        .bind(session.status.as_str())
        .bind(&session.notes)
        .bind(session.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_session", e))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn sessions_overlapping(&mut self, range: TimeRange) -> StoreResult<Vec<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions s \
             WHERE s.status IN ('SCHEDULED', 'ONGOING') \
               AND s.start_time < $2 AND $1 < s.end_time \
             ORDER BY s.start_time ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(range.start())
            .bind(range.end())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("sessions_overlapping", e))?;
        rows.iter().map(session_from_row).collect()
    }

    #[instrument(skip(self), fields(session_id = %id), err)]
    async fn session_details(&mut self, id: SessionId) -> StoreResult<Option<SessionDetails>> {
        let sql = format!("{SESSION_DETAIL_SELECT} WHERE s.id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("session_details", e))?;
        row.as_ref().map(session_details_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_session_details(
        &mut self,
        filter: &SessionFilter,
        page: PageRequest,
    ) -> StoreResult<Page<SessionDetails>> {
        let class_id = filter.class_id.map(Uuid::from);
        let status = filter.status.map(|s| s.as_str());

        let total_sql = format!("SELECT COUNT(*) AS total FROM sessions s {SESSION_FILTER}");
        let total_row = sqlx::query(&total_sql)
            .bind(class_id)
            .bind(status)
            .bind(filter.start_from)
            .bind(filter.start_to)
            .bind(filter.starts_after)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_sessions", e))?;
        let total = count_from_row(&total_row, "total")?;

        let sql = format!(
            "{SESSION_DETAIL_SELECT} {SESSION_FILTER} \
             ORDER BY s.start_time ASC, s.id ASC LIMIT $6 OFFSET $7"
        );
        let rows = sqlx::query(&sql)
            .bind(class_id)
            .bind(status)
            .bind(filter.start_from)
            .bind(filter.start_to)
            .bind(filter.starts_after)
            .bind(to_i64(page.limit()))
            .bind(to_i64(page.skip()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_session_details", e))?;
        let items = rows
            .iter()
            .map(session_details_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    #[instrument(skip(self), fields(class_id = %class_id), err)]
    async fn sessions_for_class(
        &mut self,
        class_id: ClassId,
        starts_after: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<Session>> {
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions s \
             WHERE s.class_id = $1 AND ($2::timestamptz IS NULL OR s.start_time > $2) \
             ORDER BY s.start_time ASC, s.id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(*class_id.as_uuid())
            .bind(starts_after)
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("sessions_for_class", e))?;
        rows.iter().map(session_from_row).collect()
    }

    #[instrument(skip(self), fields(booking_id = %id), err)]
    async fn get_booking(&mut self, id: BookingId) -> StoreResult<Option<Booking>> {
        let sql = format!("SELECT {BOOKING_COLUMNS} FROM bookings b WHERE b.id = $1");
        let row = sqlx::query(&sql)
            .bind(*id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_booking", e))?;
        row.as_ref().map(booking_from_row).transpose()
    }

    #[instrument(skip(self, booking), fields(booking_id = %booking.id), err)]
    async fn insert_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings (
                id, user_id, session_id, status, booked_at, notes, admin_notes, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(*booking.id.as_uuid())
        .bind(*booking.user_id.as_uuid())
        .bind(*booking.session_id.as_uuid())
        .bind(booking.status.as_str())
        .bind(booking.booked_at)
        .bind(&booking.notes)
        .bind(&booking.admin_notes)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_booking", e))?;
        Ok(())
    }

    #[instrument(skip(self, booking), fields(booking_id = %booking.id), err)]
    async fn update_booking(&mut self, booking: &Booking) -> StoreResult<()> {
        sqlx::query(
            r#"
            UPDATE bookings
            SET status = $2, notes = $3, admin_notes = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(*booking.id.as_uuid())
        .bind(booking.status.as_str())
        .bind(&booking.notes)
        .bind(&booking.admin_notes)
        .bind(booking.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_booking", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(session_id = %session_id), err)]
    async fn count_active_bookings(&mut self, session_id: SessionId) -> StoreResult<u64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS active
            FROM bookings
            WHERE session_id = $1 AND status IN ('PENDING', 'CONFIRMED')
            "#,
        )
        .bind(*session_id.as_uuid())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("count_active_bookings", e))?;
        count_from_row(&row, "active")
    }

    #[instrument(skip(self), fields(user_id = %user_id, session_id = %session_id), err)]
    async fn active_booking_for(
        &mut self,
        user_id: UserId,
        session_id: SessionId,
    ) -> StoreResult<Option<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b \
             WHERE b.user_id = $1 AND b.session_id = $2 AND b.status IN ('PENDING', 'CONFIRMED')"
        );
        let row = sqlx::query(&sql)
            .bind(*user_id.as_uuid())
            .bind(*session_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("active_booking_for", e))?;
        row.as_ref().map(booking_from_row).transpose()
    }

    #[instrument(skip(self), fields(session_id = %session_id), err)]
    async fn bookings_for_session(&mut self, session_id: SessionId) -> StoreResult<Vec<Booking>> {
        let sql = format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings b \
             WHERE b.session_id = $1 ORDER BY b.booked_at ASC, b.id ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(*session_id.as_uuid())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("bookings_for_session", e))?;
        rows.iter().map(booking_from_row).collect()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn active_bookings_with_sessions(
        &mut self,
        user_id: UserId,
        starts_after: Option<DateTime<Utc>>,
    ) -> StoreResult<Vec<(Booking, Session)>> {
        let rows = sqlx::query(
            r#"
            SELECT
                b.id AS booking_id, b.user_id, b.session_id, b.status AS booking_status,
                b.booked_at, b.notes AS booking_notes, b.admin_notes,
                b.updated_at AS booking_updated_at,
                s.id, s.class_id, s.start_time, s.end_time, s.location, s.status,
                s.notes, s.created_at, s.updated_at
            FROM bookings b
            JOIN sessions s ON s.id = b.session_id
            WHERE b.user_id = $1
              AND b.status IN ('PENDING', 'CONFIRMED')
              AND ($2::timestamptz IS NULL OR s.start_time > $2)
            ORDER BY s.start_time ASC, b.id ASC
            "#,
        )
        .bind(*user_id.as_uuid())
        .bind(starts_after)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("active_bookings_with_sessions", e))?;

        rows.iter()
            .map(|row| {
                let booking = Booking {
                    id: BookingId::from_uuid(column(row, "booking_id")?),
                    user_id: UserId::from_uuid(column(row, "user_id")?),
                    session_id: SessionId::from_uuid(column(row, "session_id")?),
                    status: parsed(row, "booking_status")?,
                    booked_at: column(row, "booked_at")?,
                    notes: column(row, "booking_notes")?,
                    admin_notes: column(row, "admin_notes")?,
                    updated_at: column(row, "booking_updated_at")?,
                };
                Ok((booking, session_from_row(row)?))
            })
            .collect()
    }

    #[instrument(skip(self), err)]
    async fn list_booking_details(
        &mut self,
        filter: &BookingFilter,
        order: BookingOrder,
        page: PageRequest,
    ) -> StoreResult<Page<BookingDetails>> {
        let user_id = filter.user_id.map(Uuid::from);
        let status = filter.status.map(|s| s.as_str());
        let class_id = filter.class_id.map(Uuid::from);

        let total_sql = format!(
            "SELECT COUNT(*) AS total FROM bookings b \
             JOIN sessions s ON s.id = b.session_id {BOOKING_FILTER}"
        );
        let total_row = sqlx::query(&total_sql)
            .bind(user_id)
            .bind(status)
            .bind(filter.active_only)
            .bind(class_id)
            .bind(filter.session_start_from)
            .bind(filter.session_start_to)
            .bind(filter.session_starts_after)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("count_bookings", e))?;
        let total = count_from_row(&total_row, "total")?;

        let order_by = match order {
            BookingOrder::BookedAtDesc => "b.booked_at DESC",
            BookingOrder::SessionStartDesc => "s.start_time DESC",
            BookingOrder::SessionStartAsc => "s.start_time ASC",
        };
        let sql = format!(
            "SELECT {BOOKING_COLUMNS}, u.name AS user_name, u.email AS user_email, \
                    c.name AS class_name, s.start_time AS session_start \
             FROM bookings b \
             JOIN sessions s ON s.id = b.session_id \
             JOIN classes c ON c.id = s.class_id \
             JOIN users u ON u.id = b.user_id \
             {BOOKING_FILTER} \
             ORDER BY {order_by}, b.id ASC LIMIT $8 OFFSET $9"
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(status)
            .bind(filter.active_only)
            .bind(class_id)
            .bind(filter.session_start_from)
            .bind(filter.session_start_to)
            .bind(filter.session_starts_after)
            .bind(to_i64(page.limit()))
            .bind(to_i64(page.skip()))
            .fetch_all(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("list_booking_details", e))?;
        let items = rows
            .iter()
            .map(booking_details_from_row)
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(Page::new(items, total, page))
    }

    #[instrument(skip(self), err)]
    async fn booking_statuses(&mut self, filter: &BookingStatusFilter) -> StoreResult<Vec<BookingStatus>> {
        let rows = sqlx::query(
            r#"
            SELECT status
            FROM bookings
            WHERE ($1::uuid IS NULL OR user_id = $1)
              AND ($2::timestamptz IS NULL OR booked_at >= $2)
              AND ($3::timestamptz IS NULL OR booked_at <= $3)
            "#,
        )
        .bind(filter.user_id.map(Uuid::from))
        .bind(filter.booked_from)
        .bind(filter.booked_to)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("booking_statuses", e))?;
        rows.iter().map(|row| parsed(row, "status")).collect()
    }

    #[instrument(skip(self), err)]
    async fn system_counts(&mut self, now: DateTime<Utc>) -> StoreResult<SystemStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM users) AS total_users,
                (SELECT COUNT(*) FROM users WHERE is_active) AS active_users,
                (SELECT COUNT(*) FROM classes) AS total_classes,
                (SELECT COUNT(*) FROM classes WHERE status = 'ACTIVE') AS active_classes,
                (SELECT COUNT(*) FROM sessions) AS total_sessions,
                (SELECT COUNT(*) FROM sessions
                    WHERE status = 'SCHEDULED' AND start_time > $1) AS upcoming_sessions,
                (SELECT COUNT(*) FROM bookings) AS total_bookings
            "#,
        )
        .bind(now)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("system_counts", e))?;

        Ok(SystemStats {
            total_users: count_from_row(&row, "total_users")?,
            active_users: count_from_row(&row, "active_users")?,
            total_classes: count_from_row(&row, "total_classes")?,
            active_classes: count_from_row(&row, "active_classes")?,
            total_sessions: count_from_row(&row, "total_sessions")?,
            upcoming_sessions: count_from_row(&row, "upcoming_sessions")?,
            total_bookings: count_from_row(&row, "total_bookings")?,
        })
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))
    }
}

/// Map SQLx errors to StoreError.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("40001") | Some("40P01") => StoreError::SerializationConflict(msg),
                Some("23505") => StoreError::UniqueViolation(msg),
                _ => StoreError::Database(msg),
            }
        }
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            StoreError::Unavailable(format!("{operation}: {err}"))
        }
        _ => StoreError::Database(format!("sqlx error in {operation}: {err}")),
    }
}
