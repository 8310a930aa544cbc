//! Statistics Aggregator over store snapshots. Read-only.

use chrono::{DateTime, Utc};
use tracing::instrument;

use classbook_booking::BookingStatus;
use classbook_core::{DomainError, SessionId, UserId};
use classbook_stats::{SessionAttendance, SystemStats, UserStats};

use crate::error::ServiceResult;
use crate::store::{BookingStatusFilter, StoreTx};

use super::{ServiceContext, observe};

async fn session_attendance_in(
    tx: &mut dyn StoreTx,
    id: SessionId,
) -> ServiceResult<SessionAttendance> {
    if tx.get_session(id).await?.is_none() {
        return Err(DomainError::not_found("session", id).into());
    }
    let statuses = tx
        .bookings_for_session(id)
        .await?
        .into_iter()
        .map(|b| b.status);
    Ok(SessionAttendance::from_statuses(id, statuses))
}

async fn user_stats_in(
    tx: &mut dyn StoreTx,
    user_id: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<UserStats> {
    if tx.get_user(user_id).await?.is_none() {
        return Err(DomainError::not_found("user", user_id).into());
    }
    let statuses = tx
        .booking_statuses(&BookingStatusFilter {
            user_id: Some(user_id),
            ..BookingStatusFilter::default()
        })
        .await?;
    let count = |wanted: BookingStatus| statuses.iter().filter(|s| **s == wanted).count() as u64;
    let upcoming = tx.active_bookings_with_sessions(user_id, Some(now)).await?.len() as u64;

    Ok(UserStats::new(
        user_id,
        statuses.len() as u64,
        count(BookingStatus::Completed),
        count(BookingStatus::Cancelled),
        upcoming,
    ))
}

#[derive(Debug, Clone)]
pub struct StatisticsService {
    ctx: ServiceContext,
}

impl StatisticsService {
    pub fn new(ctx: ServiceContext) -> Self {
        Self { ctx }
    }

    /// Upcoming sessions are `SCHEDULED` ones starting after now.
    #[instrument(skip(self))]
    pub async fn system_stats(&self) -> ServiceResult<SystemStats> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<SystemStats> = async {
            let mut tx = self.ctx.store().begin().await?;
            let stats = tx.system_counts(now).await?;
            tx.commit().await?;
            Ok(stats)
        }
        .await;
        observe("system_stats", result)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn user_stats(&self, user_id: UserId) -> ServiceResult<UserStats> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<UserStats> = async {
            let mut tx = self.ctx.store().begin().await?;
            let stats = user_stats_in(tx.as_mut(), user_id, now).await?;
            tx.commit().await?;
            Ok(stats)
        }
        .await;
        observe("user_stats", result)
    }

    /// Attendance over every booking of the session, cancelled ones included.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn session_attendance(&self, id: SessionId) -> ServiceResult<SessionAttendance> {
        let result: ServiceResult<SessionAttendance> = async {
            let mut tx = self.ctx.store().begin().await?;
            let attendance = session_attendance_in(tx.as_mut(), id).await?;
            tx.commit().await?;
            Ok(attendance)
        }
        .await;
        observe("session_attendance", result)
    }
}
