//! Session Scheduler: session lifecycle and schedule conflicts.
//!
//! Two `SCHEDULED`/`ONGOING` sessions conflict when their half-open time
//! ranges overlap and they share a location; a session without a location
//! conflicts with any overlapping one. Creation and slot-moving updates take
//! the schedule lock before looking for conflicts.

use tracing::instrument;

use classbook_booking::{BookingPolicy, session_title};
use classbook_core::{ClassId, DomainError, Page, PageRequest, SessionId};
use classbook_scheduling::{NewSession, Session, SessionPatch, SessionSlot, SessionStatus, find_conflict};

use crate::audit::{AuditAction, AuditEvent};
use crate::error::ServiceResult;
use crate::store::{BookableSession, SessionDetails, SessionFilter, StoreTx};

use super::{ServiceContext, observe};

#[derive(Debug, Clone)]
pub struct SessionScheduler {
    ctx: ServiceContext,
    policy: BookingPolicy,
}

async fn ensure_free(
    tx: &mut dyn StoreTx,
    slot: &SessionSlot,
    exclude: Option<SessionId>,
) -> ServiceResult<()> {
    tx.lock_schedule().await?;
    let nearby = tx.sessions_overlapping(slot.range).await?;
    if let Some(other) = find_conflict(slot, &nearby, exclude) {
        return Err(DomainError::conflict(format!(
            "overlaps session {} ({} - {}{})",
            other.id,
            other.start_time.format("%Y-%m-%d %H:%M"),
            other.end_time.format("%H:%M"),
            other
                .location
                .as_deref()
                .map(|l| format!(" at {l}"))
                .unwrap_or_default(),
        ))
        .into());
    }
    Ok(())
}

impl SessionScheduler {
    /// `policy` supplies the booking cutoff shown on upcoming sessions.
    pub fn new(ctx: ServiceContext, policy: BookingPolicy) -> Self {
        Self { ctx, policy }
    }

    /// Refusals: `NotFound` (class), `InvalidRange`, `SchedulingConflict`.
    #[instrument(skip(self, input), fields(class_id = %input.class_id))]
    pub async fn create_session(&self, input: NewSession) -> ServiceResult<Session> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Session> = async {
            let mut tx = self.ctx.store().begin().await?;
            if tx.get_class(input.class_id).await?.is_none() {
                return Err(DomainError::not_found("class", input.class_id).into());
            }
            let slot = input.slot()?;
            ensure_free(tx.as_mut(), &slot, None).await?;

            let session = Session::schedule(SessionId::new(), input, now)?;
            tx.insert_session(&session).await?;
            tx.commit().await?;
            Ok(session)
        }
        .await;

        let session = observe("create_session", result)?;
        tracing::info!(session_id = %session.id, start = %session.start_time, "session created");
        self.ctx
            .record(AuditEvent::new(AuditAction::SessionCreated, "session", session.id, now));
        Ok(session)
    }

    /// Partial update. The conflict check re-runs, excluding this session,
    /// whenever the patch touches start, end or location.
    #[instrument(skip(self, patch), fields(session_id = %id))]
    pub async fn update_session(&self, id: SessionId, patch: SessionPatch) -> ServiceResult<Session> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Session> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut session = tx
                .lock_session(id)
                .await?
                .ok_or_else(|| DomainError::not_found("session", id))?;
            if patch.moves_slot() {
                let slot = session.merged_slot(&patch)?;
                ensure_free(tx.as_mut(), &slot, Some(id)).await?;
            }
            session.apply_patch(patch, now)?;
            tx.update_session(&session).await?;
            tx.commit().await?;
            Ok(session)
        }
        .await;

        let session = observe("update_session", result)?;
        tracing::info!(status = session.status.as_str(), "session updated");
        self.ctx
            .record(AuditEvent::new(AuditAction::SessionUpdated, "session", id, now));
        Ok(session)
    }

    /// Cancel the session and every active booking on it.
    ///
    /// Re-cancelling leaves the session and its notes as they are. The
    /// booking cascade ignores deadlines.
    #[instrument(skip(self, reason), fields(session_id = %id))]
    pub async fn cancel_session(&self, id: SessionId, reason: Option<&str>) -> ServiceResult<Session> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<(Session, usize)> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut session = tx
                .lock_session(id)
                .await?
                .ok_or_else(|| DomainError::not_found("session", id))?;
            if session.cancel(reason, now) {
                tx.update_session(&session).await?;
            }

            let mut cascaded = 0;
            for mut booking in tx.bookings_for_session(id).await? {
                if booking.cascade_cancel(now) {
                    tx.update_booking(&booking).await?;
                    cascaded += 1;
                }
            }
            tx.commit().await?;
            Ok((session, cascaded))
        }
        .await;

        let (session, cascaded) = observe("cancel_session", result)?;
        tracing::info!(cancelled_bookings = cascaded, "session cancelled");
        self.ctx.record(
            AuditEvent::new(AuditAction::SessionCancelled, "session", id, now)
                .with_details(format!("{cascaded} booking(s) cancelled")),
        );
        Ok(session)
    }

    /// Mark completed regardless of the start time.
    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn mark_completed(&self, id: SessionId) -> ServiceResult<Session> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Session> = async {
            let mut tx = self.ctx.store().begin().await?;
            let mut session = tx
                .lock_session(id)
                .await?
                .ok_or_else(|| DomainError::not_found("session", id))?;
            session.complete(now);
            tx.update_session(&session).await?;
            tx.commit().await?;
            Ok(session)
        }
        .await;

        let session = observe("mark_completed", result)?;
        tracing::info!("session completed");
        self.ctx
            .record(AuditEvent::new(AuditAction::SessionCompleted, "session", id, now));
        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %id))]
    pub async fn get_session(&self, id: SessionId) -> ServiceResult<SessionDetails> {
        let result: ServiceResult<SessionDetails> = async {
            let mut tx = self.ctx.store().begin().await?;
            let details = tx
                .session_details(id)
                .await?
                .ok_or_else(|| DomainError::not_found("session", id))?;
            tx.commit().await?;
            Ok(details)
        }
        .await;
        observe("get_session", result)
    }

    /// Ordered by start time ascending.
    #[instrument(skip(self))]
    pub async fn list_sessions(
        &self,
        filter: SessionFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<SessionDetails>> {
        let result: ServiceResult<Page<SessionDetails>> = async {
            let mut tx = self.ctx.store().begin().await?;
            let page = tx.list_session_details(&filter, page).await?;
            tx.commit().await?;
            Ok(page)
        }
        .await;
        observe("list_sessions", result)
    }

    /// Scheduled sessions that have not started, soonest first.
    #[instrument(skip(self))]
    pub async fn upcoming_sessions(&self, limit: u64) -> ServiceResult<Vec<BookableSession>> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Vec<BookableSession>> = async {
            let page = PageRequest::new(0, limit)?;
            let filter = SessionFilter {
                status: Some(SessionStatus::Scheduled),
                starts_after: Some(now),
                ..SessionFilter::default()
            };
            let mut tx = self.ctx.store().begin().await?;
            let details = tx.list_session_details(&filter, page).await?;
            tx.commit().await?;

            Ok(details
                .items
                .into_iter()
                .map(|d| {
                    let start = d.session.start_time;
                    let deadline = self.policy.booking_cutoff(start);
                    BookableSession {
                        session_id: d.session.id,
                        session_title: session_title(&d.class_name, start),
                        start_time: start,
                        available_spots: d.available_spots,
                        is_bookable: now < deadline && d.available_spots > 0,
                        booking_deadline: deadline,
                    }
                })
                .collect())
        }
        .await;
        observe("upcoming_sessions", result)
    }

    /// All sessions of a class, or only those still to come.
    #[instrument(skip(self), fields(class_id = %class_id))]
    pub async fn sessions_for_class(
        &self,
        class_id: ClassId,
        include_past: bool,
    ) -> ServiceResult<Vec<Session>> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Vec<Session>> = async {
            let mut tx = self.ctx.store().begin().await?;
            if tx.get_class(class_id).await?.is_none() {
                return Err(DomainError::not_found("class", class_id).into());
            }
            let sessions = tx
                .sessions_for_class(class_id, (!include_past).then_some(now))
                .await?;
            tx.commit().await?;
            Ok(sessions)
        }
        .await;
        observe("sessions_for_class", result)
    }
}
