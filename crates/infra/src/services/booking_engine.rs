//! Booking Engine: seat reservation and the booking state machine.
//!
//! ## Seat accounting
//!
//! `create_booking` locks the session row before it counts active bookings,
//! so two concurrent requests for the last seat are serialized: the second
//! one sees the first one's booking and fails with `CapacityExceeded`.
//! Capacity is read from the session's class at that moment.
//!
//! ## Ownership
//!
//! Operations on an existing booking take an optional acting user. `Some`
//! means the booking's owner is acting and ownership plus the cancellation
//! cutoff are enforced; `None` is an administrative call and bypasses both.
//! Role policy is the caller's concern.
//!
//! ## Transitions
//!
//! ```text
//! PENDING ──confirm──▶ CONFIRMED
//!    │                    │
//!    ├──cancel──▶ CANCELLED ◀──cancel──┤
//!    └──attendance──▶ COMPLETED | NO_SHOW ◀──attendance──┘
//! ```
//!
//! `update_booking` is the administrative escape hatch and may overwrite the
//! status without these guards.

use chrono::{DateTime, Utc};
use tracing::instrument;

use classbook_booking::{
    Booking, BookingDetails, BookingPatch, BookingPolicy, BookingStatus, SeatSnapshot,
    check_eligibility, has_overlapping_booking,
};
use classbook_core::{BookingId, DomainError, Page, PageRequest, SessionId, UserId};
use classbook_scheduling::Session;
use classbook_stats::BookingStats;

use crate::audit::{AuditAction, AuditEvent};
use crate::error::ServiceResult;
use crate::store::{BookingFilter, BookingOrder, BookingStatusFilter, StoreTx};

use super::{ServiceContext, observe, unique_as};

#[derive(Debug, Clone)]
pub struct BookingEngine {
    ctx: ServiceContext,
    policy: BookingPolicy,
}

/// Load a booking and row-lock its session.
async fn load_for_transition(
    tx: &mut dyn StoreTx,
    id: BookingId,
) -> ServiceResult<(Booking, Session)> {
    let booking = tx
        .get_booking(id)
        .await?
        .ok_or_else(|| DomainError::not_found("booking", id))?;
    let session = tx
        .lock_session(booking.session_id)
        .await?
        .ok_or_else(|| DomainError::not_found("session", booking.session_id))?;
    Ok((booking, session))
}

impl BookingEngine {
    pub fn new(ctx: ServiceContext, policy: BookingPolicy) -> Self {
        Self { ctx, policy }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Reserve a seat for `user_id` in `session_id`.
    ///
    /// Refusals, in order: `NotFound`, `NotBookable`, `PastSession`,
    /// `CapacityExceeded`, `DuplicateBooking`, `DeadlinePassed`, and, when
    /// the policy rejects overlapping bookings, `SchedulingConflict`.
    #[instrument(skip(self, notes), fields(session_id = %session_id, user_id = %user_id))]
    pub async fn create_booking(
        &self,
        session_id: SessionId,
        user_id: UserId,
        notes: Option<String>,
    ) -> ServiceResult<Booking> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Booking> = async {
            let mut tx = self.ctx.store().begin().await?;

            let session = tx
                .lock_session(session_id)
                .await?
                .ok_or_else(|| DomainError::not_found("session", session_id))?;
            if tx.get_user(user_id).await?.is_none() {
                return Err(DomainError::not_found("user", user_id).into());
            }
            let class = tx
                .get_class(session.class_id)
                .await?
                .ok_or_else(|| DomainError::not_found("class", session.class_id))?;

            let seats = SeatSnapshot {
                max_capacity: class.max_capacity,
                active_bookings: tx.count_active_bookings(session_id).await?,
                user_has_active_booking: tx.active_booking_for(user_id, session_id).await?.is_some(),
            };
            check_eligibility(&session, &seats, &self.policy, now)?;

            if self.policy.reject_overlapping_bookings {
                let held: Vec<Session> = tx
                    .active_bookings_with_sessions(user_id, None)
                    .await?
                    .into_iter()
                    .map(|(_, s)| s)
                    .collect();
                if has_overlapping_booking(&session, &held) {
                    return Err(DomainError::conflict(format!(
                        "user {user_id} already holds a booking overlapping session {session_id}"
                    ))
                    .into());
                }
            }

            let booking = Booking::reserve(BookingId::new(), user_id, session_id, notes, now);
            tx.insert_booking(&booking)
                .await
                .map_err(|e| unique_as(e, || DomainError::DuplicateBooking))?;
            tx.commit().await?;
            Ok(booking)
        }
        .await;

        let booking = observe("create_booking", result)?;
        tracing::info!(booking_id = %booking.id, "booking created");
        self.ctx.record(
            AuditEvent::new(AuditAction::BookingCreated, "booking", booking.id, now)
                .by(Some(user_id))
                .with_details(format!("session {session_id}")),
        );
        Ok(booking)
    }

    /// Partial update. Ownership is enforced when `acting` is given; the
    /// status is overwritten without transition checks.
    #[instrument(skip(self, patch), fields(booking_id = %id))]
    pub async fn update_booking(
        &self,
        id: BookingId,
        patch: BookingPatch,
        acting: Option<UserId>,
    ) -> ServiceResult<Booking> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Booking> = async {
            let mut tx = self.ctx.store().begin().await?;
            let (mut booking, _) = load_for_transition(tx.as_mut(), id).await?;
            booking.ensure_owned_by(acting)?;
            booking.apply_patch(patch, now);
            tx.update_booking(&booking)
                .await
                .map_err(|e| unique_as(e, || DomainError::DuplicateBooking))?;
            tx.commit().await?;
            Ok(booking)
        }
        .await;

        let booking = observe("update_booking", result)?;
        tracing::info!(status = booking.status.as_str(), "booking updated");
        self.ctx.record(
            AuditEvent::new(AuditAction::BookingUpdated, "booking", id, now).by(acting),
        );
        Ok(booking)
    }

    /// Cancel an active booking.
    ///
    /// Refusals, in order: `NotFound`, `Forbidden`, `InvalidTransition`,
    /// `DeadlinePassed` (owner cancellations only).
    #[instrument(skip(self, reason), fields(booking_id = %id))]
    pub async fn cancel_booking(
        &self,
        id: BookingId,
        acting: Option<UserId>,
        reason: Option<&str>,
    ) -> ServiceResult<Booking> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Booking> = async {
            let mut tx = self.ctx.store().begin().await?;
            let (mut booking, session) = load_for_transition(tx.as_mut(), id).await?;
            booking.ensure_owned_by(acting)?;
            booking.cancel(reason, now)?;
            self.policy
                .check_cancellation_deadline(session.start_time, acting.is_some(), now)?;
            tx.update_booking(&booking).await?;
            tx.commit().await?;
            Ok(booking)
        }
        .await;

        let booking = observe("cancel_booking", result)?;
        tracing::info!(session_id = %booking.session_id, "booking cancelled");
        let mut event = AuditEvent::new(AuditAction::BookingCancelled, "booking", id, now).by(acting);
        if let Some(reason) = reason {
            event = event.with_details(reason);
        }
        self.ctx.record(event);
        Ok(booking)
    }

    #[instrument(skip(self), fields(booking_id = %id))]
    pub async fn confirm_booking(&self, id: BookingId) -> ServiceResult<Booking> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Booking> = async {
            let mut tx = self.ctx.store().begin().await?;
            let (mut booking, _) = load_for_transition(tx.as_mut(), id).await?;
            booking.confirm(now)?;
            tx.update_booking(&booking).await?;
            tx.commit().await?;
            Ok(booking)
        }
        .await;

        let booking = observe("confirm_booking", result)?;
        tracing::info!("booking confirmed");
        self.ctx
            .record(AuditEvent::new(AuditAction::BookingConfirmed, "booking", id, now));
        Ok(booking)
    }

    /// `COMPLETED` when attended, otherwise `NO_SHOW`; refused with
    /// `TooEarly` before the session starts.
    #[instrument(skip(self), fields(booking_id = %id))]
    pub async fn mark_attendance(&self, id: BookingId, attended: bool) -> ServiceResult<Booking> {
        let now = self.ctx.clock().now();
        let result: ServiceResult<Booking> = async {
            let mut tx = self.ctx.store().begin().await?;
            let (mut booking, session) = load_for_transition(tx.as_mut(), id).await?;
            booking.mark_attendance(session.start_time, attended, now)?;
            tx.update_booking(&booking).await?;
            tx.commit().await?;
            Ok(booking)
        }
        .await;

        let booking = observe("mark_attendance", result)?;
        tracing::info!(status = booking.status.as_str(), "attendance marked");
        self.ctx.record(
            AuditEvent::new(AuditAction::AttendanceMarked, "booking", id, now)
                .with_details(booking.status.as_str()),
        );
        Ok(booking)
    }

    /// Whether `user_id` holds another active booking overlapping `session_id`.
    ///
    /// Advisory; `create_booking` consults it only when the policy says so.
    /// An unknown session has nothing to conflict with.
    #[instrument(skip(self), fields(user_id = %user_id, session_id = %session_id))]
    pub async fn check_conflict(&self, user_id: UserId, session_id: SessionId) -> ServiceResult<bool> {
        let result: ServiceResult<bool> = async {
            let mut tx = self.ctx.store().begin().await?;
            let Some(target) = tx.get_session(session_id).await? else {
                tx.commit().await?;
                return Ok(false);
            };
            let held: Vec<Session> = tx
                .active_bookings_with_sessions(user_id, None)
                .await?
                .into_iter()
                .map(|(_, s)| s)
                .collect();
            tx.commit().await?;
            Ok(has_overlapping_booking(&target, &held))
        }
        .await;
        observe("check_conflict", result)
    }

    /// Fetch one booking. Owners may only read their own.
    #[instrument(skip(self), fields(booking_id = %id))]
    pub async fn get_booking(&self, id: BookingId, acting: Option<UserId>) -> ServiceResult<Booking> {
        let result: ServiceResult<Booking> = async {
            let mut tx = self.ctx.store().begin().await?;
            let booking = tx
                .get_booking(id)
                .await?
                .ok_or_else(|| DomainError::not_found("booking", id))?;
            tx.commit().await?;
            booking.ensure_owned_by(acting)?;
            Ok(booking)
        }
        .await;
        observe("get_booking", result)
    }

    /// A user's bookings, most recent session first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn list_user_bookings(
        &self,
        user_id: UserId,
        status: Option<BookingStatus>,
        include_past: bool,
        page: PageRequest,
    ) -> ServiceResult<Page<BookingDetails>> {
        let now = self.ctx.clock().now();
        let filter = BookingFilter {
            user_id: Some(user_id),
            status,
            session_starts_after: (!include_past).then_some(now),
            ..BookingFilter::default()
        };
        self.list(filter, BookingOrder::SessionStartDesc, page, "list_user_bookings")
            .await
    }

    /// Administrative listing, newest booking first.
    #[instrument(skip(self))]
    pub async fn list_all_bookings(
        &self,
        filter: BookingFilter,
        page: PageRequest,
    ) -> ServiceResult<Page<BookingDetails>> {
        self.list(filter, BookingOrder::BookedAtDesc, page, "list_all_bookings")
            .await
    }

    /// Active bookings on sessions that have not started, soonest first.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn upcoming_for_user(
        &self,
        user_id: UserId,
        limit: u64,
    ) -> ServiceResult<Vec<BookingDetails>> {
        let now = self.ctx.clock().now();
        let page = match PageRequest::new(0, limit) {
            Ok(page) => page,
            Err(err) => return observe("upcoming_for_user", Err(err.into())),
        };
        let filter = BookingFilter {
            user_id: Some(user_id),
            active_only: true,
            session_starts_after: Some(now),
            ..BookingFilter::default()
        };
        let page = self
            .list(filter, BookingOrder::SessionStartAsc, page, "upcoming_for_user")
            .await?;
        Ok(page.items)
    }

    /// Counts and rates over bookings matching `filter`; zero bookings give zero rates.
    #[instrument(skip(self))]
    pub async fn compute_stats(&self, filter: BookingStatusFilter) -> ServiceResult<BookingStats> {
        let result: ServiceResult<BookingStats> = async {
            let mut tx = self.ctx.store().begin().await?;
            let statuses = tx.booking_statuses(&filter).await?;
            tx.commit().await?;
            Ok(BookingStats::from_statuses(statuses))
        }
        .await;
        observe("compute_stats", result)
    }

    /// Stats over a booking-time window.
    pub async fn compute_stats_between(
        &self,
        booked_from: Option<DateTime<Utc>>,
        booked_to: Option<DateTime<Utc>>,
    ) -> ServiceResult<BookingStats> {
        self.compute_stats(BookingStatusFilter {
            user_id: None,
            booked_from,
            booked_to,
        })
        .await
    }

    async fn list(
        &self,
        filter: BookingFilter,
        order: BookingOrder,
        page: PageRequest,
        operation: &'static str,
    ) -> ServiceResult<Page<BookingDetails>> {
        let result: ServiceResult<Page<BookingDetails>> = async {
            let mut tx = self.ctx.store().begin().await?;
            let page = tx.list_booking_details(&filter, order, page).await?;
            tx.commit().await?;
            Ok(page)
        }
        .await;
        observe(operation, result)
    }
}
