//! Application services over the entity store.
//!
//! Every public operation reads the clock once, runs in exactly one store
//! transaction, commits, and only then records an audit event. Domain
//! refusals are logged at `warn`, store failures at `error`; neither is
//! retried here.

pub mod accounts;
pub mod booking_engine;
pub mod catalog;
pub mod scheduler;
pub mod statistics;

use std::sync::Arc;

use classbook_core::{Clock, SystemClock};

use crate::audit::{AuditEvent, AuditSink, TracingAuditSink};
use crate::error::{ServiceError, ServiceResult};
use crate::store::{EntityStore, StoreError};

pub use accounts::AccountService;
pub use booking_engine::BookingEngine;
pub use catalog::ClassCatalog;
pub use scheduler::SessionScheduler;
pub use statistics::StatisticsService;

/// Collaborators shared by every service.
#[derive(Clone)]
pub struct ServiceContext {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditSink>,
}

impl ServiceContext {
    pub fn new(
        store: Arc<dyn EntityStore>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditSink>,
    ) -> Self {
        Self { store, clock, audit }
    }

    /// Wall clock and tracing audit sink.
    pub fn with_store(store: Arc<dyn EntityStore>) -> Self {
        Self::new(store, Arc::new(SystemClock), Arc::new(TracingAuditSink))
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub(crate) fn record(&self, event: AuditEvent) {
        self.audit.record(event);
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext").finish_non_exhaustive()
    }
}

/// Log a failed operation at the level its kind deserves, then pass it on.
pub(crate) fn observe<T>(operation: &'static str, result: ServiceResult<T>) -> ServiceResult<T> {
    match &result {
        Ok(_) => {}
        Err(ServiceError::Domain(err)) => {
            tracing::warn!(operation, code = err.code(), error = %err, "operation refused");
        }
        Err(ServiceError::Store(err)) => {
            tracing::error!(operation, error = %err, "store failure");
        }
        Err(ServiceError::Internal(msg)) => {
            tracing::error!(operation, error = %msg, "internal failure");
        }
    }
    result
}

/// Translate a tripped uniqueness backstop into the domain refusal it stands for.
pub(crate) fn unique_as(
    err: StoreError,
    refusal: impl FnOnce() -> classbook_core::DomainError,
) -> ServiceError {
    match err {
        StoreError::UniqueViolation(_) => ServiceError::Domain(refusal()),
        other => ServiceError::Store(other),
    }
}
