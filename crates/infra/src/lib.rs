//! Infrastructure layer: entity store, configuration, audit trail and the
//! application services built on them.

pub mod audit;
pub mod config;
pub mod error;
pub mod services;
pub mod store;

pub use audit::{AuditAction, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use config::{AppConfig, BootstrapAdmin};
pub use error::{ServiceError, ServiceResult};
pub use services::{
    AccountService, BookingEngine, ClassCatalog, ServiceContext, SessionScheduler,
    StatisticsService,
};
