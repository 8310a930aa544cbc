//! Session scheduling domain module.
//!
//! Owns the `Session` model, its status transitions and the pure conflict
//! rules the scheduler service evaluates inside a store transaction.

pub mod conflict;
pub mod session;

pub use conflict::{SessionSlot, conflicts_with, find_conflict};
pub use session::{NewSession, Session, SessionPatch, SessionStatus};
