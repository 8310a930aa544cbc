//! `classbook-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod page;
pub mod time;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{BookingId, ClassId, SessionId, UserId};
pub use page::{Page, PageRequest};
pub use time::{Clock, ManualClock, SystemClock, TimeRange};
pub use value_object::ValueObject;
