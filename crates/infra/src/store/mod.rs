//! Entity store boundary.
//!
//! Transactional persistence for users, classes, sessions and bookings. The
//! services never hold state between calls; everything shared lives behind
//! this trait.

pub mod in_memory;
pub mod postgres;
pub mod query;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use query::{
    BookableSession, BookingFilter, BookingOrder, BookingStatusFilter, ClassFilter, SessionDetails,
    SessionFilter, UserFilter,
};
pub use r#trait::{EntityStore, StoreError, StoreResult, StoreTx};
