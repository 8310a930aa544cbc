//! Entity trait: identity + continuity across state changes.

/// Entity marker + minimal interface.
///
/// Users, classes, sessions and bookings are entities: they keep their
/// identity while their status and attributes change. Relationships between
/// them are plain foreign-key ids, never back-pointers.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}
