//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects carry no identity and are compared by their attribute
/// values (a `TimeRange`, a `PageRequest`). They are immutable: to "change"
/// one, build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
