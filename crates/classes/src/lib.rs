//! Class catalog domain module.
//!
//! A class is a bookable offering; its sessions inherit `max_capacity` at read
//! time. Pure validation only (no IO, no storage).

pub mod class;

pub use class::{Class, ClassCategory, ClassPatch, ClassStatus, NewClass};
