//! Domain model for schedulable records.
//!
//! # Responsibility
//! - Define alarms, calendar events and the time specifications they fire on.
//! - Keep scheduler bookkeeping types shared between storage and scheduling.
//!
//! # Invariants
//! - Every schedulable record is identified by a stable UUID.
//! - Field updates are explicit tagged unions, never free-form maps.

pub mod alarm;
pub mod entity;
pub mod event;
pub mod time_spec;
