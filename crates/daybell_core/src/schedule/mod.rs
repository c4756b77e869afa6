//! Occurrence scheduling core.
//!
//! # Responsibility
//! - Compute next occurrences and reminder fire-times.
//! - Arm and disarm one-shot notifications through a dispatcher.
//!
//! # Invariants
//! - Nothing here runs on a timer; wake-up at fire-time is the dispatcher's
//!   job.

pub mod dispatcher;
pub mod occurrence;
pub mod orchestrator;
pub mod reminder;
