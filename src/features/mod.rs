//! # Features Layer
//!
//! Bot features built on the core layer. Reminders is the only one so far.

pub mod reminders;

pub use reminders::{EscalationEngine, ReminderScheduler, ResponseHandler};
