//! # Reminders Feature
//!
//! Escalating reminders: a due reminder is delivered, then repeated on a
//! priority-specific schedule until the user answers `done`, `snooze` or
//! `skip`, or every tier goes unanswered and it is marked missed.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.2.0: Per-reminder escalation tasks, restart recovery, explicit resolution
//! - 1.1.0: Priority-based nagging and reply handling
//! - 1.0.0: Initial release

pub mod clock;
pub mod duration;
pub mod engine;
pub mod intervals;
pub mod messages;
pub mod notifier;
pub mod response;
pub mod scheduler;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use clock::{Clock, SystemClock};
pub use duration::{deadline_after, format_duration, parse_duration};
pub use engine::{EscalationEngine, EscalationOutcome, EscalationSettings};
pub use intervals::IntervalTable;
pub use messages::{MessageContext, MessageTier};
pub use notifier::{DiscordNotifier, Notifier};
pub use response::{ReplyIntent, ReplyOutcome, ResponseHandler};
pub use scheduler::ReminderScheduler;
pub use store::ReminderStore;
pub use types::{NewReminder, Reminder, ReminderPriority, ReminderStatus, Resolution};
