// Core layer - shared types and configuration
pub mod core;

// Features layer - all feature modules
pub mod features;

// Infrastructure
pub mod database;

// Re-export core config for convenience
pub use core::Config;

pub use features::reminders::{
    EscalationEngine, ReminderScheduler, ReminderStore, ResponseHandler,
};
