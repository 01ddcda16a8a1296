//! # Reminder Records
//!
//! Reminder entity, its priority and status enums, and the resolution marker
//! that separates missed reminders from user-initiated cancellations.
//!
//! - **Version**: 1.1.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.1.0: Added `Resolution` and `last_sent_at` for restart recovery
//! - 1.0.0: Initial release

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How persistently a reminder nags before giving up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderPriority {
    /// One reminder only
    Optional,
    /// Remind twice
    Normal,
    /// Three reminders
    Important,
    /// Nag every few minutes until confirmed
    Critical,
}

impl ReminderPriority {
    pub const ALL: [ReminderPriority; 4] = [
        ReminderPriority::Optional,
        ReminderPriority::Normal,
        ReminderPriority::Important,
        ReminderPriority::Critical,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderPriority::Optional => "optional",
            ReminderPriority::Normal => "normal",
            ReminderPriority::Important => "important",
            ReminderPriority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for ReminderPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ReminderPriority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "optional" => Ok(ReminderPriority::Optional),
            "normal" => Ok(ReminderPriority::Normal),
            "important" => Ok(ReminderPriority::Important),
            "critical" => Ok(ReminderPriority::Critical),
            _ => Err(anyhow::anyhow!("Invalid reminder priority: {}", s)),
        }
    }
}

/// Current state of a reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    /// Waiting for its fire time
    Pending,
    /// At least one tier delivered, escalation in progress
    Sent,
    /// Paused by the user until `snoozed_until`
    Snoozed,
    /// User confirmed it was done
    Completed,
    /// Closed without completion (user skip, missed or undeliverable)
    Cancelled,
}

impl ReminderStatus {
    /// Terminal statuses never change again
    pub fn is_terminal(&self) -> bool {
        matches!(self, ReminderStatus::Completed | ReminderStatus::Cancelled)
    }
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReminderStatus::Pending => write!(f, "pending"),
            ReminderStatus::Sent => write!(f, "sent"),
            ReminderStatus::Snoozed => write!(f, "snoozed"),
            ReminderStatus::Completed => write!(f, "completed"),
            ReminderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ReminderStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(ReminderStatus::Pending),
            "sent" => Ok(ReminderStatus::Sent),
            "snoozed" => Ok(ReminderStatus::Snoozed),
            "completed" => Ok(ReminderStatus::Completed),
            "cancelled" => Ok(ReminderStatus::Cancelled),
            _ => Err(anyhow::anyhow!("Invalid reminder status: {}", s)),
        }
    }
}

/// Why a reminder reached a terminal status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// User replied done/completed/finished
    Completed,
    /// User replied skip/cancel/nevermind
    UserCancelled,
    /// Every tier went unanswered
    Missed,
    /// Delivery kept failing, escalation gave up
    Undeliverable,
}

impl Resolution {
    /// The status a reminder carries once resolved this way
    pub fn status(&self) -> ReminderStatus {
        match self {
            Resolution::Completed => ReminderStatus::Completed,
            Resolution::UserCancelled | Resolution::Missed | Resolution::Undeliverable => {
                ReminderStatus::Cancelled
            }
        }
    }
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Completed => write!(f, "completed"),
            Resolution::UserCancelled => write!(f, "user_cancelled"),
            Resolution::Missed => write!(f, "missed"),
            Resolution::Undeliverable => write!(f, "undeliverable"),
        }
    }
}

impl std::str::FromStr for Resolution {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(Resolution::Completed),
            "user_cancelled" => Ok(Resolution::UserCancelled),
            "missed" => Ok(Resolution::Missed),
            "undeliverable" => Ok(Resolution::Undeliverable),
            _ => Err(anyhow::anyhow!("Invalid reminder resolution: {}", s)),
        }
    }
}

/// A scheduled reminder record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reminder {
    /// Unique reminder identifier
    pub id: i64,

    /// Owner of the reminder
    pub user_id: String,

    /// Delivery handle for the owner (a DM channel id)
    pub recipient: String,

    /// Associated task, if the reminder is not standalone
    pub task_id: Option<i64>,

    /// When the reminder is due
    pub reminder_time: DateTime<Utc>,

    pub priority: ReminderPriority,

    pub status: ReminderStatus,

    /// Escalation messages delivered for this occurrence
    pub nag_count: u32,

    /// While set and in the future, nothing is sent
    pub snoozed_until: Option<DateTime<Utc>>,

    /// When the most recent tier was delivered
    pub last_sent_at: Option<DateTime<Utc>>,

    /// Text shown to the user
    pub reminder_message: String,

    /// Set once the reminder reaches a terminal status
    pub resolution: Option<Resolution>,

    pub created_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,
}

impl Reminder {
    /// Whether the snooze has run out at `now`
    pub fn snooze_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == ReminderStatus::Snoozed && self.snoozed_until.is_none_or(|until| until <= now)
    }
}

/// Input for creating a reminder
#[derive(Debug, Clone)]
pub struct NewReminder {
    pub user_id: String,
    pub recipient: String,
    pub reminder_time: DateTime<Utc>,
    pub reminder_message: String,
    pub priority: ReminderPriority,
    pub task_id: Option<i64>,
}
