//! Persistence contract for reminder state
//!
//! The store is the single source of truth for reminder status. Every
//! mutation is a single-row atomic update keyed by id; implementations must
//! never lower `nag_count` and must refuse to touch terminal rows.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::types::{NewReminder, Reminder, ReminderStatus, Resolution};

#[async_trait]
pub trait ReminderStore: Send + Sync {
    async fn create(&self, reminder: NewReminder) -> Result<Reminder>;

    async fn get(&self, id: i64) -> Result<Option<Reminder>>;

    /// Pending reminders whose `reminder_time` is at or before `now`
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>>;

    /// Reminders mid-escalation: `sent`, or `snoozed` with an elapsed `snoozed_until`
    async fn find_in_flight(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>>;

    /// Move a non-terminal reminder to `sent`, `completed` or `cancelled`,
    /// raising `nag_count` if given. `pending` and `snoozed` are errors:
    /// nothing returns to pending, and snoozing needs a deadline (see `snooze`).
    async fn update_status(
        &self,
        id: i64,
        status: ReminderStatus,
        nag_count: Option<u32>,
    ) -> Result<bool>;

    /// Record a successful tier delivery: status `sent`, `nag_count`, `last_sent_at`.
    /// Only `pending` and `sent` rows accept it; a snooze taken mid-send wins.
    async fn record_delivery(&self, id: i64, nag_count: u32, at: DateTime<Utc>) -> Result<bool>;

    /// Pause an in-flight reminder until `until`
    async fn snooze(&self, id: i64, until: DateTime<Utc>) -> Result<bool>;

    /// Move a non-terminal reminder to its terminal status
    async fn resolve(&self, id: i64, resolution: Resolution, at: DateTime<Utc>) -> Result<bool>;

    /// Most recent non-terminal reminder that has already gone off for `user_id`
    async fn latest_open_for_user(&self, user_id: &str) -> Result<Option<Reminder>>;

    /// Percentage of the user's reminders resolved since `since` that were completed
    async fn completion_rate(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32>;
}
