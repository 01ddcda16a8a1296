//! # Escalation Interval Table
//!
//! Maps each priority to its nag schedule. Offsets are minutes from the first
//! send, so `[0, 5, 10]` sends at minute 0, 5 and 10. Loaded from YAML when a
//! file is present, otherwise the built-in schedule is used.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use log::info;
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::types::{Reminder, ReminderPriority, ReminderStatus};

/// Per-priority minute offsets, first entry always 0
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct IntervalTable {
    pub optional: Vec<u32>,
    pub normal: Vec<u32>,
    pub important: Vec<u32>,
    pub critical: Vec<u32>,
}

impl Default for IntervalTable {
    fn default() -> Self {
        Self {
            optional: vec![0],
            normal: vec![0, 30],
            important: vec![0, 15, 30],
            critical: vec![0, 5, 10, 15, 20],
        }
    }
}

impl IntervalTable {
    /// Load the table from a YAML file and validate it
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read interval table {}", path.display()))?;
        let table: IntervalTable = serde_yaml::from_str(&contents)
            .with_context(|| format!("Invalid interval table {}", path.display()))?;
        table.validate()?;
        Ok(table)
    }

    /// Load from `path` if it exists, otherwise fall back to the defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            let table = Self::load(path)?;
            info!("📄 Loaded reminder intervals from {}", path.display());
            Ok(table)
        } else {
            info!(
                "📄 No interval table at {} - using default reminder intervals",
                path.display()
            );
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        for priority in ReminderPriority::ALL {
            let offsets = self.offsets(priority);
            if offsets.is_empty() {
                return Err(anyhow::anyhow!(
                    "Interval table for '{}' has no entries",
                    priority
                ));
            }
            if offsets[0] != 0 {
                return Err(anyhow::anyhow!(
                    "Interval table for '{}' must start at 0, got {}",
                    priority,
                    offsets[0]
                ));
            }
            if offsets.windows(2).any(|pair| pair[1] < pair[0]) {
                return Err(anyhow::anyhow!(
                    "Interval table for '{}' must be non-decreasing: {:?}",
                    priority,
                    offsets
                ));
            }
        }
        Ok(())
    }

    /// Same table with every priority cut down to its first send
    pub fn single_shot(&self) -> Self {
        Self {
            optional: vec![0],
            normal: vec![0],
            important: vec![0],
            critical: vec![0],
        }
    }

    pub fn offsets(&self, priority: ReminderPriority) -> &[u32] {
        match priority {
            ReminderPriority::Optional => &self.optional,
            ReminderPriority::Normal => &self.normal,
            ReminderPriority::Important => &self.important,
            ReminderPriority::Critical => &self.critical,
        }
    }

    /// Number of tiers sent before the grace period
    pub fn tier_count(&self, priority: ReminderPriority) -> u32 {
        self.offsets(priority).len() as u32
    }

    /// Wait between sending `tier - 1` and `tier`, or `None` past the table
    pub fn wait_before_tier(&self, priority: ReminderPriority, tier: u32) -> Option<Duration> {
        if tier < 2 {
            return None;
        }
        let offsets = self.offsets(priority);
        let idx = tier as usize - 1;
        let current = *offsets.get(idx)?;
        let previous = offsets[idx - 1];
        Some(Duration::minutes(i64::from(current.saturating_sub(previous))))
    }

    /// Wait after the most recent send before the next escalation step
    ///
    /// Once every tier has gone out, the next step is the missed notice after `grace`.
    pub fn wait_after_send(&self, priority: ReminderPriority, nag_count: u32, grace: Duration) -> Duration {
        self.wait_before_tier(priority, nag_count + 1).unwrap_or(grace)
    }

    /// When the engine should next act on an in-flight reminder
    ///
    /// Only `sent` and `snoozed` reminders have a next action.
    pub fn next_action_at(&self, reminder: &Reminder, grace: Duration) -> Option<DateTime<Utc>> {
        match reminder.status {
            ReminderStatus::Sent => {
                let base = reminder.last_sent_at.unwrap_or(reminder.reminder_time);
                Some(base + self.wait_after_send(reminder.priority, reminder.nag_count, grace))
            }
            ReminderStatus::Snoozed => Some(reminder.snoozed_until.unwrap_or(reminder.reminder_time)),
            _ => None,
        }
    }
}
