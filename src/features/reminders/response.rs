//! # Reminder Replies
//!
//! Turns a user's reply to a reminder into a state change. This is the only
//! way a reminder leaves escalation early; the engine just reads the result.
//!
//! Vocabulary (case-insensitive): `done`, `completed`, `finished`, `skip`,
//! `cancel`, `nevermind`, `snooze <N>`, `snooze <N>m`, `snooze <N>h`.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Snoozing can be switched off; out-of-range snoozes ask again
//! - 1.1.0: Snooze now sets `snoozed_until`; malformed durations ask again
//! - 1.0.0: Initial release

use chrono::Duration;
use log::{error, info};
use regex::Regex;
use std::sync::{Arc, OnceLock};

use super::clock::Clock;
use super::duration::{deadline_after, format_duration};
use super::store::ReminderStore;
use super::types::{ReminderStatus, Resolution};

const CLARIFY: &str = "Not sure what you mean. Reply 'done', 'snooze X', or 'skip'";
const ASK_DURATION: &str = "How long? Try 'snooze 15' or 'snooze 1h'";
const RETRY: &str = "Couldn't process that. Try 'done' or 'snooze 15'";
const SNOOZE_DISABLED: &str = "Snoozing is turned off. Reply 'done' or 'skip'";

static SNOOZE_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn snooze_pattern() -> Option<&'static Regex> {
    SNOOZE_PATTERN
        .get_or_init(|| Regex::new(r"^snooze\s+(\d+)([mh]?)$").ok())
        .as_ref()
}

/// What the user meant by their reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyIntent {
    Done,
    Snooze(Duration),
    Skip,
    /// Started with "snooze" but the duration was missing or malformed
    SnoozeUnclear,
    Unrecognized,
}

impl ReplyIntent {
    pub fn classify(reply: &str) -> Self {
        let reply = reply.trim().to_lowercase();
        match reply.as_str() {
            "done" | "completed" | "finished" => return ReplyIntent::Done,
            "skip" | "cancel" | "nevermind" => return ReplyIntent::Skip,
            _ => {}
        }

        if reply != "snooze" && !reply.starts_with("snooze ") {
            return ReplyIntent::Unrecognized;
        }

        let Some(caps) = snooze_pattern().and_then(|re| re.captures(&reply)) else {
            return ReplyIntent::SnoozeUnclear;
        };
        let Ok(amount) = caps[1].parse::<i64>() else {
            return ReplyIntent::SnoozeUnclear;
        };
        let duration = match &caps[2] {
            "h" => Duration::try_hours(amount),
            _ => Duration::try_minutes(amount),
        };
        match duration {
            Some(d) if amount > 0 => ReplyIntent::Snooze(d),
            _ => ReplyIntent::SnoozeUnclear,
        }
    }
}

/// Text to send back, plus the new status when the reply changed state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyOutcome {
    pub message: String,
    pub status: Option<ReminderStatus>,
}

impl ReplyOutcome {
    fn unchanged(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    fn changed(message: impl Into<String>, status: ReminderStatus) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

/// Applies user replies to reminders
#[derive(Clone)]
pub struct ResponseHandler {
    store: Arc<dyn ReminderStore>,
    clock: Arc<dyn Clock>,
    snooze_enabled: bool,
}

impl ResponseHandler {
    pub fn new(store: Arc<dyn ReminderStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            snooze_enabled: true,
        }
    }

    pub fn with_snooze(mut self, enabled: bool) -> Self {
        self.snooze_enabled = enabled;
        self
    }

    /// Handle a reply to reminder `reminder_id`; never fails towards the user
    pub async fn handle(&self, reminder_id: i64, reply: &str) -> ReplyOutcome {
        let intent = ReplyIntent::classify(reply);
        match intent {
            ReplyIntent::Unrecognized => return ReplyOutcome::unchanged(CLARIFY),
            ReplyIntent::Snooze(_) | ReplyIntent::SnoozeUnclear if !self.snooze_enabled => {
                return ReplyOutcome::unchanged(SNOOZE_DISABLED)
            }
            ReplyIntent::SnoozeUnclear => return ReplyOutcome::unchanged(ASK_DURATION),
            _ => {}
        }

        match self.apply(reminder_id, intent).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("❌ Error handling reply to reminder {reminder_id}: {e:#}");
                ReplyOutcome::unchanged(RETRY)
            }
        }
    }

    async fn apply(&self, reminder_id: i64, intent: ReplyIntent) -> anyhow::Result<ReplyOutcome> {
        let Some(reminder) = self.store.get(reminder_id).await? else {
            return Ok(ReplyOutcome::unchanged("I couldn't find that reminder."));
        };
        if reminder.status.is_terminal() {
            return Ok(ReplyOutcome::unchanged("That reminder is already closed."));
        }

        let now = self.clock.now();
        let outcome = match intent {
            ReplyIntent::Done => {
                if !self.store.resolve(reminder_id, Resolution::Completed, now).await? {
                    return Ok(ReplyOutcome::unchanged("That reminder is already closed."));
                }
                ReplyOutcome::changed("✅ Great! Marked as complete.", ReminderStatus::Completed)
            }
            ReplyIntent::Skip => {
                if !self
                    .store
                    .resolve(reminder_id, Resolution::UserCancelled, now)
                    .await?
                {
                    return Ok(ReplyOutcome::unchanged("That reminder is already closed."));
                }
                ReplyOutcome::changed("Reminder cancelled.", ReminderStatus::Cancelled)
            }
            ReplyIntent::Snooze(duration) => {
                if reminder.status == ReminderStatus::Pending {
                    return Ok(ReplyOutcome::unchanged(
                        "That reminder hasn't gone off yet, nothing to snooze.",
                    ));
                }
                let Some(until) = deadline_after(now, duration) else {
                    return Ok(ReplyOutcome::unchanged(ASK_DURATION));
                };
                if !self.store.snooze(reminder_id, until).await? {
                    return Ok(ReplyOutcome::unchanged("That reminder is already closed."));
                }
                ReplyOutcome::changed(
                    format!(
                        "⏰ Snoozed for {}. I'll remind you then.",
                        format_duration(duration)
                    ),
                    ReminderStatus::Snoozed,
                )
            }
            ReplyIntent::SnoozeUnclear | ReplyIntent::Unrecognized => {
                return Ok(ReplyOutcome::unchanged(CLARIFY))
            }
        };

        info!(
            "💬 Reminder {} -> {} by user {}",
            reminder_id,
            outcome.status.map(|s| s.to_string()).unwrap_or_default(),
            reminder.user_id
        );
        Ok(outcome)
    }
}
