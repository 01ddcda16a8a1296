//! # Escalation Engine
//!
//! Drives one reminder occurrence through its tiers:
//! `pending → sent(1) → … → sent(K) → missed`, with user-driven exits to
//! `completed`, `cancelled` and `snoozed`. The engine only ever *reads* the
//! user's decision from the store; it re-fetches the reminder after every
//! suspension and before every send.
//!
//! - **Version**: 1.3.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false
//!
//! ## Changelog
//! - 1.3.0: A snooze taken while a tier is in flight stops the run
//! - 1.2.0: Resume from `sent`/`snoozed` for restart recovery and snooze expiry
//! - 1.1.0: Bounded delivery retry, undeliverable reminders are closed
//! - 1.0.0: Initial release with priority-based nagging

use chrono::{DateTime, Duration, Utc};
use log::{debug, error, info, warn};
use std::sync::Arc;

use super::clock::Clock;
use super::intervals::IntervalTable;
use super::messages::{MessageContext, MessageTier};
use super::notifier::Notifier;
use super::store::ReminderStore;
use super::types::{Reminder, ReminderPriority, ReminderStatus, Resolution};

/// Timing and retry knobs for escalation
#[derive(Debug, Clone)]
pub struct EscalationSettings {
    pub intervals: IntervalTable,
    /// Wait after the last tier before marking the reminder missed
    pub grace: Duration,
    /// Delivery attempts per message before giving up
    pub delivery_attempts: u32,
    pub delivery_backoff: std::time::Duration,
    /// Look-back window for the completion rate in the final warning
    pub stats_window: Duration,
}

impl Default for EscalationSettings {
    fn default() -> Self {
        Self {
            intervals: IntervalTable::default(),
            grace: Duration::minutes(5),
            delivery_attempts: 3,
            delivery_backoff: std::time::Duration::from_secs(2),
            stats_window: Duration::days(7),
        }
    }
}

/// How an escalation run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// Reminder was not in a state this run could act on
    Skipped,
    /// User completed or cancelled it mid-escalation
    Resolved(ReminderStatus),
    /// User snoozed it; the scheduler resumes it once the snooze runs out
    Snoozed,
    /// Every tier went unanswered and it was marked missed
    Missed,
    /// Delivery or store failure ended the run early
    Aborted,
}

enum Delivery {
    Sent(DateTime<Utc>),
    Stop(EscalationOutcome),
}

/// Per-reminder escalation state machine
#[derive(Clone)]
pub struct EscalationEngine {
    store: Arc<dyn ReminderStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    settings: Arc<EscalationSettings>,
}

impl EscalationEngine {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        settings: EscalationSettings,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            settings: Arc::new(settings),
        }
    }

    pub fn settings(&self) -> &EscalationSettings {
        &self.settings
    }

    /// Send tier 1 of a due reminder and escalate until it is resolved or missed
    pub async fn fire(&self, reminder: Reminder) -> EscalationOutcome {
        let now = self.clock.now();
        if reminder.status != ReminderStatus::Pending || reminder.reminder_time > now {
            debug!(
                "Reminder {} not fireable (status {}, due {})",
                reminder.id, reminder.status, reminder.reminder_time
            );
            return EscalationOutcome::Skipped;
        }

        match self.send_tier(&reminder, 1).await {
            Delivery::Sent(sent_at) => {
                info!(
                    "⏰ Sent reminder {} to user {}: {}",
                    reminder.id, reminder.user_id, reminder.reminder_message
                );
                self.escalate(reminder.id, reminder.priority, 1, sent_at).await
            }
            Delivery::Stop(outcome) => outcome,
        }
    }

    /// Pick up an in-flight reminder without resetting its tier
    ///
    /// A `sent` reminder continues from its last delivery; a `snoozed` one whose
    /// snooze has run out gets its next tier immediately.
    pub async fn resume(&self, reminder: Reminder) -> EscalationOutcome {
        let now = self.clock.now();
        match reminder.status {
            ReminderStatus::Sent => {
                let sent_at = reminder.last_sent_at.unwrap_or(reminder.reminder_time);
                info!(
                    "🔁 Resuming reminder {} after tier {}",
                    reminder.id, reminder.nag_count
                );
                self.escalate(reminder.id, reminder.priority, reminder.nag_count, sent_at)
                    .await
            }
            ReminderStatus::Snoozed if reminder.snooze_elapsed(now) => {
                if let Some(outcome) = self.wake(reminder.id).await {
                    return outcome;
                }

                let tier = reminder.nag_count + 1;
                info!("🔁 Snooze over for reminder {}, sending tier {}", reminder.id, tier);
                match self.send_tier(&reminder, tier).await {
                    Delivery::Sent(sent_at) => {
                        self.escalate(reminder.id, reminder.priority, tier, sent_at).await
                    }
                    Delivery::Stop(outcome) => outcome,
                }
            }
            _ => EscalationOutcome::Skipped,
        }
    }

    /// Sleep/wake loop after `tier` was delivered at `sent_at`
    async fn escalate(
        &self,
        id: i64,
        priority: ReminderPriority,
        mut tier: u32,
        mut sent_at: DateTime<Utc>,
    ) -> EscalationOutcome {
        let tier_count = self.settings.intervals.tier_count(priority);
        loop {
            let wait = self
                .settings
                .intervals
                .wait_after_send(priority, tier, self.settings.grace);
            self.clock.sleep_until(sent_at + wait).await;

            // The user may have answered while we slept
            let Some(current) = self.refresh(id).await else {
                return EscalationOutcome::Aborted;
            };
            let now = self.clock.now();
            let snooze_over = match current.status {
                ReminderStatus::Completed | ReminderStatus::Cancelled => {
                    info!("✅ Reminder {} resolved as {}, stopping", id, current.status);
                    return EscalationOutcome::Resolved(current.status);
                }
                ReminderStatus::Snoozed if !current.snooze_elapsed(now) => {
                    info!("😴 Reminder {} snoozed, pausing escalation", id);
                    return EscalationOutcome::Snoozed;
                }
                ReminderStatus::Snoozed => true,
                ReminderStatus::Pending => {
                    warn!("Reminder {} went back to pending mid-escalation", id);
                    return EscalationOutcome::Aborted;
                }
                ReminderStatus::Sent => false,
            };

            if tier >= tier_count && !snooze_over {
                return self.mark_missed(&current).await;
            }
            if snooze_over {
                if let Some(outcome) = self.wake(id).await {
                    return outcome;
                }
            }

            tier += 1;
            match self.send_tier(&current, tier).await {
                Delivery::Sent(at) => {
                    info!("⏰ Nag #{} sent for reminder {}", tier, id);
                    sent_at = at;
                }
                Delivery::Stop(outcome) => return outcome,
            }
        }
    }

    async fn send_tier(&self, reminder: &Reminder, tier: u32) -> Delivery {
        let tier_count = self.settings.intervals.tier_count(reminder.priority);
        let text = self
            .render(reminder, MessageTier::for_tier(tier, tier_count))
            .await;

        if !self.deliver(reminder, &text).await {
            self.close_undeliverable(reminder).await;
            return Delivery::Stop(EscalationOutcome::Aborted);
        }

        let sent_at = self.clock.now();
        match self.store.record_delivery(reminder.id, tier, sent_at).await {
            Ok(true) => Delivery::Sent(sent_at),
            Ok(false) => {
                // Answered between our re-check and the send
                match self.refresh(reminder.id).await {
                    Some(r) if r.status.is_terminal() => {
                        debug!("Reminder {} closed while tier {} was in flight", reminder.id, tier);
                        Delivery::Stop(EscalationOutcome::Resolved(r.status))
                    }
                    Some(r) if r.status == ReminderStatus::Snoozed => {
                        info!(
                            "😴 Reminder {} snoozed while tier {} was in flight, pausing escalation",
                            reminder.id, tier
                        );
                        Delivery::Stop(EscalationOutcome::Snoozed)
                    }
                    _ => Delivery::Stop(EscalationOutcome::Aborted),
                }
            }
            Err(e) => {
                error!(
                    "❌ Failed to record tier {} for reminder {}: {e:#}",
                    tier, reminder.id
                );
                Delivery::Stop(EscalationOutcome::Aborted)
            }
        }
    }

    /// Move an expired snooze back to `sent`; `Some` carries the outcome when that fails
    async fn wake(&self, id: i64) -> Option<EscalationOutcome> {
        match self.store.update_status(id, ReminderStatus::Sent, None).await {
            Ok(true) => None,
            Ok(false) => Some(EscalationOutcome::Skipped),
            Err(e) => {
                error!("❌ Failed to wake snoozed reminder {}: {e:#}", id);
                Some(EscalationOutcome::Aborted)
            }
        }
    }

    /// Flip to missed first so a racing "done" wins, then tell the user
    async fn mark_missed(&self, reminder: &Reminder) -> EscalationOutcome {
        let now = self.clock.now();
        match self.store.resolve(reminder.id, Resolution::Missed, now).await {
            Ok(true) => {}
            Ok(false) => {
                return match self.refresh(reminder.id).await {
                    Some(r) if r.status.is_terminal() => EscalationOutcome::Resolved(r.status),
                    _ => EscalationOutcome::Aborted,
                };
            }
            Err(e) => {
                error!("❌ Failed to mark reminder {} missed: {e:#}", reminder.id);
                return EscalationOutcome::Aborted;
            }
        }

        let text = self.render(reminder, MessageTier::Missed).await;
        if !self.deliver(reminder, &text).await {
            warn!("Missed notice for reminder {} could not be delivered", reminder.id);
        }

        info!("⏰ Reminder {} marked as missed", reminder.id);
        EscalationOutcome::Missed
    }

    async fn close_undeliverable(&self, reminder: &Reminder) {
        let now = self.clock.now();
        match self
            .store
            .resolve(reminder.id, Resolution::Undeliverable, now)
            .await
        {
            Ok(_) => error!(
                "❌ Giving up on reminder {}: recipient {} unreachable",
                reminder.id, reminder.recipient
            ),
            Err(e) => error!(
                "❌ Failed to close undeliverable reminder {}: {e:#}",
                reminder.id
            ),
        }
    }

    /// Deliver with a bounded number of attempts
    async fn deliver(&self, reminder: &Reminder, text: &str) -> bool {
        let attempts = self.settings.delivery_attempts.max(1);
        for attempt in 1..=attempts {
            match self.notifier.deliver(&reminder.recipient, text).await {
                Ok(()) => return true,
                Err(e) => {
                    warn!(
                        "⚠️ Delivery attempt {}/{} for reminder {} failed: {e:#}",
                        attempt, attempts, reminder.id
                    );
                    if attempt < attempts {
                        self.clock.sleep(self.settings.delivery_backoff).await;
                    }
                }
            }
        }
        false
    }

    async fn render(&self, reminder: &Reminder, tier: MessageTier) -> String {
        let now = self.clock.now();
        let completion_rate = if tier.needs_completion_rate() {
            let since = now - self.settings.stats_window;
            match self.store.completion_rate(&reminder.user_id, since).await {
                Ok(rate) => Some(rate),
                Err(e) => {
                    warn!(
                        "Could not load completion rate for user {}: {e:#}",
                        reminder.user_id
                    );
                    None
                }
            }
        } else {
            None
        };

        tier.render(&MessageContext {
            task_name: &reminder.reminder_message,
            elapsed_minutes: (now - reminder.reminder_time).num_minutes().max(0),
            priority: reminder.priority,
            completion_rate,
        })
    }

    async fn refresh(&self, id: i64) -> Option<Reminder> {
        match self.store.get(id).await {
            Ok(Some(reminder)) => Some(reminder),
            Ok(None) => {
                warn!("Reminder {} disappeared mid-escalation", id);
                None
            }
            Err(e) => {
                error!("❌ Failed to re-read reminder {}: {e:#}", id);
                None
            }
        }
    }
}
