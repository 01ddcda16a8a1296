//! # Reminder Scheduler
//!
//! Background loop that fires due reminders and picks up escalations left
//! in flight. Each escalating reminder runs in its own tokio task; the
//! scheduler owns the table of those tasks so one reminder never has two
//! loops.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//! - **Toggleable**: true
//!
//! ## Changelog
//! - 1.2.0: Restart recovery and snooze expiry through in-flight reconciliation
//! - 1.1.0: Active loops tracked per scheduler instead of a global set
//! - 1.0.0: Initial release

use anyhow::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use log::{debug, error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::clock::Clock;
use super::engine::{EscalationEngine, EscalationOutcome};
use super::store::ReminderStore;
use super::types::Reminder;

#[derive(Debug, Clone, Copy)]
enum Start {
    Fire,
    Resume,
}

pub struct ReminderScheduler {
    store: Arc<dyn ReminderStore>,
    engine: EscalationEngine,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    /// Reminder id -> its escalation task
    active: DashMap<i64, JoinHandle<EscalationOutcome>>,
    shutdown: watch::Sender<bool>,
}

impl ReminderScheduler {
    pub fn new(
        store: Arc<dyn ReminderStore>,
        engine: EscalationEngine,
        clock: Arc<dyn Clock>,
        poll_interval: Duration,
    ) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store,
            engine,
            clock,
            poll_interval,
            active: DashMap::new(),
            shutdown,
        }
    }

    /// Poll until `stop` is called. Escalation tasks outlive the loop.
    pub async fn run(self: Arc<Self>) {
        info!(
            "⏰ Reminder scheduler started (polling every {}s)",
            self.poll_interval.as_secs()
        );
        let mut stop_rx = self.shutdown.subscribe();

        loop {
            if *stop_rx.borrow() {
                break;
            }
            if let Err(e) = self.tick().await {
                error!("❌ Reminder tick failed: {e:#}");
            }
            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {},
                _ = stop_rx.changed() => {},
            }
        }

        info!(
            "⏰ Reminder scheduler stopped ({} escalations still running)",
            self.active_count()
        );
    }

    /// One scheduling pass: reap, fire due reminders, resume stalled ones
    pub async fn tick(&self) -> Result<()> {
        self.reap();
        let now = self.clock.now();

        let due = self.store.find_due(now).await?;
        if !due.is_empty() {
            debug!("Found {} due reminders", due.len());
        }
        for reminder in due {
            self.dispatch(reminder, Start::Fire);
        }

        let grace = self.engine.settings().grace;
        for reminder in self.store.find_in_flight(now).await? {
            if self.is_active(reminder.id) {
                continue;
            }
            let ready = self
                .engine
                .settings()
                .intervals
                .next_action_at(&reminder, grace)
                .is_some_and(|at| at <= now);
            if ready {
                self.dispatch(reminder, Start::Resume);
            }
        }

        Ok(())
    }

    /// Spawn an escalation task unless one is already running for this id
    fn dispatch(&self, reminder: Reminder, start: Start) -> bool {
        let id = reminder.id;
        match self.active.entry(id) {
            Entry::Occupied(mut slot) => {
                if !slot.get().is_finished() {
                    return false;
                }
                slot.insert(self.spawn(reminder, start));
            }
            Entry::Vacant(slot) => {
                slot.insert(self.spawn(reminder, start));
            }
        }
        debug!("Dispatched reminder {id} ({start:?})");
        true
    }

    fn spawn(&self, reminder: Reminder, start: Start) -> JoinHandle<EscalationOutcome> {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            let id = reminder.id;
            let outcome = match start {
                Start::Fire => engine.fire(reminder).await,
                Start::Resume => engine.resume(reminder).await,
            };
            debug!("Escalation for reminder {id} ended: {outcome:?}");
            outcome
        })
    }

    fn reap(&self) {
        self.active.retain(|_, handle| !handle.is_finished());
    }

    /// Stop polling after the current tick
    pub fn stop(&self) {
        self.shutdown.send_replace(true);
    }

    /// Drop ownership of a reminder's loop, aborting it if still running
    pub fn release(&self, id: i64) {
        if let Some((_, handle)) = self.active.remove(&id) {
            handle.abort();
            debug!("Released escalation for reminder {id}");
        }
    }

    pub fn active_count(&self) -> usize {
        self.active.iter().filter(|h| !h.is_finished()).count()
    }

    pub fn is_active(&self, id: i64) -> bool {
        self.active.get(&id).is_some_and(|h| !h.is_finished())
    }

    /// Wait until every owned escalation task has finished
    #[cfg(test)]
    pub(crate) async fn wait_idle(&self) {
        while self.active_count() > 0 {
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }
}
