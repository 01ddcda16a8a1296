//! Test doubles: in-memory store, recording notifier, paused-time clock

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

use crate::database::Database;

use super::clock::Clock;
use super::engine::{EscalationEngine, EscalationSettings};
use super::notifier::Notifier;
use super::response::ResponseHandler;
use super::scheduler::ReminderScheduler;
use super::store::ReminderStore;
use super::types::{NewReminder, Reminder, ReminderPriority, ReminderStatus, Resolution};

/// `ReminderStore` over a `HashMap`, mirroring the SQLite update guards
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<i64, Reminder>>,
    next_id: AtomicI64,
    failing: AtomicBool,
}

impl MemoryStore {
    /// Overwrite a row as-is
    pub fn insert(&self, reminder: Reminder) {
        self.rows.lock().unwrap().insert(reminder.id, reminder);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        Ok(())
    }

    /// Apply `f` to an open row, returning whether it was open
    fn update_open(&self, id: i64, f: impl FnOnce(&mut Reminder)) -> Result<bool> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(r) if !r.status.is_terminal() => {
                f(r);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ReminderStore for MemoryStore {
    async fn create(&self, new: NewReminder) -> Result<Reminder> {
        self.check()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let reminder = Reminder {
            id,
            user_id: new.user_id,
            recipient: new.recipient,
            task_id: new.task_id,
            reminder_time: new.reminder_time,
            priority: new.priority,
            status: ReminderStatus::Pending,
            nag_count: 0,
            snoozed_until: None,
            last_sent_at: None,
            reminder_message: new.reminder_message,
            resolution: None,
            created_at: Utc::now(),
            completed_at: None,
        };
        self.insert(reminder.clone());
        Ok(reminder)
    }

    async fn get(&self, id: i64) -> Result<Option<Reminder>> {
        self.check()?;
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        self.check()?;
        let mut due: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == ReminderStatus::Pending && r.reminder_time <= now)
            .cloned()
            .collect();
        due.sort_by_key(|r| (r.reminder_time, r.id));
        Ok(due)
    }

    async fn find_in_flight(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        self.check()?;
        let mut found: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == ReminderStatus::Sent || r.snooze_elapsed(now))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.id);
        Ok(found)
    }

    async fn update_status(
        &self,
        id: i64,
        status: ReminderStatus,
        nag_count: Option<u32>,
    ) -> Result<bool> {
        match status {
            ReminderStatus::Completed => {
                return self.resolve(id, Resolution::Completed, Utc::now()).await
            }
            ReminderStatus::Cancelled => {
                return self.resolve(id, Resolution::UserCancelled, Utc::now()).await
            }
            ReminderStatus::Pending | ReminderStatus::Snoozed => {
                anyhow::bail!("Reminder {id} cannot be moved to {status} through update_status")
            }
            ReminderStatus::Sent => {}
        }
        self.update_open(id, |r| {
            r.status = ReminderStatus::Sent;
            r.snoozed_until = None;
            if let Some(n) = nag_count {
                r.nag_count = r.nag_count.max(n);
            }
        })
    }

    async fn record_delivery(&self, id: i64, nag_count: u32, at: DateTime<Utc>) -> Result<bool> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(r) if matches!(r.status, ReminderStatus::Pending | ReminderStatus::Sent) => {
                r.status = ReminderStatus::Sent;
                r.nag_count = r.nag_count.max(nag_count);
                r.last_sent_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn snooze(&self, id: i64, until: DateTime<Utc>) -> Result<bool> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        match rows.get_mut(&id) {
            Some(r) if matches!(r.status, ReminderStatus::Sent | ReminderStatus::Snoozed) => {
                r.status = ReminderStatus::Snoozed;
                r.snoozed_until = Some(until);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn resolve(&self, id: i64, resolution: Resolution, at: DateTime<Utc>) -> Result<bool> {
        self.update_open(id, |r| {
            r.status = resolution.status();
            r.resolution = Some(resolution);
            r.completed_at = (resolution == Resolution::Completed).then_some(at);
            r.snoozed_until = None;
        })
    }

    async fn latest_open_for_user(&self, user_id: &str) -> Result<Option<Reminder>> {
        self.check()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| {
                r.user_id == user_id
                    && matches!(r.status, ReminderStatus::Sent | ReminderStatus::Snoozed)
            })
            .max_by_key(|r| (r.last_sent_at.unwrap_or(r.reminder_time), r.id))
            .cloned())
    }

    async fn completion_rate(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32> {
        self.check()?;
        let rows = self.rows.lock().unwrap();
        let closed: Vec<_> = rows
            .values()
            .filter(|r| r.user_id == user_id && r.status.is_terminal() && r.reminder_time >= since)
            .collect();
        if closed.is_empty() {
            return Ok(0);
        }
        let done = closed
            .iter()
            .filter(|r| r.status == ReminderStatus::Completed)
            .count();
        Ok((done * 100 / closed.len()) as u32)
    }
}

/// Wall clock pinned to a fixed origin, advanced by tokio's paused timer
pub struct TestClock {
    origin: DateTime<Utc>,
    start: Instant,
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            origin: Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap(),
            start: Instant::now(),
        }
    }
}

#[async_trait]
impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        self.origin + chrono::Duration::from_std(self.start.elapsed()).unwrap()
    }

    async fn sleep(&self, duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Records every delivery; can fail the first N attempts or all of them
pub struct TestNotifier {
    start: Instant,
    sent: Mutex<Vec<(Instant, String)>>,
    attempts: AtomicUsize,
    fail_first: usize,
    delay: std::time::Duration,
}

impl TestNotifier {
    pub fn new() -> Self {
        Self::failing_first(0)
    }

    pub fn failing() -> Self {
        Self::failing_first(usize::MAX)
    }

    pub fn failing_first(n: usize) -> Self {
        Self {
            start: Instant::now(),
            sent: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
            fail_first: n,
            delay: std::time::Duration::ZERO,
        }
    }

    /// Each delivery takes `delay` before it lands
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Whole minutes since start of each successful delivery
    pub fn minutes(&self) -> Vec<i64> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(at, _)| (at.duration_since(self.start).as_secs() / 60) as i64)
            .collect()
    }

    pub fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for TestNotifier {
    async fn deliver(&self, recipient: &str, text: &str) -> Result<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt < self.fail_first {
            return Err(anyhow!("channel {recipient} unavailable"));
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.sent
            .lock()
            .unwrap()
            .push((Instant::now(), text.to_string()));
        Ok(())
    }
}

/// Engine, reply handler and doubles wired together
pub struct Harness<S = MemoryStore> {
    pub store: Arc<S>,
    pub notifier: Arc<TestNotifier>,
    pub clock: Arc<TestClock>,
    pub engine: EscalationEngine,
    pub responses: ResponseHandler,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_notifier(TestNotifier::new())
    }

    pub fn with_notifier(notifier: TestNotifier) -> Self {
        Self::over(MemoryStore::default(), notifier)
    }
}

impl Harness<Database> {
    /// Same wiring over an in-memory SQLite database
    pub async fn sqlite(notifier: TestNotifier) -> Self {
        Self::over(Database::new(":memory:").await.unwrap(), notifier)
    }
}

impl<S: ReminderStore + 'static> Harness<S> {
    fn over(store: S, notifier: TestNotifier) -> Self {
        let store = Arc::new(store);
        let notifier = Arc::new(notifier);
        let clock = Arc::new(TestClock::new());
        let engine = EscalationEngine::new(
            store.clone(),
            notifier.clone(),
            clock.clone(),
            EscalationSettings::default(),
        );
        let responses = ResponseHandler::new(store.clone(), clock.clone());
        Self {
            store,
            notifier,
            clock,
            engine,
            responses,
        }
    }

    /// Scheduler polling once a minute over this harness
    pub fn scheduler(&self) -> Arc<ReminderScheduler> {
        Arc::new(ReminderScheduler::new(
            self.store.clone(),
            self.engine.clone(),
            self.clock.clone(),
            std::time::Duration::from_secs(60),
        ))
    }

    /// A pending reminder due right now
    pub async fn due_reminder(&self, priority: ReminderPriority) -> Reminder {
        self.store
            .create(NewReminder {
                user_id: "user-1".to_string(),
                recipient: "100".to_string(),
                reminder_time: self.clock.now(),
                reminder_message: "Take meds".to_string(),
                priority,
                task_id: None,
            })
            .await
            .unwrap()
    }

    /// A reminder whose first tier went out just now
    pub async fn sent_reminder(&self, priority: ReminderPriority) -> Reminder {
        let r = self.due_reminder(priority).await;
        self.store
            .record_delivery(r.id, 1, self.clock.now())
            .await
            .unwrap();
        self.stored(r.id).await
    }

    pub async fn stored(&self, id: i64) -> Reminder {
        self.store.get(id).await.unwrap().unwrap()
    }

    pub async fn advance_minutes(&self, minutes: u64) {
        tokio::time::sleep(std::time::Duration::from_secs(minutes * 60)).await;
    }
}
