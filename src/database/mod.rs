//! # Database
//!
//! SQLite persistence for reminders. The connection sits behind an async
//! mutex so clones of `Database` can be shared across the scheduler, every
//! escalation task and the reply handler. Each mutation is one `UPDATE`
//! keyed by id, guarded against terminal rows.
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: Deliveries no longer overwrite a snooze; `update_status` refuses pending and snoozed
//! - 1.1.0: Added resolution and last_sent_at columns, in-flight query for restart recovery
//! - 1.0.0: Initial reminders schema

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, info};
use sqlite::{Connection, State, Statement};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::features::reminders::{
    NewReminder, Reminder, ReminderStatus, ReminderStore, Resolution,
};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS reminders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id TEXT NOT NULL,
        recipient TEXT NOT NULL,
        task_id INTEGER,
        reminder_time TEXT NOT NULL,
        priority TEXT NOT NULL DEFAULT 'normal',
        status TEXT NOT NULL DEFAULT 'pending',
        nag_count INTEGER NOT NULL DEFAULT 0,
        snoozed_until TEXT,
        last_sent_at TEXT,
        reminder_message TEXT NOT NULL,
        resolution TEXT,
        created_at TEXT NOT NULL,
        completed_at TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_reminders_status_time ON reminders(status, reminder_time);
    CREATE INDEX IF NOT EXISTS idx_reminders_user ON reminders(user_id);
";

const OPEN_ONLY: &str = "status NOT IN ('completed', 'cancelled')";

fn to_db_time(dt: DateTime<Utc>) -> String {
    dt.format(TIME_FORMAT).to_string()
}

fn from_db_time(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value, TIME_FORMAT)
        .with_context(|| format!("Invalid timestamp in database: {value}"))?;
    Ok(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}

fn from_db_time_opt(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value.as_deref().map(from_db_time).transpose()
}

fn read_reminder(statement: &Statement) -> Result<Reminder> {
    let status: String = statement.read("status")?;
    let priority: String = statement.read("priority")?;
    let resolution: Option<String> = statement.read("resolution")?;
    let nag_count: i64 = statement.read("nag_count")?;

    Ok(Reminder {
        id: statement.read("id")?,
        user_id: statement.read("user_id")?,
        recipient: statement.read("recipient")?,
        task_id: statement.read("task_id")?,
        reminder_time: from_db_time(&statement.read::<String, _>("reminder_time")?)?,
        priority: priority.parse()?,
        status: status.parse()?,
        nag_count: u32::try_from(nag_count).unwrap_or(0),
        snoozed_until: from_db_time_opt(statement.read("snoozed_until")?)?,
        last_sent_at: from_db_time_opt(statement.read("last_sent_at")?)?,
        reminder_message: statement.read("reminder_message")?,
        resolution: resolution.map(|r| r.parse()).transpose()?,
        created_at: from_db_time(&statement.read::<String, _>("created_at")?)?,
        completed_at: from_db_time_opt(statement.read("completed_at")?)?,
    })
}

fn collect_reminders(statement: &mut Statement) -> Result<Vec<Reminder>> {
    let mut reminders = Vec::new();
    while let State::Row = statement.next()? {
        reminders.push(read_reminder(statement)?);
    }
    Ok(reminders)
}

/// Run a prepared update and report whether a row changed
fn run_update(connection: &Connection, statement: &mut Statement) -> Result<bool> {
    while statement.next()? != State::Done {}
    Ok(connection.change_count() > 0)
}

/// Shared handle to the SQLite database
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and apply the schema
    pub async fn new(path: &str) -> Result<Self> {
        let connection = sqlite::open(path)
            .with_context(|| format!("Failed to open database at {path}"))?;
        connection
            .execute(SCHEMA)
            .context("Failed to initialize reminders schema")?;

        info!("🗄️ Database ready at {path}");

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }
}

#[async_trait]
impl ReminderStore for Database {
    async fn create(&self, reminder: NewReminder) -> Result<Reminder> {
        let now = Utc::now();
        let id = {
            let conn = self.connection.lock().await;
            let mut statement = conn.prepare(
                "INSERT INTO reminders
                    (user_id, recipient, task_id, reminder_time, priority, status,
                     nag_count, reminder_message, created_at)
                 VALUES (?, ?, ?, ?, ?, 'pending', 0, ?, ?)",
            )?;
            statement.bind((1, reminder.user_id.as_str()))?;
            statement.bind((2, reminder.recipient.as_str()))?;
            statement.bind((3, reminder.task_id))?;
            statement.bind((4, to_db_time(reminder.reminder_time).as_str()))?;
            statement.bind((5, reminder.priority.as_str()))?;
            statement.bind((6, reminder.reminder_message.as_str()))?;
            statement.bind((7, to_db_time(now).as_str()))?;
            while statement.next()? != State::Done {}

            let mut rowid = conn.prepare("SELECT last_insert_rowid() AS id")?;
            rowid.next()?;
            rowid.read::<i64, _>("id")?
        };

        info!(
            "✅ Reminder {} created for user {} at {}",
            id, reminder.user_id, reminder.reminder_time
        );

        self.get(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Reminder {} vanished after insert", id))
    }

    async fn get(&self, id: i64) -> Result<Option<Reminder>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare("SELECT * FROM reminders WHERE id = ?")?;
        statement.bind((1, id))?;
        Ok(collect_reminders(&mut statement)?.into_iter().next())
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT * FROM reminders
             WHERE status = 'pending' AND reminder_time <= ?
             ORDER BY reminder_time, id",
        )?;
        statement.bind((1, to_db_time(now).as_str()))?;
        collect_reminders(&mut statement)
    }

    async fn find_in_flight(&self, now: DateTime<Utc>) -> Result<Vec<Reminder>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT * FROM reminders
             WHERE status = 'sent'
                OR (status = 'snoozed' AND (snoozed_until IS NULL OR snoozed_until <= ?))
             ORDER BY id",
        )?;
        statement.bind((1, to_db_time(now).as_str()))?;
        collect_reminders(&mut statement)
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
                bail!("Reminder {id} cannot be moved to {status} through update_status")
            }
            ReminderStatus::Sent => {}
        }

        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(format!(
            "UPDATE reminders
             SET status = 'sent', nag_count = MAX(nag_count, COALESCE(?, nag_count)),
                 snoozed_until = NULL
             WHERE id = ? AND {OPEN_ONLY}"
        ))?;
        statement.bind((1, nag_count.map(i64::from)))?;
        statement.bind((2, id))?;
        let changed = run_update(&conn, &mut statement)?;
        debug!("Reminder {id} status -> {status} (changed: {changed})");
        Ok(changed)
    }

    async fn record_delivery(&self, id: i64, nag_count: u32, at: DateTime<Utc>) -> Result<bool> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "UPDATE reminders
             SET status = 'sent', nag_count = MAX(nag_count, ?), last_sent_at = ?
             WHERE id = ? AND status IN ('pending', 'sent')",
        )?;
        statement.bind((1, i64::from(nag_count)))?;
        statement.bind((2, to_db_time(at).as_str()))?;
        statement.bind((3, id))?;
        run_update(&conn, &mut statement)
    }

    async fn snooze(&self, id: i64, until: DateTime<Utc>) -> Result<bool> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "UPDATE reminders
             SET status = 'snoozed', snoozed_until = ?
             WHERE id = ? AND status IN ('sent', 'snoozed')",
        )?;
        statement.bind((1, to_db_time(until).as_str()))?;
        statement.bind((2, id))?;
        run_update(&conn, &mut statement)
    }

    async fn resolve(&self, id: i64, resolution: Resolution, at: DateTime<Utc>) -> Result<bool> {
        let status = resolution.status();
        let completed_at = (status == ReminderStatus::Completed).then(|| to_db_time(at));

        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(format!(
            "UPDATE reminders
             SET status = ?, resolution = ?, completed_at = ?, snoozed_until = NULL
             WHERE id = ? AND {OPEN_ONLY}"
        ))?;
        statement.bind((1, status.to_string().as_str()))?;
        statement.bind((2, resolution.to_string().as_str()))?;
        statement.bind((3, completed_at.as_deref()))?;
        statement.bind((4, id))?;
        let changed = run_update(&conn, &mut statement)?;
        if changed {
            debug!("Reminder {id} resolved as {resolution}");
        }
        Ok(changed)
    }

    async fn latest_open_for_user(&self, user_id: &str) -> Result<Option<Reminder>> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT * FROM reminders
             WHERE user_id = ? AND status IN ('sent', 'snoozed')
             ORDER BY COALESCE(last_sent_at, reminder_time) DESC, id DESC
             LIMIT 1",
        )?;
        statement.bind((1, user_id))?;
        Ok(collect_reminders(&mut statement)?.into_iter().next())
    }

    async fn completion_rate(&self, user_id: &str, since: DateTime<Utc>) -> Result<u32> {
        let conn = self.connection.lock().await;
        let mut statement = conn.prepare(
            "SELECT COUNT(*) AS total,
                    SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END) AS done
             FROM reminders
             WHERE user_id = ? AND status IN ('completed', 'cancelled') AND reminder_time >= ?",
        )?;
        statement.bind((1, user_id))?;
        statement.bind((2, to_db_time(since).as_str()))?;
        statement.next()?;
        let total: i64 = statement.read("total")?;
        let done: Option<i64> = statement.read("done")?;
        if total == 0 {
            return Ok(0);
        }
        Ok((done.unwrap_or(0) * 100 / total) as u32)
    }
}
