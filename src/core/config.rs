//! Environment-driven configuration for the bot
//!
//! - **Version**: 1.2.0
//! - **Since**: 0.1.0
//!
//! ## Changelog
//! - 1.2.0: `ENABLE_PERSISTENT_REMINDERS` and `ENABLE_SNOOZE` toggles
//! - 1.1.0: Escalation grace, delivery attempts and interval table path
//! - 1.0.0: Initial release

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub discord_token: String,
    pub database_path: String,
    pub log_level: String,
    /// How often the scheduler looks for due reminders
    pub reminder_poll_interval: Duration,
    /// Wait after the last tier before a reminder is marked missed
    pub reminder_grace_minutes: i64,
    pub reminder_delivery_attempts: u32,
    /// YAML file with per-priority interval offsets
    pub reminder_intervals_path: String,
    /// When off, every reminder is sent once and then marked missed
    pub enable_persistent_reminders: bool,
    pub enable_snooze: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let discord_token =
            env::var("DISCORD_TOKEN").context("DISCORD_TOKEN environment variable not set")?;

        let poll_seconds: u64 = parse_var("REMINDER_POLL_SECONDS", 60)?;

        Ok(Config {
            discord_token,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "taskmate.db".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            reminder_poll_interval: Duration::from_secs(poll_seconds.max(1)),
            reminder_grace_minutes: parse_var("REMINDER_GRACE_MINUTES", 5)?,
            reminder_delivery_attempts: parse_var("REMINDER_DELIVERY_ATTEMPTS", 3)?,
            reminder_intervals_path: env::var("REMINDER_INTERVALS_PATH")
                .unwrap_or_else(|_| "reminders.yaml".to_string()),
            enable_persistent_reminders: parse_flag("ENABLE_PERSISTENT_REMINDERS", true)?,
            enable_snooze: parse_flag("ENABLE_SNOOZE", true)?,
        })
    }
}

/// Read an optional numeric variable, rejecting values that do not parse
fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{name} must be a number, got '{raw}'")),
        Err(_) => Ok(default),
    }
}

/// Read an optional on/off variable (`true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`)
fn parse_flag(name: &str, default: bool) -> Result<bool> {
    let Ok(raw) = env::var(name) else {
        return Ok(default);
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(anyhow::anyhow!("{name} must be true or false, got '{raw}'")),
    }
}
