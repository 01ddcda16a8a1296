//! Wall-clock time and suspension for escalation loops

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Source of the current time and a way to wait
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    async fn sleep(&self, duration: std::time::Duration);

    /// Suspend until `deadline`, returning immediately if it already passed
    async fn sleep_until(&self, deadline: DateTime<Utc>) {
        if let Ok(remaining) = (deadline - self.now()).to_std() {
            if !remaining.is_zero() {
                self.sleep(remaining).await;
            }
        }
    }
}

/// System time with tokio timers
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    async fn sleep(&self, duration: std::time::Duration) {
        tokio::time::sleep(duration).await;
    }
}
