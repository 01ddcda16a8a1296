//! # Reminder Delivery
//!
//! `Notifier` is the single capability the escalation engine needs from the
//! chat transport. `DiscordNotifier` posts to a DM channel through serenity.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0

use anyhow::{Context, Result};
use async_trait::async_trait;
use log::debug;
use serenity::http::Http;
use serenity::model::id::ChannelId;
use std::sync::Arc;

use crate::core::chunk_for_message;

/// Delivers text to a recipient handle
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn deliver(&self, recipient: &str, text: &str) -> Result<()>;
}

/// Sends reminders as Discord messages; the recipient is a channel id
#[derive(Clone)]
pub struct DiscordNotifier {
    http: Arc<Http>,
}

impl DiscordNotifier {
    pub fn new(http: Arc<Http>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Notifier for DiscordNotifier {
    async fn deliver(&self, recipient: &str, text: &str) -> Result<()> {
        let channel_id: u64 = recipient
            .parse()
            .with_context(|| format!("Invalid recipient channel id: {recipient}"))?;
        let channel = ChannelId(channel_id);

        for chunk in chunk_for_message(text) {
            channel
                .say(&self.http, &chunk)
                .await
                .with_context(|| format!("Failed to deliver to channel {channel_id}"))?;
        }

        debug!("Delivered {} bytes to channel {}", text.len(), channel_id);
        Ok(())
    }
}
