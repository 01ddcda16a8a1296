use anyhow::Result;
use chrono::Utc;
use dotenvy::dotenv;
use log::{error, info, warn};
use serenity::async_trait;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use std::sync::Arc;

use taskmate::core::Config;
use taskmate::database::Database;
use taskmate::features::reminders::{
    deadline_after, format_duration, parse_duration, DiscordNotifier, EscalationEngine,
    EscalationSettings, IntervalTable, NewReminder, ReminderPriority, ReminderScheduler,
    ReminderStore, ResponseHandler, SystemClock,
};

const REMIND_USAGE: &str =
    "Usage: `remind <duration> [optional|normal|important|critical] <task>`, e.g. `remind 30m important Take meds`";

/// A parsed `remind` direct message
#[derive(Debug, PartialEq)]
struct RemindRequest {
    delay: chrono::Duration,
    priority: ReminderPriority,
    text: String,
}

/// Parse `remind <duration> [priority] <text>`; `None` if the message is not a remind command
fn parse_remind(content: &str) -> Option<Result<RemindRequest, &'static str>> {
    let mut words = content.split_whitespace();
    if !words.next()?.eq_ignore_ascii_case("remind") {
        return None;
    }

    let Some(delay) = words.next().and_then(parse_duration) else {
        return Some(Err(REMIND_USAGE));
    };

    let mut rest: Vec<&str> = words.collect();
    let priority = match rest.first().and_then(|w| w.parse::<ReminderPriority>().ok()) {
        Some(priority) => {
            rest.remove(0);
            priority
        }
        None => ReminderPriority::Normal,
    };

    let text = rest.join(" ");
    if text.is_empty() {
        return Some(Err(REMIND_USAGE));
    }

    Some(Ok(RemindRequest {
        delay,
        priority,
        text,
    }))
}

struct Handler {
    database: Database,
    responses: ResponseHandler,
    scheduler: Arc<ReminderScheduler>,
}

impl Handler {
    async fn handle_remind(&self, msg: &Message, request: RemindRequest) -> Result<String> {
        let Some(reminder_time) = deadline_after(Utc::now(), request.delay) else {
            return Ok(REMIND_USAGE.to_string());
        };
        let reminder = self
            .database
            .create(NewReminder {
                user_id: msg.author.id.0.to_string(),
                recipient: msg.channel_id.0.to_string(),
                reminder_time,
                reminder_message: request.text,
                priority: request.priority,
                task_id: None,
            })
            .await?;

        Ok(format!(
            "⏰ Got it! I'll remind you in **{}** about:\n> {}\n\n*Reminder ID: #{} ({})*",
            format_duration(request.delay),
            reminder.reminder_message,
            reminder.id,
            reminder.priority
        ))
    }

    async fn handle_reply(&self, msg: &Message) -> Result<String> {
        let user_id = msg.author.id.0.to_string();
        let Some(reminder) = self.database.latest_open_for_user(&user_id).await? else {
            return Ok(
                "You don't have any active reminders. Start one with `remind 30m Take meds`."
                    .to_string(),
            );
        };

        let outcome = self.responses.handle(reminder.id, &msg.content).await;
        if outcome.status.is_some() {
            self.scheduler.release(reminder.id);
        }
        Ok(outcome.message)
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: Message) {
        // Reminders live in DMs only
        if msg.author.bot || msg.guild_id.is_some() {
            return;
        }

        let reply = match parse_remind(&msg.content) {
            Some(Ok(request)) => self.handle_remind(&msg, request).await,
            Some(Err(usage)) => Ok(usage.to_string()),
            None => self.handle_reply(&msg).await,
        };

        let reply = reply.unwrap_or_else(|e| {
            error!("Error handling message from {}: {e:#}", msg.author.id);
            "Sorry, I encountered an error processing your message.".to_string()
        });

        if let Err(why) = msg.channel_id.say(&ctx.http, reply).await {
            error!("Failed to send reply: {why}");
        }
    }

    async fn ready(&self, _ctx: Context, ready: Ready) {
        info!("🎉 {} is connected and ready!", ready.user.name);
        info!("🤖 Bot ID: {}", ready.user.id);
        info!(
            "⏰ {} reminder escalations running",
            self.scheduler.active_count()
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    let config = Config::from_env()?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&config.log_level))
        .init();

    info!("Starting Taskmate reminder bot...");

    let database = Database::new(&config.database_path).await?;

    let mut intervals = IntervalTable::load_or_default(&config.reminder_intervals_path)?;
    if !config.enable_persistent_reminders {
        info!("⏰ Persistent reminders disabled - one notice per reminder");
        intervals = intervals.single_shot();
    }
    let settings = EscalationSettings {
        intervals,
        grace: chrono::Duration::minutes(config.reminder_grace_minutes),
        delivery_attempts: config.reminder_delivery_attempts,
        ..EscalationSettings::default()
    };

    let store: Arc<dyn ReminderStore> = Arc::new(database.clone());
    let clock = Arc::new(SystemClock);
    let http = Arc::new(Http::new(&config.discord_token));
    let notifier = Arc::new(DiscordNotifier::new(http));

    let engine = EscalationEngine::new(store.clone(), notifier, clock.clone(), settings);
    let scheduler = Arc::new(ReminderScheduler::new(
        store.clone(),
        engine,
        clock.clone(),
        config.reminder_poll_interval,
    ));
    let responses = ResponseHandler::new(store, clock).with_snooze(config.enable_snooze);

    let handler = Handler {
        database,
        responses,
        scheduler: scheduler.clone(),
    };

    let intents = GatewayIntents::DIRECT_MESSAGES | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.discord_token, intents)
        .event_handler(handler)
        .await
        .map_err(|e| {
            error!("Failed to create Discord client: {e}");
            anyhow::anyhow!("Client creation failed: {}", e)
        })?;

    // Start the reminder scheduler
    tokio::spawn(scheduler.clone().run());

    info!("Establishing WebSocket connection to Discord gateway...");

    if let Err(why) = client.start().await {
        error!("Gateway connection failed: {why:?}");
        scheduler.stop();
        if scheduler.active_count() > 0 {
            warn!(
                "{} escalations interrupted; they resume on next start",
                scheduler.active_count()
            );
        }
        return Err(anyhow::anyhow!(
            "Failed to establish gateway connection: {}",
            why
        ));
    }

    Ok(())
}
