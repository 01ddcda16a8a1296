//! Reminder message templates, resolved by tier
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.2.0

use super::types::ReminderPriority;

/// Which template a delivery uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageTier {
    /// Neutral first notice
    First,
    /// Firmer follow-up
    Second,
    /// Pointed follow-up with elapsed time and priority
    Third,
    /// Last warning with completion rate, no further reminders
    Final,
    /// Any tier past the configured table (after a snooze)
    Generic(u32),
    /// Terminal notice once the reminder is marked missed
    Missed,
}

impl MessageTier {
    /// Template for escalation tier `tier` (1-based) of a `tier_count`-long table
    pub fn for_tier(tier: u32, tier_count: u32) -> Self {
        if tier > tier_count {
            return MessageTier::Generic(tier);
        }
        match tier {
            0 | 1 => MessageTier::First,
            2 => MessageTier::Second,
            3 => MessageTier::Third,
            _ => MessageTier::Final,
        }
    }

    /// Whether rendering needs the user's completion rate
    pub fn needs_completion_rate(&self) -> bool {
        matches!(self, MessageTier::Final)
    }

    pub fn render(&self, ctx: &MessageContext<'_>) -> String {
        let task = ctx.task_name;
        match self {
            MessageTier::First => format!(
                "⏰ TIME: {task}\n\n\
                 This is what you asked me to remind you about.\n\n\
                 Reply 'done' when finished, or 'snooze 15' to delay."
            ),
            MessageTier::Second => format!(
                "⏰ SECOND REMINDER: {task}\n\n\
                 You haven't responded yet.\n\
                 You ASKED me to remind you, so here I am.\n\n\
                 Reply 'done' or 'snooze X'"
            ),
            MessageTier::Third => format!(
                "⏰ THIRD REMINDER: {task}\n\n\
                 It's been {elapsed} minutes and this is marked {priority}.\n\n\
                 Either:\n\
                 1. Do it RIGHT NOW\n\
                 2. Reply 'skip' if plans changed\n\
                 3. Reply 'snooze 30' to delay",
                elapsed = ctx.elapsed_minutes,
                priority = ctx.priority,
            ),
            MessageTier::Final => format!(
                "⏰ FINAL WARNING: {task}\n\n\
                 {elapsed} minutes. No action.\n\n\
                 Your completion rate this week is {rate}%.\n\
                 You set this as {priority}. Act like it.\n\n\
                 This is the last reminder. After this, it gets marked as missed.",
                elapsed = ctx.elapsed_minutes,
                rate = ctx.completion_rate.unwrap_or(0),
                priority = ctx.priority,
            ),
            MessageTier::Generic(n) => format!(
                "⏰ REMINDER #{n}: {task}\n\n\
                 It's been {elapsed} minutes.\n\
                 Reply 'done' when finished.",
                elapsed = ctx.elapsed_minutes,
            ),
            MessageTier::Missed => format!(
                "⏰ MARKED AS MISSED\n\n\
                 You didn't do '{task}' and you didn't respond.\n\n\
                 This will show up in your next assessment under commitments you broke.\n\
                 Own it and do better tomorrow."
            ),
        }
    }
}

/// Values substituted into a template
#[derive(Debug, Clone)]
pub struct MessageContext<'a> {
    pub task_name: &'a str,
    pub elapsed_minutes: i64,
    pub priority: ReminderPriority,
    pub completion_rate: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> MessageContext<'static> {
        MessageContext {
            task_name: "call John",
            elapsed_minutes: 12,
            priority: ReminderPriority::Critical,
            completion_rate: Some(64),
        }
    }

    #[test]
    fn test_tier_lookup() {
        assert_eq!(MessageTier::for_tier(1, 5), MessageTier::First);
        assert_eq!(MessageTier::for_tier(2, 5), MessageTier::Second);
        assert_eq!(MessageTier::for_tier(3, 5), MessageTier::Third);
        assert_eq!(MessageTier::for_tier(4, 5), MessageTier::Final);
        assert_eq!(MessageTier::for_tier(5, 5), MessageTier::Final);
        assert_eq!(MessageTier::for_tier(2, 1), MessageTier::Generic(2));
        assert_eq!(MessageTier::for_tier(4, 3), MessageTier::Generic(4));
    }

    #[test]
    fn test_third_reports_elapsed_and_priority() {
        let text = MessageTier::Third.render(&ctx());
        assert!(text.contains("call John"));
        assert!(text.contains("12 minutes"));
        assert!(text.contains("critical"));
    }

    #[test]
    fn test_final_reports_completion_rate() {
        let text = MessageTier::Final.render(&ctx());
        assert!(text.starts_with("⏰ FINAL WARNING"));
        assert!(text.contains("64%"));
        assert!(text.contains("last reminder"));
        assert!(MessageTier::Final.needs_completion_rate());
        assert!(!MessageTier::Third.needs_completion_rate());
    }

    #[test]
    fn test_generic_and_missed() {
        let text = MessageTier::Generic(6).render(&ctx());
        assert!(text.contains("REMINDER #6"));
        assert!(text.contains("12 minutes"));

        let text = MessageTier::Missed.render(&ctx());
        assert!(text.contains("MISSED"));
        assert!(text.contains("call John"));
    }
}
