//! User-facing reply texts.
//!
//! All replies are sent with HTML parse mode; anything interpolated from user
//! input goes through [`escape_html`].

use crate::telegram::{TelegramError, User};

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Inline mention link for a user.
pub fn mention_html(user: &User) -> String {
    format!(
        "<a href=\"tg://user?id={}\">{}</a>",
        user.id,
        escape_html(&user.full_name())
    )
}

pub fn start(user: Option<&User>, channel_id: i64) -> String {
    let greeting = user.map(mention_html).unwrap_or_else(|| "there".to_string());
    format!(
        "👋 Hi {greeting}!\n\n\
         🤖 <b>Unban Bot Active</b>\n\n\
         📋 <b>Commands:</b>\n\
         • /start - Start bot\n\
         • /help - Help guide\n\
         • /unban [ID] - Unban user\n\n\
         🎯 <b>How to use:</b>\n\
         1. Get user ID from @userinfobot\n\
         2. Send me the ID\n\
         3. I'll unban them\n\n\
         ⚡ <b>Quick unban:</b>\n\
         Just send: <code>123456789</code>\n\n\
         📢 Channel ID: <code>{channel_id}</code>"
    )
}

pub const HELP: &str = "🆘 <b>HELP GUIDE</b>\n\n\
    📋 <b>Commands:</b>\n\
    /start - Start the bot\n\
    /help - Show this guide\n\
    /unban [ID] - Unban a user\n\n\
    🎯 <b>How to unban:</b>\n\
    1. Get user ID from @userinfobot\n\
    2. Send: <code>/unban 123456789</code>\n\
    OR just send the ID\n\n\
    ⚠️ <b>Note:</b> I must be an admin in your channel!";

pub const UNBAN_USAGE: &str = "❌ <b>Usage:</b> <code>/unban USER_ID</code>\n\
    Example: <code>/unban 123456789</code>";

pub const INVALID_TEXT: &str = "❌ Send a valid User ID (numbers only)\n\
    Example: <code>123456789</code>\n\
    Get ID from @userinfobot";

pub const HANDLER_ERROR: &str = "⚠️ <b>An error occurred!</b>\n\
    Please try again later.";

/// Result of an unban attempt as reported to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnbanOutcome {
    Unbanned,
    TimedOut,
    InvalidId,
    PermissionDenied,
    UserNotFound,
    NotBanned,
    ChatNotFound,
    Failed,
}

impl UnbanOutcome {
    /// Classify a Bot API failure by its description.
    ///
    /// The first matching phrase wins, checked in this order.
    pub fn from_error(error: &TelegramError) -> Self {
        let message = error.to_string().to_lowercase();
        if message.contains("not enough rights") {
            UnbanOutcome::PermissionDenied
        } else if message.contains("user not found") {
            UnbanOutcome::UserNotFound
        } else if message.contains("not banned") {
            UnbanOutcome::NotBanned
        } else if message.contains("chat not found") {
            UnbanOutcome::ChatNotFound
        } else {
            UnbanOutcome::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UnbanOutcome::Unbanned => "unbanned",
            UnbanOutcome::TimedOut => "timed_out",
            UnbanOutcome::InvalidId => "invalid_id",
            UnbanOutcome::PermissionDenied => "permission_denied",
            UnbanOutcome::UserNotFound => "user_not_found",
            UnbanOutcome::NotBanned => "not_banned",
            UnbanOutcome::ChatNotFound => "chat_not_found",
            UnbanOutcome::Failed => "failed",
        }
    }

    /// Reply text for this outcome.
    pub fn reply(&self, user_id: &str, channel_id: i64) -> String {
        match self {
            UnbanOutcome::Unbanned => format!(
                "✅ <b>Successfully Unbanned!</b>\n\n\
                 👤 User ID: <code>{}</code>\n\
                 📢 Channel: <code>{}</code>",
                escape_html(user_id),
                channel_id
            ),
            UnbanOutcome::TimedOut => "⚠️ <b>Operation timed out!</b>\n\
                The server took too long to respond. Please try again."
                .to_string(),
            UnbanOutcome::InvalidId => "❌ <b>Invalid User ID!</b>\n\
                User ID must contain only numbers."
                .to_string(),
            UnbanOutcome::PermissionDenied => "❌ <b>Permission Error!</b>\n\n\
                Make me an ADMIN in the channel with:\n\
                • Ban Users permission\n\n\
                Then try again!"
                .to_string(),
            UnbanOutcome::UserNotFound => "❌ User not found!".to_string(),
            UnbanOutcome::NotBanned => "✅ User is not banned!".to_string(),
            UnbanOutcome::ChatNotFound => "❌ Channel not found!".to_string(),
            UnbanOutcome::Failed => "❌ Failed to unban. Try again!".to_string(),
        }
    }
}
