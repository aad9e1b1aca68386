//! Update routing and command handlers.
//!
//! Commands (`/start`, `/help`, `/unban`) are accepted in any chat. Plain text
//! is only handled in private chats, where a bare numeric ID of at least
//! [`MIN_BARE_USER_ID_LEN`] digits triggers an unban.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use tokio::time::timeout;
use tracing::instrument;

use crate::config::{MIN_BARE_USER_ID_LEN, UNBAN_TIMEOUT_SECS};
use crate::telegram::{ChatType, Message, TelegramApi, TelegramError, Update};

use super::replies::{self, UnbanOutcome};

/// What to do with an incoming message.
#[derive(Debug, PartialEq, Eq)]
pub enum Route<'a> {
    Start,
    Help,
    /// `/unban` with its first argument, if any
    Unban(Option<&'a str>),
    /// Trimmed non-command text from a private chat
    Text(&'a str),
    Ignore,
}

/// Decide how to handle a message.
///
/// `bot_username` filters `/command@otherbot` addressed to someone else.
pub fn route<'a>(message: &'a Message, bot_username: Option<&str>) -> Route<'a> {
    let Some(text) = message.text.as_deref() else {
        return Route::Ignore;
    };

    if let Some(command_line) = text.strip_prefix('/') {
        let mut parts = command_line.split_whitespace();
        let head = parts.next().unwrap_or_default();
        let (name, target) = match head.split_once('@') {
            Some((name, target)) => (name, Some(target)),
            None => (head, None),
        };

        if let (Some(target), Some(me)) = (target, bot_username) {
            if !target.eq_ignore_ascii_case(me) {
                return Route::Ignore;
            }
        }

        return match name.to_ascii_lowercase().as_str() {
            "start" => Route::Start,
            "help" => Route::Help,
            "unban" => Route::Unban(parts.next()),
            _ => Route::Ignore,
        };
    }

    if message.chat.kind != ChatType::Private {
        return Route::Ignore;
    }

    match text.trim() {
        "" => Route::Ignore,
        // Indented slash text is neither a command nor an ID
        trimmed if trimmed.starts_with('/') => Route::Ignore,
        trimmed => Route::Text(trimmed),
    }
}

/// A bare message counts as a user ID when it is all digits and long enough.
fn is_bare_user_id(text: &str) -> bool {
    text.len() >= MIN_BARE_USER_ID_LEN && text.bytes().all(|b| b.is_ascii_digit())
}

/// Handles updates against the Bot API. Cheap to clone; one per worker.
#[derive(Clone)]
pub struct Handlers {
    api: Arc<dyn TelegramApi>,
    channel_id: i64,
    bot_username: Arc<OnceLock<String>>,
    unban_timeout: Duration,
}

impl Handlers {
    pub fn new(api: Arc<dyn TelegramApi>, channel_id: i64, bot_username: Arc<OnceLock<String>>) -> Self {
        Self {
            api,
            channel_id,
            bot_username,
            unban_timeout: Duration::from_secs(UNBAN_TIMEOUT_SECS),
        }
    }

    /// Override the unban timeout.
    pub fn with_unban_timeout(mut self, unban_timeout: Duration) -> Self {
        self.unban_timeout = unban_timeout;
        self
    }

    /// Handle one update, reporting handler failures to the chat.
    ///
    /// Never fails: errors are logged and answered with a generic message on a
    /// best-effort basis.
    #[instrument(name = "bot.process_update", skip_all, fields(update_id = update.update_id))]
    pub async fn process(&self, update: &Update) {
        if let Err(e) = self.handle_update(update).await {
            tracing::error!(error = %e, "Bot error while handling update");

            if let Some(chat_id) = update.effective_chat_id() {
                if let Err(reply_err) = self.api.send_message(chat_id, replies::HANDLER_ERROR).await {
                    tracing::debug!(error = %reply_err, "Failed to send error reply");
                }
            }
        }
    }

    async fn handle_update(&self, update: &Update) -> Result<(), TelegramError> {
        let Some(message) = update.message.as_ref() else {
            tracing::debug!("Ignoring update without message");
            return Ok(());
        };

        let chat_id = message.chat.id;
        match route(message, self.bot_username.get().map(String::as_str)) {
            Route::Start => {
                if let Some(user) = message.from.as_ref() {
                    tracing::info!(user_id = user.id, "Start command");
                }
                let text = replies::start(message.from.as_ref(), self.channel_id);
                self.api.send_message(chat_id, &text).await
            }
            Route::Help => self.api.send_message(chat_id, replies::HELP).await,
            Route::Unban(None) => self.api.send_message(chat_id, replies::UNBAN_USAGE).await,
            Route::Unban(Some(user_id)) => self.process_unban(chat_id, user_id).await,
            Route::Text(text) if is_bare_user_id(text) => self.process_unban(chat_id, text).await,
            Route::Text(_) => self.api.send_message(chat_id, replies::INVALID_TEXT).await,
            Route::Ignore => Ok(()),
        }
    }

    /// Unban `user_id` from the configured channel and reply with the outcome.
    async fn process_unban(&self, chat_id: i64, user_id: &str) -> Result<(), TelegramError> {
        let outcome = self.unban(user_id).await;
        tracing::debug!(user_id, outcome = outcome.as_str(), "Unban processed");
        self.api
            .send_message(chat_id, &outcome.reply(user_id, self.channel_id))
            .await
    }

    #[instrument(name = "bot.unban", skip(self), fields(channel_id = self.channel_id))]
    async fn unban(&self, user_id: &str) -> UnbanOutcome {
        let Ok(id) = user_id.parse::<i64>() else {
            return UnbanOutcome::InvalidId;
        };

        tracing::info!(user_id = id, "Unbanning user");
        match timeout(
            self.unban_timeout,
            self.api.unban_chat_member(self.channel_id, id, true),
        )
        .await
        {
            Ok(Ok(())) => {
                tracing::info!(user_id = id, "Unbanned user");
                UnbanOutcome::Unbanned
            }
            Ok(Err(e)) => {
                tracing::error!(user_id = id, error = %e, "Unban error");
                UnbanOutcome::from_error(&e)
            }
            Err(_) => {
                tracing::warn!(user_id = id, "Timeout unbanning user");
                UnbanOutcome::TimedOut
            }
        }
    }
}
