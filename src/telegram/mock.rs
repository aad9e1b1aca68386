//! In-memory implementation of [`TelegramApi`] for testing.
//!
//! [`MockTelegram`] records every call it receives and can be scripted to
//! fail or stall specific operations:
//!
//! - unban failures and delays keyed by user ID
//! - failing sendMessage, getMe or webhook calls
//! - queued getUpdates batches, returned one per call
//!
//! When no batch is queued, getUpdates sleeps briefly and returns nothing so a
//! poller under test does not spin.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{SetWebhook, TelegramApi, TelegramError, Update, User};

/// Delay on an empty getUpdates response
const EMPTY_POLL_DELAY: Duration = Duration::from_millis(20);

/// A call recorded by [`MockTelegram`].
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    GetMe,
    SendMessage { chat_id: i64, text: String },
    UnbanChatMember { chat_id: i64, user_id: i64, only_if_banned: bool },
    SetWebhook(SetWebhook),
    DeleteWebhook,
    GetUpdates { offset: Option<i64> },
}

#[derive(Default)]
struct Script {
    unban_errors: HashMap<i64, TelegramError>,
    unban_delays: HashMap<i64, Duration>,
    send_error: Option<TelegramError>,
    get_me_error: Option<TelegramError>,
    webhook_error: Option<TelegramError>,
    updates: VecDeque<Vec<Update>>,
}

/// Recording Bot API double.
pub struct MockTelegram {
    me: User,
    calls: Mutex<Vec<MockCall>>,
    script: Mutex<Script>,
}

impl Default for MockTelegram {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTelegram {
    pub fn new() -> Self {
        Self {
            me: User {
                id: 1,
                is_bot: true,
                first_name: "Unban Bot".to_string(),
                last_name: None,
                username: Some("unban_test_bot".to_string()),
            },
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(Script::default()),
        }
    }

    /// Username reported by getMe.
    pub fn username(&self) -> &str {
        self.me.username.as_deref().unwrap_or_default()
    }

    pub fn with_unban_error(self, user_id: i64, error: TelegramError) -> Self {
        self.script_mut(|s| {
            s.unban_errors.insert(user_id, error);
        });
        self
    }

    pub fn with_unban_delay(self, user_id: i64, delay: Duration) -> Self {
        self.script_mut(|s| {
            s.unban_delays.insert(user_id, delay);
        });
        self
    }

    pub fn with_send_error(self, error: TelegramError) -> Self {
        self.script_mut(|s| s.send_error = Some(error));
        self
    }

    pub fn with_get_me_error(self, error: TelegramError) -> Self {
        self.script_mut(|s| s.get_me_error = Some(error));
        self
    }

    pub fn with_webhook_error(self, error: TelegramError) -> Self {
        self.script_mut(|s| s.webhook_error = Some(error));
        self
    }

    /// Queue a batch for the next getUpdates call.
    pub fn push_updates(&self, batch: Vec<Update>) {
        self.script_mut(|s| s.updates.push_back(batch));
    }

    /// All calls received so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// `(chat_id, text)` of every sendMessage call.
    pub fn sent_messages(&self) -> Vec<(i64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::SendMessage { chat_id, text } => Some((chat_id, text)),
                _ => None,
            })
            .collect()
    }

    /// `(chat_id, user_id)` of every unbanChatMember call.
    pub fn unbans(&self) -> Vec<(i64, i64)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                MockCall::UnbanChatMember { chat_id, user_id, .. } => Some((chat_id, user_id)),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: MockCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn script_mut<F: FnOnce(&mut Script)>(&self, f: F) {
        if let Ok(mut script) = self.script.lock() {
            f(&mut script);
        }
    }

    fn scripted<T, F: FnOnce(&mut Script) -> T>(&self, f: F) -> Option<T> {
        self.script.lock().ok().map(|mut s| f(&mut s))
    }
}

#[async_trait]
impl TelegramApi for MockTelegram {
    async fn get_me(&self) -> Result<User, TelegramError> {
        self.record(MockCall::GetMe);
        match self.scripted(|s| s.get_me_error.clone()).flatten() {
            Some(err) => Err(err),
            None => Ok(self.me.clone()),
        }
    }

    async fn send_message(&self, chat_id: i64, html: &str) -> Result<(), TelegramError> {
        self.record(MockCall::SendMessage {
            chat_id,
            text: html.to_string(),
        });
        match self.scripted(|s| s.send_error.clone()).flatten() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn unban_chat_member(
        &self,
        chat_id: i64,
        user_id: i64,
        only_if_banned: bool,
    ) -> Result<(), TelegramError> {
        self.record(MockCall::UnbanChatMember {
            chat_id,
            user_id,
            only_if_banned,
        });

        let (delay, error) = self
            .scripted(|s| {
                (
                    s.unban_delays.get(&user_id).copied(),
                    s.unban_errors.get(&user_id).cloned(),
                )
            })
            .unwrap_or((None, None));

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn set_webhook(&self, request: &SetWebhook) -> Result<(), TelegramError> {
        self.record(MockCall::SetWebhook(request.clone()));
        match self.scripted(|s| s.webhook_error.clone()).flatten() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn delete_webhook(&self) -> Result<(), TelegramError> {
        self.record(MockCall::DeleteWebhook);
        match self.scripted(|s| s.webhook_error.clone()).flatten() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        _timeout_secs: u64,
        _allowed_updates: &[&str],
    ) -> Result<Vec<Update>, TelegramError> {
        self.record(MockCall::GetUpdates { offset });
        match self.scripted(|s| s.updates.pop_front()).flatten() {
            Some(batch) => Ok(batch),
            None => {
                tokio::time::sleep(EMPTY_POLL_DELAY).await;
                Ok(Vec::new())
            }
        }
    }
}
