use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{ChatKind, IncomingMessage, Permissions, TelegramApi, Update, UserRef};

/// A recorded `TelegramApi` call
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SendMessage {
        chat_id: i64,
        text: String,
    },
    DeleteMessage {
        chat_id: i64,
        message_id: i32,
    },
    ForwardMessage {
        to_chat_id: i64,
        from_chat_id: i64,
        message_id: i32,
    },
    Ban {
        chat_id: i64,
        user_id: u64,
    },
    Unban {
        chat_id: i64,
        user_id: u64,
    },
    Restrict {
        chat_id: i64,
        user_id: u64,
        permissions: Permissions,
        until: Option<DateTime<Utc>>,
    },
    GetAdministrators {
        chat_id: i64,
    },
    GetUpdates {
        offset: u32,
    },
}

impl Call {
    /// Calls that change something visible in Telegram, other than a plain reply
    pub fn is_moderation(&self) -> bool {
        matches!(
            self,
            Call::DeleteMessage { .. }
                | Call::ForwardMessage { .. }
                | Call::Ban { .. }
                | Call::Unban { .. }
                | Call::Restrict { .. }
        )
    }
}

/// Recording fake used by the dispatcher, polling and webhook tests
#[derive(Default)]
pub struct FakeApi {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<&'static str>>,
    admins: Mutex<Vec<u64>>,
    batches: Mutex<VecDeque<Result<Vec<Update>, String>>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `method` (e.g. "delete_message") return an error
    pub fn fail(&self, method: &'static str) {
        self.failing.lock().unwrap().insert(method);
    }

    pub fn set_admins(&self, admins: Vec<u64>) {
        *self.admins.lock().unwrap() = admins;
    }

    pub fn push_updates(&self, updates: Vec<Update>) {
        self.batches.lock().unwrap().push_back(Ok(updates));
    }

    pub fn push_transport_error(&self, error: &str) {
        self.batches
            .lock()
            .unwrap()
            .push_back(Err(error.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent_texts(&self) -> Vec<(i64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::SendMessage { chat_id, text } => Some((chat_id, text)),
                _ => None,
            })
            .collect()
    }

    pub fn moderation_calls(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_moderation).collect()
    }

    fn record(&self, method: &'static str, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.lock().unwrap().contains(method) {
            anyhow::bail!("{} failed: Bad Request: not enough rights", method);
        }
        Ok(())
    }
}

#[async_trait]
impl TelegramApi for FakeApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.record(
            "send_message",
            Call::SendMessage {
                chat_id,
                text: text.to_string(),
            },
        )
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.record(
            "delete_message",
            Call::DeleteMessage {
                chat_id,
                message_id,
            },
        )
    }

    async fn forward_message(
        &self,
        to_chat_id: i64,
        from_chat_id: i64,
        message_id: i32,
    ) -> Result<()> {
        self.record(
            "forward_message",
            Call::ForwardMessage {
                to_chat_id,
                from_chat_id,
                message_id,
            },
        )
    }

    async fn ban_chat_member(&self, chat_id: i64, user_id: u64) -> Result<()> {
        self.record("ban_chat_member", Call::Ban { chat_id, user_id })
    }

    async fn unban_chat_member(&self, chat_id: i64, user_id: u64) -> Result<()> {
        self.record("unban_chat_member", Call::Unban { chat_id, user_id })
    }

    async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user_id: u64,
        permissions: Permissions,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        self.record(
            "restrict_chat_member",
            Call::Restrict {
                chat_id,
                user_id,
                permissions,
                until,
            },
        )
    }

    async fn get_chat_administrators(&self, chat_id: i64) -> Result<Vec<u64>> {
        self.record("get_chat_administrators", Call::GetAdministrators { chat_id })?;
        Ok(self.admins.lock().unwrap().clone())
    }

    async fn get_updates(&self, offset: u32, _timeout_secs: u32) -> Result<Vec<Update>> {
        self.record("get_updates", Call::GetUpdates { offset })?;
        match self.batches.lock().unwrap().pop_front() {
            Some(Ok(updates)) => Ok(updates),
            Some(Err(e)) => anyhow::bail!("getUpdates failed: {}", e),
            None => Ok(Vec::new()),
        }
    }
}

/// Build a text message from `sender_id` in `chat_id`
pub fn text_message(chat_id: i64, chat_kind: ChatKind, sender_id: u64, text: &str) -> IncomingMessage {
    IncomingMessage {
        message_id: 100,
        chat_id,
        chat_kind,
        sender: Some(UserRef {
            id: sender_id,
            first_name: format!("user{}", sender_id),
        }),
        text: Some(text.to_string()),
        reply_to: None,
    }
}

pub fn update(update_id: u32, message: IncomingMessage) -> Update {
    Update {
        update_id,
        message: Some(message),
    }
}
