pub mod telegram;

#[cfg(test)]
pub mod fake;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One inbound event from Telegram, reduced to what the bot acts on.
#[derive(Debug, Clone)]
pub struct Update {
    /// Sequence number, only used to advance the polling cursor
    pub update_id: u32,
    /// `None` for update kinds the bot does not handle (edits, callbacks, ...)
    pub message: Option<IncomingMessage>,
}

/// A chat message received from Telegram
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message_id: i32,
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    /// Missing for messages posted on behalf of a channel
    pub sender: Option<UserRef>,
    pub text: Option<String>,
    /// Sender of the message this one replies to
    pub reply_to: Option<UserRef>,
}

impl IncomingMessage {
    pub fn sender_id(&self) -> Option<u64> {
        self.sender.as_ref().map(|u| u.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: u64,
    pub first_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// Chat member permissions sent with `restrictChatMember`.
/// `None` keeps the group's default for that flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Permissions {
    pub can_send_messages: Option<bool>,
    pub can_send_media_messages: Option<bool>,
    pub can_send_other_messages: Option<bool>,
    pub can_add_web_page_previews: Option<bool>,
}

impl Permissions {
    /// Revoke only the right to send text messages.
    pub fn send_only_muted() -> Self {
        Self {
            can_send_messages: Some(false),
            ..Self::default()
        }
    }

    pub fn fully_muted() -> Self {
        Self::all(false)
    }

    pub fn unmuted() -> Self {
        Self::all(true)
    }

    /// Whether some flag is left to the group's defaults
    pub fn is_partial(&self) -> bool {
        [
            self.can_send_messages,
            self.can_send_media_messages,
            self.can_send_other_messages,
            self.can_add_web_page_previews,
        ]
        .iter()
        .any(Option::is_none)
    }

    fn all(value: bool) -> Self {
        Self {
            can_send_messages: Some(value),
            can_send_media_messages: Some(value),
            can_send_other_messages: Some(value),
            can_add_web_page_previews: Some(value),
        }
    }
}

/// The subset of the Telegram Bot API the bot calls.
///
/// Handlers only talk to Telegram through this trait so they can run against
/// a recording fake in tests.
#[async_trait]
pub trait TelegramApi: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()>;

    async fn forward_message(
        &self,
        to_chat_id: i64,
        from_chat_id: i64,
        message_id: i32,
    ) -> Result<()>;

    async fn ban_chat_member(&self, chat_id: i64, user_id: u64) -> Result<()>;

    async fn unban_chat_member(&self, chat_id: i64, user_id: u64) -> Result<()>;

    async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user_id: u64,
        permissions: Permissions,
        until: Option<DateTime<Utc>>,
    ) -> Result<()>;

    /// User ids of the chat's administrators
    async fn get_chat_administrators(&self, chat_id: i64) -> Result<Vec<u64>>;

    /// Long-poll for updates with `update_id >= offset`
    async fn get_updates(&self, offset: u32, timeout_secs: u32) -> Result<Vec<Update>>;
}
