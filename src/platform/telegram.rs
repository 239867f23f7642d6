use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand, Chat, ChatId, ChatPermissions, Message, MessageId, UpdateKind, User, UserId,
};
use tracing::{info, warn};

use super::{ChatKind, IncomingMessage, Permissions, TelegramApi, Update, UserRef};

/// `TelegramApi` backed by a teloxide `Bot`
pub struct TeloxideApi {
    bot: Bot,
}

impl TeloxideApi {
    pub fn new(token: &str) -> Self {
        Self {
            bot: Bot::new(token),
        }
    }

    /// The bot's own @username, used to accept `/cmd@username`
    pub async fn username(&self) -> Result<Option<String>> {
        let me = self.bot.get_me().await.context("getMe failed")?;
        Ok(me.user.username.clone())
    }

    /// Publish the command menu shown by Telegram clients
    pub async fn register_commands(&self, commands: &[(&str, &str)]) {
        let commands: Vec<BotCommand> = commands
            .iter()
            .map(|(name, description)| BotCommand::new(*name, *description))
            .collect();
        match self.bot.set_my_commands(commands).await {
            Ok(_) => info!("Registered command menu"),
            Err(e) => warn!("Failed to register command menu: {}", e),
        }
    }

    /// The group's default member permissions, the starting point for a
    /// restriction that only changes some flags
    async fn default_permissions(&self, chat_id: i64) -> Result<ChatPermissions> {
        let chat = self
            .bot
            .get_chat(ChatId(chat_id))
            .await
            .with_context(|| format!("getChat for {} failed", chat_id))?;
        Ok(chat.permissions().unwrap_or_else(ChatPermissions::empty))
    }

    /// Drop any registered webhook; Telegram refuses getUpdates while one is set.
    pub async fn delete_webhook(&self) {
        if let Err(e) = self.bot.delete_webhook().await {
            warn!("Failed to delete webhook (might not exist): {}", e);
        }
    }
}

#[async_trait]
impl TelegramApi for TeloxideApi {
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .with_context(|| format!("sendMessage to {} failed", chat_id))?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .with_context(|| format!("deleteMessage {} in {} failed", message_id, chat_id))?;
        Ok(())
    }

    async fn forward_message(
        &self,
        to_chat_id: i64,
        from_chat_id: i64,
        message_id: i32,
    ) -> Result<()> {
        self.bot
            .forward_message(ChatId(to_chat_id), ChatId(from_chat_id), MessageId(message_id))
            .await
            .with_context(|| {
                format!(
                    "forwardMessage {} from {} to {} failed",
                    message_id, from_chat_id, to_chat_id
                )
            })?;
        Ok(())
    }

    async fn ban_chat_member(&self, chat_id: i64, user_id: u64) -> Result<()> {
        self.bot
            .ban_chat_member(ChatId(chat_id), UserId(user_id))
            .await
            .with_context(|| format!("banChatMember {} in {} failed", user_id, chat_id))?;
        Ok(())
    }

    async fn unban_chat_member(&self, chat_id: i64, user_id: u64) -> Result<()> {
        self.bot
            .unban_chat_member(ChatId(chat_id), UserId(user_id))
            .await
            .with_context(|| format!("unbanChatMember {} in {} failed", user_id, chat_id))?;
        Ok(())
    }

    async fn restrict_chat_member(
        &self,
        chat_id: i64,
        user_id: u64,
        permissions: Permissions,
        until: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let base = if permissions.is_partial() {
            self.default_permissions(chat_id).await?
        } else {
            ChatPermissions::empty()
        };
        let mut req = self.bot.restrict_chat_member(
            ChatId(chat_id),
            UserId(user_id),
            to_chat_permissions(permissions, base),
        );
        // Otherwise Telegram derives SEND_MESSAGES from the media flags
        req.use_independent_chat_permissions = Some(true);
        req.until_date = until;
        req.await
            .with_context(|| format!("restrictChatMember {} in {} failed", user_id, chat_id))?;
        Ok(())
    }

    async fn get_chat_administrators(&self, chat_id: i64) -> Result<Vec<u64>> {
        let admins = self
            .bot
            .get_chat_administrators(ChatId(chat_id))
            .await
            .with_context(|| format!("getChatAdministrators for {} failed", chat_id))?;
        Ok(admins.into_iter().map(|m| m.user.id.0).collect())
    }

    async fn get_updates(&self, offset: u32, timeout_secs: u32) -> Result<Vec<Update>> {
        let mut req = self.bot.get_updates();
        req.offset = Some(
            i32::try_from(offset)
                .with_context(|| format!("Update offset {} out of range", offset))?,
        );
        req.timeout = Some(timeout_secs);
        let updates = req.await.context("getUpdates failed")?;
        Ok(updates.iter().map(convert_update).collect())
    }
}

/// Decode a webhook body into an `Update`
pub fn parse_update(body: &[u8]) -> Result<Update> {
    let update: teloxide::types::Update =
        serde_json::from_slice(body).context("Invalid update JSON")?;
    Ok(convert_update(&update))
}

fn convert_update(update: &teloxide::types::Update) -> Update {
    let message = match &update.kind {
        UpdateKind::Message(msg) => Some(convert_message(msg)),
        _ => None,
    };
    Update {
        update_id: update.id.0,
        message,
    }
}

fn convert_message(msg: &Message) -> IncomingMessage {
    IncomingMessage {
        message_id: msg.id.0,
        chat_id: msg.chat.id.0,
        chat_kind: chat_kind(&msg.chat),
        sender: msg.from.as_ref().map(user_ref),
        // Captions count as text so links in media posts are moderated too
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
        // Inside a forum topic every message replies to the topic's root
        reply_to: msg
            .reply_to_message()
            .filter(|reply| reply.forum_topic_created().is_none())
            .and_then(|reply| reply.from.as_ref())
            .map(user_ref),
    }
}

fn chat_kind(chat: &Chat) -> ChatKind {
    if chat.is_private() {
        ChatKind::Private
    } else if chat.is_channel() {
        ChatKind::Channel
    } else if chat.is_supergroup() {
        ChatKind::Supergroup
    } else {
        ChatKind::Group
    }
}

fn user_ref(user: &User) -> UserRef {
    UserRef {
        id: user.id.0,
        first_name: user.first_name.clone(),
    }
}

/// Apply the flags set in `perms` on top of `base`. Flags left as `None`
/// keep whatever `base` grants.
fn to_chat_permissions(perms: Permissions, base: ChatPermissions) -> ChatPermissions {
    let mut result = base;

    let flags = [
        (perms.can_send_messages, ChatPermissions::SEND_MESSAGES),
        (
            perms.can_send_media_messages,
            ChatPermissions::SEND_MEDIA_MESSAGES,
        ),
        (
            perms.can_send_other_messages,
            ChatPermissions::SEND_OTHER_MESSAGES,
        ),
        (
            perms.can_add_web_page_previews,
            ChatPermissions::ADD_WEB_PAGE_PREVIEWS,
        ),
    ];
    for (value, flag) in flags {
        if let Some(granted) = value {
            result.set(flag, granted);
        }
    }

    result
}
