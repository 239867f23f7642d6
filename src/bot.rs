use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::auth;
use crate::commands::{self, Command, Parsed};
use crate::config::{Config, MutePolicy};
use crate::moderation::{self, LinkFilter};
use crate::platform::{ChatKind, IncomingMessage, Permissions, TelegramApi, Update, UserRef};

/// Shared application state
pub struct AppState {
    pub config: Config,
    api: Arc<dyn TelegramApi>,
    link_filter: LinkFilter,
    bot_username: Option<String>,
}

/// Moderation actions that act on the sender of a replied-to message
#[derive(Debug, Clone, Copy)]
enum MemberAction {
    Ban,
    Kick,
    Mute,
    Unmute,
}

/// Reply text plus an optional admin notification sent after it
struct Reply {
    text: String,
    notify: Option<(MemberAction, UserRef)>,
}

impl From<String> for Reply {
    fn from(text: String) -> Self {
        Self { text, notify: None }
    }
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        text.to_string().into()
    }
}

impl MemberAction {
    fn label(self) -> &'static str {
        match self {
            MemberAction::Ban => "Ban",
            MemberAction::Kick => "Kick",
            MemberAction::Mute => "Mute",
            MemberAction::Unmute => "Unmute",
        }
    }
}

impl AppState {
    pub fn new(
        config: Config,
        api: Arc<dyn TelegramApi>,
        bot_username: Option<String>,
    ) -> Result<Self> {
        let link_filter = LinkFilter::new(config.moderation.link_pattern.as_deref())?;
        Ok(Self {
            config,
            api,
            link_filter,
            bot_username,
        })
    }

    pub fn api(&self) -> &dyn TelegramApi {
        self.api.as_ref()
    }

    /// Handle one update. Never fails: every error is logged here.
    pub async fn handle_update(&self, update: Update) {
        let Some(msg) = update.message else {
            debug!("Ignoring non-message update {}", update.update_id);
            return;
        };
        let Some(text) = msg.text.clone() else {
            return;
        };

        debug!(
            "Update {} from {:?} in chat {}: {}",
            update.update_id,
            msg.sender_id(),
            msg.chat_id,
            text
        );

        match Command::parse(&text, self.bot_username.as_deref()) {
            Parsed::Command(cmd) => self.handle_command(&msg, &text, cmd).await,
            Parsed::Unrecognized => self.handle_text(&msg, &text, false).await,
            Parsed::NotACommand => self.handle_text(&msg, &text, true).await,
        }
    }

    async fn handle_command(&self, msg: &IncomingMessage, text: &str, cmd: Command) {
        if !auth::require_authorized(self.api(), &self.config, msg).await {
            // The sender is already known not to be an admin
            if self.is_monitored_link(msg, text) {
                self.remove_link(msg).await;
            }
            return;
        }

        info!("Command /{} from {:?}", cmd.name(), msg.sender_id());

        let reply: Reply = match self.run_command(msg, &cmd).await {
            Ok(reply) => reply,
            Err(e) => {
                error!(
                    "/{} from {:?} in chat {} failed: {:#}",
                    cmd.name(),
                    msg.sender_id(),
                    msg.chat_id,
                    e
                );
                format!("❌ /{} failed. Check the logs for details.", cmd.name()).into()
            }
        };

        self.reply(msg, &reply.text).await;
        if let Some((action, target)) = reply.notify {
            self.notify_admin(action, &target).await;
        }
    }

    /// Run a command for an authorized sender and return the reply text
    async fn run_command(&self, msg: &IncomingMessage, cmd: &Command) -> Result<Reply> {
        let telegram = &self.config.telegram;
        match cmd {
            Command::Start => Ok(format!(
                "✅ Bot is active.\n\nGroup ID: {}\nChannel ID: {}",
                telegram.group_id, telegram.channel_id
            )
            .into()),
            Command::Help => Ok(commands::help_text().into()),
            Command::SendGroup(text) => {
                if text.is_empty() {
                    return Ok(cmd.usage().into());
                }
                self.api.send_message(telegram.group_id, text).await?;
                Ok("✅ Sent to group.".into())
            }
            Command::SendChannel(text) => {
                if text.is_empty() {
                    return Ok(cmd.usage().into());
                }
                self.api.send_message(telegram.channel_id, text).await?;
                Ok("✅ Sent to channel.".into())
            }
            Command::Broadcast(text) => {
                if text.is_empty() {
                    return Ok(cmd.usage().into());
                }
                Ok(self.broadcast(text).await.into())
            }
            Command::Ban => self.member_action(msg, cmd, MemberAction::Ban).await,
            Command::Kick => self.member_action(msg, cmd, MemberAction::Kick).await,
            Command::Mute(_) => self.member_action(msg, cmd, MemberAction::Mute).await,
            Command::Unmute => self.member_action(msg, cmd, MemberAction::Unmute).await,
            Command::Echo(text) => {
                if text.is_empty() {
                    return Ok(cmd.usage().into());
                }
                Ok(text.clone().into())
            }
        }
    }

    /// Send to group and channel; both are attempted even if one fails.
    async fn broadcast(&self, text: &str) -> String {
        let telegram = &self.config.telegram;
        let mut failed = Vec::new();

        for (label, chat_id) in [("group", telegram.group_id), ("channel", telegram.channel_id)] {
            if let Err(e) = self.api.send_message(chat_id, text).await {
                error!("Broadcast to {} {} failed: {:#}", label, chat_id, e);
                failed.push(label);
            }
        }

        if failed.is_empty() {
            "✅ Broadcast sent to group and channel.".to_string()
        } else {
            format!(
                "❌ Broadcast failed for: {}. Check the logs for details.",
                failed.join(", ")
            )
        }
    }

    async fn member_action(
        &self,
        msg: &IncomingMessage,
        cmd: &Command,
        action: MemberAction,
    ) -> Result<Reply> {
        let Some(target) = msg.reply_to.as_ref() else {
            return Ok(cmd.usage().into());
        };

        let until = match cmd {
            Command::Mute(arg) if !arg.is_empty() => match commands::parse_duration(arg) {
                Some(duration) => Some(Utc::now() + duration),
                None => return Ok(cmd.usage().into()),
            },
            _ => None,
        };

        if self.config.is_static_admin(target.id) {
            return Ok("⚠️ Cannot moderate an admin.".into());
        }

        let group_id = self.config.telegram.group_id;
        let text = match action {
            MemberAction::Ban => {
                self.api.ban_chat_member(group_id, target.id).await?;
                format!("🚫 {} banned.", target.first_name)
            }
            MemberAction::Kick => {
                // Ban then unban: removes the member but lets them rejoin
                self.api.ban_chat_member(group_id, target.id).await?;
                if let Err(e) = self.api.unban_chat_member(group_id, target.id).await {
                    error!(
                        "Kick of {} in {} stopped after the ban: {:#}",
                        target.id, group_id, e
                    );
                    return Ok(Reply {
                        text: format!(
                            "⚠️ {} was banned, but the unban failed, so they cannot rejoin.",
                            target.first_name
                        ),
                        notify: Some((MemberAction::Ban, target.clone())),
                    });
                }
                format!("👢 {} kicked.", target.first_name)
            }
            MemberAction::Mute => {
                let permissions = match self.config.moderation.mute_policy {
                    MutePolicy::SendOnly => Permissions::send_only_muted(),
                    MutePolicy::Full => Permissions::fully_muted(),
                };
                self.api
                    .restrict_chat_member(group_id, target.id, permissions, until)
                    .await?;
                match cmd {
                    Command::Mute(arg) if until.is_some() => {
                        format!("🔇 {} muted for {}.", target.first_name, arg)
                    }
                    _ => format!("🔇 {} muted.", target.first_name),
                }
            }
            MemberAction::Unmute => {
                self.api
                    .restrict_chat_member(group_id, target.id, Permissions::unmuted(), None)
                    .await?;
                format!("🔊 {} unmuted.", target.first_name)
            }
        };

        Ok(Reply {
            text,
            notify: Some((action, target.clone())),
        })
    }

    /// Tell the primary admin about a moderation action
    async fn notify_admin(&self, action: MemberAction, target: &UserRef) {
        let admin_id = self.config.telegram.admin_id;
        let text = format!(
            "📢 Action: {}\n👤 User: {} ({})",
            action.label(),
            target.first_name,
            target.id
        );
        if let Err(e) = self.api.send_message(admin_id as i64, &text).await {
            warn!("Failed to notify admin {}: {:#}", admin_id, e);
        }
    }

    /// Non-command path: link moderation in the group, echo in private chats
    async fn handle_text(&self, msg: &IncomingMessage, text: &str, plain: bool) {
        if msg.chat_id == self.config.telegram.group_id {
            self.moderate(msg, text).await;
            return;
        }

        if plain
            && msg.chat_kind == ChatKind::Private
            && self.config.moderation.echo_private
            && auth::require_authorized(self.api(), &self.config, msg).await
        {
            self.reply(msg, text).await;
        }
    }

    async fn moderate(&self, msg: &IncomingMessage, text: &str) {
        if !self.is_monitored_link(msg, text) {
            return;
        }
        if auth::is_authorized(self.api(), &self.config, msg).await {
            return;
        }
        self.remove_link(msg).await;
    }

    /// A link-like message in the monitored group, with filtering enabled
    fn is_monitored_link(&self, msg: &IncomingMessage, text: &str) -> bool {
        msg.chat_id == self.config.telegram.group_id
            && self.config.moderation.link_filter
            && self.link_filter.matches(text)
    }

    async fn remove_link(&self, msg: &IncomingMessage) {
        let audit_chat = self
            .config
            .moderation
            .forward_links
            .then(|| self.config.audit_chat_id());
        moderation::remove_link(self.api(), msg, audit_chat).await;
    }

    async fn reply(&self, msg: &IncomingMessage, text: &str) {
        if let Err(e) = self.api.send_message(msg.chat_id, text).await {
            warn!("Failed to reply in chat {}: {:#}", msg.chat_id, e);
        }
    }
}
