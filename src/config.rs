use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BotMode {
    #[default]
    Webhook,
    Polling,
}

impl std::str::FromStr for BotMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "webhook" => Ok(BotMode::Webhook),
            "polling" => Ok(BotMode::Polling),
            other => anyhow::bail!("Unknown bot mode '{}' (expected webhook or polling)", other),
        }
    }
}

/// Who may run privileged commands
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Sender must be the configured admin (or one of the additional admins)
    #[default]
    AdminId,
    /// In groups, any chat administrator; elsewhere the static admin set
    ChatAdmins,
}

impl std::str::FromStr for AuthMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin_id" => Ok(AuthMode::AdminId),
            "chat_admins" => Ok(AuthMode::ChatAdmins),
            other => anyhow::bail!(
                "Unknown auth mode '{}' (expected admin_id or chat_admins)",
                other
            ),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MutePolicy {
    /// Revoke only the send-messages permission
    #[default]
    SendOnly,
    /// Revoke every send permission
    Full,
}

impl std::str::FromStr for MutePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "send_only" => Ok(MutePolicy::SendOnly),
            "full" => Ok(MutePolicy::Full),
            other => anyhow::bail!(
                "Unknown mute policy '{}' (expected send_only or full)",
                other
            ),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub server: ServerConfig,
    pub polling: PollingConfig,
    pub moderation: ModerationConfig,
    pub auth: AuthConfig,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Primary admin; also receives moderation notifications
    pub admin_id: u64,
    pub additional_admin_ids: Vec<u64>,
    pub group_id: i64,
    pub channel_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default)]
    pub mode: BotMode,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
    /// Expected `X-Telegram-Bot-Api-Secret-Token` header value
    #[serde(default)]
    pub secret_token: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PollingConfig {
    #[serde(default = "default_poll_timeout")]
    pub timeout_secs: u32,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModerationConfig {
    /// Delete links posted by non-admins in the group
    #[serde(default = "default_true")]
    pub link_filter: bool,
    /// Forward deleted links to the audit chat
    #[serde(default = "default_true")]
    pub forward_links: bool,
    /// Where deleted links go; defaults to the channel
    #[serde(default)]
    pub audit_chat_id: Option<i64>,
    /// Overrides the built-in URL pattern
    #[serde(default)]
    pub link_pattern: Option<String>,
    #[serde(default)]
    pub mute_policy: MutePolicy,
    /// Echo plain text sent to the bot in private chats
    #[serde(default = "default_true")]
    pub echo_private: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
}

/// On-disk shape: every field optional so env vars can fill the gaps.
#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    #[serde(default)]
    telegram: FileTelegram,
    #[serde(default)]
    server: ServerConfig,
    #[serde(default)]
    polling: PollingConfig,
    #[serde(default)]
    moderation: ModerationConfig,
    #[serde(default)]
    auth: AuthConfig,
}

#[derive(Debug, Deserialize, Default)]
struct FileTelegram {
    #[serde(default)]
    bot_token: Option<String>,
    #[serde(default)]
    admin_id: Option<u64>,
    #[serde(default)]
    additional_admin_ids: Vec<u64>,
    #[serde(default)]
    group_id: Option<i64>,
    #[serde(default)]
    channel_id: Option<i64>,
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_webhook_path() -> String {
    "/webhook".to_string()
}

fn default_poll_timeout() -> u32 {
    10
}

fn default_retry_delay() -> u64 {
    3
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            mode: BotMode::default(),
            host: default_host(),
            port: default_port(),
            webhook_path: default_webhook_path(),
            secret_token: None,
        }
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_poll_timeout(),
            retry_delay_secs: default_retry_delay(),
        }
    }
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            link_filter: true,
            forward_links: true,
            audit_chat_id: None,
            link_pattern: None,
            mute_policy: MutePolicy::default(),
            echo_private: true,
        }
    }
}

fn parse_env<T>(name: &str, value: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid value for {}: {} ({})", name, value, e))
}

fn parse_id_list(name: &str, value: &str) -> Result<Vec<u64>> {
    value
        .split([',', ' '])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| parse_env(name, s))
        .collect()
}

impl Config {
    /// Load from an optional TOML file, then apply process environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let content = if path.exists() {
            Some(
                std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?,
            )
        } else {
            None
        };

        Self::from_sources(content.as_deref(), |key| std::env::var(key).ok())
    }

    pub fn from_sources(
        content: Option<&str>,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut file: FileConfig = match content {
            Some(c) => toml::from_str(c).context("Failed to parse config file")?,
            None => FileConfig::default(),
        };

        if let Some(v) = env("BOT_TOKEN") {
            file.telegram.bot_token = Some(v);
        }
        if let Some(v) = env("ADMIN_ID") {
            file.telegram.admin_id = Some(parse_env("ADMIN_ID", &v)?);
        }
        if let Some(v) = env("ADMIN_IDS") {
            file.telegram.additional_admin_ids = parse_id_list("ADMIN_IDS", &v)?;
        }
        if let Some(v) = env("GROUP_ID") {
            file.telegram.group_id = Some(parse_env("GROUP_ID", &v)?);
        }
        if let Some(v) = env("CHANNEL_ID") {
            file.telegram.channel_id = Some(parse_env("CHANNEL_ID", &v)?);
        }
        if let Some(v) = env("BOT_MODE") {
            file.server.mode = v.parse()?;
        }
        if let Some(v) = env("HOST") {
            file.server.host = v;
        }
        if let Some(v) = env("PORT") {
            file.server.port = parse_env("PORT", &v)?;
        }
        if let Some(v) = env("WEBHOOK_PATH") {
            file.server.webhook_path = v;
        }
        if let Some(v) = env("WEBHOOK_SECRET") {
            file.server.secret_token = Some(v);
        }
        if let Some(v) = env("AUTH_MODE") {
            file.auth.mode = v.parse()?;
        }
        if let Some(v) = env("MUTE_POLICY") {
            file.moderation.mute_policy = v.parse()?;
        }
        if let Some(v) = env("FORWARD_LINKS") {
            file.moderation.forward_links = parse_env("FORWARD_LINKS", &v)?;
        }

        let t = file.telegram;
        let bot_token = t
            .bot_token
            .filter(|s| !s.trim().is_empty())
            .context("Bot token is missing: set BOT_TOKEN or [telegram] bot_token")?;
        let admin_id = t
            .admin_id
            .context("Admin id is missing: set ADMIN_ID or [telegram] admin_id")?;
        let group_id = t
            .group_id
            .context("Group id is missing: set GROUP_ID or [telegram] group_id")?;
        let channel_id = t
            .channel_id
            .context("Channel id is missing: set CHANNEL_ID or [telegram] channel_id")?;

        if !file.server.webhook_path.starts_with('/') {
            file.server.webhook_path.insert(0, '/');
        }

        Ok(Config {
            telegram: TelegramConfig {
                bot_token,
                admin_id,
                additional_admin_ids: t.additional_admin_ids,
                group_id,
                channel_id,
            },
            server: file.server,
            polling: file.polling,
            moderation: file.moderation,
            auth: file.auth,
        })
    }

    /// Static admin set: the primary admin plus any additional ones
    pub fn is_static_admin(&self, user_id: u64) -> bool {
        self.telegram.admin_id == user_id || self.telegram.additional_admin_ids.contains(&user_id)
    }

    /// Chat that receives forwarded links
    pub fn audit_chat_id(&self) -> i64 {
        self.moderation
            .audit_chat_id
            .unwrap_or(self.telegram.channel_id)
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        telegram: TelegramConfig {
            bot_token: "123:abc".to_string(),
            admin_id: 1,
            additional_admin_ids: vec![],
            group_id: -100,
            channel_id: -200,
        },
        server: ServerConfig::default(),
        polling: PollingConfig::default(),
        moderation: ModerationConfig::default(),
        auth: AuthConfig::default(),
    }
}
