use anyhow::{Context, Result};
use regex::Regex;
use tracing::{info, warn};

use crate::platform::{IncomingMessage, TelegramApi};

/// Scheme prefixes, Telegram links and bare `www.` hosts
const DEFAULT_LINK_PATTERN: &str =
    r"(?i)(?:\b(?:https?|ftp|tg)://|\bwww\.|\b(?:t|telegram)\.me/)\S+";

/// Detects link-like text
#[derive(Debug, Clone)]
pub struct LinkFilter {
    pattern: Regex,
}

impl LinkFilter {
    pub fn new(pattern: Option<&str>) -> Result<Self> {
        let source = pattern.unwrap_or(DEFAULT_LINK_PATTERN);
        let pattern =
            Regex::new(source).with_context(|| format!("Invalid link pattern: {}", source))?;
        Ok(Self { pattern })
    }

    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// Forward `msg` to `audit_chat` (when given) and delete it from its chat.
///
/// The forward goes first since a deleted message can't be forwarded. Each
/// call is attempted regardless of how the other went; failures are logged.
pub async fn remove_link(
    api: &dyn TelegramApi,
    msg: &IncomingMessage,
    audit_chat: Option<i64>,
) {
    if let Some(to) = audit_chat {
        if let Err(e) = api.forward_message(to, msg.chat_id, msg.message_id).await {
            warn!(
                "Failed to forward link message {} from chat {} to {}: {:#}",
                msg.message_id, msg.chat_id, to, e
            );
        }
    }

    match api.delete_message(msg.chat_id, msg.message_id).await {
        Ok(()) => info!(
            "Deleted link message {} from user {:?} in chat {}",
            msg.message_id,
            msg.sender_id(),
            msg.chat_id
        ),
        Err(e) => warn!(
            "Failed to delete link message {} in chat {}: {:#}",
            msg.message_id, msg.chat_id, e
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::fake::{text_message, Call, FakeApi};
    use crate::platform::ChatKind;

    #[test]
    fn test_default_pattern_matches_links() {
        let filter = LinkFilter::new(None).unwrap();
        assert!(filter.matches("check this https://x.com"));
        assert!(filter.matches("HTTP://EXAMPLE.ORG/path"));
        assert!(filter.matches("join t.me/somechannel"));
        assert!(filter.matches("see www.example.com"));
        assert!(filter.matches("tg://resolve?domain=foo"));
        assert!(filter.matches("telegram.me/joinchat/abc"));
    }

    #[test]
    fn test_default_pattern_ignores_plain_text() {
        let filter = LinkFilter::new(None).unwrap();
        assert!(!filter.matches("hello everyone"));
        assert!(!filter.matches("meet at 5pm, www is down"));
        assert!(!filter.matches("https:// alone"));
        assert!(!filter.matches("the habit.me thing"));
    }

    #[test]
    fn test_custom_pattern() {
        let filter = LinkFilter::new(Some(r"(?i)discord\.gg/\S+")).unwrap();
        assert!(filter.matches("discord.gg/abc"));
        assert!(!filter.matches("https://x.com"));
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(LinkFilter::new(Some("(unclosed")).is_err());
    }

    #[tokio::test]
    async fn test_forward_then_delete() {
        let api = FakeApi::new();
        let msg = text_message(-100, ChatKind::Supergroup, 9, "https://x.com");

        remove_link(&api, &msg, Some(-200)).await;
        assert_eq!(
            api.calls(),
            vec![
                Call::ForwardMessage {
                    to_chat_id: -200,
                    from_chat_id: -100,
                    message_id: 100
                },
                Call::DeleteMessage {
                    chat_id: -100,
                    message_id: 100
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_forward_failure_still_deletes() {
        let api = FakeApi::new();
        api.fail("forward_message");
        let msg = text_message(-100, ChatKind::Supergroup, 9, "https://x.com");

        remove_link(&api, &msg, Some(-200)).await;
        assert_eq!(api.calls().len(), 2);
        assert!(matches!(api.calls()[1], Call::DeleteMessage { .. }));
    }

    #[tokio::test]
    async fn test_delete_failure_is_contained() {
        let api = FakeApi::new();
        api.fail("delete_message");
        let msg = text_message(-100, ChatKind::Supergroup, 9, "https://x.com");

        remove_link(&api, &msg, None).await;
        assert_eq!(
            api.calls(),
            vec![Call::DeleteMessage {
                chat_id: -100,
                message_id: 100
            }]
        );
    }
}
