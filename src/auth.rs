use tracing::{info, warn};

use crate::config::{AuthMode, Config};
use crate::platform::{IncomingMessage, TelegramApi};

pub const NOT_AUTHORIZED: &str = "❌ You are not authorized to use this bot.";

/// Decide whether the sender of `msg` may use privileged commands.
///
/// Recomputed for every message. In `chat_admins` mode only administrators
/// of the monitored group qualify, and only for messages sent there; in any
/// other chat the configured admins apply. A failed administrator lookup
/// counts as not authorized.
pub async fn is_authorized(api: &dyn TelegramApi, config: &Config, msg: &IncomingMessage) -> bool {
    let Some(sender_id) = msg.sender_id() else {
        return false;
    };

    match config.auth.mode {
        AuthMode::AdminId => config.is_static_admin(sender_id),
        AuthMode::ChatAdmins if msg.chat_id == config.telegram.group_id => {
            match api.get_chat_administrators(msg.chat_id).await {
                Ok(admins) => admins.contains(&sender_id),
                Err(e) => {
                    warn!(
                        "Could not fetch administrators of chat {}, denying user {}: {:#}",
                        msg.chat_id, sender_id, e
                    );
                    false
                }
            }
        }
        AuthMode::ChatAdmins => config.is_static_admin(sender_id),
    }
}

/// Gate run before every command handler. On rejection the fixed reply is
/// sent and `false` returned.
pub async fn require_authorized(
    api: &dyn TelegramApi,
    config: &Config,
    msg: &IncomingMessage,
) -> bool {
    if is_authorized(api, config, msg).await {
        return true;
    }

    info!(
        "Rejected unauthorized user {:?} in chat {}",
        msg.sender_id(),
        msg.chat_id
    );
    if let Err(e) = api.send_message(msg.chat_id, NOT_AUTHORIZED).await {
        warn!("Failed to send rejection to chat {}: {:#}", msg.chat_id, e);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::platform::fake::{text_message, Call, FakeApi};
    use crate::platform::ChatKind;

    #[tokio::test]
    async fn test_admin_id_mode() {
        let api = FakeApi::new();
        let config = test_config();

        let admin = text_message(1, ChatKind::Private, 1, "hi");
        let other = text_message(2, ChatKind::Private, 2, "hi");
        assert!(is_authorized(&api, &config, &admin).await);
        assert!(!is_authorized(&api, &config, &other).await);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_additional_admins() {
        let api = FakeApi::new();
        let mut config = test_config();
        config.telegram.additional_admin_ids = vec![7];

        let msg = text_message(7, ChatKind::Private, 7, "hi");
        assert!(is_authorized(&api, &config, &msg).await);
    }

    #[tokio::test]
    async fn test_missing_sender_is_rejected() {
        let api = FakeApi::new();
        let config = test_config();
        let mut msg = text_message(-100, ChatKind::Supergroup, 1, "hi");
        msg.sender = None;
        assert!(!is_authorized(&api, &config, &msg).await);
    }

    #[tokio::test]
    async fn test_chat_admins_mode_in_group() {
        let api = FakeApi::new();
        api.set_admins(vec![55]);
        let mut config = test_config();
        config.auth.mode = AuthMode::ChatAdmins;

        let chat_admin = text_message(-100, ChatKind::Supergroup, 55, "hi");
        let configured_admin = text_message(-100, ChatKind::Group, 1, "hi");
        assert!(is_authorized(&api, &config, &chat_admin).await);
        assert!(!is_authorized(&api, &config, &configured_admin).await);
        assert_eq!(
            api.calls(),
            vec![
                Call::GetAdministrators { chat_id: -100 },
                Call::GetAdministrators { chat_id: -100 },
            ]
        );
    }

    #[tokio::test]
    async fn test_chat_admins_mode_private_falls_back() {
        let api = FakeApi::new();
        let mut config = test_config();
        config.auth.mode = AuthMode::ChatAdmins;

        let msg = text_message(1, ChatKind::Private, 1, "hi");
        assert!(is_authorized(&api, &config, &msg).await);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_chat_admins_of_other_groups_are_not_trusted() {
        let api = FakeApi::new();
        api.set_admins(vec![77]);
        let mut config = test_config();
        config.auth.mode = AuthMode::ChatAdmins;

        let foreign_admin = text_message(-555, ChatKind::Supergroup, 77, "/broadcast hi");
        let configured_admin = text_message(-555, ChatKind::Group, 1, "/broadcast hi");
        assert!(!is_authorized(&api, &config, &foreign_admin).await);
        assert!(is_authorized(&api, &config, &configured_admin).await);
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn test_admin_lookup_failure_fails_closed() {
        let api = FakeApi::new();
        api.set_admins(vec![55]);
        api.fail("get_chat_administrators");
        let mut config = test_config();
        config.auth.mode = AuthMode::ChatAdmins;

        let msg = text_message(-100, ChatKind::Supergroup, 55, "hi");
        assert!(!is_authorized(&api, &config, &msg).await);
    }

    #[tokio::test]
    async fn test_rejection_reply() {
        let api = FakeApi::new();
        let config = test_config();

        let msg = text_message(-100, ChatKind::Supergroup, 9, "/ban");
        assert!(!require_authorized(&api, &config, &msg).await);
        assert_eq!(api.sent_texts(), vec![(-100, NOT_AUTHORIZED.to_string())]);
    }
}
