use chrono::Duration;

/// A slash command the bot knows how to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    SendGroup(String),
    SendChannel(String),
    Broadcast(String),
    Ban,
    Kick,
    /// Optional duration argument, unparsed
    Mute(String),
    Unmute,
    Echo(String),
}

/// Name and description of every command, in menu order
pub const COMMANDS: &[(&str, &str)] = &[
    ("start", "Show bot status"),
    ("help", "List available commands"),
    ("sendgroup", "Send a message to the group"),
    ("sendchannel", "Send a message to the channel"),
    ("broadcast", "Send a message to the group and the channel"),
    ("ban", "Ban the sender of the replied-to message"),
    ("kick", "Remove the sender of the replied-to message"),
    ("mute", "Mute the sender of the replied-to message [duration]"),
    ("unmute", "Restore the replied-to sender's permissions"),
    ("echo", "Echo the given text"),
];

/// Outcome of looking at a message's text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Parsed {
    Command(Command),
    /// Starts with '/' but isn't ours (unknown name or another bot's command)
    Unrecognized,
    NotACommand,
}

impl Command {
    /// Split `/name[@bot] args...` and map it to a known command.
    ///
    /// `bot_username` is the bot's own username; commands addressed to any
    /// other bot are `Unrecognized`.
    pub fn parse(text: &str, bot_username: Option<&str>) -> Parsed {
        let Some(rest) = text.strip_prefix('/') else {
            return Parsed::NotACommand;
        };

        let (head, args) = match rest.find(char::is_whitespace) {
            Some(pos) => (&rest[..pos], rest[pos..].trim()),
            None => (rest, ""),
        };

        let name = match head.split_once('@') {
            Some((name, target)) => match bot_username {
                Some(me) if target.eq_ignore_ascii_case(me) => name,
                _ => return Parsed::Unrecognized,
            },
            None => head,
        };

        let args = args.to_string();
        let command = match name.to_ascii_lowercase().as_str() {
            "start" => Command::Start,
            "help" => Command::Help,
            "sendgroup" => Command::SendGroup(args),
            "sendchannel" => Command::SendChannel(args),
            "broadcast" => Command::Broadcast(args),
            "ban" => Command::Ban,
            "kick" => Command::Kick,
            "mute" => Command::Mute(args),
            "unmute" => Command::Unmute,
            "echo" => Command::Echo(args),
            _ => return Parsed::Unrecognized,
        };
        Parsed::Command(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Help => "help",
            Command::SendGroup(_) => "sendgroup",
            Command::SendChannel(_) => "sendchannel",
            Command::Broadcast(_) => "broadcast",
            Command::Ban => "ban",
            Command::Kick => "kick",
            Command::Mute(_) => "mute",
            Command::Unmute => "unmute",
            Command::Echo(_) => "echo",
        }
    }

    /// Reply sent when the command's arguments or reply target are missing
    pub fn usage(&self) -> &'static str {
        match self {
            Command::Start | Command::Help => "⚠️ Usage: /start or /help",
            Command::SendGroup(_) => "⚠️ Usage: /sendgroup <message>",
            Command::SendChannel(_) => "⚠️ Usage: /sendchannel <message>",
            Command::Broadcast(_) => "⚠️ Usage: /broadcast <message>",
            Command::Ban => "⚠️ Reply to a user's message with /ban to ban them.",
            Command::Kick => "⚠️ Reply to a user's message with /kick to kick them.",
            Command::Mute(_) => {
                "⚠️ Reply to a user's message with /mute [duration] to mute them (e.g. /mute 30m)."
            }
            Command::Unmute => "⚠️ Reply to a user's message with /unmute to restore permissions.",
            Command::Echo(_) => "⚠️ Usage: /echo <text>",
        }
    }
}

/// Render the /help listing
pub fn help_text() -> String {
    let mut text = String::from("Available commands:\n\n");
    for (name, description) in COMMANDS {
        text.push_str(&format!("/{} - {}\n", name, description));
    }
    text
}

/// Telegram treats restrictions longer than this as permanent
const MAX_MUTE_DAYS: i64 = 366;

/// Parse a mute duration: bare minutes (`45`) or a number with an
/// `m`/`h`/`d` suffix. Zero and anything over 366 days are rejected.
pub fn parse_duration(arg: &str) -> Option<Duration> {
    let arg = arg.trim().to_ascii_lowercase();
    let (digits, unit) = match arg.char_indices().find(|(_, c)| !c.is_ascii_digit()) {
        Some((pos, _)) => arg.split_at(pos),
        None => (arg.as_str(), "m"),
    };
    let value: i64 = digits.parse().ok().filter(|v| *v > 0)?;
    let duration = match unit {
        "m" | "min" => Duration::try_minutes(value),
        "h" => Duration::try_hours(value),
        "d" => Duration::try_days(value),
        _ => None,
    }?;
    (duration <= Duration::days(MAX_MUTE_DAYS)).then_some(duration)
}
