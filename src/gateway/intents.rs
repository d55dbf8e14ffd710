use crate::error::ConfigError;

pub const GUILD_MESSAGES: u64 = 1 << 9;
pub const DIRECT_MESSAGES: u64 = 1 << 12;
/// Privileged.
pub const MESSAGE_CONTENT: u64 = 1 << 15;

/// All intent names this client understands.
pub const ALL_INTENTS: &[(&str, u64)] = &[
    ("guild_messages", GUILD_MESSAGES),
    ("direct_messages", DIRECT_MESSAGES),
    ("message_content", MESSAGE_CONTENT),
];

pub const DEFAULT_INTENTS: u64 = GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT;

pub fn intent_bit(name: &str) -> Option<u64> {
    ALL_INTENTS
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, bit)| *bit)
}

/// Parse either a raw bitmask (`"37376"`) or a comma-separated list of names
/// (`"guild_messages,message_content"`).
pub fn parse(value: &str) -> Result<u64, ConfigError> {
    let value = value.trim();
    if let Ok(bits) = value.parse::<u64>() {
        return Ok(bits);
    }
    value
        .split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .try_fold(0, |acc, name| {
            intent_bit(name)
                .map(|bit| acc | bit)
                .ok_or_else(|| ConfigError::UnknownIntent(name.to_string()))
        })
}
