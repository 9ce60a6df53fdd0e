use std::fmt;

use serde::{Deserialize, Serialize};

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Opaque identity of a user's conversation with the bot.
///
/// Primary key of every user record and the OAuth `state` parameter. Telegram
/// chat ids are stored in their decimal form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatIdentity(pub String);

impl ChatIdentity {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Numeric Telegram chat id, if this identity came from Telegram.
    pub fn as_chat_id(&self) -> Option<ChatId> {
        self.0.trim().parse::<i64>().ok().map(ChatId)
    }
}

impl From<ChatId> for ChatIdentity {
    fn from(c: ChatId) -> Self {
        Self(c.0.to_string())
    }
}

impl fmt::Display for ChatIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_identity_round_trips_telegram_ids() {
        let id = ChatIdentity::from(ChatId(-100123));
        assert_eq!(id.as_str(), "-100123");
        assert_eq!(id.as_chat_id(), Some(ChatId(-100123)));
        assert_eq!(ChatIdentity::new("web:abc").as_chat_id(), None);
        assert!(ChatIdentity::new("  ").is_empty());
    }
}
