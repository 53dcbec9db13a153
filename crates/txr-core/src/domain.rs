use std::fmt;

/// Opaque chat identifier.
///
/// Transports hand us ids as native integers (Bot API) or strings (channel
/// usernames, env overrides). Everything is canonicalized to its string form
/// and compared as a string, byte for byte.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ChatRef(String);

impl ChatRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Parse an id out of a JSON value (number or string). `null`, empty
    /// strings and other shapes yield `None`.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => Some(Self(n.to_string())),
            serde_json::Value::String(s) if !s.is_empty() => Some(Self::new(s.as_str())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Numeric form, when the id is a Bot API chat id.
    pub fn as_i64(&self) -> Option<i64> {
        self.0.parse().ok()
    }
}

impl From<i64> for ChatRef {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for ChatRef {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ChatRef {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl fmt::Display for ChatRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who sent an inbound message. Every field is optional; channel posts have no sender.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sender {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventKind {
    Command,
    Message,
    EditedMessage,
    ChannelPost,
    EditedChannelPost,
    /// Anything else the transport delivered (callbacks, member updates, ...).
    Other,
}

impl EventKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Command => "command",
            EventKind::Message => "message",
            EventKind::EditedMessage => "edited_message",
            EventKind::ChannelPost => "channel_post",
            EventKind::EditedChannelPost => "edited_channel_post",
            EventKind::Other => "other",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transport-normalized inbound event. Lives for one dispatch cycle.
#[derive(Clone, Debug)]
pub struct InboundEvent {
    pub chat_id: ChatRef,
    /// `None` when the update carried no text (service messages, media).
    pub text: Option<String>,
    pub sender: Sender,
    pub kind: EventKind,
    /// Set on group → supergroup migration service messages.
    pub migrate_to_chat_id: Option<ChatRef>,
}

impl InboundEvent {
    pub fn text(chat_id: impl Into<ChatRef>, kind: EventKind, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            text: Some(text.into()),
            sender: Sender::default(),
            kind,
            migrate_to_chat_id: None,
        }
    }
}
