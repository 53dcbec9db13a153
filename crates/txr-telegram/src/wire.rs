//! Telegram update JSON as posted to the webhook, and its mapping to
//! [`InboundEvent`].
//!
//! Only the fields the relay reads are modelled; everything else in the
//! payload is ignored.

use serde::Deserialize;

use txr_core::domain::{ChatRef, EventKind, InboundEvent, Sender};

#[derive(Debug, Deserialize)]
pub struct TgUpdate {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<TgMessage>,
    #[serde(default)]
    pub edited_message: Option<TgMessage>,
    #[serde(default)]
    pub channel_post: Option<TgMessage>,
    #[serde(default)]
    pub edited_channel_post: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
pub struct TgMessage {
    pub chat: TgChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<TgUser>,
    #[serde(default)]
    pub migrate_to_chat_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct TgChat {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct TgUser {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl TgUpdate {
    /// `None` for update types the relay does not handle (callback queries,
    /// membership changes, ...).
    pub fn into_event(self) -> Option<InboundEvent> {
        let (kind, msg) = if let Some(m) = self.message {
            (EventKind::Message, m)
        } else if let Some(m) = self.edited_message {
            (EventKind::EditedMessage, m)
        } else if let Some(m) = self.channel_post {
            (EventKind::ChannelPost, m)
        } else if let Some(m) = self.edited_channel_post {
            (EventKind::EditedChannelPost, m)
        } else {
            return None;
        };

        let sender = msg
            .from
            .map(|u| Sender {
                id: Some(u.id),
                username: u.username,
                first_name: u.first_name,
                last_name: u.last_name,
            })
            .unwrap_or_default();

        Some(build_event(
            kind,
            msg.chat.id,
            msg.text,
            sender,
            msg.migrate_to_chat_id,
        ))
    }
}

/// Shared by the webhook and polling transports. A `message` whose text
/// starts with `/` becomes a command; edits and channel posts never do.
pub fn build_event(
    kind: EventKind,
    chat_id: i64,
    text: Option<String>,
    sender: Sender,
    migrate_to_chat_id: Option<i64>,
) -> InboundEvent {
    let kind = match (kind, text.as_deref()) {
        (EventKind::Message, Some(t)) if t.starts_with('/') => EventKind::Command,
        (k, _) => k,
    };

    InboundEvent {
        chat_id: ChatRef::from(chat_id),
        text,
        sender,
        kind,
        migrate_to_chat_id: migrate_to_chat_id.map(ChatRef::from),
    }
}
