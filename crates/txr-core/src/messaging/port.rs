use async_trait::async_trait;

use crate::{domain::ChatRef, Result};

/// Outbound reply port, implemented by the transport.
///
/// Texts are Telegram-style HTML; implementations for plain-text transports
/// should strip or ignore the markup.
#[async_trait]
pub trait ReplyPort: Send + Sync {
    async fn send_reply(&self, chat_id: &ChatRef, text: &str) -> Result<()>;
}
