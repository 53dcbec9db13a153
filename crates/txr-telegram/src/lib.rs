//! Telegram adapter (teloxide + axum).
//!
//! Implements the `txr-core` ReplyPort over the Telegram Bot API and feeds
//! inbound updates, from the webhook server or long polling, into the
//! dispatcher.

use std::sync::Arc;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{ParseMode, Recipient},
};

use tokio::{sync::Mutex, time::sleep};

pub mod polling;
pub mod webhook;
pub mod wire;

use txr_core::{
    config_cache::ConfigCache, domain::ChatRef, errors::Error, messaging::port::ReplyPort,
    Result,
};

/// Sends replies with whatever bot token the config cache currently holds.
pub struct TelegramMessenger {
    cache: Arc<ConfigCache>,
    api_url: Option<reqwest::Url>,
    // (token, bot built for that token)
    bot: Mutex<Option<(String, Bot)>>,
}

impl TelegramMessenger {
    pub fn new(cache: Arc<ConfigCache>, api_url: Option<&str>) -> Result<Self> {
        let api_url = api_url
            .map(|raw| {
                reqwest::Url::parse(raw)
                    .map_err(|e| Error::Config(format!("TELEGRAM_API_URL is not a valid URL: {e}")))
            })
            .transpose()?;

        Ok(Self {
            cache,
            api_url,
            bot: Mutex::new(None),
        })
    }

    /// Bot bound to the current snapshot's token; rebuilt when the token rotates.
    pub async fn bot(&self) -> Result<Bot> {
        let token = self
            .cache
            .current()
            .await
            .and_then(|snap| snap.bot_token.clone())
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| Error::Config("bot token not configured".to_string()))?;

        let mut slot = self.bot.lock().await;
        if let Some((cached, bot)) = slot.as_ref() {
            if *cached == token {
                return Ok(bot.clone());
            }
        }

        if slot.is_some() {
            tracing::info!("bot token changed; rebuilding telegram client");
        }
        let mut bot = Bot::new(token.clone());
        if let Some(url) = &self.api_url {
            bot = bot.set_api_url(url.clone());
        }
        *slot = Some((token, bot.clone()));
        Ok(bot)
    }

    /// Register `url` as the webhook, clearing any previous registration first.
    pub async fn set_webhook(&self, url: &str) -> Result<()> {
        let url = reqwest::Url::parse(url)
            .map_err(|e| Error::Config(format!("invalid webhook url `{url}`: {e}")))?;
        let bot = self.bot().await?;

        self.with_retry(|| bot.delete_webhook()).await?;
        self.with_retry(|| bot.set_webhook(url.clone())).await?;
        tracing::info!(url = %url, "webhook registered");
        Ok(())
    }

    pub async fn webhook_info(&self) -> Result<serde_json::Value> {
        let bot = self.bot().await?;
        let info = self.with_retry(|| bot.get_webhook_info()).await?;
        Ok(serde_json::to_value(info)?)
    }

    fn recipient(chat_id: &ChatRef) -> Recipient {
        match chat_id.as_i64() {
            Some(id) => Recipient::Id(teloxide::types::ChatId(id)),
            None => Recipient::ChannelUsername(chat_id.as_str().to_string()),
        }
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(retry_after = ?d, "telegram rate limit hit; retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

#[async_trait]
impl ReplyPort for TelegramMessenger {
    async fn send_reply(&self, chat_id: &ChatRef, text: &str) -> Result<()> {
        let bot = self.bot().await?;
        let recipient = Self::recipient(chat_id);
        self.with_retry(|| {
            bot.send_message(recipient.clone(), text.to_string())
                .parse_mode(ParseMode::Html)
        })
        .await?;
        Ok(())
    }
}
