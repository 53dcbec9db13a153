//! Runtime configuration fetched from the vendor configuration API.
//!
//! The current [`ConfigSnapshot`] is replaced whole behind a lock, so readers
//! never observe a half-updated value. Refreshes are serialized; a failed
//! fetch leaves the previous snapshot in place.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::{
    config::{Config, USER_AGENT},
    domain::ChatRef,
    errors::{ConfigFetchError, Error},
    Result,
};

/// Cached credentials + authorization target.
#[derive(Clone, Debug, PartialEq)]
pub struct ConfigSnapshot {
    pub bot_token: Option<String>,
    pub authorized_chat_id: Option<ChatRef>,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl ConfigSnapshot {
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>) -> bool {
        self.age_at(now) >= self.ttl
    }
}

/// Shape of the configuration API response. Only `bot_token` and `chat_id`
/// drive behavior; the rest is logged.
#[derive(Debug, Deserialize)]
struct RemoteBotConfig {
    #[serde(default)]
    bot_token: Option<String>,
    #[serde(default)]
    chat_id: serde_json::Value,
    #[serde(default)]
    vendor_id: serde_json::Value,
    #[serde(default)]
    business_name: Option<String>,
}

pub struct ConfigCache {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    vendor_id: i64,
    ttl: Duration,
    static_bot_token: Option<String>,
    static_chat_id: Option<ChatRef>,
    current: RwLock<Option<Arc<ConfigSnapshot>>>,
    refresh_lock: Mutex<()>,
}

impl ConfigCache {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;

        Ok(Self {
            http,
            endpoint: cfg.bot_config_endpoint.clone(),
            api_key: cfg.api_key.clone(),
            vendor_id: cfg.vendor_id,
            ttl: cfg.config_ttl,
            static_bot_token: cfg.static_bot_token.clone(),
            static_chat_id: cfg.static_chat_id.clone(),
            current: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// The snapshot as it is right now, stale or not.
    pub async fn current(&self) -> Option<Arc<ConfigSnapshot>> {
        self.current.read().await.clone()
    }

    /// Return a fresh snapshot, fetching only when forced or when the cached
    /// one has outlived its ttl.
    pub async fn ensure_fresh(
        &self,
        force: bool,
    ) -> std::result::Result<Arc<ConfigSnapshot>, ConfigFetchError> {
        self.ensure_fresh_at(force, Utc::now()).await
    }

    pub async fn ensure_fresh_at(
        &self,
        force: bool,
        now: DateTime<Utc>,
    ) -> std::result::Result<Arc<ConfigSnapshot>, ConfigFetchError> {
        if !force {
            if let Some(snap) = self.current().await {
                if !snap.is_stale_at(now) {
                    tracing::debug!("using cached bot configuration");
                    return Ok(snap);
                }
            }
        }

        let _guard = self.refresh_lock.lock().await;
        let remote = self.fetch().await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to fetch bot configuration");
        })?;

        tracing::info!(
            vendor_id = %remote.vendor_id,
            business_name = remote.business_name.as_deref().unwrap_or(""),
            "bot configuration loaded"
        );

        let mut current = self.current.write().await;
        let previous = current.clone();
        let fetched_at = match &previous {
            Some(prev) if prev.fetched_at > now => prev.fetched_at,
            _ => now,
        };
        let snap = Arc::new(ConfigSnapshot {
            bot_token: remote.bot_token.or_else(|| self.static_bot_token.clone()),
            authorized_chat_id: ChatRef::from_json(&remote.chat_id)
                .or_else(|| self.static_chat_id.clone()),
            fetched_at,
            ttl: self.ttl,
        });

        if let Some(prev) = previous {
            if prev.authorized_chat_id.is_some()
                && prev.authorized_chat_id != snap.authorized_chat_id
            {
                tracing::warn!(
                    from = %display_chat(&prev.authorized_chat_id),
                    to = %display_chat(&snap.authorized_chat_id),
                    "authorization target changed"
                );
            }
        }

        *current = Some(snap.clone());
        Ok(snap)
    }

    /// Install a snapshot built from the static env overrides. Used at
    /// startup when the configuration API is unreachable but `BOT_TOKEN` is set.
    pub async fn seed_from_overrides(&self) -> Option<Arc<ConfigSnapshot>> {
        self.static_bot_token.as_ref()?;
        let snap = Arc::new(ConfigSnapshot {
            bot_token: self.static_bot_token.clone(),
            authorized_chat_id: self.static_chat_id.clone(),
            fetched_at: Utc::now(),
            ttl: self.ttl,
        });
        *self.current.write().await = Some(snap.clone());
        Some(snap)
    }

    /// Swap in a snapshot whose authorized chat is `chat_id`, everything else
    /// unchanged. In-memory only; the next successful fetch overwrites it.
    pub async fn replace_authorized_chat(&self, chat_id: ChatRef) -> Option<Arc<ConfigSnapshot>> {
        let mut current = self.current.write().await;
        let prev = current.as_ref()?;
        let snap = Arc::new(ConfigSnapshot {
            authorized_chat_id: Some(chat_id),
            ..prev.as_ref().clone()
        });
        *current = Some(snap.clone());
        Some(snap)
    }

    async fn fetch(&self) -> std::result::Result<RemoteBotConfig, ConfigFetchError> {
        tracing::info!(endpoint = %self.endpoint, vendor_id = self.vendor_id, "fetching bot configuration");

        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[("vendor_id", self.vendor_id)])
            .bearer_auth(&self.api_key)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConfigFetchError::Status {
                status: status.as_u16(),
                body: body.chars().take(200).collect(),
            });
        }

        let body = resp.text().await.map_err(classify_transport_error)?;
        serde_json::from_str::<RemoteBotConfig>(&body)
            .map_err(|e| ConfigFetchError::Malformed(e.to_string()))
    }
}

fn classify_transport_error(e: reqwest::Error) -> ConfigFetchError {
    if e.is_timeout() {
        ConfigFetchError::Timeout
    } else {
        ConfigFetchError::Network(e.to_string())
    }
}

fn display_chat(chat: &Option<ChatRef>) -> String {
    chat.as_ref()
        .map(ChatRef::to_string)
        .unwrap_or_else(|| "<none>".to_string())
}
