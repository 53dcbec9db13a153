use std::{env, time::Duration};

use crate::{domain::ChatRef, errors::Error, Result};

pub const DEFAULT_API_ENDPOINT: &str = "https://httpbin.org/post";
pub const DEFAULT_BOT_CONFIG_ENDPOINT: &str =
    "https://ztakepayments.vercel.app/api/vendor/bot-token-secure";
pub const DEFAULT_VENDOR_ID: i64 = 3;
pub const DEFAULT_CONFIG_TTL: Duration = Duration::from_secs(300);
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Client identifier sent with every outbound API call.
pub const USER_AGENT: &str = concat!("txr-relay/", env!("CARGO_PKG_VERSION"));

/// What to do with events from chats other than the authorized one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnauthorizedPolicy {
    /// Drop without a reply (avoids noise in groups the bot was added to).
    #[default]
    Silent,
    /// Reply with a short "unauthorized" notice.
    Verbose,
}

impl UnauthorizedPolicy {
    fn parse(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "silent" => Ok(Self::Silent),
            "verbose" | "reply" => Ok(Self::Verbose),
            other => Err(Error::Config(format!(
                "UNAUTHORIZED_REPLY must be `silent` or `verbose`, got `{other}`"
            ))),
        }
    }
}

/// Typed process configuration, read from the environment.
#[derive(Clone, Debug)]
pub struct Config {
    // Downstream APIs
    pub api_endpoint: String,
    pub api_key: String,
    pub vendor_id: i64,
    pub bot_config_endpoint: String,

    // Static overrides (used when the config API omits a field or is unreachable at startup)
    pub static_bot_token: Option<String>,
    pub static_chat_id: Option<ChatRef>,

    // Webhook server
    pub webhook_url: Option<String>,
    pub host: String,
    pub port: u16,
    pub telegram_api_url: Option<String>,

    // Runtime constants
    pub config_ttl: Duration,
    pub http_timeout: Duration,
    pub unauthorized_policy: UnauthorizedPolicy,
}

impl Config {
    /// Load from the process environment, after merging `.env` if present.
    pub fn load() -> Result<Self> {
        // Never overrides variables that are already set.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the real environment in `load`).
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let str_or = |key: &str, default: &str| {
            get(key)
                .and_then(non_empty)
                .unwrap_or_else(|| default.to_string())
        };

        let vendor_id = match get("VENDOR_ID").and_then(non_empty) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                Error::Config(format!("VENDOR_ID must be an integer, got `{raw}`"))
            })?,
            None => DEFAULT_VENDOR_ID,
        };

        let port = parse_num::<u16>(&get, "PORT")?.unwrap_or(5000);
        let config_ttl = parse_num::<u64>(&get, "CONFIG_CACHE_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_CONFIG_TTL);
        let http_timeout = parse_num::<u64>(&get, "HTTP_TIMEOUT_SECONDS")?
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_HTTP_TIMEOUT);
        if http_timeout.is_zero() {
            return Err(Error::Config(
                "HTTP_TIMEOUT_SECONDS must be greater than zero".to_string(),
            ));
        }

        let unauthorized_policy = match get("UNAUTHORIZED_REPLY") {
            Some(raw) => UnauthorizedPolicy::parse(&raw)?,
            None => UnauthorizedPolicy::default(),
        };

        Ok(Self {
            api_endpoint: str_or("API_ENDPOINT", DEFAULT_API_ENDPOINT),
            api_key: str_or("API_KEY", "test-key"),
            vendor_id,
            bot_config_endpoint: str_or("BOT_CONFIG_ENDPOINT", DEFAULT_BOT_CONFIG_ENDPOINT),
            static_bot_token: get("BOT_TOKEN").and_then(non_empty),
            static_chat_id: get("AUTHORIZED_CHAT_ID")
                .and_then(non_empty)
                .map(ChatRef::from),
            webhook_url: get("WEBHOOK_URL")
                .and_then(non_empty)
                .map(|u| u.trim_end_matches('/').to_string()),
            host: str_or("HOST", "0.0.0.0"),
            port,
            telegram_api_url: get("TELEGRAM_API_URL").and_then(non_empty),
            config_ttl,
            http_timeout,
            unauthorized_policy,
        })
    }

    /// Where Telegram should deliver updates, if a public URL is configured.
    pub fn webhook_endpoint(&self) -> Option<String> {
        self.webhook_url.as_ref().map(|base| format!("{base}/webhook"))
    }
}

fn parse_num<T: std::str::FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    let Some(raw) = get(key).and_then(non_empty) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} must be a number, got `{raw}`")))
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.api_endpoint, DEFAULT_API_ENDPOINT);
        assert_eq!(cfg.bot_config_endpoint, DEFAULT_BOT_CONFIG_ENDPOINT);
        assert_eq!(cfg.vendor_id, 3);
        assert_eq!(cfg.port, 5000);
        assert_eq!(cfg.config_ttl, Duration::from_secs(300));
        assert_eq!(cfg.http_timeout, Duration::from_secs(10));
        assert_eq!(cfg.unauthorized_policy, UnauthorizedPolicy::Silent);
        assert!(cfg.static_bot_token.is_none());
        assert!(cfg.webhook_endpoint().is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = Config::from_lookup(lookup(&[
            ("VENDOR_ID", " 42 "),
            ("BOT_TOKEN", "123:abc"),
            ("AUTHORIZED_CHAT_ID", "-100200"),
            ("WEBHOOK_URL", "https://relay.example.com/"),
            ("UNAUTHORIZED_REPLY", "Verbose"),
            ("CONFIG_CACHE_SECONDS", "60"),
        ]))
        .unwrap();
        assert_eq!(cfg.vendor_id, 42);
        assert_eq!(cfg.static_bot_token.as_deref(), Some("123:abc"));
        assert_eq!(cfg.static_chat_id, Some(ChatRef::from(-100200)));
        assert_eq!(
            cfg.webhook_endpoint().as_deref(),
            Some("https://relay.example.com/webhook")
        );
        assert_eq!(cfg.unauthorized_policy, UnauthorizedPolicy::Verbose);
        assert_eq!(cfg.config_ttl, Duration::from_secs(60));
    }

    #[test]
    fn blank_overrides_count_as_unset() {
        let cfg = Config::from_lookup(lookup(&[("BOT_TOKEN", "  "), ("VENDOR_ID", "")])).unwrap();
        assert!(cfg.static_bot_token.is_none());
        assert_eq!(cfg.vendor_id, DEFAULT_VENDOR_ID);
    }

    #[test]
    fn invalid_numbers_are_config_errors() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("VENDOR_ID", "three")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "99999")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("HTTP_TIMEOUT_SECONDS", "0")])),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("UNAUTHORIZED_REPLY", "loud")])),
            Err(Error::Config(_))
        ));
    }
}
