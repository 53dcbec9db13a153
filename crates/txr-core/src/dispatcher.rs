//! Per-event orchestration: config refresh → authorization → routing →
//! extraction → relay → replies.
//!
//! Every failure below this boundary is logged and turned into either a
//! user-visible reply or a silent drop; nothing propagates to the transport.

use std::sync::Arc;

use tracing::Instrument;

use crate::{
    config::UnauthorizedPolicy,
    config_cache::{ConfigCache, ConfigSnapshot},
    domain::{ChatRef, EventKind, InboundEvent},
    errors::ConfigFetchError,
    extraction::{self, ExtractionResult},
    formatting,
    messaging::port::ReplyPort,
    relay::{RelayClient, RelayOutcome},
    security::{AuthorizationGuard, Verdict},
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// No snapshot could be fetched and none was cached.
    ConfigUnavailable,
    Unauthorized,
    NoText,
    UnhandledKind,
    UnknownCommand,
}

/// Terminal state of one dispatch cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum DispatchOutcome {
    Dropped(DropReason),
    /// A recognized command was answered.
    Command(String),
    /// Nothing extractable; one "nothing found" reply sent.
    NothingFound,
    /// Extracted data was relayed; intermediate and final replies sent.
    Relayed {
        extracted: ExtractionResult,
        outcome: RelayOutcome,
    },
}

pub struct EventDispatcher {
    cache: Arc<ConfigCache>,
    guard: AuthorizationGuard,
    relay: RelayClient,
    replies: Arc<dyn ReplyPort>,
}

impl EventDispatcher {
    pub fn new(
        cache: Arc<ConfigCache>,
        relay: RelayClient,
        replies: Arc<dyn ReplyPort>,
        policy: UnauthorizedPolicy,
    ) -> Self {
        Self {
            guard: AuthorizationGuard::new(cache.clone(), policy),
            cache,
            relay,
            replies,
        }
    }

    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }

    /// Force a configuration fetch (manual refresh endpoint / CLI).
    pub async fn refresh_configuration(
        &self,
    ) -> std::result::Result<Arc<ConfigSnapshot>, ConfigFetchError> {
        tracing::info!("force refreshing bot configuration");
        self.cache.ensure_fresh(true).await
    }

    /// Single entry point for transports. Safe to call concurrently for
    /// independent events.
    pub async fn handle_event(&self, event: InboundEvent) -> DispatchOutcome {
        let span = tracing::info_span!(
            "dispatch",
            kind = %event.kind,
            chat_id = %event.chat_id,
        );
        async move {
            let outcome = self.dispatch(event).await;
            match &outcome {
                DispatchOutcome::Dropped(reason) => tracing::info!(?reason, "event dropped"),
                DispatchOutcome::Relayed { outcome, .. } if !outcome.is_success() => {
                    tracing::warn!(?outcome, "relay failed")
                }
                other => tracing::debug!(?other, "event handled"),
            }
            outcome
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        // Always refresh so authorization uses the newest chat id.
        if let Err(e) = self.cache.ensure_fresh(true).await {
            if self.cache.current().await.is_none() {
                tracing::error!(error = %e, "no bot configuration available");
                return DispatchOutcome::Dropped(DropReason::ConfigUnavailable);
            }
            tracing::warn!(error = %e, "config refresh failed; using last known configuration");
        }

        if let Some(new_chat_id) = &event.migrate_to_chat_id {
            self.guard.apply_migration(new_chat_id).await;
        }

        if event.kind == EventKind::Other {
            return DispatchOutcome::Dropped(DropReason::UnhandledKind);
        }
        let Some(text) = event.text.as_deref() else {
            return DispatchOutcome::Dropped(DropReason::NoText);
        };

        if self.guard.check(&event.chat_id).await == Verdict::Reject {
            if self.guard.policy() == UnauthorizedPolicy::Verbose {
                self.reply(&event.chat_id, &formatting::unauthorized_text())
                    .await;
            }
            return DispatchOutcome::Dropped(DropReason::Unauthorized);
        }

        tracing::debug!(
            sender_id = ?event.sender.id,
            sender_username = event.sender.username.as_deref().unwrap_or(""),
            "authorized event"
        );

        match event.kind {
            EventKind::Command => self.handle_command(&event.chat_id, text).await,
            _ => self.process_text(&event.chat_id, text).await,
        }
    }

    async fn handle_command(&self, chat_id: &ChatRef, text: &str) -> DispatchOutcome {
        let (cmd, _args) = parse_command(text);
        let reply = match cmd.as_str() {
            "start" => formatting::welcome_text(),
            "help" => formatting::help_text(),
            "test" => {
                formatting::sample_extraction_text(&extraction::extract(formatting::SAMPLE_SMS))
            }
            _ => return DispatchOutcome::Dropped(DropReason::UnknownCommand),
        };
        self.reply(chat_id, &reply).await;
        DispatchOutcome::Command(cmd)
    }

    async fn process_text(&self, chat_id: &ChatRef, text: &str) -> DispatchOutcome {
        let extracted = extraction::extract(text);
        if extracted.is_empty() {
            self.reply(chat_id, &formatting::nothing_found_text()).await;
            return DispatchOutcome::NothingFound;
        }

        self.reply(chat_id, &formatting::extracted_text(&extracted))
            .await;

        let outcome = self
            .relay
            .send(&extracted.reference_numbers, &extracted.amounts)
            .await;

        self.reply(chat_id, &formatting::relay_outcome_text(&outcome))
            .await;

        DispatchOutcome::Relayed { extracted, outcome }
    }

    async fn reply(&self, chat_id: &ChatRef, text: &str) {
        if let Err(e) = self.replies.send_reply(chat_id, text).await {
            tracing::warn!(error = %e, "failed to send reply");
        }
    }
}

/// Split `/cmd@botname args` into a lowercase command name and the rest.
pub fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}
