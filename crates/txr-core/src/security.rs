use std::sync::Arc;

use crate::{
    config::UnauthorizedPolicy, config_cache::ConfigCache, config_cache::ConfigSnapshot,
    domain::ChatRef,
};

// ============== Authorization ==============

/// Fail-closed chat check: no (or empty) authorized chat means nobody is
/// authorized. Ids are compared in their canonical string form.
pub fn is_authorized(candidate: Option<&ChatRef>, snapshot: &ConfigSnapshot) -> bool {
    let Some(authorized) = snapshot.authorized_chat_id.as_ref() else {
        return false;
    };
    if authorized.is_empty() {
        return false;
    }
    candidate.is_some_and(|c| c.as_str() == authorized.as_str())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject,
}

/// Decides per event whether the relay may act in that chat.
pub struct AuthorizationGuard {
    cache: Arc<ConfigCache>,
    policy: UnauthorizedPolicy,
}

impl AuthorizationGuard {
    pub fn new(cache: Arc<ConfigCache>, policy: UnauthorizedPolicy) -> Self {
        Self { cache, policy }
    }

    pub fn policy(&self) -> UnauthorizedPolicy {
        self.policy
    }

    /// Follow a group → supergroup migration: the new id becomes the
    /// authorized chat for this and every later event, until the next
    /// successful config fetch replaces it. Not persisted anywhere.
    pub async fn apply_migration(&self, new_chat_id: &ChatRef) {
        match self.cache.replace_authorized_chat(new_chat_id.clone()).await {
            Some(_) => tracing::warn!(
                new_chat_id = %new_chat_id,
                "chat migrated; authorized chat id updated in memory"
            ),
            None => tracing::warn!(
                new_chat_id = %new_chat_id,
                "chat migrated but no configuration is loaded; ignoring"
            ),
        }
    }

    /// Check against the snapshot currently held by the cache.
    pub async fn check(&self, chat_id: &ChatRef) -> Verdict {
        let Some(snapshot) = self.cache.current().await else {
            tracing::warn!("no configuration loaded; rejecting");
            return Verdict::Reject;
        };
        if snapshot.authorized_chat_id.is_none() {
            tracing::warn!("no authorized chat id configured");
        }
        if is_authorized(Some(chat_id), &snapshot) {
            Verdict::Accept
        } else {
            tracing::warn!(
                chat_id = %chat_id,
                authorized = %snapshot
                    .authorized_chat_id
                    .as_ref()
                    .map(ChatRef::to_string)
                    .unwrap_or_default(),
                "unauthorized chat"
            );
            Verdict::Reject
        }
    }
}
