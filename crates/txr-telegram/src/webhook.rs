//! Webhook server and its operational endpoints.

use std::sync::Arc;

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use tokio::net::TcpListener;

use txr_core::{
    config::Config,
    dispatcher::{DispatchOutcome, DropReason, EventDispatcher},
};

use crate::{wire::TgUpdate, TelegramMessenger};

type JsonReply = (StatusCode, Json<Value>);

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub dispatcher: Arc<EventDispatcher>,
    pub messenger: Arc<TelegramMessenger>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .route("/set_webhook", post(set_webhook))
        .route("/webhook_info", get(webhook_info))
        .route("/bot_config", get(bot_config))
        .route("/refresh_config", post(refresh_config))
        .with_state(state)
}

/// Bind `HOST:PORT` and serve until Ctrl-C.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.cfg.host, state.cfg.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    tracing::info!(%addr, "webhook server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("server error")?;

    Ok(())
}

fn reply(status: StatusCode, body: Value) -> JsonReply {
    (status, Json(body))
}

async fn home(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "online",
        "service": "txr-relay",
        "webhook_path": "/webhook",
        "vendor_id": state.cfg.vendor_id,
        "bot_config_endpoint": state.cfg.bot_config_endpoint,
    }))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn webhook(State(state): State<AppState>, body: Bytes) -> JsonReply {
    if body.is_empty() {
        return reply(StatusCode::BAD_REQUEST, json!({"error": "No data received"}));
    }

    let update: TgUpdate = match serde_json::from_slice(&body) {
        Ok(u) => u,
        Err(e) => {
            tracing::warn!(error = %e, "unparseable webhook body");
            return reply(
                StatusCode::BAD_REQUEST,
                json!({"error": format!("invalid update: {e}")}),
            );
        }
    };

    let update_id = update.update_id;
    let Some(event) = update.into_event() else {
        tracing::debug!(?update_id, "unhandled update type; refreshing config only");
        if let Err(e) = state.dispatcher.refresh_configuration().await {
            if state.dispatcher.cache().current().await.is_none() {
                tracing::error!(error = %e, "no bot configuration available");
                return reply(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({"error": "Failed to fetch bot configuration"}),
                );
            }
        }
        return reply(StatusCode::OK, json!({"ok": true}));
    };

    match state.dispatcher.handle_event(event).await {
        DispatchOutcome::Dropped(DropReason::ConfigUnavailable) => reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({"error": "Failed to fetch bot configuration"}),
        ),
        _ => reply(StatusCode::OK, json!({"ok": true})),
    }
}

async fn set_webhook(State(state): State<AppState>) -> JsonReply {
    let Some(url) = state.cfg.webhook_endpoint() else {
        return reply(
            StatusCode::BAD_REQUEST,
            json!({"error": "WEBHOOK_URL not configured"}),
        );
    };

    if let Err(e) = state.dispatcher.cache().ensure_fresh(false).await {
        if state.dispatcher.cache().current().await.is_none() {
            return reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": format!("Failed to fetch bot configuration: {e}")}),
            );
        }
    }

    match state.messenger.set_webhook(&url).await {
        Ok(()) => reply(
            StatusCode::OK,
            json!({"success": true, "webhook_url": url}),
        ),
        Err(e) => {
            tracing::error!(error = %e, "failed to set webhook");
            reply(
                StatusCode::BAD_GATEWAY,
                json!({"success": false, "error": e.to_string()}),
            )
        }
    }
}

async fn webhook_info(State(state): State<AppState>) -> JsonReply {
    if let Err(e) = state.dispatcher.cache().ensure_fresh(false).await {
        if state.dispatcher.cache().current().await.is_none() {
            return reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({"error": format!("Failed to fetch bot configuration: {e}")}),
            );
        }
    }

    match state.messenger.webhook_info().await {
        Ok(info) => reply(StatusCode::OK, json!({"ok": true, "result": info})),
        Err(e) => reply(
            StatusCode::BAD_GATEWAY,
            json!({"error": format!("Failed to get webhook info: {e}")}),
        ),
    }
}

async fn bot_config(State(state): State<AppState>) -> Json<Value> {
    let cache = state.dispatcher.cache();
    let snapshot = cache.current().await;
    let now = Utc::now();

    Json(json!({
        "bot_token_configured": snapshot.as_ref().is_some_and(|s| s.bot_token.is_some()),
        "authorized_chat_id": snapshot
            .as_ref()
            .and_then(|s| s.authorized_chat_id.as_ref())
            .map(|c| c.to_string()),
        "vendor_id": state.cfg.vendor_id,
        "api_endpoint": state.cfg.api_endpoint,
        "last_config_fetch": snapshot.as_ref().map(|s| s.fetched_at.to_rfc3339()),
        "seconds_since_last_fetch": snapshot.as_ref().map(|s| s.age_at(now).as_secs_f64()),
        "stale": snapshot.as_ref().map_or(true, |s| s.is_stale_at(now)),
        "cache_duration": cache.ttl().as_secs(),
    }))
}

async fn refresh_config(State(state): State<AppState>) -> JsonReply {
    match state.dispatcher.refresh_configuration().await {
        Ok(snap) => reply(
            StatusCode::OK,
            json!({
                "success": true,
                "message": "Bot configuration refreshed successfully",
                "authorized_chat_id": snap.authorized_chat_id.as_ref().map(|c| c.to_string()),
                "bot_token_configured": snap.bot_token.is_some(),
            }),
        ),
        Err(e) => reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            json!({
                "success": false,
                "message": "Failed to refresh bot configuration",
                "error": e.to_string(),
            }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use mockito::{Matcher, ServerGuard};
    use txr_core::{config_cache::ConfigCache, relay::RelayClient};

    use super::*;
    use crate::tests::{config_for, sent_message_body, TOKEN};

    const AUTHORIZED: i64 = -1001;

    async fn spawn_app(cfg: Config) -> String {
        let cfg = Arc::new(cfg);
        let cache = Arc::new(ConfigCache::new(&cfg).unwrap());
        let messenger = Arc::new(
            TelegramMessenger::new(cache.clone(), cfg.telegram_api_url.as_deref()).unwrap(),
        );
        let dispatcher = Arc::new(EventDispatcher::new(
            cache,
            RelayClient::new(&cfg).unwrap(),
            messenger.clone(),
            cfg.unauthorized_policy,
        ));
        let state = AppState {
            cfg,
            dispatcher,
            messenger,
        };

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn mock_config(server: &mut ServerGuard) -> mockito::Mock {
        server
            .mock("GET", "/config")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(
                r#"{{"bot_token":"{TOKEN}","chat_id":{AUTHORIZED},"vendor_id":7,"business_name":"Acme"}}"#
            ))
            .create_async()
            .await
    }

    #[tokio::test]
    async fn health_and_home() {
        let base = spawn_app(config_for("http://127.0.0.1:9", &[])).await;
        let client = reqwest::Client::new();

        let health: Value = client
            .get(format!("{base}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health, json!({"status": "healthy"}));

        let home: Value = client.get(&base).send().await.unwrap().json().await.unwrap();
        assert_eq!(home["status"], "online");
        assert_eq!(home["vendor_id"], 7);
    }

    #[tokio::test]
    async fn unparseable_webhook_body_is_rejected() {
        let base = spawn_app(config_for("http://127.0.0.1:9", &[])).await;
        let client = reqwest::Client::new();

        for body in ["", "not json", r#"{"message": {"text": "no chat"}}"#] {
            let resp = client
                .post(format!("{base}/webhook"))
                .body(body)
                .send()
                .await
                .unwrap();
            assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST, "{body}");
        }
    }

    #[tokio::test]
    async fn webhook_update_is_relayed_and_answered() {
        let mut server = mockito::Server::new_async().await;
        let _config = mock_config(&mut server).await;
        let relay = server
            .mock("POST", "/relay")
            .match_body(Matcher::Json(json!({
                "utr": "123456789012",
                "amount": 500.0,
                "vendor_id": 7
            })))
            .with_status(200)
            .with_body(r#"{"status":"verified"}"#)
            .expect(1)
            .create_async()
            .await;
        let telegram = server
            .mock("POST", Matcher::Regex(r"(?i)/sendmessage$".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(sent_message_body(AUTHORIZED))
            .expect(2)
            .create_async()
            .await;

        let base = spawn_app(config_for(&server.url(), &[])).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .json(&json!({
                "update_id": 1,
                "message": {
                    "message_id": 3,
                    "date": 1700000000,
                    "chat": {"id": AUTHORIZED, "type": "supergroup", "title": "Payments"},
                    "text": "Rs 500 received, UPI Ref no 123456789012"
                }
            }))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        relay.assert_async().await;
        telegram.assert_async().await;
    }

    #[tokio::test]
    async fn unhandled_update_without_id_still_refreshes_config() {
        let mut server = mockito::Server::new_async().await;
        let config = server
            .mock("GET", "/config")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body(format!(r#"{{"bot_token":"{TOKEN}","chat_id":{AUTHORIZED}}}"#))
            .expect(1)
            .create_async()
            .await;

        let base = spawn_app(config_for(&server.url(), &[])).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .json(&json!({"callback_query": {"id": "1", "data": "x"}}))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        config.assert_async().await;
    }

    #[tokio::test]
    async fn webhook_reports_missing_configuration() {
        let mut server = mockito::Server::new_async().await;
        let _config = server
            .mock("GET", "/config")
            .match_query(Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let base = spawn_app(config_for(&server.url(), &[])).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/webhook"))
            .json(&json!({"update_id": 1, "message": {"chat": {"id": AUTHORIZED}, "text": "Rs 5"}}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn bot_config_reflects_refresh() {
        let mut server = mockito::Server::new_async().await;
        let _config = mock_config(&mut server).await;

        let base = spawn_app(config_for(&server.url(), &[])).await;
        let client = reqwest::Client::new();

        let before: Value = client
            .get(format!("{base}/bot_config"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(before["bot_token_configured"], false);
        assert_eq!(before["authorized_chat_id"], Value::Null);
        assert_eq!(before["cache_duration"], 300);

        let refreshed: Value = client
            .post(format!("{base}/refresh_config"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(refreshed["success"], true);
        assert_eq!(refreshed["authorized_chat_id"], "-1001");

        let after: Value = client
            .get(format!("{base}/bot_config"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(after["bot_token_configured"], true);
        assert_eq!(after["authorized_chat_id"], "-1001");
        assert_eq!(after["stale"], false);
        assert!(after["seconds_since_last_fetch"].as_f64().unwrap() < 60.0);
    }

    #[tokio::test]
    async fn refresh_failure_is_a_server_error() {
        let mut server = mockito::Server::new_async().await;
        let _config = server
            .mock("GET", "/config")
            .match_query(Matcher::Any)
            .with_status(500)
            .create_async()
            .await;

        let base = spawn_app(config_for(&server.url(), &[])).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/refresh_config"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn set_webhook_requires_public_url() {
        let base = spawn_app(config_for("http://127.0.0.1:9", &[])).await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/set_webhook"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn set_webhook_replaces_registration() {
        let mut server = mockito::Server::new_async().await;
        let _config = mock_config(&mut server).await;
        let delete = server
            .mock("POST", Matcher::Regex(r"(?i)/deletewebhook$".to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":true}"#)
            .expect(1)
            .create_async()
            .await;
        let set = server
            .mock("POST", Matcher::Regex(r"(?i)/setwebhook$".to_string()))
            .match_body(Matcher::PartialJson(json!({
                "url": "https://relay.example.com/webhook"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":true,"result":true}"#)
            .expect(1)
            .create_async()
            .await;

        let base = spawn_app(config_for(
            &server.url(),
            &[("WEBHOOK_URL", "https://relay.example.com/")],
        ))
        .await;
        let resp = reqwest::Client::new()
            .post(format!("{base}/set_webhook"))
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["webhook_url"], "https://relay.example.com/webhook");
        delete.assert_async().await;
        set.assert_async().await;
    }
}
