//! Forwarding extracted data to the payment-verification API.

use serde::Serialize;

use crate::{
    config::{Config, USER_AGENT},
    errors::Error,
    Result,
};

/// Longest response excerpt kept for diagnostics.
pub const BODY_EXCERPT_LIMIT: usize = 500;

/// The verification API takes one reference and one amount per call.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RelayPayload {
    pub utr: String,
    pub amount: f64,
    pub vendor_id: i64,
}

impl RelayPayload {
    /// Reduce each extracted sequence to its head; an empty sequence becomes
    /// the empty-string / zero sentinel.
    pub fn from_extraction(reference_numbers: &[String], amounts: &[f64], vendor_id: i64) -> Self {
        Self {
            utr: head_or(reference_numbers, String::new()),
            amount: head_or(amounts, 0.0),
            vendor_id,
        }
    }
}

fn head_or<T: Clone>(items: &[T], sentinel: T) -> T {
    items.first().cloned().unwrap_or(sentinel)
}

#[derive(Clone, Debug, PartialEq)]
pub enum RelayFailure {
    Timeout,
    Network(String),
    NonOkStatus { status: u16, body_excerpt: String },
}

/// Result of one relay attempt. Failures are values: there are no retries.
#[derive(Clone, Debug, PartialEq)]
pub enum RelayOutcome {
    Success { response_body: serde_json::Value },
    Failure(RelayFailure),
}

impl RelayOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RelayOutcome::Success { .. })
    }
}

#[derive(Clone, Debug)]
pub struct RelayClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    vendor_id: i64,
}

impl RelayClient {
    pub fn new(cfg: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(cfg.http_timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;

        Ok(Self {
            http,
            endpoint: cfg.api_endpoint.clone(),
            api_key: cfg.api_key.clone(),
            vendor_id: cfg.vendor_id,
        })
    }

    pub async fn send(&self, reference_numbers: &[String], amounts: &[f64]) -> RelayOutcome {
        let payload = RelayPayload::from_extraction(reference_numbers, amounts, self.vendor_id);
        self.send_payload(&payload).await
    }

    pub async fn send_payload(&self, payload: &RelayPayload) -> RelayOutcome {
        tracing::info!(
            utr = %payload.utr,
            amount = payload.amount,
            vendor_id = payload.vendor_id,
            "sending payload to verification API"
        );

        let resp = match self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(payload)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => return RelayOutcome::Failure(classify(e)),
        };

        let status = resp.status();
        tracing::info!(status = status.as_u16(), "verification API responded");

        let body = match resp.text().await {
            Ok(body) => body,
            Err(e) => return RelayOutcome::Failure(classify(e)),
        };

        if status != reqwest::StatusCode::OK {
            let body_excerpt: String = body.chars().take(BODY_EXCERPT_LIMIT).collect();
            tracing::error!(status = status.as_u16(), body = %body_excerpt, "relay call failed");
            return RelayOutcome::Failure(RelayFailure::NonOkStatus {
                status: status.as_u16(),
                body_excerpt,
            });
        }

        match serde_json::from_str(&body) {
            Ok(response_body) => RelayOutcome::Success { response_body },
            Err(e) => {
                tracing::error!(error = %e, "verification API returned a non-JSON body");
                RelayOutcome::Failure(RelayFailure::Network(format!(
                    "invalid JSON in response: {e}"
                )))
            }
        }
    }
}

fn classify(e: reqwest::Error) -> RelayFailure {
    if e.is_timeout() {
        RelayFailure::Timeout
    } else {
        RelayFailure::Network(e.to_string())
    }
}
