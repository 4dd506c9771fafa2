//! Bakong open-API client — settlement lookups by transaction md5.
//!
//! The gateway always answers HTTP 200 for a well-formed request and signals
//! the outcome through `responseCode`: `0` means the transaction settled and
//! `data` carries the settlement details; anything else means "not yet".
//! Transport failures bubble up as retryable errors — the poller logs them
//! and keeps its interval.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;

#[derive(Debug, Deserialize)]
pub struct CheckResponse {
    #[serde(rename = "responseCode")]
    pub response_code: i64,
    #[serde(rename = "responseMessage")]
    pub response_message: Option<String>,
    pub data: Option<Value>,
}

/// Outcome of one settlement check.
#[derive(Debug, Clone)]
pub enum CheckOutcome {
    /// Settled; carries the gateway's settlement payload.
    Paid(Value),
    /// Known to the gateway but not settled yet (or not seen at all).
    NotYet,
}

/// Seam between the poller and the outside world; tests substitute a stub.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn check_transaction(&self, md5: &str) -> Result<CheckOutcome>;
}

#[derive(Clone)]
pub struct BakongClient {
    client: Client,
    base_url: String,
    token: String,
}

impl BakongClient {
    pub fn new(client: Client, base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token: token.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for BakongClient {
    async fn check_transaction(&self, md5: &str) -> Result<CheckOutcome> {
        let response = self
            .client
            .post(format!("{}/v1/check_transaction_by_md5", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "md5": md5 }))
            .send()
            .await?
            .error_for_status()?;

        let body: CheckResponse = response.json().await?;
        if body.response_code == 0 {
            Ok(CheckOutcome::Paid(body.data.unwrap_or(Value::Null)))
        } else {
            debug!(
                %md5,
                code = body.response_code,
                message = body.response_message.as_deref().unwrap_or(""),
                "transaction not settled"
            );
            Ok(CheckOutcome::NotYet)
        }
    }
}
