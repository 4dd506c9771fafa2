//! Axum REST API handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tracing::info;

use khqr::{Currency, KhqrBuilder};

use crate::db::{self, ProfileRecord};
use crate::errors::{Result, ServerError};
use crate::events::PaymentEvent;
use crate::sessions::PendingDonation;
use crate::{poller, qr, AppState};

// ─────────────────────────────────────────────────────────
// Request / response shapes
// ─────────────────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateKhqrRequest {
    pub account_type: Option<String>,
    #[serde(rename = "bakongAccountID")]
    pub bakong_account_id: Option<String>,
    pub merchant_name: Option<String>,
    pub merchant_city: Option<String>,
    pub currency: Option<String>,
    pub amount: Option<f64>,
    pub merchant_id: Option<String>,
    pub acquiring_bank: Option<String>,
    pub bill_number: Option<String>,
    pub mobile_number: Option<String>,
    pub store_label: Option<String>,
    pub terminal_label: Option<String>,
    pub purpose: Option<String>,
}

#[derive(Deserialize)]
pub struct DonationRequest {
    /// The frontend sends either a JSON number or a numeric string.
    pub amount: Option<Value>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationResponse {
    pub qr_data: String,
    pub md5: String,
    pub subscribe_url: String,
    pub countdown_secs: u64,
    pub expires_at: String,
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

// ─────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// `POST /api/user/generate-khqr`
///
/// Full-option KHQR creation for the authenticated profile.  The generated
/// payload is decoded back and the snapshot persisted onto the profile.
pub async fn generate_khqr(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<GenerateKhqrRequest>,
) -> Result<Json<Value>> {
    let profile = authenticate(&state, &headers).await?;

    let account_id = req
        .bakong_account_id
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServerError::InvalidInput("bakongAccountID is required".to_string()))?;
    let merchant_name = req
        .merchant_name
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ServerError::InvalidInput("merchantName is required".to_string()))?;

    let mut builder = match req.account_type.as_deref() {
        Some("individual") => KhqrBuilder::individual(account_id, merchant_name),
        Some("merchant") => KhqrBuilder::merchant(account_id, merchant_name),
        Some(other) => {
            return Err(ServerError::InvalidInput(format!(
                "Unknown accountType: {other}"
            )))
        }
        None => return Err(ServerError::InvalidInput("accountType is required".to_string())),
    };

    if let Some(currency) = &req.currency {
        builder = builder.currency(
            Currency::from_alpha_code(currency)
                .map_err(|e| ServerError::InvalidInput(e.to_string()))?,
        );
    }
    if let Some(amount) = req.amount {
        builder = builder.amount(amount);
    }
    if let Some(v) = req.merchant_city {
        builder = builder.merchant_city(v);
    }
    if let Some(v) = req.merchant_id {
        builder = builder.merchant_id(v);
    }
    if let Some(v) = req.acquiring_bank {
        builder = builder.acquiring_bank(v);
    }
    if let Some(v) = req.bill_number {
        builder = builder.bill_number(v);
    }
    if let Some(v) = req.mobile_number {
        builder = builder.mobile_number(v);
    }
    if let Some(v) = req.store_label {
        builder = builder.store_label(v);
    }
    if let Some(v) = req.terminal_label {
        builder = builder.terminal_label(v);
    }
    if let Some(v) = req.purpose {
        builder = builder.purpose(v);
    }

    let payload = builder.build().map_err(|e| match e {
        khqr::KhqrError::MissingField(_)
        | khqr::KhqrError::FieldTooLong(_, _)
        | khqr::KhqrError::ValueTooLong(_)
        | khqr::KhqrError::InvalidAmount(_) => ServerError::InvalidInput(e.to_string()),
        other => ServerError::Qr(other),
    })?;
    let info = khqr::decode(&payload)?;
    let md5 = khqr::transaction_md5(&payload);

    db::save_khqr_snapshot(&state.pool, profile.id, &payload, &md5, &info).await?;
    info!(profile = %profile.username, "KHQR snapshot saved");

    Ok(Json(serde_json::json!({ "success": true })))
}

/// `POST /api/user/generate-donation-khqr`
///
/// Generates a USD donation QR for the platform's Bakong account, records
/// the pending session keyed by the transaction md5, and starts the gateway
/// poll.  The authenticated profile is the one credited once the gateway
/// confirms settlement.
pub async fn generate_donation_khqr(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DonationRequest>,
) -> Result<Json<DonationResponse>> {
    let profile = authenticate(&state, &headers).await?;
    let amount = parse_amount(req.amount.as_ref())?;

    let donation = qr::build_donation_qr(&state.config, amount)?;

    state
        .sessions
        .insert(
            &donation.md5,
            PendingDonation {
                profile_id: profile.id,
                amount,
                created_at: Utc::now(),
            },
        )
        .await;
    tokio::spawn(poller::run(state.clone(), donation.md5.clone()));

    info!(profile = %profile.username, md5 = %donation.md5, amount, "donation session opened");

    let expires_at = Utc::now() + chrono::Duration::seconds(state.config.session_timeout_secs as i64);
    Ok(Json(DonationResponse {
        qr_data: donation.qr_data_url,
        subscribe_url: format!("/api/payment/events/{}", donation.md5),
        md5: donation.md5,
        countdown_secs: state.config.countdown_secs,
        expires_at: expires_at.to_rfc3339(),
    }))
}

/// `GET /api/payment/events/:md5`
///
/// SSE subscription for one transaction.  The first frame is CONNECTED;
/// the stream ends right after the single terminal frame (or when the
/// subscription is replaced by a newer one for the same hash).
pub async fn payment_events(
    State(state): State<Arc<AppState>>,
    Path(md5): Path<String>,
) -> Result<Response> {
    if md5.trim().is_empty() {
        return Err(ServerError::InvalidInput(
            "md5 path parameter is required".to_string(),
        ));
    }

    let rx = state.subscribers.register(&md5).await;
    state.subscribers.notify(&md5, PaymentEvent::Connected).await;

    let stream = ReceiverStream::new(rx).map(|ev| Event::default().json_data(&ev));
    let mut response = Sse::new(stream).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(response)
}

// ─────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────

/// Resolve the bearer token to a profile.  A missing or malformed header is
/// an auth failure; a well-formed token with no matching profile is 404.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<ProfileRecord> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|v| !v.is_empty())
        .ok_or(ServerError::Unauthorized)?;

    db::get_profile_by_token(&state.pool, token)
        .await?
        .ok_or(ServerError::ProfileNotFound)
}

fn parse_amount(raw: Option<&Value>) -> Result<f64> {
    let amount = match raw {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| ServerError::InvalidInput("Amount is required".to_string()))?;

    if !amount.is_finite() || amount <= 0.0 {
        return Err(ServerError::InvalidInput(format!(
            "Amount must be a positive number, got {amount}"
        )));
    }
    Ok(amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn amount_accepts_number_and_string() {
        assert_eq!(parse_amount(Some(&json!(10.5))).unwrap(), 10.5);
        assert_eq!(parse_amount(Some(&json!("10.50"))).unwrap(), 10.5);
        assert_eq!(parse_amount(Some(&json!(" 3 "))).unwrap(), 3.0);
    }

    #[test]
    fn amount_rejects_garbage() {
        assert!(parse_amount(None).is_err());
        assert!(parse_amount(Some(&json!(null))).is_err());
        assert!(parse_amount(Some(&json!("abc"))).is_err());
        assert!(parse_amount(Some(&json!(0))).is_err());
        assert!(parse_amount(Some(&json!(-5))).is_err());
    }
}
