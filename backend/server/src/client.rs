//! Donation client state machine — the Rust counterpart of the browser flow.
//!
//! `idle -> pending -> paid | expired`, with `expired -> idle` on retry.
//! The client requests a QR, subscribes to the SSE stream for the returned
//! md5, and races the server's events against its own local countdown (the
//! `countdownSecs` value the server advertises, so there is a single source
//! of truth for the timeout).  Dropping the `await_outcome` future mid-wait
//! is the "user navigated away" case: the stream closes and the server-side
//! poller abandons the session on its next tick.

use serde::Deserialize;
use serde_json::Value;
use tokio_stream::StreamExt;

use crate::errors::{Result, ServerError};
use crate::events::PaymentEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationPhase {
    Idle,
    Pending,
    Paid,
    Expired,
}

/// Response of `POST /api/user/generate-donation-khqr`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationSession {
    pub qr_data: String,
    pub md5: String,
    pub subscribe_url: String,
    pub countdown_secs: u64,
    pub expires_at: String,
}

#[derive(Debug, Clone)]
pub enum DonationOutcome {
    Paid(Value),
    Expired,
}

pub struct DonationClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    phase: DonationPhase,
}

impl DonationClient {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            token: token.into(),
            phase: DonationPhase::Idle,
        }
    }

    pub fn phase(&self) -> DonationPhase {
        self.phase
    }

    /// Request a donation QR and move to `pending`.  Allowed from `idle` and
    /// from `expired` (the retry path).
    pub async fn start_donation(&mut self, amount: &str) -> Result<DonationSession> {
        if self.phase == DonationPhase::Pending || self.phase == DonationPhase::Paid {
            return Err(ServerError::InvalidInput(format!(
                "cannot start a donation while {:?}",
                self.phase
            )));
        }

        let session: DonationSession = self
            .http
            .post(format!("{}/api/user/generate-donation-khqr", self.base_url))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "amount": amount }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        self.phase = DonationPhase::Pending;
        Ok(session)
    }

    /// Subscribe to the payment stream and wait for the terminal outcome.
    ///
    /// Resolves to `Expired` when the local countdown wins the race, when
    /// the server pushes EXPIRED, or when the stream closes without a
    /// terminal frame.
    pub async fn await_outcome(&mut self, session: &DonationSession) -> Result<DonationOutcome> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, session.subscribe_url))
            .send()
            .await?
            .error_for_status()?;

        let mut body = response.bytes_stream();
        let countdown = tokio::time::sleep(std::time::Duration::from_secs(session.countdown_secs));
        tokio::pin!(countdown);

        let mut buf: Vec<u8> = Vec::new();
        loop {
            tokio::select! {
                () = &mut countdown => {
                    self.phase = DonationPhase::Expired;
                    return Ok(DonationOutcome::Expired);
                }
                chunk = body.next() => match chunk {
                    Some(Ok(bytes)) => {
                        buf.extend_from_slice(&bytes);
                        while let Some(frame) = next_sse_data(&mut buf) {
                            match serde_json::from_str::<PaymentEvent>(&frame)? {
                                PaymentEvent::Connected => {}
                                PaymentEvent::Paid { data } => {
                                    self.phase = DonationPhase::Paid;
                                    return Ok(DonationOutcome::Paid(data));
                                }
                                PaymentEvent::Expired => {
                                    self.phase = DonationPhase::Expired;
                                    return Ok(DonationOutcome::Expired);
                                }
                            }
                        }
                    }
                    Some(Err(e)) => return Err(e.into()),
                    // Server closed without a terminal frame (e.g. our
                    // subscription was replaced); treat as expiry.
                    None => {
                        self.phase = DonationPhase::Expired;
                        return Ok(DonationOutcome::Expired);
                    }
                }
            }
        }
    }

    /// User-initiated cancel of a pending session.  The caller must also
    /// drop any in-flight `await_outcome` future; the server notices the
    /// closed stream on its next poll tick.
    pub fn cancel(&mut self) {
        if self.phase == DonationPhase::Pending {
            self.phase = DonationPhase::Idle;
        }
    }

    /// `expired -> idle`, enabling a fresh attempt.
    pub fn reset(&mut self) {
        if self.phase == DonationPhase::Expired {
            self.phase = DonationPhase::Idle;
        }
    }
}

/// Pull the next complete `data:` payload out of an SSE byte buffer.
///
/// Frames are separated by a blank line; comment lines (leading `:`) and
/// other fields are ignored.  Multiple `data:` lines in one frame are joined
/// with newlines per the SSE spec.
fn next_sse_data(buf: &mut Vec<u8>) -> Option<String> {
    loop {
        let sep = buf.windows(2).position(|w| w == b"\n\n")?;
        let frame: Vec<u8> = buf.drain(..sep + 2).take(sep).collect();
        let text = String::from_utf8_lossy(&frame);

        let data: Vec<&str> = text
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(str::trim_start)
            .collect();
        if !data.is_empty() {
            return Some(data.join("\n"));
        }
        // Comment-only frame (keep-alive); keep scanning.
    }
}
