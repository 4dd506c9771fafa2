//! Per-transaction poll session against the Bakong gateway.
//!
//! One task is spawned per generated donation QR and owns that transaction's
//! whole lifecycle: ticks are strictly sequential (the next check is only
//! scheduled once the current one finishes), the hard deadline is evaluated
//! before the gateway call on every tick so a stuck gateway cannot stretch
//! the session, and the task ends in exactly one of three ways:
//!
//! * PAID    — ledger applied, terminal event delivered;
//! * EXPIRED — deadline hit, pending amount forfeited, terminal event
//!             delivered;
//! * abandoned — the subscriber left, no event, no further gateway calls.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::bakong::CheckOutcome;
use crate::events::PaymentEvent;
use crate::{db, AppState};

pub async fn run(state: Arc<AppState>, md5: String) {
    let started = Instant::now();
    let deadline = Duration::from_secs(state.config.session_timeout_secs);
    let interval = Duration::from_secs(state.config.poll_interval_secs);

    info!(%md5, "poll session started");

    loop {
        // The first check happens one interval after the QR was issued,
        // leaving the subscriber time to open its stream before the
        // liveness gate is consulted.
        tokio::time::sleep(interval).await;

        // Deadline before the gateway call: a slow gateway response must
        // not extend the session.
        if started.elapsed() >= deadline {
            state.sessions.remove(&md5).await;
            state.subscribers.notify(&md5, PaymentEvent::Expired).await;
            info!(%md5, "poll session expired");
            return;
        }

        match state.gateway.check_transaction(&md5).await {
            Ok(CheckOutcome::Paid(data)) => {
                match state.sessions.take(&md5).await {
                    Some(pending) => match db::apply_donation(&state.pool, &pending).await {
                        Ok(Some(profile)) => info!(
                            %md5,
                            profile = %profile.username,
                            amount = pending.amount,
                            total = profile.donation_amount,
                            supporter = profile.is_supporter,
                            gold = profile.is_gold_supporter,
                            "donation applied"
                        ),
                        Ok(None) => warn!(%md5, "beneficiary profile vanished, donation dropped"),
                        Err(e) => error!(%md5, "failed to apply donation: {e}"),
                    },
                    // Possible if the same md5 was paid twice or the session
                    // was already consumed; never double-credit.
                    None => warn!(%md5, "paid transaction had no pending session"),
                }
                state
                    .subscribers
                    .notify(&md5, PaymentEvent::Paid { data })
                    .await;
                info!(%md5, "poll session settled");
                return;
            }
            Ok(CheckOutcome::NotYet) => {
                // Liveness gate: keep polling only while someone listens.
                if !state.subscribers.has(&md5).await {
                    state.sessions.remove(&md5).await;
                    debug!(%md5, "subscriber gone, poll session abandoned");
                    return;
                }
            }
            // Retryable: stay on the same interval, still bounded by the
            // deadline check above.
            Err(e) => warn!(%md5, "gateway check failed, will retry: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use serde_json::json;

    use super::*;
    use crate::bakong::PaymentGateway;
    use crate::config::Config;
    use crate::db::test_support::temp_pool;
    use crate::errors::{Result, ServerError};
    use crate::sessions::PendingDonation;

    /// Scripted gateway: NotYet for `paid_after` calls, then Paid; or always
    /// NotYet / always failing.
    struct StubGateway {
        calls: AtomicUsize,
        paid_after: Option<usize>,
        fail: bool,
    }

    impl StubGateway {
        fn paid_after(n: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                paid_after: Some(n),
                fail: false,
            }
        }

        fn never_pays() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                paid_after: None,
                fail: false,
            }
        }

        fn always_fails() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                paid_after: None,
                fail: true,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaymentGateway for StubGateway {
        async fn check_transaction(&self, _md5: &str) -> Result<CheckOutcome> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ServerError::Config("gateway unreachable".to_string()));
            }
            match self.paid_after {
                Some(after) if n >= after => Ok(CheckOutcome::Paid(json!({ "hash": "h" }))),
                _ => Ok(CheckOutcome::NotYet),
            }
        }
    }

    fn test_config() -> Config {
        Config {
            bakong_token: "t".to_string(),
            bakong_api_url: "http://localhost".to_string(),
            bakong_account_id: "khnhom@devb".to_string(),
            merchant_name: "Khnhom".to_string(),
            merchant_city: "Phnom Penh".to_string(),
            database_url: String::new(),
            api_port: 0,
            poll_interval_secs: 5,
            session_timeout_secs: 300,
            countdown_secs: 30,
        }
    }

    async fn state_with(gateway: Arc<dyn PaymentGateway>) -> (tempfile::TempDir, Arc<AppState>) {
        // Pool setup does real blocking I/O; under paused time the runtime
        // auto-advances past sqlx's acquire timeout before the connection
        // can be established, so run it on the real clock.
        tokio::time::resume();
        let (dir, pool) = temp_pool().await;
        tokio::time::pause();
        let state = Arc::new(AppState {
            config: test_config(),
            pool,
            gateway,
            subscribers: crate::subscribers::SubscriberRegistry::new(),
            sessions: crate::sessions::PendingDonations::new(),
        });
        (dir, state)
    }

    #[tokio::test(start_paused = true)]
    async fn paid_applies_ledger_and_notifies_once() {
        let gateway = Arc::new(StubGateway::paid_after(2));
        let (_dir, state) = state_with(gateway.clone()).await;
        // This test hits the pool from inside the poll loop; sqlite worker
        // round-trips stall under auto-advancing paused time, so the whole
        // paid path (three 5s ticks) runs on the real clock.
        tokio::time::resume();
        let profile = db::create_profile(&state.pool, "sokha", "tok").await.unwrap();

        state
            .sessions
            .insert(
                "abc",
                PendingDonation {
                    profile_id: profile.id,
                    amount: 10.5,
                    created_at: chrono::Utc::now(),
                },
            )
            .await;
        let mut rx = state.subscribers.register("abc").await;

        run(state.clone(), "abc".to_string()).await;

        assert!(matches!(rx.recv().await, Some(PaymentEvent::Paid { .. })));
        assert_eq!(rx.recv().await, None);
        assert_eq!(gateway.calls(), 3);

        let profile = db::get_profile(&state.pool, profile.id).await.unwrap().unwrap();
        assert_eq!(profile.donation_amount, 10.5);
        assert!(profile.is_supporter);
        assert!(!profile.is_gold_supporter);
        // Session consumed.
        assert!(state.sessions.take("abc").await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn expires_after_deadline_with_exactly_one_event() {
        let gateway = Arc::new(StubGateway::never_pays());
        let (_dir, state) = state_with(gateway.clone()).await;
        let mut rx = state.subscribers.register("abc").await;

        run(state.clone(), "abc".to_string()).await;

        assert_eq!(rx.recv().await, Some(PaymentEvent::Expired));
        assert_eq!(rx.recv().await, None);
        // Ticks at 5s..295s; the 300s tick hits the deadline before calling.
        assert_eq!(gateway.calls(), 59);
    }

    #[tokio::test(start_paused = true)]
    async fn gateway_errors_are_retried_until_deadline() {
        let gateway = Arc::new(StubGateway::always_fails());
        let (_dir, state) = state_with(gateway.clone()).await;
        let mut rx = state.subscribers.register("abc").await;

        run(state.clone(), "abc".to_string()).await;

        // Persistent upstream failure surfaces as a plain expiry.
        assert_eq!(rx.recv().await, Some(PaymentEvent::Expired));
        assert_eq!(gateway.calls(), 59);
    }

    #[tokio::test(start_paused = true)]
    async fn abandons_when_subscriber_leaves() {
        let gateway = Arc::new(StubGateway::never_pays());
        let (_dir, state) = state_with(gateway.clone()).await;
        // No subscriber was ever registered.

        run(state.clone(), "abc".to_string()).await;

        // One check observed NotYet, then the liveness gate stopped the loop.
        assert_eq!(gateway.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_session_drops_pending_amount() {
        let gateway = Arc::new(StubGateway::never_pays());
        let (_dir, state) = state_with(gateway).await;
        state
            .sessions
            .insert(
                "abc",
                PendingDonation {
                    profile_id: 1,
                    amount: 3.0,
                    created_at: chrono::Utc::now(),
                },
            )
            .await;

        run(state.clone(), "abc".to_string()).await;
        assert_eq!(state.sessions.len().await, 0);
    }
}
