//! Pending donation sessions, keyed by transaction md5.
//!
//! Each entry ties a generated donation QR to the amount requested and the
//! profile to credit, so concurrent donation sessions never clobber each
//! other and the ledger can only ever apply the amount that belongs to the
//! hash that was actually paid.  State is process-local and dies with the
//! poll session; nothing here is persisted.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

#[derive(Debug, Clone)]
pub struct PendingDonation {
    pub profile_id: i64,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Default)]
pub struct PendingDonations {
    inner: Mutex<HashMap<String, PendingDonation>>,
}

impl PendingDonations {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, md5: &str, pending: PendingDonation) {
        self.inner.lock().await.insert(md5.to_string(), pending);
    }

    /// Consume the pending record for `md5`. Used on PAID so the amount can
    /// be applied exactly once.
    pub async fn take(&self, md5: &str) -> Option<PendingDonation> {
        self.inner.lock().await.remove(md5)
    }

    /// Drop the pending record without applying it (expiry or abandonment).
    pub async fn remove(&self, md5: &str) {
        self.inner.lock().await.remove(md5);
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
