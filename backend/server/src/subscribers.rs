//! In-memory registry of open SSE subscriptions, keyed by transaction md5.
//!
//! Holds the sending half of each subscriber's channel; the receiving half
//! backs the SSE response stream.  Dropping the sender is what ends the
//! stream, so removing a registry entry after a terminal event guarantees
//! the client sees that event before the connection closes.

use std::collections::HashMap;

use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::events::PaymentEvent;

/// Room for the CONNECTED handshake plus a terminal frame, with slack.
const CHANNEL_CAPACITY: usize = 8;

#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Mutex<HashMap<String, mpsc::Sender<PaymentEvent>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a subscription for `md5`, returning the stream end.
    ///
    /// A second registration for the same hash replaces the first; the
    /// orphaned stream simply closes on the older browser tab.
    pub async fn register(&self, md5: &str) -> mpsc::Receiver<PaymentEvent> {
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        if self
            .inner
            .lock()
            .await
            .insert(md5.to_string(), tx)
            .is_some()
        {
            debug!(%md5, "replaced an existing subscription");
        }
        rx
    }

    /// Is anyone still listening?  A subscriber whose receiving end has been
    /// dropped (client navigated away) counts as absent and is pruned.
    pub async fn has(&self, md5: &str) -> bool {
        let mut map = self.inner.lock().await;
        match map.get(md5) {
            Some(tx) if !tx.is_closed() => true,
            Some(_) => {
                map.remove(md5);
                false
            }
            None => false,
        }
    }

    pub async fn remove(&self, md5: &str) {
        self.inner.lock().await.remove(md5);
    }

    /// Push one event to the subscriber for `md5`, if any.
    ///
    /// Events for unknown hashes are dropped — no queue, no redelivery.  On
    /// a terminal event the entry is removed afterwards, so at most one of
    /// PAID/EXPIRED ever reaches a given subscriber and later calls for the
    /// same hash are no-ops.
    pub async fn notify(&self, md5: &str, event: PaymentEvent) {
        let sender = { self.inner.lock().await.get(md5).cloned() };
        let Some(sender) = sender else {
            debug!(%md5, "no subscriber, event dropped");
            return;
        };

        let terminal = event.is_terminal();
        if sender.send(event).await.is_err() {
            // Receiver already gone; writes to a dead stream are swallowed.
            debug!(%md5, "subscriber stream closed, event dropped");
            self.remove(md5).await;
            return;
        }
        if terminal {
            self.remove(md5).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn at_most_one_terminal_event() {
        let registry = SubscriberRegistry::new();
        let mut rx = registry.register("abc").await;

        registry.notify("abc", PaymentEvent::Expired).await;
        registry.notify("abc", PaymentEvent::Expired).await;

        assert_eq!(rx.recv().await, Some(PaymentEvent::Expired));
        // Entry was removed with the first terminal event, so the channel is
        // closed and nothing else arrives.
        assert_eq!(rx.recv().await, None);
        assert!(!registry.has("abc").await);
    }

    #[tokio::test]
    async fn connected_does_not_close_the_stream() {
        let registry = SubscriberRegistry::new();
        let mut rx = registry.register("abc").await;

        registry.notify("abc", PaymentEvent::Connected).await;
        assert_eq!(rx.recv().await, Some(PaymentEvent::Connected));
        assert!(registry.has("abc").await);
    }

    #[tokio::test]
    async fn register_is_last_writer_wins() {
        let registry = SubscriberRegistry::new();
        let mut first = registry.register("abc").await;
        let mut second = registry.register("abc").await;

        registry.notify("abc", PaymentEvent::Connected).await;

        // The first subscription was orphaned by the second.
        assert_eq!(first.recv().await, None);
        assert_eq!(second.recv().await, Some(PaymentEvent::Connected));
    }

    #[tokio::test]
    async fn dropped_receiver_counts_as_absent() {
        let registry = SubscriberRegistry::new();
        let rx = registry.register("abc").await;
        assert!(registry.has("abc").await);

        drop(rx);
        assert!(!registry.has("abc").await);
        // Pruned, so a notify is a silent no-op.
        registry.notify("abc", PaymentEvent::Expired).await;
    }

    #[tokio::test]
    async fn notify_unknown_hash_is_noop() {
        let registry = SubscriberRegistry::new();
        registry.notify("missing", PaymentEvent::Expired).await;
    }
}
