//! Payment status events pushed to SSE subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One frame on the event stream.  Serialized with a `status` tag so the
/// browser sees `{"status":"PAID","data":{...}}` and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum PaymentEvent {
    /// Handshake frame sent as soon as the subscription is open.
    #[serde(rename = "CONNECTED")]
    Connected,
    /// The gateway confirmed settlement; `data` is its settlement payload.
    #[serde(rename = "PAID")]
    Paid { data: Value },
    /// The poll session hit its hard deadline without a settlement.
    #[serde(rename = "EXPIRED")]
    Expired,
}

impl PaymentEvent {
    /// Terminal events close the stream after delivery.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Paid { .. } | Self::Expired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_shapes() {
        assert_eq!(
            serde_json::to_string(&PaymentEvent::Connected).unwrap(),
            r#"{"status":"CONNECTED"}"#
        );
        assert_eq!(
            serde_json::to_string(&PaymentEvent::Expired).unwrap(),
            r#"{"status":"EXPIRED"}"#
        );
        let paid = PaymentEvent::Paid {
            data: serde_json::json!({ "amount": 10.5 }),
        };
        assert_eq!(
            serde_json::to_string(&paid).unwrap(),
            r#"{"status":"PAID","data":{"amount":10.5}}"#
        );
    }

    #[test]
    fn terminal_classification() {
        assert!(!PaymentEvent::Connected.is_terminal());
        assert!(PaymentEvent::Expired.is_terminal());
        assert!(PaymentEvent::Paid { data: Value::Null }.is_terminal());
    }

    #[test]
    fn round_trips_through_serde() {
        let frame = r#"{"status":"PAID","data":{"hash":"abc"}}"#;
        let ev: PaymentEvent = serde_json::from_str(frame).unwrap();
        assert!(matches!(ev, PaymentEvent::Paid { .. }));
    }
}
