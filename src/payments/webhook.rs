//! Processor webhook signature verification and event decoding.
//!
//! Events are kept as loosely-typed JSON envelopes and only the fields this
//! service acts on are pulled out, so new processor API versions and unknown
//! event types pass through without failing deserialization.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

/// Maximum allowed distance between the signed timestamp and now, in seconds.
pub const DEFAULT_TOLERANCE_SECS: i64 = 300;

/// Metadata key carrying the local payment record id.
pub const PAYMENT_ID_METADATA_KEY: &str = "paymentId";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WebhookError {
    #[error("Missing Stripe-Signature header")]
    MissingSignature,

    #[error("Unable to parse signature header: {0}")]
    BadHeader(String),

    #[error("No signatures found matching the expected signature for payload")]
    BadSignature,

    #[error("Timestamp outside the tolerance zone")]
    TimestampOutOfRange,

    #[error("Invalid event payload: {0}")]
    Payload(String),
}

#[derive(Debug)]
struct SignatureHeader {
    timestamp: i64,
    v1_signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    /// Format: `t=<unix>,v1=<hex>[,v1=<hex>][,v0=<hex>]`. Unknown keys and
    /// legacy v0 signatures are ignored.
    fn parse(header: &str) -> Result<Self, WebhookError> {
        let mut timestamp = None;
        let mut v1_signatures = Vec::new();

        for part in header.split(',') {
            let (key, value) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| WebhookError::BadHeader("invalid header format".to_string()))?;

            match key {
                "t" => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| {
                        WebhookError::BadHeader("invalid timestamp".to_string())
                    })?);
                }
                "v1" => {
                    // A malformed candidate can never match, skip it.
                    if let Ok(sig) = hex::decode(value) {
                        v1_signatures.push(sig);
                    }
                }
                _ => {}
            }
        }

        let timestamp =
            timestamp.ok_or_else(|| WebhookError::BadHeader("missing timestamp".to_string()))?;
        if v1_signatures.is_empty() {
            return Err(WebhookError::BadSignature);
        }

        Ok(Self { timestamp, v1_signatures })
    }
}

/// Checks `Stripe-Signature` headers against one endpoint signing secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn with_tolerance(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    /// Verifies the signature and decodes the envelope.
    pub fn construct_event(&self, payload: &[u8], header: &str) -> Result<WebhookEvent, WebhookError> {
        self.verify_at(payload, header, Utc::now().timestamp())?;
        serde_json::from_slice(payload).map_err(|e| WebhookError::Payload(e.to_string()))
    }

    pub fn verify_at(&self, payload: &[u8], header: &str, now: i64) -> Result<(), WebhookError> {
        let header = SignatureHeader::parse(header)?;
        let expected = self.compute_signature(header.timestamp, payload)?;

        let matched = header
            .v1_signatures
            .iter()
            .any(|candidate| candidate.len() == expected.len() && bool::from(candidate.ct_eq(&expected)));
        if !matched {
            return Err(WebhookError::BadSignature);
        }

        if (now - header.timestamp).abs() > self.tolerance_secs {
            return Err(WebhookError::TimestampOutOfRange);
        }

        Ok(())
    }

    fn compute_signature(&self, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>, WebhookError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.as_bytes())
            .map_err(|_| WebhookError::BadSignature)?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}

/// Builds a valid `Stripe-Signature` header value. Used by tests and by
/// local tooling that replays events.
#[cfg(any(test, feature = "test-utils"))]
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC accepts keys of any length"));
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    format!("t={},v1={}", timestamp, hex::encode(mac.finalize().into_bytes()))
}

/// The event envelope as delivered.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    /// Connected account the event originated from, for Connect events.
    #[serde(default)]
    pub account: Option<String>,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

impl WebhookEvent {
    fn object_str(&self, key: &str) -> Option<&str> {
        self.data.object.get(key).and_then(Value::as_str)
    }

    fn object_id(&self) -> Result<String, WebhookError> {
        self.object_str("id")
            .map(str::to_string)
            .ok_or_else(|| WebhookError::Payload(format!("{} event without object id", self.event_type)))
    }

    /// Local payment id stamped into metadata at checkout, if any.
    fn payment_id_metadata(&self) -> Option<Uuid> {
        self.data
            .object
            .get("metadata")
            .and_then(|m| m.get(PAYMENT_ID_METADATA_KEY))
            .and_then(Value::as_str)
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}

/// Payment-endpoint events this service reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentEvent {
    CheckoutCompleted {
        session_id: String,
        payment_intent_id: Option<String>,
        payment_id: Option<Uuid>,
    },
    /// Either a failed async checkout (session id) or a failed payment
    /// intent (intent id).
    PaymentFailed {
        external_id: String,
        payment_id: Option<Uuid>,
    },
    Transfer {
        transfer_id: String,
        amount_cents: i64,
        destination: Option<String>,
    },
    Unhandled,
}

impl PaymentEvent {
    pub fn from_event(event: &WebhookEvent) -> Result<Self, WebhookError> {
        match event.event_type.as_str() {
            "checkout.session.completed" => Ok(PaymentEvent::CheckoutCompleted {
                session_id: event.object_id()?,
                // Expanded intents arrive as objects, collapsed ones as ids.
                payment_intent_id: match event.data.object.get("payment_intent") {
                    Some(Value::String(id)) => Some(id.clone()),
                    Some(Value::Object(intent)) => {
                        intent.get("id").and_then(Value::as_str).map(str::to_string)
                    }
                    _ => None,
                },
                payment_id: event.payment_id_metadata(),
            }),
            "checkout.session.async_payment_failed" | "payment_intent.payment_failed" => {
                Ok(PaymentEvent::PaymentFailed {
                    external_id: event.object_id()?,
                    payment_id: event.payment_id_metadata(),
                })
            }
            t if t.starts_with("transfer.") => Ok(PaymentEvent::Transfer {
                transfer_id: event.object_id()?,
                amount_cents: event.data.object.get("amount").and_then(Value::as_i64).unwrap_or(0),
                destination: event.object_str("destination").map(str::to_string),
            }),
            _ => Ok(PaymentEvent::Unhandled),
        }
    }
}

/// The fields of a connected account that decide onboarding status.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AccountSnapshot {
    pub id: String,
    #[serde(default)]
    pub charges_enabled: bool,
    #[serde(default)]
    pub payouts_enabled: bool,
    #[serde(default)]
    pub requirements: AccountRequirements,
    #[serde(default)]
    pub capabilities: AccountCapabilities,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AccountRequirements {
    #[serde(default)]
    pub currently_due: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AccountCapabilities {
    pub card_payments: Option<String>,
    pub transfers: Option<String>,
}

/// Account-endpoint events this service reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountEvent {
    Updated(AccountSnapshot),
    Deauthorized { account_id: String },
    Unhandled,
}

impl AccountEvent {
    pub fn from_event(event: &WebhookEvent) -> Result<Self, WebhookError> {
        match event.event_type.as_str() {
            "account.updated" => serde_json::from_value(event.data.object.clone())
                .map(AccountEvent::Updated)
                .map_err(|e| WebhookError::Payload(e.to_string())),
            "account.application.deauthorized" => {
                // The object is the platform application; the account lives
                // on the envelope.
                let account_id = match event.account.clone() {
                    Some(id) => id,
                    None => event.object_id()?,
                };
                Ok(AccountEvent::Deauthorized { account_id })
            }
            _ => Ok(AccountEvent::Unhandled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "whsec_test_secret";

    fn event_payload(event_type: &str, object: Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": event_type,
            "data": { "object": object }
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_signature_is_accepted() {
        let payload = event_payload("checkout.session.completed", json!({"id": "cs_1"}));
        let now = Utc::now().timestamp();
        let header = sign_payload(SECRET, now, &payload);

        let event = WebhookVerifier::new(SECRET).construct_event(&payload, &header).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.event_type, "checkout.session.completed");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let payload = event_payload("checkout.session.completed", json!({"id": "cs_1"}));
        let now = Utc::now().timestamp();
        let header = sign_payload("whsec_other", now, &payload);

        let err = WebhookVerifier::new(SECRET).construct_event(&payload, &header).unwrap_err();
        assert_eq!(err, WebhookError::BadSignature);
    }

    #[test]
    fn test_tampered_payload_is_rejected() {
        let payload = event_payload("checkout.session.completed", json!({"id": "cs_1"}));
        let now = Utc::now().timestamp();
        let header = sign_payload(SECRET, now, &payload);
        let tampered = event_payload("checkout.session.completed", json!({"id": "cs_2"}));

        let err = WebhookVerifier::new(SECRET).verify_at(&tampered, &header, now).unwrap_err();
        assert_eq!(err, WebhookError::BadSignature);
    }

    #[test]
    fn test_stale_timestamp_is_rejected() {
        let payload = b"{}";
        let signed_at = 1_700_000_000;
        let header = sign_payload(SECRET, signed_at, payload);
        let verifier = WebhookVerifier::new(SECRET);

        assert!(verifier.verify_at(payload, &header, signed_at + 299).is_ok());
        assert_eq!(
            verifier.verify_at(payload, &header, signed_at + 301).unwrap_err(),
            WebhookError::TimestampOutOfRange
        );
    }

    #[test]
    fn test_any_matching_v1_signature_is_accepted() {
        let payload = b"{}";
        let now = 1_700_000_000;
        let good = sign_payload(SECRET, now, payload);
        let good_sig = good.split("v1=").nth(1).unwrap();
        let header = format!("t={},v1={},v1={},v0=abc", now, "00".repeat(32), good_sig);

        assert!(WebhookVerifier::new(SECRET).verify_at(payload, &header, now).is_ok());
    }

    #[test]
    fn test_malformed_headers() {
        let verifier = WebhookVerifier::new(SECRET);
        assert!(matches!(
            verifier.verify_at(b"{}", "garbage", 0),
            Err(WebhookError::BadHeader(_))
        ));
        assert!(matches!(
            verifier.verify_at(b"{}", "v1=abcd", 0),
            Err(WebhookError::BadHeader(_))
        ));
        assert_eq!(
            verifier.verify_at(b"{}", "t=100", 100).unwrap_err(),
            WebhookError::BadSignature
        );
    }

    #[test]
    fn test_checkout_completed_parsing() {
        let payment_id = Uuid::new_v4();
        let payload = event_payload(
            "checkout.session.completed",
            json!({
                "id": "cs_1",
                "payment_intent": "pi_1",
                "metadata": { "paymentId": payment_id.to_string() }
            }),
        );
        let event: WebhookEvent = serde_json::from_slice(&payload).unwrap();

        assert_eq!(
            PaymentEvent::from_event(&event).unwrap(),
            PaymentEvent::CheckoutCompleted {
                session_id: "cs_1".to_string(),
                payment_intent_id: Some("pi_1".to_string()),
                payment_id: Some(payment_id),
            }
        );
    }

    #[test]
    fn test_expanded_payment_intent_is_read() {
        let payload = event_payload(
            "checkout.session.completed",
            json!({ "id": "cs_1", "payment_intent": { "id": "pi_9", "object": "payment_intent" } }),
        );
        let event: WebhookEvent = serde_json::from_slice(&payload).unwrap();

        match PaymentEvent::from_event(&event).unwrap() {
            PaymentEvent::CheckoutCompleted { payment_intent_id, .. } => {
                assert_eq!(payment_intent_id.as_deref(), Some("pi_9"));
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_failure_and_transfer_parsing() {
        let failed: WebhookEvent = serde_json::from_slice(&event_payload(
            "payment_intent.payment_failed",
            json!({ "id": "pi_1", "metadata": {} }),
        ))
        .unwrap();
        assert_eq!(
            PaymentEvent::from_event(&failed).unwrap(),
            PaymentEvent::PaymentFailed { external_id: "pi_1".to_string(), payment_id: None }
        );

        let transfer: WebhookEvent = serde_json::from_slice(&event_payload(
            "transfer.created",
            json!({ "id": "tr_1", "amount": 2459, "destination": "acct_1" }),
        ))
        .unwrap();
        assert_eq!(
            PaymentEvent::from_event(&transfer).unwrap(),
            PaymentEvent::Transfer {
                transfer_id: "tr_1".to_string(),
                amount_cents: 2459,
                destination: Some("acct_1".to_string()),
            }
        );

        let other: WebhookEvent = serde_json::from_slice(&event_payload(
            "customer.created",
            json!({ "id": "cus_1" }),
        ))
        .unwrap();
        assert_eq!(PaymentEvent::from_event(&other).unwrap(), PaymentEvent::Unhandled);
    }

    #[test]
    fn test_account_event_parsing() {
        let updated: WebhookEvent = serde_json::from_slice(&event_payload(
            "account.updated",
            json!({
                "id": "acct_1",
                "charges_enabled": true,
                "payouts_enabled": false,
                "requirements": { "currently_due": ["external_account"] },
                "capabilities": { "card_payments": "active", "transfers": "inactive" }
            }),
        ))
        .unwrap();
        match AccountEvent::from_event(&updated).unwrap() {
            AccountEvent::Updated(snapshot) => {
                assert_eq!(snapshot.id, "acct_1");
                assert!(snapshot.charges_enabled);
                assert_eq!(snapshot.requirements.currently_due, vec!["external_account"]);
                assert_eq!(snapshot.capabilities.transfers.as_deref(), Some("inactive"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let deauthorized: WebhookEvent = serde_json::from_value(json!({
            "id": "evt_2",
            "type": "account.application.deauthorized",
            "account": "acct_7",
            "data": { "object": { "id": "ca_platform", "object": "application" } }
        }))
        .unwrap();
        assert_eq!(
            AccountEvent::from_event(&deauthorized).unwrap(),
            AccountEvent::Deauthorized { account_id: "acct_7".to_string() }
        );
    }
}
