//! Hosted payment gateway collaborator: checkout session creation over HTTP
//! and webhook signature verification.

use std::collections::HashMap;

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::{
    config::PaymentConfig,
    dto::checkout::CheckoutIntent,
    error::{AppError, AppResult},
};

/// Hosted sessions expire after 30 minutes; a completion event arriving
/// later belongs to a session the provider no longer honours.
pub const SESSION_EXPIRY_SECS: i64 = 30 * 60;

/// Signature timestamps older than this are treated as replays.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 5 * 60;

pub const METADATA_INTENT_KEY: &str = "intent";

#[derive(Debug, Serialize)]
struct SessionLineItem {
    name: String,
    amount: i64,
    quantity: i32,
}

#[derive(Debug, Serialize)]
struct CreateSessionRequest {
    mode: &'static str,
    success_url: String,
    cancel_url: String,
    expires_at: i64,
    line_items: Vec<SessionLineItem>,
    metadata: HashMap<String, String>,
}

/// Redirect handle returned by the provider.
#[derive(Debug, Deserialize)]
pub struct HostedSession {
    pub id: String,
    pub url: String,
}

/// Inbound signed event. Only `checkout.session.completed` carries a
/// session object we act on.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub object: SessionObject,
}

#[derive(Debug, Deserialize)]
pub struct SessionObject {
    pub id: String,
    #[serde(default)]
    pub payment_status: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Clone)]
pub struct PaymentClient {
    http: reqwest::Client,
    config: PaymentConfig,
}

impl PaymentClient {
    pub fn new(config: PaymentConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    pub fn minimum_charge(&self) -> i64 {
        self.config.minimum_charge
    }

    /// Create a hosted checkout session carrying the serialized intent as
    /// opaque metadata. Nothing is persisted on our side.
    pub async fn create_checkout_session(
        &self,
        intent: &CheckoutIntent,
        item_names: &HashMap<uuid::Uuid, String>,
    ) -> AppResult<HostedSession> {
        let encoded = intent
            .encode()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("intent encoding failed: {e}")))?;
        let mut metadata = HashMap::new();
        metadata.insert(METADATA_INTENT_KEY.to_string(), encoded);

        let line_items = intent
            .groups
            .iter()
            .flat_map(|g| g.items.iter())
            .map(|line| SessionLineItem {
                name: item_names
                    .get(&line.product_id)
                    .cloned()
                    .unwrap_or_else(|| line.product_id.to_string()),
                amount: line.unit_price,
                quantity: line.quantity,
            })
            .collect();

        let body = CreateSessionRequest {
            mode: "payment",
            success_url: self.config.success_url.clone(),
            cancel_url: self.config.cancel_url.clone(),
            expires_at: Utc::now().timestamp() + SESSION_EXPIRY_SECS,
            line_items,
            metadata,
        };

        let session = self
            .http
            .post(format!("{}/checkout/sessions", self.config.api_base))
            .bearer_auth(&self.config.secret_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json::<HostedSession>()
            .await?;

        Ok(session)
    }

    /// Verify the `t=<ts>,v1=<hex>` signature header against the raw payload.
    pub fn verify_webhook(&self, payload: &[u8], signature_header: &str) -> AppResult<()> {
        let valid = verify_signature(
            payload,
            signature_header,
            &self.config.webhook_secret,
            Utc::now().timestamp(),
        )
        .map_err(|_| AppError::InvalidSignature)?;
        if !valid {
            return Err(AppError::InvalidSignature);
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing timestamp in signature header")]
    MissingTimestamp,
    #[error("missing v1 signature in signature header")]
    MissingSignature,
    #[error("malformed signature header")]
    Malformed,
}

/// Constant-shape verification of the provider's signature scheme:
/// HMAC-SHA256 over `"{timestamp}.{payload}"`. Returns Ok(false) for a
/// well-formed header that does not match, Err for a header we cannot parse.
pub fn verify_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now_ts: i64,
) -> Result<bool, SignatureError> {
    let mut timestamp: Option<&str> = None;
    let mut provided: Option<&str> = None;

    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => provided = Some(value),
            Some(_) => {}
            None => return Err(SignatureError::Malformed),
        }
    }

    let timestamp = timestamp.ok_or(SignatureError::MissingTimestamp)?;
    let provided = provided.ok_or(SignatureError::MissingSignature)?;
    let ts: i64 = timestamp.parse().map_err(|_| SignatureError::Malformed)?;

    if (now_ts - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Ok(false);
    }

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|_| SignatureError::Malformed)?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    // Both sides are hex strings of fixed length; compare without early exit.
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        return Ok(false);
    }
    let mut diff = 0u8;
    for (a, b) in provided.iter().zip(expected.iter()) {
        diff |= a ^ b;
    }
    Ok(diff == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, ts: i64) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{ts}.").as_bytes());
        mac.update(payload);
        format!("t={ts},v1={}", hex::encode(mac.finalize().into_bytes()))
    }

    #[test]
    fn accepts_a_valid_signature() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = sign(payload, SECRET, now);
        assert!(verify_signature(payload, &header, SECRET, now).unwrap());
    }

    #[test]
    fn rejects_wrong_secret() {
        let payload = br#"{"type":"checkout.session.completed"}"#;
        let now = 1_700_000_000;
        let header = sign(payload, "wrong_secret", now);
        assert!(!verify_signature(payload, &header, SECRET, now).unwrap());
    }

    #[test]
    fn rejects_modified_payload() {
        let payload = br#"{"ok":true}"#;
        let now = 1_700_000_000;
        let header = sign(payload, SECRET, now);
        assert!(!verify_signature(br#"{"ok":false}"#, &header, SECRET, now).unwrap());
    }

    #[test]
    fn rejects_stale_timestamp() {
        let payload = b"{}";
        let signed_at = 1_700_000_000;
        let header = sign(payload, SECRET, signed_at);
        let now = signed_at + SIGNATURE_TOLERANCE_SECS + 1;
        assert!(!verify_signature(payload, &header, SECRET, now).unwrap());
    }

    #[test]
    fn errors_on_missing_parts() {
        assert!(matches!(
            verify_signature(b"{}", "v1=abc", SECRET, 0),
            Err(SignatureError::MissingTimestamp)
        ));
        assert!(matches!(
            verify_signature(b"{}", "t=123", SECRET, 0),
            Err(SignatureError::MissingSignature)
        ));
        assert!(verify_signature(b"{}", "garbage", SECRET, 0).is_err());
    }

    #[test]
    fn parses_completed_session_event() {
        let raw = r#"{
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {
                "object": {
                    "id": "cs_1",
                    "payment_status": "paid",
                    "metadata": {"intent": "{}"}
                }
            }
        }"#;
        let event: WebhookEvent = serde_json::from_str(raw).unwrap();
        assert_eq!(event.id, "evt_1");
        assert_eq!(event.kind, "checkout.session.completed");
        assert_eq!(event.data.object.payment_status.as_deref(), Some("paid"));
        assert!(event.data.object.metadata.contains_key("intent"));
    }
}
