//! Payment gateway webhook entry point.
//!
//! The gateway delivers notifications at-least-once; verification happens
//! here, before any business logic runs, and the reconciliation service is
//! idempotent per order. Unknown event kinds are acknowledged so the
//! gateway's retry logic is never blocked.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{errors::ServiceError, AppState};

type HmacSha256 = Hmac<Sha256>;

// POST /api/v1/payments/webhook
#[utoipa::path(
    post,
    path = "/api/v1/payments/webhook",
    request_body = String,
    responses(
        (status = 200, description = "Webhook accepted"),
        (status = 401, description = "Invalid signature", body = crate::errors::ErrorResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Payments"
)]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, ServiceError> {
    // Verify before touching any state.
    if let Some(secret) = state.config.payment_webhook_secret.clone() {
        let ok = verify_signature(
            &headers,
            &body,
            &secret,
            state.config.payment_webhook_tolerance_secs,
        );
        if !ok {
            warn!("payment webhook signature verification failed");
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }
    }

    let json: Value = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::InvalidInput(format!("invalid json: {}", e)))?;

    let event_type = json.get("type").and_then(|v| v.as_str()).unwrap_or("");
    match event_type {
        "payment_intent.succeeded" => {
            let (order_id, user_id) = extract_metadata(&json)?;
            state
                .services
                .payments
                .handle_payment_succeeded(order_id, user_id)
                .await?;
        }
        "payment_intent.payment_failed" => {
            let (order_id, _user_id) = extract_metadata(&json)?;
            state
                .services
                .payments
                .handle_payment_failed(order_id)
                .await?;
        }
        other => {
            info!(event_type = %other, "unhandled payment webhook type");
        }
    }

    Ok((StatusCode::OK, "ok"))
}

/// Pulls `{order_id, user_id}` out of the notification's opaque metadata.
fn extract_metadata(event: &Value) -> Result<(Uuid, Uuid), ServiceError> {
    let metadata = event
        .pointer("/data/object/metadata")
        .and_then(|v| v.as_object())
        .ok_or_else(|| ServiceError::InvalidInput("missing event metadata".to_string()))?;

    let order_id = metadata
        .get("order_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ServiceError::InvalidInput("missing order_id in metadata".to_string()))?;
    let user_id = metadata
        .get("user_id")
        .and_then(|v| v.as_str())
        .and_then(|s| Uuid::parse_str(s).ok())
        .ok_or_else(|| ServiceError::InvalidInput("missing user_id in metadata".to_string()))?;

    Ok((order_id, user_id))
}

/// HMAC-SHA256 over `"{timestamp}.{payload}"` with the shared secret.
/// Accepts either the generic `x-timestamp`/`x-signature` header pair or a
/// Stripe-style `Stripe-Signature: t=...,v1=...` header.
pub fn verify_signature(
    headers: &HeaderMap,
    payload: &Bytes,
    secret: &str,
    tolerance_secs: u64,
) -> bool {
    if let (Some(ts), Some(sig)) = (headers.get("x-timestamp"), headers.get("x-signature")) {
        if let (Ok(ts), Ok(sig)) = (ts.to_str(), sig.to_str()) {
            return check_signed(ts, sig, payload, secret, Some(tolerance_secs));
        }
    }

    if let Some(sig) = headers.get("stripe-signature").and_then(|h| h.to_str().ok()) {
        let mut ts = "";
        let mut v1 = "";
        for part in sig.split(',') {
            let mut it = part.trim().split('=');
            match (it.next(), it.next()) {
                (Some("t"), Some(val)) => ts = val,
                (Some("v1"), Some(val)) => v1 = val,
                _ => {}
            }
        }
        if !ts.is_empty() && !v1.is_empty() {
            return check_signed(ts, v1, payload, secret, Some(tolerance_secs));
        }
    }

    false
}

fn check_signed(
    ts: &str,
    sig: &str,
    payload: &Bytes,
    secret: &str,
    tolerance_secs: Option<u64>,
) -> bool {
    if let Some(tolerance) = tolerance_secs {
        match ts.parse::<i64>() {
            Ok(ts_i) => {
                let now = chrono::Utc::now().timestamp();
                if (now - ts_i).unsigned_abs() > tolerance {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }

    let signed = format!("{}.{}", ts, std::str::from_utf8(payload).unwrap_or(""));
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(signed.as_bytes());
    let expected = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(&expected, sig)
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, ts: i64, payload: &[u8]) -> String {
        let signed = format!("{}.{}", ts, std::str::from_utf8(payload).unwrap());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(signed.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_stripe_style_signature_is_accepted() {
        let secret = "whsec_test";
        let payload = Bytes::from_static(b"{\"type\":\"payment_intent.succeeded\"}");
        let ts = chrono::Utc::now().timestamp();
        let sig = sign(secret, ts, &payload);

        let mut headers = HeaderMap::new();
        headers.insert(
            "stripe-signature",
            format!("t={},v1={}", ts, sig).parse().unwrap(),
        );
        assert!(verify_signature(&headers, &payload, secret, 300));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = Bytes::from_static(b"{}");
        let ts = chrono::Utc::now().timestamp();
        let sig = sign("whsec_other", ts, &payload);

        let mut headers = HeaderMap::new();
        headers.insert(
            "stripe-signature",
            format!("t={},v1={}", ts, sig).parse().unwrap(),
        );
        assert!(!verify_signature(&headers, &payload, "whsec_test", 300));
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let secret = "whsec_test";
        let payload = Bytes::from_static(b"{}");
        let ts = chrono::Utc::now().timestamp() - 3600;
        let sig = sign(secret, ts, &payload);

        let mut headers = HeaderMap::new();
        headers.insert(
            "stripe-signature",
            format!("t={},v1={}", ts, sig).parse().unwrap(),
        );
        assert!(!verify_signature(&headers, &payload, secret, 300));
    }

    #[test]
    fn missing_headers_are_rejected() {
        let payload = Bytes::from_static(b"{}");
        assert!(!verify_signature(&HeaderMap::new(), &payload, "whsec_test", 300));
    }

    #[test]
    fn metadata_extraction() {
        let order_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        let event = serde_json::json!({
            "type": "payment_intent.succeeded",
            "data": { "object": { "id": "pi_123", "metadata": {
                "order_id": order_id.to_string(),
                "user_id": user_id.to_string(),
            }}}
        });
        assert_eq!(extract_metadata(&event).unwrap(), (order_id, user_id));

        let bad = serde_json::json!({"type": "payment_intent.succeeded", "data": {"object": {}}});
        assert!(extract_metadata(&bad).is_err());
    }
}
