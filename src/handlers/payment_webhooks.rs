//! Payment provider callbacks. The provider signs the raw body with
//! HMAC-SHA256; we verify before parsing. Handlers are idempotent, so
//! provider retries of a delivered event are harmless.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::{ApiResponse, AppState};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-webhook-signature";

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct PaymentWebhookPayload {
    /// "payment.captured", "payment.failed" or "payment.refunded"
    #[schema(example = "payment.captured")]
    pub event_type: String,
    pub booking_id: Uuid,
    /// Provider-side transaction id, logged for reconciliation
    pub transaction_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WebhookAck {
    pub received: bool,
    pub booking_status: Option<String>,
}

/// Verifies the hex HMAC-SHA256 signature over the raw body. `Mac::verify`
/// compares in constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> Result<(), ServiceError> {
    let signature = hex::decode(signature_hex)
        .map_err(|_| ServiceError::Unauthorized("Malformed webhook signature".to_string()))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ServiceError::InternalError(format!("HMAC init failed: {}", e)))?;
    mac.update(body);
    mac.verify_slice(&signature)
        .map_err(|_| ServiceError::Unauthorized("Invalid webhook signature".to_string()))
}

/// Payment provider webhook. Captured payments confirm the booking;
/// failures are recorded; refund notifications flip completed bookings.
#[utoipa::path(
    post,
    path = "/api/v1/webhooks/payment",
    request_body = PaymentWebhookPayload,
    responses(
        (status = 200, description = "Event processed", body = WebhookAck),
        (status = 401, description = "Bad signature"),
        (status = 409, description = "Booking cannot take this transition")
    ),
    tag = "webhooks"
)]
#[instrument(skip(state, headers, body))]
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ApiResponse<WebhookAck>>, ServiceError> {
    let secret = state
        .config
        .payment_webhook_secret
        .as_deref()
        .ok_or_else(|| {
            ServiceError::InternalError("Payment webhook secret is not configured".to_string())
        })?;

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ServiceError::Unauthorized("Missing webhook signature".to_string()))?;

    verify_signature(secret, &body, signature)?;

    let payload: PaymentWebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::ValidationError(format!("Invalid webhook body: {}", e)))?;

    info!(
        event_type = %payload.event_type,
        booking_id = %payload.booking_id,
        transaction_id = payload.transaction_id.as_deref().unwrap_or("-"),
        "payment webhook received"
    );

    let booking = match payload.event_type.as_str() {
        "payment.captured" => Some(
            state
                .services
                .bookings
                .confirm_payment(payload.booking_id)
                .await?,
        ),
        "payment.failed" => Some(
            state
                .services
                .bookings
                .fail_payment(payload.booking_id)
                .await?,
        ),
        "payment.refunded" => Some(state.services.bookings.refund(payload.booking_id).await?),
        other => {
            // Acknowledge unknown event types so the provider stops retrying.
            warn!(event_type = %other, "ignoring unknown payment event type");
            None
        }
    };

    Ok(Json(ApiResponse::ok(WebhookAck {
        received: true,
        booking_status: booking.map(|b| b.status),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sign(secret: &str, body: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(body);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_passes() {
        let secret = "whsec_test";
        let body = br#"{"event_type":"payment.captured","booking_id":"00000000-0000-0000-0000-000000000000"}"#;
        let signature = sign(secret, body);
        assert!(verify_signature(secret, body, &signature).is_ok());
    }

    #[test]
    fn tampered_body_fails() {
        let secret = "whsec_test";
        let signature = sign(secret, b"original");
        let err = verify_signature(secret, b"tampered", &signature).unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn wrong_secret_fails() {
        let body = b"payload";
        let signature = sign("secret-a", body);
        assert!(verify_signature("secret-b", body, &signature).is_err());
    }

    #[test]
    fn malformed_hex_fails() {
        let err = verify_signature("secret", b"payload", "not-hex!").unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }
}
