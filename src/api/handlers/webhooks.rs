use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::{
    api::state::AppState,
    payments::{webhook::AccountEvent, WebhookError, WebhookEvent, WebhookVerifier},
};

const SIGNATURE_HEADER: &str = "stripe-signature";

fn verify(verifier: &WebhookVerifier, headers: &HeaderMap, body: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(WebhookError::MissingSignature)?;

    verifier.construct_event(body, signature)
}

fn webhook_error(message: impl std::fmt::Display) -> Response {
    (StatusCode::BAD_REQUEST, format!("Webhook Error: {}", message)).into_response()
}

/// Checkout, payment-intent and transfer events. Acknowledged with
/// `{"received": true}` whenever the event was verified and the store was
/// reachable, even if nothing matched or the payload was unreadable.
pub async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let payments = match state.payments() {
        Ok(payments) => payments,
        Err(e) => return e.into_response(),
    };

    let event = match verify(&payments.payment_webhook, &headers, &body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Rejected payment webhook: {}", e);
            return webhook_error(e);
        }
    };

    match payments.reconciler.reconcile(&event).await {
        Ok(_) => Json(json!({ "received": true })).into_response(),
        Err(e) => {
            tracing::error!("Failed to process event {} ({}): {}", event.id, event.event_type, e);
            e.into_response()
        }
    }
}

/// Connected-account events, signed with their own secret. Responds with
/// bare status codes.
pub async fn account_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let Ok(payments) = state.payments() else {
        return StatusCode::SERVICE_UNAVAILABLE;
    };

    let event = match verify(&payments.account_webhook, &headers, &body) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!("Rejected account webhook: {}", e);
            return StatusCode::BAD_REQUEST;
        }
    };

    let account_event = match AccountEvent::from_event(&event) {
        Ok(account_event) => account_event,
        Err(e) => {
            tracing::error!("Unreadable account event {} ({}): {}", event.id, event.event_type, e);
            return StatusCode::INTERNAL_SERVER_ERROR;
        }
    };

    match payments.onboarding.handle_account_event(&account_event).await {
        Ok(_) => StatusCode::OK,
        Err(e) => {
            tracing::error!("Failed to process account event {}: {}", event.id, e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}
