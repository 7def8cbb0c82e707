//! Unauthenticated processor webhook intake (spec §4.F, §6 `POST
//! /webhooks/stripe`). No `AuthenticatedUser` extractor here: the
//! processor is not a platform user, its identity is the HMAC signature.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;

use crate::app::App;
use crate::billing_reconciler::{self, WebhookEvent};

/// The processor sends its signature as `t=<unix_ts>,v1=<hex_hmac>`, the
/// same scheme Stripe's own webhook headers use.
fn parse_signature_header(header: &str) -> Option<(i64, &str)> {
    let mut timestamp = None;
    let mut signature = None;
    for part in header.split(',') {
        let mut kv = part.splitn(2, '=');
        match (kv.next(), kv.next()) {
            (Some("t"), Some(v)) => timestamp = v.parse::<i64>().ok(),
            (Some("v1"), Some(v)) => signature = Some(v),
            _ => {}
        }
    }
    Some((timestamp?, signature?))
}

pub async fn stripe_webhook(
    State(app): State<App>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> impl IntoResponse {
    let Some(signature_header) = headers
        .get("Stripe-Signature")
        .and_then(|v| v.to_str().ok())
    else {
        return (StatusCode::BAD_REQUEST, "missing Stripe-Signature header").into_response();
    };
    let Some((timestamp, signature)) = parse_signature_header(signature_header) else {
        return (StatusCode::BAD_REQUEST, "malformed Stripe-Signature header").into_response();
    };

    if billing_reconciler::verify_signature(&app.webhook_secret, &body, timestamp, signature).is_err() {
        return (StatusCode::BAD_REQUEST, "invalid signature").into_response();
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(_) => return (StatusCode::BAD_REQUEST, "malformed event payload").into_response(),
    };

    match billing_reconciler::process_webhook(&app.db, event).await {
        Ok(()) => (StatusCode::OK, Json(serde_json::json!({"received": true}))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "webhook processing failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "webhook processing failed").into_response()
        }
    }
}
