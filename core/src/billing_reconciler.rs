//! Billing Reconciler (spec §4.F): mirrors an external payment processor's
//! state locally, keyed so replayed webhooks are a no-op.

use crate::db::billing::{self, EventRegistration};
use crate::db::organizations;
use crate::error::CoreError;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use eosin_common::ids::OrganizationId;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_TOLERANCE_SECS: i64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Verifies `signature` as `HMAC-SHA256(timestamp ":" payload)` against
/// `secret`, rejecting timestamps outside a 5-minute tolerance window —
/// the processor's documented replay-protection scheme (spec §4.F).
pub fn verify_signature(
    secret: &str,
    payload: &[u8],
    timestamp: i64,
    signature_hex: &str,
) -> Result<(), WebhookError> {
    let now = Utc::now().timestamp();
    if (now - timestamp).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err(WebhookError::InvalidSignature);
    }
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::InvalidSignature)?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b":");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());
    if eosin_common::auth::constant_time_eq(expected.as_bytes(), signature_hex.as_bytes()) {
        Ok(())
    } else {
        Err(WebhookError::InvalidSignature)
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct SubscriptionPayload {
    organization_id: String,
    plan_id: String,
    status: String,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    processor_subscription_id: String,
    canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct InvoicePayload {
    subscription_processor_id: String,
    organization_id: String,
    amount_due: i64,
    currency: String,
    status: String,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    due_date: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    processor_invoice_id: String,
}

/// Applies one webhook event inside a single transaction covering the
/// idempotency check, the mirror update, and recording the outcome (spec
/// §5 "Webhook apply: one transaction per event").
pub async fn process_webhook(pool: &Pool, event: WebhookEvent) -> Result<(), WebhookError> {
    let mut client = pool.get().await.map_err(CoreError::from)?;
    let txn = client.transaction().await.map_err(CoreError::from)?;

    match billing::register_event(&txn, &event.id, &event.event_type)
        .await
        .map_err(WebhookError::Core)?
    {
        EventRegistration::AlreadyProcessed => {
            txn.commit().await.map_err(CoreError::from)?;
            return Ok(());
        }
        EventRegistration::Fresh => {}
    }

    let outcome = apply_event(&txn, &event).await;
    match &outcome {
        Ok(()) => {
            billing::mark_event_status(&txn, &event.id, "PROCESSED", None)
                .await
                .map_err(WebhookError::Core)?;
        }
        Err(msg) => {
            // An unhandled event type is non-fatal: acknowledged to the
            // processor, recorded FAILED for operator visibility.
            billing::mark_event_status(&txn, &event.id, "FAILED", Some(msg))
                .await
                .map_err(WebhookError::Core)?;
        }
    }
    txn.commit().await.map_err(CoreError::from)?;
    Ok(())
}

async fn apply_event(txn: &tokio_postgres::Transaction<'_>, event: &WebhookEvent) -> Result<(), String> {
    match event.event_type.as_str() {
        "subscription.created" | "subscription.updated" | "subscription.deleted" => {
            let payload: SubscriptionPayload =
                serde_json::from_value(event.data.clone()).map_err(|e| e.to_string())?;
            billing::upsert_subscription(
                txn,
                &OrganizationId(payload.organization_id),
                &payload.plan_id,
                &payload.status,
                payload.current_period_start,
                payload.current_period_end,
                &payload.processor_subscription_id,
                payload.canceled_at,
            )
            .await
            .map_err(|e| e.to_string())?;
            Ok(())
        }
        "invoice.created" | "invoice.paid" | "invoice.voided" => {
            let payload: InvoicePayload =
                serde_json::from_value(event.data.clone()).map_err(|e| e.to_string())?;
            let subscription_id: String = txn
                .query_one(
                    "SELECT id FROM subscriptions WHERE processor_subscription_id = $1",
                    &[&payload.subscription_processor_id],
                )
                .await
                .map_err(|e| e.to_string())?
                .get(0);
            billing::upsert_invoice(
                txn,
                &eosin_common::ids::SubscriptionId(subscription_id),
                &OrganizationId(payload.organization_id),
                payload.amount_due,
                &payload.currency,
                &payload.status,
                payload.period_start,
                payload.period_end,
                payload.due_date,
                payload.paid_at,
                &payload.processor_invoice_id,
            )
            .await
            .map_err(|e| e.to_string())?;
            Ok(())
        }
        other => Err(format!("unhandled event type: {other}")),
    }
}

pub async fn set_processor_customer(
    pool: &Pool,
    org_id: &OrganizationId,
    processor_customer_id: &str,
) -> Result<(), CoreError> {
    organizations::set_processor_customer_id(pool, org_id, processor_customer_id).await
}
