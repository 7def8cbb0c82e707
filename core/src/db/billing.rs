//! Subscriptions, invoices, and the processor-event idempotency ledger the
//! Billing Reconciler uses to make webhook replays a no-op (spec §4.F).

use crate::error::CoreError;
use crate::models::{Invoice, Subscription};
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use eosin_common::ids::{InvoiceId, OrganizationId, SubscriptionId};
use tokio_postgres::Row;

fn row_to_subscription(row: &Row) -> Subscription {
    Subscription {
        id: SubscriptionId(row.get("id")),
        organization_id: OrganizationId(row.get("organization_id")),
        plan_id: row.get("plan_id"),
        status: row.get("status"),
        current_period_start: row.get("current_period_start"),
        current_period_end: row.get("current_period_end"),
        processor_subscription_id: row.get("processor_subscription_id"),
        canceled_at: row.get("canceled_at"),
    }
}

fn row_to_invoice(row: &Row) -> Invoice {
    Invoice {
        id: InvoiceId(row.get("id")),
        subscription_id: SubscriptionId(row.get("subscription_id")),
        organization_id: OrganizationId(row.get("organization_id")),
        amount_due: row.get("amount_due"),
        currency: row.get("currency"),
        status: row.get("status"),
        period_start: row.get("period_start"),
        period_end: row.get("period_end"),
        due_date: row.get("due_date"),
        paid_at: row.get("paid_at"),
        processor_invoice_id: row.get("processor_invoice_id"),
    }
}

/// Outcome of registering a processor event at the start of webhook
/// handling: either it's genuinely new and must be applied, or it was seen
/// before and handling is a no-op (spec §4.F idempotence invariant).
pub enum EventRegistration {
    Fresh,
    AlreadyProcessed,
}

/// Inserts the event row as `PENDING` if absent (`ON CONFLICT DO NOTHING`);
/// if a row already exists, reports whether it already reached `PROCESSED`
/// so the caller can skip re-applying it. Must run inside the same
/// transaction as the event's application.
pub async fn register_event(
    txn: &tokio_postgres::Transaction<'_>,
    processor_event_id: &str,
    event_type: &str,
) -> Result<EventRegistration, CoreError> {
    let id = eosin_common::ids::generate("evt");
    let inserted = txn
        .execute(
            "INSERT INTO processor_events (id, processor_event_id, event_type)
             VALUES ($1, $2, $3)
             ON CONFLICT (processor_event_id) DO NOTHING",
            &[&id, &processor_event_id, &event_type],
        )
        .await?;
    if inserted == 1 {
        return Ok(EventRegistration::Fresh);
    }
    let status: String = txn
        .query_one(
            "SELECT status FROM processor_events WHERE processor_event_id = $1",
            &[&processor_event_id],
        )
        .await?
        .get(0);
    if status == "PROCESSED" {
        Ok(EventRegistration::AlreadyProcessed)
    } else {
        Ok(EventRegistration::Fresh)
    }
}

pub async fn mark_event_status(
    txn: &tokio_postgres::Transaction<'_>,
    processor_event_id: &str,
    status: &str,
    error_message: Option<&str>,
) -> Result<(), CoreError> {
    txn.execute(
        "UPDATE processor_events SET status = $2, error_message = $3, processed_at = now()
         WHERE processor_event_id = $1",
        &[&processor_event_id, &status, &error_message],
    )
    .await?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert_subscription(
    txn: &tokio_postgres::Transaction<'_>,
    org_id: &OrganizationId,
    plan_id: &str,
    status: &str,
    current_period_start: DateTime<Utc>,
    current_period_end: DateTime<Utc>,
    processor_subscription_id: &str,
    canceled_at: Option<DateTime<Utc>>,
) -> Result<Subscription, CoreError> {
    let id = SubscriptionId::generate().0;
    let row = txn
        .query_one(
            "INSERT INTO subscriptions
                (id, organization_id, plan_id, status, current_period_start, current_period_end,
                 processor_subscription_id, canceled_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             ON CONFLICT (processor_subscription_id) DO UPDATE SET
                plan_id = EXCLUDED.plan_id,
                status = EXCLUDED.status,
                current_period_start = EXCLUDED.current_period_start,
                current_period_end = EXCLUDED.current_period_end,
                canceled_at = EXCLUDED.canceled_at,
                updated_at = now()
             RETURNING *",
            &[
                &id,
                &org_id.0,
                &plan_id,
                &status,
                &current_period_start,
                &current_period_end,
                &processor_subscription_id,
                &canceled_at,
            ],
        )
        .await?;
    Ok(row_to_subscription(&row))
}

pub async fn get_subscription_for_org(
    pool: &Pool,
    org_id: &OrganizationId,
) -> Result<Option<Subscription>, CoreError> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            "SELECT * FROM subscriptions WHERE organization_id = $1
             ORDER BY created_at DESC LIMIT 1",
            &[&org_id.0],
        )
        .await?;
    Ok(row.map(|r| row_to_subscription(&r)))
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert_invoice(
    txn: &tokio_postgres::Transaction<'_>,
    subscription_id: &SubscriptionId,
    org_id: &OrganizationId,
    amount_due: i64,
    currency: &str,
    status: &str,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    due_date: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    processor_invoice_id: &str,
) -> Result<Invoice, CoreError> {
    let id = InvoiceId::generate().0;
    let row = txn
        .query_one(
            "INSERT INTO invoices
                (id, subscription_id, organization_id, amount_due, currency, status,
                 period_start, period_end, due_date, paid_at, processor_invoice_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
             ON CONFLICT (processor_invoice_id) DO UPDATE SET
                status = EXCLUDED.status, paid_at = EXCLUDED.paid_at, updated_at = now()
             RETURNING *",
            &[
                &id,
                &subscription_id.0,
                &org_id.0,
                &amount_due,
                &currency,
                &status,
                &period_start,
                &period_end,
                &due_date,
                &paid_at,
                &processor_invoice_id,
            ],
        )
        .await?;
    Ok(row_to_invoice(&row))
}

pub async fn list_invoices(pool: &Pool, org_id: &OrganizationId) -> Result<Vec<Invoice>, CoreError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT * FROM invoices WHERE organization_id = $1 ORDER BY period_start DESC",
            &[&org_id.0],
        )
        .await?;
    Ok(rows.iter().map(row_to_invoice).collect())
}
