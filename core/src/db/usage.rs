//! Resource usage records, the metering input to billing (spec §3
//! "UsageRecord", §4.F).

use crate::error::CoreError;
use crate::models::UsageRecord;
use chrono::{DateTime, Utc};
use deadpool_postgres::Pool;
use eosin_common::ids::{OrganizationId, UsageRecordId, WorkspaceId};
use tokio_postgres::Row;

fn row_to_usage(row: &Row) -> UsageRecord {
    UsageRecord {
        id: UsageRecordId(row.get("id")),
        organization_id: OrganizationId(row.get("organization_id")),
        workspace_id: row.get::<_, Option<String>>("workspace_id").map(WorkspaceId),
        resource_type: row.get("resource_type"),
        quantity: row.get("quantity"),
        unit: row.get("unit"),
        recorded_at: row.get("recorded_at"),
    }
}

pub async fn record_usage(
    pool: &Pool,
    org_id: &OrganizationId,
    workspace_id: Option<&WorkspaceId>,
    resource_type: &str,
    quantity: f64,
    unit: &str,
) -> Result<UsageRecord, CoreError> {
    let client = pool.get().await?;
    let id = UsageRecordId::generate().0;
    let workspace = workspace_id.map(|w| w.0.clone());
    let row = client
        .query_one(
            "INSERT INTO usage_records (id, organization_id, workspace_id, resource_type, quantity, unit)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING *",
            &[&id, &org_id.0, &workspace, &resource_type, &quantity, &unit],
        )
        .await?;
    Ok(row_to_usage(&row))
}

pub async fn usage_for_org_in_window(
    pool: &Pool,
    org_id: &OrganizationId,
    since: DateTime<Utc>,
    until: DateTime<Utc>,
) -> Result<Vec<UsageRecord>, CoreError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT * FROM usage_records
             WHERE organization_id = $1 AND recorded_at >= $2 AND recorded_at < $3
             ORDER BY recorded_at",
            &[&org_id.0, &since, &until],
        )
        .await?;
    Ok(rows.iter().map(row_to_usage).collect())
}

pub async fn usage_for_workspace(pool: &Pool, workspace_id: &WorkspaceId) -> Result<Vec<UsageRecord>, CoreError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT * FROM usage_records WHERE workspace_id = $1 ORDER BY recorded_at DESC",
            &[&workspace_id.0],
        )
        .await?;
    Ok(rows.iter().map(row_to_usage).collect())
}
