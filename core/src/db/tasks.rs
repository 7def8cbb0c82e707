//! Task Runner queue operations (spec §4.C, §5): claim via conditional
//! UPDATE (oldest-PENDING-first, tie-broken by creation order), complete,
//! fail-with-backoff, and reaping tasks whose claim lease expired.

use crate::error::CoreError;
use crate::models::Task;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use deadpool_postgres::Pool;
use eosin_common::ids::{TaskId, WorkspaceId};
use std::time::Duration;
use tokio_postgres::Row;

pub const MAX_ATTEMPTS: i32 = 5;
const BACKOFF_BASE: Duration = Duration::from_secs(30);
const BACKOFF_CAP: Duration = Duration::from_secs(30 * 60);
const CLAIM_LEASE_SECS: i64 = 300;

fn row_to_task(row: &Row) -> Task {
    Task {
        id: TaskId(row.get("id")),
        workspace_id: WorkspaceId(row.get("workspace_id")),
        task_type: row.get("task_type"),
        status: row.get("status"),
        payload: row.get("payload"),
        error_message: row.get("error_message"),
        attempt_count: row.get("attempt_count"),
        worker_id: row.get("worker_id"),
        claim_expiry: row.get("claim_expiry"),
        not_before: row.get("not_before"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Claims the oldest eligible `PENDING` task for `worker_id` via a single
/// conditional `UPDATE ... WHERE id = (SELECT ... FOR UPDATE SKIP LOCKED)`,
/// so concurrent workers never claim the same row (spec §5 "claim_next is
/// exactly-once under concurrent workers").
pub async fn claim_next(pool: &Pool, worker_id: &str) -> Result<Option<Task>, CoreError> {
    let client = pool.get().await?;
    let claim_expiry = Utc::now() + ChronoDuration::seconds(CLAIM_LEASE_SECS);
    let row = client
        .query_opt(
            "UPDATE tasks SET status = 'RUNNING', worker_id = $1, claim_expiry = $2,
                attempt_count = attempt_count + 1, updated_at = now()
             WHERE id = (
                SELECT id FROM tasks
                WHERE status = 'PENDING' AND not_before <= now()
                ORDER BY created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
             )
             RETURNING *",
            &[&worker_id, &claim_expiry],
        )
        .await?;
    Ok(row.map(|r| row_to_task(&r)))
}

pub async fn complete(pool: &Pool, id: &TaskId) -> Result<(), CoreError> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE tasks SET status = 'COMPLETED', worker_id = NULL, claim_expiry = NULL, updated_at = now()
             WHERE id = $1",
            &[&id.0],
        )
        .await?;
    Ok(())
}

/// Records a failed attempt. Below `MAX_ATTEMPTS`, reschedules as `PENDING`
/// with full-jitter exponential backoff; at or beyond it, marks `FAILED`
/// terminally (spec §7 "task failure policy").
pub async fn fail(pool: &Pool, id: &TaskId, error_message: &str) -> Result<bool, CoreError> {
    let client = pool.get().await?;
    let attempt_count: i32 = client
        .query_one("SELECT attempt_count FROM tasks WHERE id = $1", &[&id.0])
        .await?
        .get(0);

    if attempt_count >= MAX_ATTEMPTS {
        client
            .execute(
                "UPDATE tasks SET status = 'FAILED', error_message = $2, worker_id = NULL,
                    claim_expiry = NULL, updated_at = now()
                 WHERE id = $1",
                &[&id.0, &error_message],
            )
            .await?;
        return Ok(false);
    }

    let delay = eosin_common::wait::backoff_full_jitter(BACKOFF_BASE, BACKOFF_CAP, attempt_count as usize);
    let not_before: DateTime<Utc> = Utc::now() + ChronoDuration::from_std(delay).unwrap_or_default();
    client
        .execute(
            "UPDATE tasks SET status = 'PENDING', error_message = $2, worker_id = NULL,
                claim_expiry = NULL, not_before = $3, updated_at = now()
             WHERE id = $1",
            &[&id.0, &error_message, &not_before],
        )
        .await?;
    Ok(true)
}

/// Resets `RUNNING` tasks whose `claim_expiry` has passed back to
/// `PENDING`, so a worker that died mid-task doesn't strand it (spec §5
/// "reap_stale"). Returns the number of tasks reset.
pub async fn reap_stale(pool: &Pool) -> Result<u64, CoreError> {
    let client = pool.get().await?;
    let reset = client
        .execute(
            "UPDATE tasks SET status = 'PENDING', worker_id = NULL, claim_expiry = NULL, updated_at = now()
             WHERE status = 'RUNNING' AND claim_expiry < now()",
            &[],
        )
        .await?;
    Ok(reset)
}

pub async fn get(pool: &Pool, id: &TaskId) -> Result<Task, CoreError> {
    let client = pool.get().await?;
    let row = client
        .query_opt("SELECT * FROM tasks WHERE id = $1", &[&id.0])
        .await?
        .ok_or(CoreError::NotFound)?;
    Ok(row_to_task(&row))
}

pub async fn list_for_workspace(pool: &Pool, workspace_id: &WorkspaceId) -> Result<Vec<Task>, CoreError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT * FROM tasks WHERE workspace_id = $1 ORDER BY created_at DESC",
            &[&workspace_id.0],
        )
        .await?;
    Ok(rows.iter().map(row_to_task).collect())
}
