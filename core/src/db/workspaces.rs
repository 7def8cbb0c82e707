//! Workspaces and the vcluster-status state machine (spec §3, §4.D).

use crate::error::CoreError;
use crate::models::{Page, Task, TaskType, Workspace};
use chrono::Utc;
use deadpool_postgres::Pool;
use eosin_common::ids::{OrganizationId, TaskId, WorkspaceId};
use serde_json::Value;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

fn row_to_workspace(row: &Row) -> Workspace {
    Workspace {
        id: WorkspaceId(row.get("id")),
        organization_id: OrganizationId(row.get("organization_id")),
        name: row.get("name"),
        plan_id: row.get("plan_id"),
        vcluster_instance_name: row.get("vcluster_instance_name"),
        vcluster_status: row.get("vcluster_status"),
        vcluster_config: row.get("vcluster_config"),
        dedicated_node_config: row.get("dedicated_node_config"),
        processor_subscription_item_id: row.get("processor_subscription_item_id"),
        kubeconfig_encrypted: row.get("kubeconfig_encrypted"),
        error_message: row.get("error_message"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

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

/// Creates the workspace row and enqueues its CREATE task in one
/// transaction, so a crash between the two never leaves a workspace with
/// no task to bring it up (spec §5 "workspace creation and its CREATE
/// task enqueue happen atomically").
pub async fn create_workspace(
    pool: &Pool,
    org_id: &OrganizationId,
    name: &str,
    plan_id: &str,
    vcluster_config: &Value,
) -> Result<(Workspace, Task), CoreError> {
    let mut client = pool.get().await?;
    let txn = client.transaction().await?;

    let existing: Option<i64> = txn
        .query_opt(
            "SELECT 1 FROM workspaces WHERE organization_id = $1 AND name = $2 AND deleted_at IS NULL",
            &[&org_id.0, &name],
        )
        .await?
        .map(|_| 1);
    if existing.is_some() {
        return Err(CoreError::Conflict(format!(
            "workspace name '{name}' already in use in this organization"
        )));
    }

    let ws_id = WorkspaceId::generate().0;
    let ws_row = txn
        .query_one(
            "INSERT INTO workspaces (id, organization_id, name, plan_id, vcluster_status, vcluster_config)
             VALUES ($1, $2, $3, $4, 'PENDING_CREATION', $5)
             RETURNING *",
            &[&ws_id, &org_id.0, &name, &plan_id, vcluster_config],
        )
        .await?;

    let task_id = TaskId::generate().0;
    let payload = serde_json::json!({"workspace_id": ws_id, "plan_id": plan_id});
    let task_row = txn
        .query_one(
            "INSERT INTO tasks (id, workspace_id, task_type, payload)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
            &[&task_id, &ws_id, &TaskType::Create.as_str(), &payload],
        )
        .await?;

    txn.commit().await?;
    Ok((row_to_workspace(&ws_row), row_to_task(&task_row)))
}

pub async fn get_workspace(pool: &Pool, id: &WorkspaceId) -> Result<Workspace, CoreError> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            "SELECT * FROM workspaces WHERE id = $1 AND deleted_at IS NULL",
            &[&id.0],
        )
        .await?
        .ok_or(CoreError::NotFound)?;
    Ok(row_to_workspace(&row))
}

pub async fn list_workspaces(
    pool: &Pool,
    org_id: &OrganizationId,
    offset: i64,
    limit: i64,
) -> Result<Page<Workspace>, CoreError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT *, COUNT(*) OVER() AS full_count
             FROM workspaces
             WHERE organization_id = $1 AND deleted_at IS NULL
             ORDER BY created_at
             LIMIT $2 OFFSET $3",
            &[&org_id.0, &limit, &offset],
        )
        .await?;
    let full_count = rows.first().map(|r| r.get::<_, i64>("full_count")).unwrap_or(0);
    let items: Vec<Workspace> = rows.iter().map(row_to_workspace).collect();
    let truncated = offset + (items.len() as i64) < full_count;
    Ok(Page { items, offset, limit, full_count, truncated })
}

/// Applies a plan/dedicated-node-config change and enqueues its task, but
/// only when the workspace is currently `RUNNING` — any other status means
/// a transition is already in flight (spec §5 "Ordering": one outstanding
/// mutating task per workspace at a time).
pub async fn request_update(
    pool: &Pool,
    id: &WorkspaceId,
    task_type: TaskType,
    new_plan_id: Option<&str>,
    new_dedicated_node_config: Option<&Value>,
) -> Result<Task, CoreError> {
    let mut client = pool.get().await?;
    let txn = client.transaction().await?;

    let status: Option<String> = txn
        .query_opt(
            "SELECT vcluster_status FROM workspaces WHERE id = $1 AND deleted_at IS NULL",
            &[&id.0],
        )
        .await?
        .map(|r| r.get("vcluster_status"));
    let Some(status) = status else {
        return Err(CoreError::NotFound);
    };
    if status != "RUNNING" {
        return Err(CoreError::Conflict(format!(
            "workspace has a transition already in progress ({status})"
        )));
    }

    let next_status = match task_type {
        TaskType::UpdatePlan => "UPDATING_PLAN",
        TaskType::UpdateDedicatedNodes => "UPDATING_DEDICATED_NODES",
        other => {
            return Err(CoreError::Internal(format!(
                "request_update called with non-update task type {other:?}"
            )));
        }
    };

    let mut set_clauses = vec!["vcluster_status = $2".to_string(), "updated_at = now()".to_string()];
    let mut params: Vec<&(dyn ToSql + Sync)> = vec![&id.0, &next_status];
    let mut idx = 3;
    if let Some(plan) = new_plan_id {
        set_clauses.push(format!("plan_id = ${idx}"));
        params.push(&plan);
        idx += 1;
    }
    if let Some(cfg) = new_dedicated_node_config {
        set_clauses.push(format!("dedicated_node_config = ${idx}"));
        params.push(cfg);
        idx += 1;
    }
    let _ = idx;
    txn.execute(
        &format!("UPDATE workspaces SET {} WHERE id = $1", set_clauses.join(", ")),
        &params,
    )
    .await?;

    let task_id = TaskId::generate().0;
    let payload = serde_json::json!({
        "workspace_id": id.0,
        "plan_id": new_plan_id,
        "dedicated_node_config": new_dedicated_node_config,
    });
    let row = txn
        .query_one(
            "INSERT INTO tasks (id, workspace_id, task_type, payload) VALUES ($1, $2, $3, $4) RETURNING *",
            &[&task_id, &id.0, &task_type.as_str(), &payload],
        )
        .await?;
    txn.commit().await?;
    Ok(row_to_task(&row))
}

/// Transitions to `DELETING` and enqueues a DELETE task. Idempotent: a
/// workspace already `DELETING`/`DELETED` returns its current state rather
/// than erroring, per spec §4.D "delete is idempotent".
pub async fn request_delete(pool: &Pool, id: &WorkspaceId) -> Result<Task, CoreError> {
    let mut client = pool.get().await?;
    let txn = client.transaction().await?;

    let status: Option<String> = txn
        .query_opt(
            "SELECT vcluster_status FROM workspaces WHERE id = $1 AND deleted_at IS NULL",
            &[&id.0],
        )
        .await?
        .map(|r| r.get("vcluster_status"));
    let Some(status) = status else {
        return Err(CoreError::NotFound);
    };

    if status == "DELETING" || status == "DELETED" {
        let existing = txn
            .query_opt(
                "SELECT * FROM tasks WHERE workspace_id = $1 AND task_type = 'DELETE'
                 ORDER BY created_at DESC LIMIT 1",
                &[&id.0],
            )
            .await?;
        txn.commit().await?;
        return existing
            .map(|r| row_to_task(&r))
            .ok_or(CoreError::Conflict("workspace deletion already in progress".to_string()));
    }

    txn.execute(
        "UPDATE workspaces SET vcluster_status = 'DELETING', updated_at = now() WHERE id = $1",
        &[&id.0],
    )
    .await?;
    let task_id = TaskId::generate().0;
    let payload = serde_json::json!({"workspace_id": id.0});
    let row = txn
        .query_one(
            "INSERT INTO tasks (id, workspace_id, task_type, payload) VALUES ($1, $2, 'DELETE', $3) RETURNING *",
            &[&task_id, &id.0, &payload],
        )
        .await?;
    txn.commit().await?;
    Ok(row_to_task(&row))
}

pub async fn set_status(
    pool: &Pool,
    id: &WorkspaceId,
    status: &str,
    instance_name: Option<&str>,
    error_message: Option<&str>,
) -> Result<(), CoreError> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE workspaces
             SET vcluster_status = $2, vcluster_instance_name = COALESCE($3, vcluster_instance_name),
                 error_message = $4, updated_at = now()
             WHERE id = $1",
            &[&id.0, &status, &instance_name, &error_message],
        )
        .await?;
    Ok(())
}

pub async fn set_kubeconfig(pool: &Pool, id: &WorkspaceId, kubeconfig_encrypted: &[u8]) -> Result<(), CoreError> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE workspaces SET kubeconfig_encrypted = $2, updated_at = now() WHERE id = $1",
            &[&id.0, &kubeconfig_encrypted],
        )
        .await?;
    Ok(())
}

/// Soft-deletes the row once its DELETE task has completed.
pub async fn mark_deleted(pool: &Pool, id: &WorkspaceId) -> Result<(), CoreError> {
    let client = pool.get().await?;
    let now = Utc::now();
    client
        .execute(
            "UPDATE workspaces SET vcluster_status = 'DELETED', deleted_at = $2, updated_at = $2 WHERE id = $1",
            &[&id.0, &now],
        )
        .await?;
    Ok(())
}
