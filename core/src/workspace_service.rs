//! Workspace Service (spec §4.D): the RBAC- and plan-validating layer
//! above the raw `db::workspaces` repository. Handlers call into this
//! instead of `db::workspaces` directly so authorization and plan checks
//! live in one place.

use crate::db::{organizations, workspaces};
use crate::error::CoreError;
use crate::models::{OrgRole, Page, Task, VclusterStatus, Workspace};
use deadpool_postgres::Pool;
use eosin_common::ids::{OrganizationId, UserId, WorkspaceId};
use serde_json::Value;

/// Plans recognized by the control plane. A real deployment would read
/// these from a catalog table; the set is small and fixed enough that
/// spec §4.D treats it as configuration, not state.
const KNOWN_PLANS: &[&str] = &["starter", "standard", "dedicated"];

pub fn is_known_plan(plan_id: &str) -> bool {
    KNOWN_PLANS.contains(&plan_id)
}

async fn require_admin(pool: &Pool, org_id: &OrganizationId, user_id: &UserId) -> Result<OrgRole, CoreError> {
    let role = organizations::member_role(pool, org_id, user_id)
        .await?
        .and_then(|r| OrgRole::parse(&r))
        .ok_or(CoreError::Forbidden)?;
    if !role.is_admin_or_above() {
        return Err(CoreError::Forbidden);
    }
    Ok(role)
}

async fn require_member(pool: &Pool, org_id: &OrganizationId, user_id: &UserId) -> Result<OrgRole, CoreError> {
    organizations::member_role(pool, org_id, user_id)
        .await?
        .and_then(|r| OrgRole::parse(&r))
        .ok_or(CoreError::Forbidden)
}

pub async fn create_workspace(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
    name: &str,
    plan_id: &str,
    vcluster_config: &Value,
) -> Result<(Workspace, Task), CoreError> {
    require_admin(pool, org_id, user_id).await?;
    if name.is_empty() || name.len() > 63 {
        return Err(CoreError::Validation(
            "workspace name must be 1-63 characters".to_string(),
        ));
    }
    if !is_known_plan(plan_id) {
        return Err(CoreError::Validation(format!("unknown plan '{plan_id}'")));
    }
    workspaces::create_workspace(pool, org_id, name, plan_id, vcluster_config).await
}

pub async fn get_workspace(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
    workspace_id: &WorkspaceId,
) -> Result<Workspace, CoreError> {
    require_member(pool, org_id, user_id).await?;
    let ws = workspaces::get_workspace(pool, workspace_id).await?;
    if &ws.organization_id != org_id {
        return Err(CoreError::NotFound);
    }
    Ok(ws)
}

pub async fn list_workspaces(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
    offset: i64,
    limit: i64,
) -> Result<Page<Workspace>, CoreError> {
    require_member(pool, org_id, user_id).await?;
    workspaces::list_workspaces(pool, org_id, offset, limit).await
}

pub async fn update_workspace(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
    workspace_id: &WorkspaceId,
    new_plan_id: Option<&str>,
    new_dedicated_node_config: Option<&Value>,
) -> Result<Task, CoreError> {
    require_admin(pool, org_id, user_id).await?;
    if let Some(plan) = new_plan_id
        && !is_known_plan(plan)
    {
        return Err(CoreError::Validation(format!("unknown plan '{plan}'")));
    }
    let ws = workspaces::get_workspace(pool, workspace_id).await?;
    if &ws.organization_id != org_id {
        return Err(CoreError::NotFound);
    }

    let task_type = if new_dedicated_node_config.is_some() {
        crate::models::TaskType::UpdateDedicatedNodes
    } else {
        crate::models::TaskType::UpdatePlan
    };
    workspaces::request_update(pool, workspace_id, task_type, new_plan_id, new_dedicated_node_config).await
}

pub async fn delete_workspace(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
    workspace_id: &WorkspaceId,
) -> Result<Task, CoreError> {
    require_admin(pool, org_id, user_id).await?;
    let ws = workspaces::get_workspace(pool, workspace_id).await?;
    if &ws.organization_id != org_id {
        return Err(CoreError::NotFound);
    }
    workspaces::request_delete(pool, workspace_id).await
}

/// Decrypts and returns the kubeconfig, refusing while the workspace
/// isn't `RUNNING` (spec §4.D "get_kubeconfig -> NotReady unless the
/// vcluster is RUNNING").
pub async fn get_kubeconfig(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
    workspace_id: &WorkspaceId,
    kubeconfig_key: &[u8; 32],
) -> Result<String, CoreError> {
    require_member(pool, org_id, user_id).await?;
    let ws = workspaces::get_workspace(pool, workspace_id).await?;
    if &ws.organization_id != org_id {
        return Err(CoreError::NotFound);
    }
    if ws.vcluster_status != VclusterStatus::Running.as_str() {
        return Err(CoreError::NotReady(ws.vcluster_status.clone()));
    }
    let encrypted = ws
        .kubeconfig_encrypted
        .ok_or_else(|| CoreError::Internal("running workspace missing kubeconfig".to_string()))?;
    let plaintext = crate::crypto::decrypt(kubeconfig_key, &encrypted)
        .map_err(|e| CoreError::Internal(e.to_string()))?;
    String::from_utf8(plaintext).map_err(|e| CoreError::Internal(e.to_string()))
}

pub async fn get_usage(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
    workspace_id: &WorkspaceId,
) -> Result<Vec<crate::models::UsageRecord>, CoreError> {
    require_member(pool, org_id, user_id).await?;
    let ws = workspaces::get_workspace(pool, workspace_id).await?;
    if &ws.organization_id != org_id {
        return Err(CoreError::NotFound);
    }
    crate::db::usage::usage_for_workspace(pool, workspace_id).await
}
