//! Workspace and billing routes (spec §4.D, §4.F, §6).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use super::auth_middleware::AuthenticatedUser;
use crate::app::App;
use crate::db::{billing, usage};
use crate::error::CoreError;
use crate::workspace_service;
use eosin_common::Pagination;
use eosin_common::ids::{OrganizationId, UserId, WorkspaceId};

#[derive(Deserialize)]
pub struct CreateWorkspaceRequest {
    pub name: String,
    pub plan_id: String,
    #[serde(default)]
    pub vcluster_config: serde_json::Value,
}

pub async fn create_workspace(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
    Json(req): Json<CreateWorkspaceRequest>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let (ws, task) = workspace_service::create_workspace(
        &app.db,
        &OrganizationId(org_id),
        &UserId(claims.sub),
        &req.name,
        &req.plan_id,
        &req.vcluster_config,
    )
    .await?;
    Ok(Json(serde_json::json!({"workspace": ws, "task": task})))
}

pub async fn list_workspaces(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let limit = page.limit.unwrap_or(50).clamp(1, 200);
    let result = workspace_service::list_workspaces(
        &app.db,
        &OrganizationId(org_id),
        &UserId(claims.sub),
        page.offset,
        limit,
    )
    .await?;
    Ok(Json(serde_json::json!(result)))
}

pub async fn get_workspace(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((org_id, ws_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let ws = workspace_service::get_workspace(
        &app.db,
        &OrganizationId(org_id),
        &UserId(claims.sub),
        &WorkspaceId(ws_id),
    )
    .await?;
    Ok(Json(serde_json::json!(ws)))
}

#[derive(Deserialize)]
pub struct UpdateWorkspaceRequest {
    pub plan_id: Option<String>,
    pub dedicated_node_config: Option<serde_json::Value>,
}

pub async fn update_workspace(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((org_id, ws_id)): Path<(String, String)>,
    Json(req): Json<UpdateWorkspaceRequest>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let task = workspace_service::update_workspace(
        &app.db,
        &OrganizationId(org_id),
        &UserId(claims.sub),
        &WorkspaceId(ws_id),
        req.plan_id.as_deref(),
        req.dedicated_node_config.as_ref(),
    )
    .await?;
    Ok(Json(serde_json::json!({"task": task})))
}

pub async fn delete_workspace(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((org_id, ws_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let task = workspace_service::delete_workspace(
        &app.db,
        &OrganizationId(org_id),
        &UserId(claims.sub),
        &WorkspaceId(ws_id),
    )
    .await?;
    Ok(Json(serde_json::json!({"task": task})))
}

/// Returns the workspace's kubeconfig as raw YAML text (spec §6: this
/// endpoint's body is YAML, not the JSON envelope the rest of the API
/// uses).
pub async fn get_kubeconfig(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((org_id, ws_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, CoreError> {
    let yaml = workspace_service::get_kubeconfig(
        &app.db,
        &OrganizationId(org_id),
        &UserId(claims.sub),
        &WorkspaceId(ws_id),
        &app.kubeconfig_key,
    )
    .await?;
    Ok((
        StatusCode::OK,
        [("content-type", "application/yaml")],
        yaml,
    ))
}

pub async fn get_usage(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((org_id, ws_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let records = workspace_service::get_usage(
        &app.db,
        &OrganizationId(org_id),
        &UserId(claims.sub),
        &WorkspaceId(ws_id),
    )
    .await?;
    Ok(Json(serde_json::json!(records)))
}

pub async fn list_invoices(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let org_id = OrganizationId(org_id);
    crate::db::organizations::member_role(&app.db, &org_id, &UserId(claims.sub))
        .await?
        .ok_or(CoreError::Forbidden)?;
    let invoices = billing::list_invoices(&app.db, &org_id).await?;
    Ok(Json(serde_json::json!(invoices)))
}

pub async fn get_subscription(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let org_id = OrganizationId(org_id);
    crate::db::organizations::member_role(&app.db, &org_id, &UserId(claims.sub))
        .await?
        .ok_or(CoreError::Forbidden)?;
    let subscription = billing::get_subscription_for_org(&app.db, &org_id).await?;
    Ok(Json(serde_json::json!(subscription)))
}

pub async fn get_organization_usage(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
    Query(window): Query<UsageWindowQuery>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let org_id = OrganizationId(org_id);
    crate::db::organizations::member_role(&app.db, &org_id, &UserId(claims.sub))
        .await?
        .ok_or(CoreError::Forbidden)?;
    let records = usage::usage_for_org_in_window(&app.db, &org_id, window.since, window.until).await?;
    Ok(Json(serde_json::json!(records)))
}

#[derive(Deserialize)]
pub struct UsageWindowQuery {
    pub since: chrono::DateTime<chrono::Utc>,
    pub until: chrono::DateTime<chrono::Utc>,
}
