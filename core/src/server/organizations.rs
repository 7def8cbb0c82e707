//! Organization and membership routes (spec §4.D, §6).

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use super::auth_middleware::AuthenticatedUser;
use crate::app::App;
use crate::db::organizations;
use crate::error::CoreError;
use crate::models::OrgRole;
use eosin_common::Pagination;
use eosin_common::ids::{OrganizationId, UserId};

#[derive(Deserialize)]
pub struct CreateOrganizationRequest {
    pub display_name: String,
    pub billing_email: String,
}

pub async fn create_organization(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<Json<serde_json::Value>, CoreError> {
    if req.display_name.trim().is_empty() {
        return Err(CoreError::Validation("display_name must not be empty".to_string()));
    }
    let org = organizations::create_organization(
        &app.db,
        &req.display_name,
        &req.billing_email,
        &UserId(claims.sub),
    )
    .await?;
    Ok(Json(serde_json::json!(org)))
}

pub async fn list_organizations(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<Json<serde_json::Value>, CoreError> {
    let orgs = organizations::list_organizations_for_user(&app.db, &UserId(claims.sub)).await?;
    Ok(Json(serde_json::json!(orgs)))
}

pub async fn get_organization(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let org_id = OrganizationId(org_id);
    organizations::member_role(&app.db, &org_id, &UserId(claims.sub))
        .await?
        .ok_or(CoreError::Forbidden)?;
    let org = organizations::get_organization(&app.db, &org_id).await?;
    Ok(Json(serde_json::json!(org)))
}

#[derive(Deserialize)]
pub struct UpdateOrganizationRequest {
    pub display_name: Option<String>,
    pub billing_email: Option<String>,
}

pub async fn update_organization(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
    Json(req): Json<UpdateOrganizationRequest>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let org_id = OrganizationId(org_id);
    require_admin(&app, &org_id, &claims.sub).await?;
    let org = organizations::update_organization(
        &app.db,
        &org_id,
        req.display_name.as_deref(),
        req.billing_email.as_deref(),
    )
    .await?;
    Ok(Json(serde_json::json!(org)))
}

pub async fn delete_organization(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let org_id = OrganizationId(org_id);
    require_admin(&app, &org_id, &claims.sub).await?;
    organizations::delete_organization(&app.db, &org_id).await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[derive(Serialize)]
pub struct MemberResponse {
    user_id: String,
    role: String,
}

pub async fn list_members(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let org_id = OrganizationId(org_id);
    organizations::member_role(&app.db, &org_id, &UserId(claims.sub))
        .await?
        .ok_or(CoreError::Forbidden)?;
    let limit = page.limit.unwrap_or(50).clamp(1, 200);
    let result = organizations::list_members(&app.db, &org_id, page.offset, limit).await?;
    Ok(Json(serde_json::json!({
        "items": result.items.iter().map(|m| MemberResponse { user_id: m.user_id.clone(), role: m.role.clone() }).collect::<Vec<_>>(),
        "offset": result.offset,
        "limit": result.limit,
        "full_count": result.full_count,
        "truncated": result.truncated,
    })))
}

#[derive(Deserialize)]
pub struct UpsertMemberRequest {
    pub user_id: String,
    pub role: String,
}

pub async fn upsert_member(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(org_id): Path<String>,
    Json(req): Json<UpsertMemberRequest>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let org_id = OrganizationId(org_id);
    require_admin(&app, &org_id, &claims.sub).await?;
    if OrgRole::parse(&req.role).is_none() {
        return Err(CoreError::Validation(format!("unknown role '{}'", req.role)));
    }
    organizations::upsert_member(&app.db, &org_id, &UserId(req.user_id), &req.role).await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}

pub async fn remove_member(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((org_id, user_id)): Path<(String, String)>,
) -> Result<Json<serde_json::Value>, CoreError> {
    let org_id = OrganizationId(org_id);
    require_admin(&app, &org_id, &claims.sub).await?;
    organizations::remove_member(&app.db, &org_id, &UserId(user_id)).await?;
    Ok(Json(serde_json::json!({"status": "ok"})))
}

async fn require_admin(app: &App, org_id: &OrganizationId, user_id: &str) -> Result<(), CoreError> {
    let role = organizations::member_role(&app.db, org_id, &UserId(user_id.to_string()))
        .await?
        .and_then(|r| OrgRole::parse(&r))
        .ok_or(CoreError::Forbidden)?;
    if !role.is_admin_or_above() {
        return Err(CoreError::Forbidden);
    }
    Ok(())
}
