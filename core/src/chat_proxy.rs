//! Chat Proxy (spec §4.G): forwards an authenticated chat turn to the
//! per-workspace inference upstream, injecting workspace/user identity
//! and streaming the delta-frame response back unchanged.

use crate::db::{organizations, workspaces};
use crate::error::CoreError;
use crate::models::VclusterStatus;
use axum::body::Body;
use axum::response::Response;
use deadpool_postgres::Pool;
use eosin_common::ids::{OrganizationId, UserId, WorkspaceId};
use futures_util::TryStreamExt;

/// Forwards `turn` (the caller's raw JSON chat-turn body) to the
/// workspace's inference endpoint, injecting `X-Workspace-Id` /
/// `X-User-Id` headers rather than trusting anything in the body itself
/// (spec §4.G "inject workspace-id/user-id as headers, never trust a
/// body-supplied identity").
pub async fn proxy_turn(
    http: &reqwest::Client,
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
    workspace_id: &WorkspaceId,
    upstream_base: &str,
    turn: Vec<u8>,
) -> Result<Response, CoreError> {
    organizations::member_role(pool, org_id, user_id)
        .await?
        .ok_or(CoreError::Forbidden)?;

    let ws = workspaces::get_workspace(pool, workspace_id).await?;
    if &ws.organization_id != org_id {
        return Err(CoreError::NotFound);
    }
    if ws.vcluster_status != VclusterStatus::Running.as_str() {
        return Err(CoreError::NotReady(ws.vcluster_status.clone()));
    }

    let url = format!("{upstream_base}/v1/chat");
    let upstream = http
        .post(&url)
        .header("X-Workspace-Id", workspace_id.as_str())
        .header("X-User-Id", user_id.as_str())
        .header("content-type", "application/json")
        .body(turn)
        .send()
        .await
        .map_err(|e| CoreError::Upstream(e.to_string()))?;

    let status = upstream.status();
    if status.is_server_error() {
        return Err(CoreError::Upstream(format!(
            "chat upstream returned {status}"
        )));
    }

    let body_stream = upstream
        .bytes_stream()
        .map_err(|e| std::io::Error::other(e.to_string()));

    Ok(Response::builder()
        .status(status.as_u16())
        .header("content-type", "application/x-ndjson")
        .body(Body::from_stream(body_stream))
        .map_err(|e| CoreError::Internal(e.to_string()))?)
}
