//! Routes gated by a verified access token: the "Security logs & sessions"
//! surface from spec §4.E (`logout`, `me`, `list_sessions`,
//! `revoke_session`, `revoke_all_sessions`).

use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;

use super::auth_middleware::AuthenticatedUser;
use crate::app::App;
use crate::audit;
use crate::db;
use crate::error::AuthError;
use eosin_common::RequestContextExtractor;
use eosin_common::ids::{SessionId, UserId};

#[derive(Serialize)]
pub struct MeResponse {
    id: String,
    email: String,
    org_roles: std::collections::HashMap<String, String>,
}

pub async fn me(AuthenticatedUser(claims): AuthenticatedUser) -> Json<MeResponse> {
    Json(MeResponse {
        id: claims.sub,
        email: claims.email,
        org_roles: claims.org_roles,
    })
}

/// Logout revokes every active session for the caller. There is no
/// server-side access-token blocklist (tokens are short-lived, ~15 min);
/// logout's durable effect is killing refresh continuity.
pub async fn logout(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ctx: RequestContextExtractor,
) -> Result<Json<serde_json::Value>, AuthError> {
    let user_id = UserId(claims.sub);
    db::revoke_all_sessions(&app.db, &user_id).await?;
    audit::log(
        "logout",
        Some(user_id.as_str()),
        ctx.client_ip.map(|ip| ip.to_string()).as_deref(),
        ctx.user_agent.as_deref(),
    );
    Ok(Json(serde_json::json!({"status": "ok"})))
}

#[derive(Serialize)]
pub struct SessionSummary {
    id: String,
    device_id: Option<String>,
    ip: Option<String>,
    user_agent: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    last_used_at: chrono::DateTime<chrono::Utc>,
}

pub async fn list_sessions(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<Json<Vec<SessionSummary>>, AuthError> {
    let user_id = UserId(claims.sub);
    let sessions = db::list_sessions_for_user(&app.db, &user_id).await?;
    Ok(Json(
        sessions
            .into_iter()
            .map(|s| SessionSummary {
                id: s.id.0,
                device_id: s.device_id,
                ip: s.ip,
                user_agent: s.user_agent,
                created_at: s.created_at,
                last_used_at: s.last_used_at,
            })
            .collect(),
    ))
}

pub async fn revoke_session(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(session_id): Path<String>,
    ctx: RequestContextExtractor,
) -> Result<Json<serde_json::Value>, AuthError> {
    let user_id = UserId(claims.sub);
    db::revoke_session(&app.db, &user_id, &SessionId(session_id)).await?;
    audit::log(
        "revoke_session",
        Some(user_id.as_str()),
        ctx.client_ip.map(|ip| ip.to_string()).as_deref(),
        ctx.user_agent.as_deref(),
    );
    Ok(Json(serde_json::json!({"status": "ok"})))
}

pub async fn revoke_all_sessions(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    ctx: RequestContextExtractor,
) -> Result<Json<serde_json::Value>, AuthError> {
    let user_id = UserId(claims.sub);
    let count = db::revoke_all_sessions(&app.db, &user_id).await?;
    audit::log(
        "revoke_all_sessions",
        Some(user_id.as_str()),
        ctx.client_ip.map(|ip| ip.to_string()).as_deref(),
        ctx.user_agent.as_deref(),
    );
    Ok(Json(serde_json::json!({"status": "ok", "revoked": count})))
}
