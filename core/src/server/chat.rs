//! Chat Proxy route (spec §4.G).

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use super::auth_middleware::AuthenticatedUser;
use crate::app::App;
use crate::chat_proxy;
use crate::error::CoreError;
use eosin_common::ids::{OrganizationId, UserId, WorkspaceId};

pub async fn proxy_turn(
    State(app): State<App>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path((org_id, ws_id)): Path<(String, String)>,
    body: axum::body::Bytes,
) -> Result<Response, CoreError> {
    chat_proxy::proxy_turn(
        &app.http,
        &app.db,
        &OrganizationId(org_id),
        &UserId(claims.sub),
        &WorkspaceId(ws_id),
        &app.chat_upstream_base,
        body.to_vec(),
    )
    .await
    .map(IntoResponse::into_response)
}
