//! Unauthenticated routes: OIDC login/callback, refresh rotation, and the
//! public discovery/JWKS documents this service publishes as an OIDC
//! provider in its own right (spec §4.E "publish jwks.json and
//! openid-configuration").

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app::App;
use crate::audit;
use crate::error::AuthError;
use crate::{db, pkce, tokens};
use eosin_common::RequestContextExtractor;

#[derive(Serialize)]
pub struct LoginResponse {
    auth_url: String,
    state: String,
}

/// `login(provider)`: the server owns the full PKCE handshake itself
/// (confidential backend client), generating both the state nonce and the
/// code verifier rather than trusting a caller-supplied challenge.
pub async fn login(
    State(app): State<App>,
    Path(provider): Path<String>,
) -> Result<Json<LoginResponse>, AuthError> {
    let oidc_provider = app.oidc.get(&provider)?;
    let state = pkce::random_token();
    let verifier = pkce::random_token();
    let challenge = pkce::code_challenge_s256(&verifier);

    db::create_oauth_state(
        &app.db,
        &state,
        &provider,
        &verifier,
        &oidc_provider.config.redirect_url,
        pkce::STATE_TTL_SECS,
    )
    .await?;

    let auth_url = oidc_provider.authorization_url(&state, &challenge).await?;
    Ok(Json(LoginResponse { auth_url, state }))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    code: String,
    state: String,
}

#[derive(Serialize)]
pub struct TokenPairResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    expires_in: i64,
    user: UserResponse,
}

#[derive(Serialize)]
pub struct UserResponse {
    id: String,
    email: String,
    name: Option<String>,
}

pub async fn callback(
    State(app): State<App>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
    ctx: RequestContextExtractor,
) -> Result<Json<TokenPairResponse>, AuthError> {
    let oauth_state = db::consume_oauth_state(&app.db, &params.state).await?;
    if oauth_state.provider != provider {
        return Err(AuthError::InvalidState);
    }

    let oidc_provider = app.oidc.get(&provider)?;
    let id_claims = oidc_provider
        .exchange_code(&params.code, &oauth_state.code_verifier)
        .await?;

    let user = db::upsert_user(
        &app.db,
        &provider,
        &id_claims.sub,
        &id_claims.email,
        id_claims.name.as_deref(),
    )
    .await?;

    let pair = issue_fresh_pair(&app, &user, None, ctx.client_ip, ctx.user_agent.as_deref()).await?;
    audit::log(
        "login",
        Some(user.id.as_str()),
        ctx.client_ip.map(|ip| ip.to_string()).as_deref(),
        ctx.user_agent.as_deref(),
    );
    Ok(Json(TokenPairResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        token_type: "Bearer",
        expires_in: app.jwt.access_token_ttl_secs,
        user: UserResponse {
            id: user.id.0,
            email: user.email,
            name: user.display_name,
        },
    }))
}

#[derive(Deserialize)]
pub struct RefreshRequest {
    refresh_token: String,
}

#[derive(Serialize)]
pub struct RefreshResponse {
    access_token: String,
    refresh_token: String,
    token_type: &'static str,
    expires_in: i64,
}

/// `refresh(refresh_token)` per spec §4.E: scan active sessions for a
/// matching hash; on match, rotate. On a match against a *revoked* session,
/// this is a reuse event — revoke the whole descendant chain and fail.
pub async fn refresh(
    State(app): State<App>,
    ctx: RequestContextExtractor,
    Json(body): Json<RefreshRequest>,
) -> Result<Json<RefreshResponse>, AuthError> {
    let ip = ctx.client_ip.map(|ip| ip.to_string());

    if let Some(active) = db::find_matching_active_session(&app.db, &body.refresh_token).await? {
        let new_refresh = tokens::random_hex_bytes(32);
        let new_salt = tokens::random_hex_bytes(32);
        let new_hash = tokens::hash_refresh_token(&new_refresh, &new_salt);
        db::rotate_session(
            &app.db,
            &active,
            &new_hash,
            &new_salt,
            app.jwt.refresh_token_ttl_secs,
            None,
            ip.as_deref(),
            ctx.user_agent.as_deref(),
        )
        .await?;

        let user = db::get_user(&app.db, &active.user_id).await?;
        let org_roles = db::org_roles_for_user(&app.db, &user.id).await?;
        let access = tokens::issue_access_token(
            &app.keyset,
            &app.jwt.issuer,
            app.jwt.access_token_ttl_secs,
            user.id.as_str(),
            &user.email,
            org_roles,
        )?;

        audit::log(
            "refresh",
            Some(user.id.as_str()),
            ip.as_deref(),
            ctx.user_agent.as_deref(),
        );
        return Ok(Json(RefreshResponse {
            access_token: access.token,
            refresh_token: new_refresh,
            token_type: "Bearer",
            expires_in: app.jwt.access_token_ttl_secs,
        }));
    }

    if let Some(revoked) = db::find_matching_revoked_session(&app.db, &body.refresh_token).await? {
        db::revoke_chain(&app.db, &revoked.id).await?;
        audit::log(
            "reuse_detected",
            Some(revoked.user_id.as_str()),
            ip.as_deref(),
            ctx.user_agent.as_deref(),
        );
        return Err(AuthError::TokenReused);
    }

    audit::log("refresh_failed", None, ip.as_deref(), ctx.user_agent.as_deref());
    Err(AuthError::Unauthenticated)
}

struct IssuedPair {
    access_token: String,
    refresh_token: String,
}

async fn issue_fresh_pair(
    app: &App,
    user: &db::User,
    device_id: Option<&str>,
    ip: Option<std::net::IpAddr>,
    user_agent: Option<&str>,
) -> Result<IssuedPair, AuthError> {
    let refresh_token = tokens::random_hex_bytes(32);
    let salt = tokens::random_hex_bytes(32);
    let hash = tokens::hash_refresh_token(&refresh_token, &salt);
    let ip = ip.map(|ip| ip.to_string());

    db::create_session(
        &app.db,
        &user.id,
        &hash,
        &salt,
        device_id,
        ip.as_deref(),
        user_agent,
        app.jwt.refresh_token_ttl_secs,
        None,
    )
    .await?;

    let org_roles = db::org_roles_for_user(&app.db, &user.id).await?;
    let access = tokens::issue_access_token(
        &app.keyset,
        &app.jwt.issuer,
        app.jwt.access_token_ttl_secs,
        user.id.as_str(),
        &user.email,
        org_roles,
    )?;

    Ok(IssuedPair {
        access_token: access.token,
        refresh_token,
    })
}

pub async fn openid_configuration(State(app): State<App>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "issuer": app.jwt.issuer,
        "jwks_uri": format!("{}/.well-known/jwks.json", app.jwt.issuer),
        "id_token_signing_alg_values_supported": ["RS256"],
        "response_types_supported": ["code"],
    }))
}

pub async fn jwks(State(app): State<App>) -> Json<serde_json::Value> {
    Json(app.keyset.jwks_json())
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy"}))
}
