//! Persistence for Auth Core's own tables: `users`, `sessions` (refresh
//! token records), and `oauth_states`. Schema init here only touches these
//! three tables; `organizations`/`organization_members` are owned by the
//! `core` crate's schema but queried here read-only for the JWT's
//! `org_roles` claim, same database.

use crate::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use deadpool_postgres::Pool;
use eosin_common::ids::{SessionId, UserId};
use std::collections::HashMap;
use tokio_postgres::Row;

pub struct User {
    pub id: UserId,
    pub provider: String,
    pub external_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn row_to_user(row: &Row) -> User {
    User {
        id: UserId(row.get("id")),
        provider: row.get("provider"),
        external_id: row.get("external_id"),
        email: row.get("email"),
        display_name: row.get("display_name"),
        created_at: row.get("created_at"),
    }
}

#[derive(Clone)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub refresh_hash: String,
    pub salt: String,
    pub device_id: Option<String>,
    pub ip: Option<String>,
    pub user_agent: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
    pub revoked: bool,
    pub parent_id: Option<SessionId>,
}

fn row_to_session(row: &Row) -> Session {
    Session {
        id: SessionId(row.get("id")),
        user_id: UserId(row.get("user_id")),
        refresh_hash: row.get("refresh_hash"),
        salt: row.get("salt"),
        device_id: row.get("device_id"),
        ip: row.get("ip"),
        user_agent: row.get("user_agent"),
        expires_at: row.get("expires_at"),
        created_at: row.get("created_at"),
        last_used_at: row.get("last_used_at"),
        revoked: row.get("revoked"),
        parent_id: row.get::<_, Option<String>>("parent_id").map(SessionId),
    }
}

pub struct OAuthState {
    pub state: String,
    pub provider: String,
    pub code_verifier: String,
    pub redirect_uri: String,
}

/// Creates Auth Core's tables if absent. Idempotent; safe to call on every
/// startup, matching the teacher's `init_schema` convention.
pub async fn init_schema(pool: &Pool) -> Result<(), AuthError> {
    let client = pool.get().await?;
    client
        .batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                external_id TEXT NOT NULL,
                email TEXT NOT NULL,
                display_name TEXT,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (provider, external_id),
                UNIQUE (email)
            );

            CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL REFERENCES users(id),
                refresh_hash TEXT NOT NULL,
                salt TEXT NOT NULL,
                device_id TEXT,
                ip TEXT,
                user_agent TEXT,
                expires_at TIMESTAMPTZ NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                last_used_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                revoked BOOLEAN NOT NULL DEFAULT false,
                parent_id TEXT REFERENCES sessions(id)
            );
            CREATE INDEX IF NOT EXISTS sessions_user_id_idx ON sessions (user_id);
            CREATE INDEX IF NOT EXISTS sessions_parent_id_idx ON sessions (parent_id);

            CREATE TABLE IF NOT EXISTS oauth_states (
                state TEXT PRIMARY KEY,
                provider TEXT NOT NULL,
                code_verifier TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL,
                consumed BOOLEAN NOT NULL DEFAULT false
            );
            "#,
        )
        .await?;
    Ok(())
}

pub async fn get_user(pool: &Pool, id: &UserId) -> Result<User, AuthError> {
    let client = pool.get().await?;
    let row = client
        .query_opt("SELECT * FROM users WHERE id = $1", &[&id.0])
        .await?
        .ok_or(AuthError::NotFound)?;
    Ok(row_to_user(&row))
}

/// Upserts the user keyed by `(provider, external_id)`, matching spec §4.E
/// step 2's "upserts the user keyed by (provider, external-id)".
pub async fn upsert_user(
    pool: &Pool,
    provider: &str,
    external_id: &str,
    email: &str,
    display_name: Option<&str>,
) -> Result<User, AuthError> {
    let client = pool.get().await?;
    let id = UserId::generate().0;
    let row = client
        .query_one(
            "INSERT INTO users (id, provider, external_id, email, display_name)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (provider, external_id)
             DO UPDATE SET email = EXCLUDED.email, display_name = EXCLUDED.display_name
             RETURNING *",
            &[&id, &provider, &external_id, &email, &display_name],
        )
        .await?;
    Ok(row_to_user(&row))
}

/// The `org_roles` JWT claim: every organization the user belongs to,
/// mapped to their role. Reads `organization_members`, a table owned by
/// the `core` crate's schema.
pub async fn org_roles_for_user(
    pool: &Pool,
    user_id: &UserId,
) -> Result<HashMap<String, String>, AuthError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT organization_id, role FROM organization_members WHERE user_id = $1",
            &[&user_id.0],
        )
        .await?;
    Ok(rows
        .into_iter()
        .map(|r| (r.get::<_, String>("organization_id"), r.get::<_, String>("role")))
        .collect())
}

pub async fn create_oauth_state(
    pool: &Pool,
    state: &str,
    provider: &str,
    code_verifier: &str,
    redirect_uri: &str,
    ttl_secs: i64,
) -> Result<(), AuthError> {
    let client = pool.get().await?;
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);
    client
        .execute(
            "INSERT INTO oauth_states (state, provider, code_verifier, redirect_uri, expires_at)
             VALUES ($1, $2, $3, $4, $5)",
            &[&state, &provider, &code_verifier, &redirect_uri, &expires_at],
        )
        .await?;
    Ok(())
}

/// Consumes a state nonce: single-use, and only if unexpired. Marking it
/// consumed rather than deleting keeps a record for the audit log and lets
/// a second presentation fail `InvalidState` instead of `NotFound`.
pub async fn consume_oauth_state(pool: &Pool, state: &str) -> Result<OAuthState, AuthError> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            "UPDATE oauth_states SET consumed = true
             WHERE state = $1 AND consumed = false AND expires_at > now()
             RETURNING provider, code_verifier, redirect_uri",
            &[&state],
        )
        .await?
        .ok_or(AuthError::InvalidState)?;
    Ok(OAuthState {
        state: state.to_string(),
        provider: row.get("provider"),
        code_verifier: row.get("code_verifier"),
        redirect_uri: row.get("redirect_uri"),
    })
}

#[allow(clippy::too_many_arguments)]
pub async fn create_session(
    pool: &Pool,
    user_id: &UserId,
    refresh_hash: &str,
    salt: &str,
    device_id: Option<&str>,
    ip: Option<&str>,
    user_agent: Option<&str>,
    ttl_secs: i64,
    parent_id: Option<&SessionId>,
) -> Result<Session, AuthError> {
    let client = pool.get().await?;
    let id = SessionId::generate().0;
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);
    let parent = parent_id.map(|p| p.0.clone());
    let row = client
        .query_one(
            "INSERT INTO sessions
                (id, user_id, refresh_hash, salt, device_id, ip, user_agent, expires_at, parent_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
            &[
                &id,
                &user_id.0,
                &refresh_hash,
                &salt,
                &device_id,
                &ip,
                &user_agent,
                &expires_at,
                &parent,
            ],
        )
        .await?;
    Ok(row_to_session(&row))
}

/// Recomputes `SHA-256(token ∥ salt)` for every currently active session
/// and constant-time compares it against the stored hash, per spec §4.E's
/// literal "scan active sessions" refresh algorithm. There is no indexable
/// lookup by refresh token since the hash depends on a per-session salt.
async fn scan_sessions(
    pool: &Pool,
    refresh_token_hex: &str,
    revoked: bool,
) -> Result<Option<Session>, AuthError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT * FROM sessions WHERE revoked = $1 AND expires_at > now()",
            &[&revoked],
        )
        .await?;
    for row in rows {
        let session = row_to_session(&row);
        if crate::tokens::verify_refresh_token(refresh_token_hex, &session.salt, &session.refresh_hash)
        {
            return Ok(Some(session));
        }
    }
    Ok(None)
}

pub async fn find_matching_active_session(
    pool: &Pool,
    refresh_token_hex: &str,
) -> Result<Option<Session>, AuthError> {
    scan_sessions(pool, refresh_token_hex, false).await
}

pub async fn find_matching_revoked_session(
    pool: &Pool,
    refresh_token_hex: &str,
) -> Result<Option<Session>, AuthError> {
    scan_sessions(pool, refresh_token_hex, true).await
}

/// Revokes `old` and inserts its successor in one transaction, per spec
/// §5's "Refresh rotation: one transaction covering old-revoke + new-insert".
#[allow(clippy::too_many_arguments)]
pub async fn rotate_session(
    pool: &Pool,
    old: &Session,
    new_refresh_hash: &str,
    new_salt: &str,
    ttl_secs: i64,
    device_id: Option<&str>,
    ip: Option<&str>,
    user_agent: Option<&str>,
) -> Result<Session, AuthError> {
    let mut client = pool.get().await?;
    let txn = client.transaction().await?;
    txn.execute(
        "UPDATE sessions SET revoked = true WHERE id = $1",
        &[&old.id.0],
    )
    .await?;
    let id = SessionId::generate().0;
    let expires_at = Utc::now() + Duration::seconds(ttl_secs);
    let row = txn
        .query_one(
            "INSERT INTO sessions
                (id, user_id, refresh_hash, salt, device_id, ip, user_agent, expires_at, parent_id)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING *",
            &[
                &id,
                &old.user_id.0,
                &new_refresh_hash,
                &new_salt,
                &device_id,
                &ip,
                &user_agent,
                &expires_at,
                &old.id.0,
            ],
        )
        .await?;
    txn.commit().await?;
    Ok(row_to_session(&row))
}

/// Transitively revokes every descendant of `session_id` via `parent_id`,
/// the reuse-detection response required by spec §4.E.
pub async fn revoke_chain(pool: &Pool, session_id: &SessionId) -> Result<(), AuthError> {
    let client = pool.get().await?;
    client
        .execute(
            "WITH RECURSIVE chain AS (
                SELECT id FROM sessions WHERE id = $1
                UNION ALL
                SELECT s.id FROM sessions s JOIN chain c ON s.parent_id = c.id
             )
             UPDATE sessions SET revoked = true WHERE id IN (SELECT id FROM chain)",
            &[&session_id.0],
        )
        .await?;
    Ok(())
}

pub async fn list_sessions_for_user(
    pool: &Pool,
    user_id: &UserId,
) -> Result<Vec<Session>, AuthError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT * FROM sessions WHERE user_id = $1 AND revoked = false AND expires_at > now()
             ORDER BY created_at DESC",
            &[&user_id.0],
        )
        .await?;
    Ok(rows.iter().map(row_to_session).collect())
}

pub async fn revoke_session(
    pool: &Pool,
    user_id: &UserId,
    session_id: &SessionId,
) -> Result<(), AuthError> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            "UPDATE sessions SET revoked = true WHERE id = $1 AND user_id = $2",
            &[&session_id.0, &user_id.0],
        )
        .await?;
    if updated == 0 {
        return Err(AuthError::NotFound);
    }
    Ok(())
}

pub async fn revoke_all_sessions(pool: &Pool, user_id: &UserId) -> Result<u64, AuthError> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            "UPDATE sessions SET revoked = true WHERE user_id = $1 AND revoked = false",
            &[&user_id.0],
        )
        .await?;
    Ok(updated)
}
