//! Organizations, their membership roster, and invitations-by-role. See
//! spec §3 "Organization" / "OrganizationMember".

use crate::error::CoreError;
use crate::models::{Organization, Page};
use deadpool_postgres::Pool;
use eosin_common::ids::{OrganizationId, UserId};
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

fn row_to_org(row: &Row) -> Organization {
    Organization {
        id: OrganizationId(row.get("id")),
        display_name: row.get("display_name"),
        billing_email: row.get("billing_email"),
        processor_customer_id: row.get("processor_customer_id"),
        processor_subscription_id: row.get("processor_subscription_id"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

pub async fn create_organization(
    pool: &Pool,
    display_name: &str,
    billing_email: &str,
    owner_user_id: &UserId,
) -> Result<Organization, CoreError> {
    let mut client = pool.get().await?;
    let txn = client.transaction().await?;
    let id = OrganizationId::generate().0;
    let row = txn
        .query_one(
            "INSERT INTO organizations (id, display_name, billing_email)
             VALUES ($1, $2, $3) RETURNING *",
            &[&id, &display_name, &billing_email],
        )
        .await?;
    txn.execute(
        "INSERT INTO organization_members (organization_id, user_id, role)
         VALUES ($1, $2, 'owner')",
        &[&id, &owner_user_id.0],
    )
    .await?;
    txn.commit().await?;
    Ok(row_to_org(&row))
}

pub async fn get_organization(pool: &Pool, id: &OrganizationId) -> Result<Organization, CoreError> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            "SELECT * FROM organizations WHERE id = $1 AND status != 'deleted'",
            &[&id.0],
        )
        .await?
        .ok_or(CoreError::NotFound)?;
    Ok(row_to_org(&row))
}

pub async fn list_organizations_for_user(
    pool: &Pool,
    user_id: &UserId,
) -> Result<Vec<Organization>, CoreError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT o.* FROM organizations o
             JOIN organization_members m ON m.organization_id = o.id
             WHERE m.user_id = $1 AND o.status != 'deleted'
             ORDER BY o.created_at",
            &[&user_id.0],
        )
        .await?;
    Ok(rows.iter().map(row_to_org).collect())
}

pub async fn update_organization(
    pool: &Pool,
    id: &OrganizationId,
    display_name: Option<&str>,
    billing_email: Option<&str>,
) -> Result<Organization, CoreError> {
    let client = pool.get().await?;

    let mut set_clauses = Vec::new();
    let mut params: Vec<&(dyn ToSql + Sync)> = Vec::new();
    let mut idx = 1;

    if let Some(name) = display_name {
        set_clauses.push(format!("display_name = ${idx}"));
        params.push(&name);
        idx += 1;
    }
    if let Some(email) = billing_email {
        set_clauses.push(format!("billing_email = ${idx}"));
        params.push(&email);
        idx += 1;
    }
    set_clauses.push("updated_at = now()".to_string());

    let query = format!(
        "UPDATE organizations SET {} WHERE id = ${idx} AND status != 'deleted' RETURNING *",
        set_clauses.join(", ")
    );
    params.push(&id.0);

    let row = client
        .query_opt(&query, &params)
        .await?
        .ok_or(CoreError::NotFound)?;
    Ok(row_to_org(&row))
}

/// Soft-deletes the organization; its workspaces are left untouched here,
/// the Workspace Service enqueues their own DELETE tasks separately.
pub async fn delete_organization(pool: &Pool, id: &OrganizationId) -> Result<(), CoreError> {
    let client = pool.get().await?;
    let updated = client
        .execute(
            "UPDATE organizations SET status = 'deleted', updated_at = now()
             WHERE id = $1 AND status != 'deleted'",
            &[&id.0],
        )
        .await?;
    if updated == 0 {
        return Err(CoreError::NotFound);
    }
    Ok(())
}

pub async fn set_processor_customer_id(
    pool: &Pool,
    id: &OrganizationId,
    processor_customer_id: &str,
) -> Result<(), CoreError> {
    let client = pool.get().await?;
    client
        .execute(
            "UPDATE organizations SET processor_customer_id = $2, updated_at = now() WHERE id = $1",
            &[&id.0, &processor_customer_id],
        )
        .await?;
    Ok(())
}

pub async fn member_role(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
) -> Result<Option<String>, CoreError> {
    let client = pool.get().await?;
    let row = client
        .query_opt(
            "SELECT role FROM organization_members WHERE organization_id = $1 AND user_id = $2",
            &[&org_id.0, &user_id.0],
        )
        .await?;
    Ok(row.map(|r| r.get("role")))
}

pub struct MemberSummary {
    pub user_id: String,
    pub role: String,
}

pub async fn list_members(
    pool: &Pool,
    org_id: &OrganizationId,
    offset: i64,
    limit: i64,
) -> Result<Page<MemberSummary>, CoreError> {
    let client = pool.get().await?;
    let rows = client
        .query(
            "SELECT user_id, role, COUNT(*) OVER() AS full_count
             FROM organization_members
             WHERE organization_id = $1
             ORDER BY created_at
             LIMIT $2 OFFSET $3",
            &[&org_id.0, &limit, &offset],
        )
        .await?;
    let full_count = rows.first().map(|r| r.get::<_, i64>("full_count")).unwrap_or(0);
    let items: Vec<MemberSummary> = rows
        .iter()
        .map(|r| MemberSummary {
            user_id: r.get("user_id"),
            role: r.get("role"),
        })
        .collect();
    let truncated = offset + (items.len() as i64) < full_count;
    Ok(Page { items, offset, limit, full_count, truncated })
}

/// Adds or changes a member's role. Upsert rather than insert-then-update
/// so re-inviting an existing member just changes their role.
pub async fn upsert_member(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
    role: &str,
) -> Result<(), CoreError> {
    let client = pool.get().await?;
    client
        .execute(
            "INSERT INTO organization_members (organization_id, user_id, role)
             VALUES ($1, $2, $3)
             ON CONFLICT (organization_id, user_id) DO UPDATE SET role = EXCLUDED.role",
            &[&org_id.0, &user_id.0, &role],
        )
        .await?;
    Ok(())
}

/// Refuses to remove the organization's last owner, per spec §4.D's
/// membership invariant that every organization keeps at least one owner.
pub async fn remove_member(
    pool: &Pool,
    org_id: &OrganizationId,
    user_id: &UserId,
) -> Result<(), CoreError> {
    let mut client = pool.get().await?;
    let txn = client.transaction().await?;
    let role: Option<String> = txn
        .query_opt(
            "SELECT role FROM organization_members WHERE organization_id = $1 AND user_id = $2",
            &[&org_id.0, &user_id.0],
        )
        .await?
        .map(|r| r.get("role"));
    let Some(role) = role else {
        return Err(CoreError::NotFound);
    };
    if role == "owner" {
        let owner_count: i64 = txn
            .query_one(
                "SELECT COUNT(*) FROM organization_members WHERE organization_id = $1 AND role = 'owner'",
                &[&org_id.0],
            )
            .await?
            .get(0);
        if owner_count <= 1 {
            return Err(CoreError::Conflict("cannot remove the last owner".to_string()));
        }
    }
    txn.execute(
        "DELETE FROM organization_members WHERE organization_id = $1 AND user_id = $2",
        &[&org_id.0, &user_id.0],
    )
    .await?;
    txn.commit().await?;
    Ok(())
}
