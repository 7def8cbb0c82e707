//! Persistence Store (spec §4.A): one repository module per aggregate
//! root, narrow typed methods, cross-aggregate writes wrapped in a single
//! transaction. `init_schema` owns `organizations`, `organization_members`,
//! `workspaces`, `tasks`, `subscriptions`, `invoices`, `processor_events`
//! and `usage_records`; the `auth` crate's schema owns `users`/`sessions`
//! and only reads `organization_members` for JWT claims.

pub mod billing;
pub mod organizations;
pub mod tasks;
pub mod usage;
pub mod workspaces;

use crate::error::CoreError;
use deadpool_postgres::Pool;

pub async fn init_schema(pool: &Pool) -> Result<(), CoreError> {
    let client = pool.get().await?;
    client
        .batch_execute(
            r#"
            CREATE TABLE IF NOT EXISTS organizations (
                id TEXT PRIMARY KEY,
                display_name TEXT NOT NULL,
                billing_email TEXT NOT NULL,
                processor_customer_id TEXT,
                processor_subscription_id TEXT,
                status TEXT NOT NULL DEFAULT 'active',
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );

            CREATE TABLE IF NOT EXISTS organization_members (
                organization_id TEXT NOT NULL REFERENCES organizations(id),
                user_id TEXT NOT NULL,
                role TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (organization_id, user_id)
            );
            CREATE INDEX IF NOT EXISTS organization_members_user_id_idx
                ON organization_members (user_id);

            CREATE TABLE IF NOT EXISTS workspaces (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organizations(id),
                name TEXT NOT NULL,
                plan_id TEXT NOT NULL,
                vcluster_instance_name TEXT,
                vcluster_status TEXT NOT NULL DEFAULT 'PENDING_CREATION',
                vcluster_config JSONB,
                dedicated_node_config JSONB,
                processor_subscription_item_id TEXT,
                kubeconfig_encrypted BYTEA,
                error_message TEXT,
                deleted_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (organization_id, name)
            );
            CREATE INDEX IF NOT EXISTS workspaces_organization_id_idx
                ON workspaces (organization_id) WHERE deleted_at IS NULL;

            CREATE TABLE IF NOT EXISTS tasks (
                id TEXT PRIMARY KEY,
                workspace_id TEXT NOT NULL REFERENCES workspaces(id),
                task_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                payload JSONB NOT NULL DEFAULT '{}'::jsonb,
                error_message TEXT,
                attempt_count INT NOT NULL DEFAULT 0,
                worker_id TEXT,
                claim_expiry TIMESTAMPTZ,
                not_before TIMESTAMPTZ NOT NULL DEFAULT now(),
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS tasks_claim_idx
                ON tasks (status, not_before, created_at) WHERE status = 'PENDING';
            CREATE INDEX IF NOT EXISTS tasks_workspace_id_idx ON tasks (workspace_id);

            CREATE TABLE IF NOT EXISTS subscriptions (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organizations(id),
                plan_id TEXT NOT NULL,
                status TEXT NOT NULL,
                current_period_start TIMESTAMPTZ NOT NULL,
                current_period_end TIMESTAMPTZ NOT NULL,
                processor_subscription_id TEXT NOT NULL UNIQUE,
                canceled_at TIMESTAMPTZ,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS subscriptions_organization_id_idx
                ON subscriptions (organization_id);

            CREATE TABLE IF NOT EXISTS invoices (
                id TEXT PRIMARY KEY,
                subscription_id TEXT NOT NULL REFERENCES subscriptions(id),
                organization_id TEXT NOT NULL REFERENCES organizations(id),
                amount_due BIGINT NOT NULL,
                currency TEXT NOT NULL,
                status TEXT NOT NULL,
                period_start TIMESTAMPTZ NOT NULL,
                period_end TIMESTAMPTZ NOT NULL,
                due_date TIMESTAMPTZ NOT NULL,
                paid_at TIMESTAMPTZ,
                processor_invoice_id TEXT NOT NULL UNIQUE,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS invoices_organization_id_idx ON invoices (organization_id);

            CREATE TABLE IF NOT EXISTS processor_events (
                id TEXT PRIMARY KEY,
                processor_event_id TEXT NOT NULL UNIQUE,
                event_type TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'PENDING',
                error_message TEXT,
                received_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                processed_at TIMESTAMPTZ
            );

            CREATE TABLE IF NOT EXISTS usage_records (
                id TEXT PRIMARY KEY,
                organization_id TEXT NOT NULL REFERENCES organizations(id),
                workspace_id TEXT REFERENCES workspaces(id),
                resource_type TEXT NOT NULL,
                quantity DOUBLE PRECISION NOT NULL,
                unit TEXT NOT NULL,
                recorded_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            CREATE INDEX IF NOT EXISTS usage_records_organization_id_idx
                ON usage_records (organization_id, recorded_at);
            "#,
        )
        .await?;
    Ok(())
}
