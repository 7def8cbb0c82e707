//! Row types for every aggregate root in the control plane's schema (spec
//! §3). Plain structs, no ORM: `db/*.rs` maps `tokio_postgres::Row` into
//! these by hand, the same convention the Persistence Store uses
//! everywhere else in this codebase.

use chrono::{DateTime, Utc};
use eosin_common::ids::{InvoiceId, OrganizationId, SubscriptionId, TaskId, UsageRecordId, WorkspaceId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrganizationStatus {
    Active,
    Suspended,
    Deleted,
}

impl OrganizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrganizationStatus::Active => "active",
            OrganizationStatus::Suspended => "suspended",
            OrganizationStatus::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "suspended" => Some(Self::Suspended),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Organization {
    pub id: OrganizationId,
    pub display_name: String,
    pub billing_email: String,
    pub processor_customer_id: Option<String>,
    pub processor_subscription_id: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrgRole {
    Member,
    Admin,
    Owner,
}

impl OrgRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrgRole::Owner => "owner",
            OrgRole::Admin => "admin",
            OrgRole::Member => "member",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "owner" => Some(Self::Owner),
            "admin" => Some(Self::Admin),
            "member" => Some(Self::Member),
            _ => None,
        }
    }

    pub fn is_admin_or_above(&self) -> bool {
        matches!(self, OrgRole::Admin | OrgRole::Owner)
    }
}

/// Mirrors the vcluster-status state machine from spec §4.2. Stored as
/// text; `as_str`/`parse` are the only conversion boundary so invalid
/// strings can never silently round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VclusterStatus {
    PendingCreation,
    Configuring,
    ConfiguringHnc,
    Running,
    UpdatingPlan,
    UpdatingDedicatedNodes,
    Deleting,
    Deleted,
    Error,
}

impl VclusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VclusterStatus::PendingCreation => "PENDING_CREATION",
            VclusterStatus::Configuring => "CONFIGURING",
            VclusterStatus::ConfiguringHnc => "CONFIGURING_HNC",
            VclusterStatus::Running => "RUNNING",
            VclusterStatus::UpdatingPlan => "UPDATING_PLAN",
            VclusterStatus::UpdatingDedicatedNodes => "UPDATING_DEDICATED_NODES",
            VclusterStatus::Deleting => "DELETING",
            VclusterStatus::Deleted => "DELETED",
            VclusterStatus::Error => "ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "PENDING_CREATION" => Self::PendingCreation,
            "CONFIGURING" => Self::Configuring,
            "CONFIGURING_HNC" => Self::ConfiguringHnc,
            "RUNNING" => Self::Running,
            "UPDATING_PLAN" => Self::UpdatingPlan,
            "UPDATING_DEDICATED_NODES" => Self::UpdatingDedicatedNodes,
            "DELETING" => Self::Deleting,
            "DELETED" => Self::Deleted,
            "ERROR" => Self::Error,
            _ => return None,
        })
    }

    /// True for any state where a live vCluster release (or the attempt to
    /// create/change one) is in flight, per spec §3's
    /// "vcluster-instance-name is set iff status ∈ {CONFIGURING, RUNNING,
    /// UPDATING_*, DELETING}".
    pub fn carries_instance_name(&self) -> bool {
        matches!(
            self,
            VclusterStatus::Configuring
                | VclusterStatus::ConfiguringHnc
                | VclusterStatus::Running
                | VclusterStatus::UpdatingPlan
                | VclusterStatus::UpdatingDedicatedNodes
                | VclusterStatus::Deleting
        )
    }

    /// Workspaces in these states reject further mutating requests (spec
    /// §5 "Ordering").
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            VclusterStatus::PendingCreation
                | VclusterStatus::Configuring
                | VclusterStatus::ConfiguringHnc
                | VclusterStatus::UpdatingPlan
                | VclusterStatus::UpdatingDedicatedNodes
                | VclusterStatus::Deleting
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    pub organization_id: OrganizationId,
    pub name: String,
    pub plan_id: String,
    pub vcluster_instance_name: Option<String>,
    pub vcluster_status: String,
    pub vcluster_config: Option<serde_json::Value>,
    pub dedicated_node_config: Option<serde_json::Value>,
    pub processor_subscription_item_id: Option<String>,
    pub kubeconfig_encrypted: Option<Vec<u8>>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Create,
    Delete,
    UpdatePlan,
    UpdateDedicatedNodes,
    SetupHnc,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Create => "CREATE",
            TaskType::Delete => "DELETE",
            TaskType::UpdatePlan => "UPDATE_PLAN",
            TaskType::UpdateDedicatedNodes => "UPDATE_DEDICATED_NODES",
            TaskType::SetupHnc => "SETUP_HNC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "CREATE" => Self::Create,
            "DELETE" => Self::Delete,
            "UPDATE_PLAN" => Self::UpdatePlan,
            "UPDATE_DEDICATED_NODES" => Self::UpdateDedicatedNodes,
            "SETUP_HNC" => Self::SetupHnc,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Completed => "COMPLETED",
            TaskStatus::Failed => "FAILED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "PENDING" => Self::Pending,
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub workspace_id: WorkspaceId,
    pub task_type: String,
    pub status: String,
    pub payload: serde_json::Value,
    pub error_message: Option<String>,
    pub attempt_count: i32,
    pub worker_id: Option<String>,
    pub claim_expiry: Option<DateTime<Utc>>,
    pub not_before: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub organization_id: OrganizationId,
    pub plan_id: String,
    pub status: String,
    pub current_period_start: DateTime<Utc>,
    pub current_period_end: DateTime<Utc>,
    pub processor_subscription_id: String,
    pub canceled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub subscription_id: SubscriptionId,
    pub organization_id: OrganizationId,
    pub amount_due: i64,
    pub currency: String,
    pub status: String,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub processor_invoice_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageRecord {
    pub id: UsageRecordId,
    pub organization_id: OrganizationId,
    pub workspace_id: Option<WorkspaceId>,
    pub resource_type: String,
    pub quantity: f64,
    pub unit: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: i64,
    pub limit: i64,
    pub full_count: i64,
    pub truncated: bool,
}
