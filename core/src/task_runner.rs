//! Task Runner (spec §4.C): a small pool of independent workers draining
//! the `tasks` queue, each a fresh execution context carrying its own
//! cancellation signal and deadline (spec §5 "Scheduling model").

use crate::db::{tasks, workspaces};
use crate::error::CoreError;
use crate::models::{Task, TaskType, VclusterStatus};
use deadpool_postgres::Pool;
use eosin_host_adapter::{ClusterAdapter, ReleaseValues};
use eosin_host_adapter::quota::QuotaSpec;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub struct TaskRunnerConfig {
    pub worker_count: usize,
    pub poll_interval: Duration,
    pub install_deadline: Duration,
    pub ready_deadline: Duration,
    pub uninstall_deadline: Duration,
    pub chart_path: String,
    pub reap_interval: Duration,
    pub kubeconfig_key: [u8; 32],
}

impl TaskRunnerConfig {
    pub fn new(kubeconfig_key: [u8; 32]) -> Self {
        Self {
            worker_count: 4,
            poll_interval: Duration::from_secs(2),
            install_deadline: Duration::from_secs(300),
            ready_deadline: Duration::from_secs(300),
            uninstall_deadline: Duration::from_secs(120),
            chart_path: "charts/vcluster".to_string(),
            reap_interval: Duration::from_secs(30),
            kubeconfig_key,
        }
    }
}

/// Spawns the configured worker pool plus a reaper, and blocks until
/// `cancel` fires. On cancellation each worker finishes checkpointing its
/// in-flight task (marks it retriable-failed) before returning, per spec
/// §5's graceful-shutdown contract.
pub async fn run(
    cancel: CancellationToken,
    pool: Pool,
    adapter: Arc<dyn ClusterAdapter>,
    config: TaskRunnerConfig,
) {
    let config = Arc::new(config);
    let mut handles = Vec::new();

    for worker_idx in 0..config.worker_count {
        let worker_id = format!("worker-{worker_idx}");
        let pool = pool.clone();
        let adapter = adapter.clone();
        let cancel = cancel.clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            worker_loop(worker_id, pool, adapter, cancel, config).await;
        }));
    }

    let reap_pool = pool.clone();
    let reap_cancel = cancel.clone();
    let reap_interval = config.reap_interval;
    handles.push(tokio::spawn(async move {
        reap_loop(reap_pool, reap_cancel, reap_interval).await;
    }));

    for handle in handles {
        let _ = handle.await;
    }
}

async fn worker_loop(
    worker_id: String,
    pool: Pool,
    adapter: Arc<dyn ClusterAdapter>,
    cancel: CancellationToken,
    config: Arc<TaskRunnerConfig>,
) {
    loop {
        if cancel.is_cancelled() {
            return;
        }
        match tasks::claim_next(&pool, &worker_id).await {
            Ok(Some(task)) => {
                let task_id = task.id.clone();
                if let Err(e) = dispatch(&pool, adapter.as_ref(), &cancel, &config, &task).await {
                    tracing::warn!(task_id = %task_id, error = %e, "task handler failed");
                    let _ = tasks::fail(&pool, &task_id, &e.to_string()).await;
                } else {
                    let _ = tasks::complete(&pool, &task_id).await;
                }
            }
            Ok(None) => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
            Err(e) => {
                tracing::error!(worker_id, error = %e, "failed to claim next task");
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(config.poll_interval) => {}
                }
            }
        }
    }
}

async fn reap_loop(pool: Pool, cancel: CancellationToken, interval: Duration) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(interval) => {}
        }
        match tasks::reap_stale(&pool).await {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "reaped stale tasks"),
            Err(e) => tracing::error!(error = %e, "reap_stale failed"),
        }
    }
}

async fn dispatch(
    pool: &Pool,
    adapter: &dyn ClusterAdapter,
    cancel: &CancellationToken,
    config: &TaskRunnerConfig,
    task: &Task,
) -> Result<(), CoreError> {
    let task_type = TaskType::parse(&task.task_type)
        .ok_or_else(|| CoreError::Internal(format!("unknown task type {}", task.task_type)))?;

    let result = match task_type {
        TaskType::Create => handle_create(pool, adapter, cancel, config, task).await,
        TaskType::Delete => handle_delete(pool, adapter, cancel, config, task).await,
        TaskType::UpdatePlan => handle_update_plan(pool, adapter, cancel, config, task).await,
        TaskType::UpdateDedicatedNodes => {
            handle_update_dedicated_nodes(pool, adapter, cancel, config, task).await
        }
        TaskType::SetupHnc => handle_setup_hnc(pool, adapter, task).await,
    };

    if let Err(e) = &result {
        let is_final_attempt = task.attempt_count >= tasks::MAX_ATTEMPTS;
        if is_final_attempt {
            let _ = workspaces::set_status(pool, &task.workspace_id, VclusterStatus::Error.as_str(), None, Some(&e.to_string())).await;
        }
    }
    result
}

fn namespace_for(workspace_id: &eosin_common::ids::WorkspaceId) -> String {
    workspace_id.as_str().to_string()
}

async fn handle_create(
    pool: &Pool,
    adapter: &dyn ClusterAdapter,
    cancel: &CancellationToken,
    config: &TaskRunnerConfig,
    task: &Task,
) -> Result<(), CoreError> {
    let ws = workspaces::get_workspace(pool, &task.workspace_id).await?;
    let release_name = ws.id.as_str().to_string();
    let namespace = namespace_for(&ws.id);

    workspaces::set_status(pool, &ws.id, VclusterStatus::Configuring.as_str(), Some(&release_name), None).await?;

    let values = ReleaseValues(ws.vcluster_config.clone().unwrap_or_else(|| serde_json::json!({})));
    adapter
        .install_or_upgrade(&release_name, &config.chart_path, &namespace, &values, cancel, config.install_deadline)
        .await?;
    adapter
        .wait_ready(&release_name, &namespace, cancel, config.ready_deadline)
        .await?;

    workspaces::set_status(pool, &ws.id, VclusterStatus::ConfiguringHnc.as_str(), None, None).await?;
    apply_quota(pool, adapter, &ws.id, &namespace).await?;

    let kubeconfig = adapter.extract_kubeconfig(&release_name, &namespace).await?;
    let encrypted = crate::crypto::encrypt(&config.kubeconfig_key, kubeconfig.as_bytes())
        .map_err(|e| CoreError::Internal(e.to_string()))?;
    workspaces::set_kubeconfig(pool, &ws.id, &encrypted).await?;
    workspaces::set_status(pool, &ws.id, VclusterStatus::Running.as_str(), None, None).await?;
    Ok(())
}

async fn handle_delete(
    pool: &Pool,
    adapter: &dyn ClusterAdapter,
    cancel: &CancellationToken,
    config: &TaskRunnerConfig,
    task: &Task,
) -> Result<(), CoreError> {
    let ws = workspaces::get_workspace(pool, &task.workspace_id).await?;
    let release_name = ws.id.as_str().to_string();
    let namespace = namespace_for(&ws.id);
    adapter
        .uninstall(&release_name, &namespace, cancel, config.uninstall_deadline)
        .await?;
    workspaces::mark_deleted(pool, &ws.id).await?;
    Ok(())
}

async fn handle_update_plan(
    pool: &Pool,
    adapter: &dyn ClusterAdapter,
    cancel: &CancellationToken,
    config: &TaskRunnerConfig,
    task: &Task,
) -> Result<(), CoreError> {
    let ws = workspaces::get_workspace(pool, &task.workspace_id).await?;
    let release_name = ws.id.as_str().to_string();
    let namespace = namespace_for(&ws.id);
    let values = ReleaseValues(ws.vcluster_config.clone().unwrap_or_else(|| serde_json::json!({})));
    adapter
        .install_or_upgrade(&release_name, &config.chart_path, &namespace, &values, cancel, config.install_deadline)
        .await?;
    adapter
        .wait_ready(&release_name, &namespace, cancel, config.ready_deadline)
        .await?;
    workspaces::set_status(pool, &ws.id, VclusterStatus::Running.as_str(), None, None).await?;
    Ok(())
}

async fn handle_update_dedicated_nodes(
    pool: &Pool,
    adapter: &dyn ClusterAdapter,
    cancel: &CancellationToken,
    config: &TaskRunnerConfig,
    task: &Task,
) -> Result<(), CoreError> {
    // Same install/upgrade path as a plan change: dedicated-node config is
    // folded into the release values by Workspace Service before enqueuing.
    handle_update_plan(pool, adapter, cancel, config, task).await
}

async fn handle_setup_hnc(pool: &Pool, adapter: &dyn ClusterAdapter, task: &Task) -> Result<(), CoreError> {
    let ws = workspaces::get_workspace(pool, &task.workspace_id).await?;
    let namespace = namespace_for(&ws.id);
    apply_quota(pool, adapter, &ws.id, &namespace).await
}

async fn apply_quota(
    _pool: &Pool,
    adapter: &dyn ClusterAdapter,
    _workspace_id: &eosin_common::ids::WorkspaceId,
    namespace: &str,
) -> Result<(), CoreError> {
    let quota = QuotaSpec {
        cpu_limit: "4".to_string(),
        memory_limit: "8Gi".to_string(),
        pods_limit: 50,
        storage_limit: "20Gi".to_string(),
    };
    adapter.apply_resource_quotas(namespace, &quota).await?;
    Ok(())
}
