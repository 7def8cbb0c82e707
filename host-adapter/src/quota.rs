use serde::{Deserialize, Serialize};

/// Resource limits applied to a workspace's namespace, derived from the
/// organization's plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSpec {
    pub cpu_limit: String,
    pub memory_limit: String,
    pub pods_limit: i32,
    pub storage_limit: String,
}

impl QuotaSpec {
    pub fn to_resource_quota_json(&self, name: &str, namespace: &str) -> serde_json::Value {
        serde_json::json!({
            "apiVersion": "v1",
            "kind": "ResourceQuota",
            "metadata": { "name": name, "namespace": namespace },
            "spec": {
                "hard": {
                    "limits.cpu": self.cpu_limit,
                    "limits.memory": self.memory_limit,
                    "pods": self.pods_limit.to_string(),
                    "requests.storage": self.storage_limit,
                }
            }
        })
    }
}
