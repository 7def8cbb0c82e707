use crate::ids::WorkspaceId;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::io::AsyncReadExt;

/// Local config for the operator CLI: which control-plane endpoint to
/// talk to, and which workspace to default commands to when `--workspace`
/// is omitted.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    pub endpoint: Option<String>,
    pub default_workspace_id: Option<WorkspaceId>,
}

pub fn config_path(path: Option<&str>) -> Result<PathBuf> {
    if let Some(path) = path {
        Ok(PathBuf::from(path))
    } else if let Some(path) = std::env::var_os("EOSIN_CONFIG") {
        Ok(PathBuf::from(path))
    } else {
        match std::env::home_dir() {
            Some(dir) => Ok(dir.join(".eosin/config")),
            None => Err(anyhow::anyhow!(
                "Failed to determine home directory for writing config"
            )),
        }
    }
}

pub async fn write_config(path: Option<&str>, config: &Config) -> Result<()> {
    let config_path = config_path(path)?;
    let contents =
        serde_json::to_string_pretty(config).context("Failed to serialize config to JSON")?;
    tokio::fs::create_dir_all(
        config_path
            .parent()
            .context("Failed to get parent directory of config path")?,
    )
    .await
    .context("Failed to create config directory")?;
    tokio::fs::write(&config_path, contents)
        .await
        .context("Failed to write config file")?;
    Ok(())
}

pub async fn default_workspace_id() -> Result<WorkspaceId> {
    load_config()
        .await?
        .and_then(|cfg| cfg.default_workspace_id)
        .ok_or_else(|| anyhow::anyhow!("No workspace ID specified and no default workspace set"))
}

pub async fn load_config() -> Result<Option<Config>> {
    load_config_path(None).await
}

pub async fn load_config_path(path: Option<&str>) -> Result<Option<Config>> {
    let config_path = config_path(path)?;
    let file = match tokio::fs::File::open(&config_path).await {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open {}: {}", config_path.display(), e));
        }
    };
    let mut reader = tokio::io::BufReader::new(file);
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .await
        .context("Failed to read config file")?;
    let config = serde_json::from_str::<Config>(&contents).context("Failed to parse config file")?;
    Ok(Some(config))
}
