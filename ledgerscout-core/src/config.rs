//! On-disk configuration, stored as JSON.

use anyhow::{Context, Result, bail};
use ledgerscout_scanner::engine::APPROVED_EXTERNAL_HOSTS;
use ledgerscout_scanner::scorer::TARGET_SCORE;
use ledgerscout_scanner::{DEFAULT_USER_AGENT, SearchConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_PATH: &str = "~/.config/ledgerscout/config.json";

/// Longest per-host delay accepted from a config file.
pub const MAX_MIN_DELAY_SECS: f64 = 3600.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoutConfig {
    pub search: SearchConfig,
    pub user_agent: String,
    pub min_delay_secs: f64,
    pub fetch_timeout_secs: u64,
    pub target_threshold: u32,
    pub result_cap: usize,
    pub max_pages: usize,
    pub max_depth: usize,
    pub max_entrypoints: usize,
    pub top_n: usize,
    pub approved_external_hosts: Vec<String>,
}

impl Default for ScoutConfig {
    fn default() -> Self {
        Self {
            search: SearchConfig::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            min_delay_secs: 1.0,
            fetch_timeout_secs: 20,
            target_threshold: TARGET_SCORE,
            result_cap: 500,
            max_pages: 50,
            max_depth: 4,
            max_entrypoints: 3,
            top_n: 10,
            approved_external_hosts: APPROVED_EXTERNAL_HOSTS
                .iter()
                .map(|h| h.to_string())
                .collect(),
        }
    }
}

impl ScoutConfig {
    /// Fill in search credentials from the environment or CLI when the file has none.
    pub fn with_credentials(
        mut self,
        api_key: Option<String>,
        collection_id: Option<String>,
    ) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.search.api_key = Some(key);
        }
        if let Some(cx) = collection_id.filter(|c| !c.trim().is_empty()) {
            self.search.collection_id = Some(cx);
        }
        self
    }

    pub fn min_delay(&self) -> std::time::Duration {
        // `max` also maps NaN to zero
        std::time::Duration::from_secs_f64(self.min_delay_secs.max(0.0).min(MAX_MIN_DELAY_SECS))
    }
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    match shellexpand::full(path) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(path).as_ref()),
    }
}

/// Load the configuration at `path`, or the defaults when the file does not exist.
pub fn load_config(path: &Path) -> Result<ScoutConfig> {
    if !path.exists() {
        tracing::debug!("No config at {}, using defaults", path.display());
        return Ok(ScoutConfig::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = serde_json::from_str(&content)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

/// Write `config` to `path`, creating parent directories. Refuses to overwrite unless `force`.
pub fn save_config(config: &ScoutConfig, path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!(
            "Config file {} already exists (use --force to overwrite)",
            path.display()
        );
    }
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(config)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}
