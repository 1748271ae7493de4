//! Controller configuration.
//!
//! Configuration is loaded once at startup from a single YAML file; hot
//! reload is not supported. Layering follows the teacher's
//! `default -> file overrides -> normalize` shape, but there is only one
//! file here: a service has one deployment-provided config, not a
//! per-checkout one.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// One configured presubmit for an `org/repo`.
#[derive(Debug, Clone, Deserialize)]
pub struct PresubmitConfig {
    pub name: String,
    #[serde(default)]
    pub always_run: bool,
    #[serde(default)]
    pub skip_report: bool,
    /// Branches this presubmit runs against. Empty means "all branches".
    #[serde(default)]
    pub branches: Vec<String>,
    /// Labels attached to jobs constructed from this presubmit.
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl PresubmitConfig {
    /// Whether this presubmit applies to `branch`.
    pub fn runs_against_branch(&self, branch: &str) -> bool {
        self.branches.is_empty() || self.branches.iter().any(|b| b == branch)
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    queries: Option<Vec<String>>,
    presubmits: Option<HashMap<String, Vec<PresubmitConfig>>>,
    dry_run: Option<bool>,
    poll_interval_secs: Option<u64>,
    listen_addr: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub queries: Vec<String>,
    pub presubmits: HashMap<String, Vec<PresubmitConfig>>,
    pub dry_run: bool,
    pub poll_interval_secs: u64,
    pub listen_addr: String,
}

impl Config {
    pub fn presubmits_for(&self, org: &str, repo: &str) -> &[PresubmitConfig] {
        self.presubmits
            .get(&format!("{org}/{repo}"))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

fn default_config() -> Config {
    Config {
        queries: Vec::new(),
        presubmits: HashMap::new(),
        dry_run: false,
        poll_interval_secs: 30,
        listen_addr: "0.0.0.0:8888".to_string(),
    }
}

fn apply_overrides(config: &Config, overrides: FileConfig) -> Config {
    let mut merged = config.clone();
    if let Some(queries) = overrides.queries {
        merged.queries = queries;
    }
    if let Some(presubmits) = overrides.presubmits {
        merged.presubmits = presubmits;
    }
    if let Some(dry_run) = overrides.dry_run {
        merged.dry_run = dry_run;
    }
    if let Some(poll_interval_secs) = overrides.poll_interval_secs {
        merged.poll_interval_secs = poll_interval_secs;
    }
    if let Some(listen_addr) = overrides.listen_addr {
        merged.listen_addr = listen_addr;
    }
    merged
}

/// Loads configuration from `path`. `force_dry_run` is a safety-only
/// override from the CLI: it can only turn dry-run on, never off.
pub fn load_config(path: &Path, force_dry_run: bool) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading config file {}", path.display()))?;
    let file_cfg: FileConfig = serde_yaml::from_str(&content)
        .with_context(|| format!("parsing config file {}", path.display()))?;
    let mut merged = apply_overrides(&default_config(), file_cfg);
    if force_dry_run {
        merged.dry_run = true;
    }
    Ok(merged)
}
