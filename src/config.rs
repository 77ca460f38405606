// ABOUTME: Configuration loading for callgate.
// ABOUTME: Reads ~/.callgate/config.toml — secrets location, rejection persistence, admins, file rules.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::gate::{RejectionPersistence, RuleSpec};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub gate: GateConfig,
    pub admin: AdminConfig,
    /// File access rules, evaluated in the order written.
    pub rules: Vec<RuleSpec>,
}

/// Where the gate keeps its state.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Restricted directory holding the whitelist and rejection files.
    pub secrets_dir: PathBuf,
    pub rejections: RejectionPersistence,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            secrets_dir: Config::base_dir().join("secrets"),
            rejections: RejectionPersistence::default(),
        }
    }
}

/// Who may change the whitelist.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub principals: Vec<String>,
}

impl Config {
    /// Load config from ~/.callgate/config.toml, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load config from an explicit path. A missing file yields defaults.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Force rejections onto disk.
    ///
    /// Each `gatectl` invocation is its own process, so a rejection recorded
    /// by one command must be on disk for `pending` or `approve-all` to see it.
    pub fn with_durable_rejections(mut self) -> Self {
        self.gate.rejections = RejectionPersistence::File;
        self
    }

    /// Path to the config file.
    pub fn config_path() -> PathBuf {
        Self::base_dir().join("config.toml")
    }

    fn base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".callgate")
    }
}
