//! Configuration Management
//!
//! Handles persistent configuration storage for gcp-discovery.

use crate::adapter::DEFAULT_MAX_PARALLEL;
use crate::resource::DiscoverySettings;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Region used when nothing else names one
pub const FALLBACK_REGION: &str = "us-central1";

fn default_cache_duration_secs() -> u64 {
    3600
}

fn default_max_parallel() -> usize {
    DEFAULT_MAX_PARALLEL
}

/// User configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Project to discover
    #[serde(default)]
    pub project_id: Option<String>,
    /// Regions served by regional and zonal families
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default = "default_cache_duration_secs")]
    pub cache_duration_secs: u64,
    /// Cache duration per item type
    #[serde(default)]
    pub cache_durations: BTreeMap<String, u64>,
    /// Concurrent gets when a list fans out
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    /// Upper bound on one upstream fetch
    #[serde(default)]
    pub fetch_timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project_id: None,
            regions: Vec::new(),
            cache_duration_secs: default_cache_duration_secs(),
            cache_durations: BTreeMap::new(),
            max_parallel: default_max_parallel(),
            fetch_timeout_secs: None,
        }
    }
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("gcp-discovery").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load from a specific file; a missing or unreadable file yields defaults
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {:?}: {}", path, e);
                Self::default()
            }),
            Err(e) => {
                tracing::warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            },
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("Failed to write config {:?}", path))?;

        Ok(())
    }

    /// Get effective project (CLI > config > gcloud default)
    pub fn effective_project(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.project_id.clone())
            .or_else(crate::gcp::auth::get_default_project)
    }

    /// Get effective regions (CLI > config > gcloud default > fallback)
    pub fn effective_regions(&self, cli: &[String]) -> Vec<String> {
        if !cli.is_empty() {
            return cli.to_vec();
        }
        if !self.regions.is_empty() {
            return self.regions.clone();
        }
        vec![crate::gcp::auth::get_default_region().unwrap_or_else(|| FALLBACK_REGION.to_string())]
    }

    /// Adapter settings for a project and its regions
    pub fn discovery_settings(&self, project: &str, regions: Vec<String>) -> DiscoverySettings {
        let mut settings = DiscoverySettings::new(project, regions);
        settings.cache_duration = Duration::from_secs(self.cache_duration_secs);
        settings.cache_durations = self
            .cache_durations
            .iter()
            .map(|(item_type, secs)| (item_type.clone(), Duration::from_secs(*secs)))
            .collect();
        settings.max_parallel = self.max_parallel.max(1);
        settings.fetch_timeout = self.fetch_timeout_secs.map(Duration::from_secs);
        settings
    }

    /// Set project and save
    pub fn set_project(&mut self, project_id: &str) -> Result<()> {
        self.project_id = Some(project_id.to_string());
        self.save()
    }

    /// Add a region and save
    pub fn add_region(&mut self, region: &str) -> Result<()> {
        if !self.regions.iter().any(|r| r == region) {
            self.regions.push(region.to_string());
        }
        self.save()
    }
}
