//! Adapter construction for every registered resource family

use super::mapper::GcpMapper;
use super::registry::{get_registry, FetchMode, LocationKind, ResourceDef};
use crate::adapter::{
    Adapter, AdapterConfig, AlwaysGetAdapter, Cache, DescribeAdapter, DEFAULT_CACHE_DURATION, DEFAULT_MAX_PARALLEL,
};
use crate::gcp::client::GcpClient;
use crate::gcp::links::KeyStyle;
use crate::model::Scope;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// What the adapters are built for
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub project: String,
    pub regions: Vec<String>,
    pub cache_duration: Duration,
    /// Per item type, over both the definition and `cache_duration`
    pub cache_durations: HashMap<String, Duration>,
    pub max_parallel: usize,
    pub fetch_timeout: Option<Duration>,
}

impl DiscoverySettings {
    pub fn new(project: impl Into<String>, regions: Vec<String>) -> Self {
        Self {
            project: project.into(),
            regions,
            cache_duration: DEFAULT_CACHE_DURATION,
            cache_durations: HashMap::new(),
            max_parallel: DEFAULT_MAX_PARALLEL,
            fetch_timeout: None,
        }
    }

    fn cache_duration_for(&self, item_type: &str, def: &ResourceDef) -> Duration {
        if let Some(duration) = self.cache_durations.get(item_type) {
            return *duration;
        }
        def.cache_duration_secs
            .map(Duration::from_secs)
            .unwrap_or(self.cache_duration)
    }

    fn scopes_for(&self, def: &ResourceDef) -> Vec<Scope> {
        match def.location {
            LocationKind::Global => vec![Scope::global(self.project.clone())],
            LocationKind::Regional | LocationKind::Zonal => self
                .regions
                .iter()
                .map(|region| Scope::new(self.project.clone(), region.clone()))
                .collect(),
        }
    }
}

/// Adapter configuration for one family
pub fn adapter_config(item_type: &str, def: &ResourceDef, settings: &DiscoverySettings) -> AdapterConfig {
    let get_description = match def.key_style() {
        KeyStyle::Zonal => format!("Get a {} by {{zone}}/{{name}}", def.display_name),
        KeyStyle::Located => format!("Get a {} by {{location}}/{{name}}", def.display_name),
        KeyStyle::Name => format!("Get a {} by name", def.display_name),
    };

    AdapterConfig::new(item_type, settings.scopes_for(def))
        .with_descriptive_name(def.display_name.clone())
        .with_cache_duration(settings.cache_duration_for(item_type, def))
        .with_fetch_timeout(settings.fetch_timeout)
        .with_disable_list(def.disable_list)
        .with_use_list_for_get(def.use_list_for_get)
        .with_max_parallel(settings.max_parallel)
        .with_descriptions(
            get_description,
            format!("List all {}s", def.display_name),
            Some(format!("Search for a {} by its self-link", def.display_name)),
        )
}

/// One adapter per resource family, sharing `cache`
pub fn build_adapters(client: &GcpClient, settings: &DiscoverySettings, cache: &Arc<Cache>) -> Vec<Arc<dyn Adapter>> {
    let mut adapters: Vec<Arc<dyn Adapter>> = Vec::new();

    for (item_type, def) in &get_registry().resources {
        let Some(mapper) = GcpMapper::new(item_type, client.clone()) else {
            continue;
        };
        let config = adapter_config(item_type, def, settings);
        if config.scopes.is_empty() {
            tracing::warn!("{} serves no scopes; configure at least one region", item_type);
        }

        let adapter: Arc<dyn Adapter> = match def.fetch_mode {
            FetchMode::Describe => Arc::new(DescribeAdapter::new(mapper, config, cache.clone())),
            FetchMode::AlwaysGet => Arc::new(AlwaysGetAdapter::new(mapper, config, cache.clone())),
        };
        adapters.push(adapter);
    }

    adapters
}
