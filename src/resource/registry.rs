//! Resource Registry - Load resource definitions from JSON
//!
//! This module loads all GCP resource family definitions from embedded JSON
//! files and provides lookup functions for the rest of the crate.

use crate::gcp::links::KeyStyle;
use crate::model::Health;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;

/// Embedded resource JSON files (compiled into the binary)
const RESOURCE_FILES: &[&str] = &[
    include_str!("../resources/common.json"),
    include_str!("../resources/compute.json"),
    include_str!("../resources/storage.json"),
    include_str!("../resources/container.json"),
];

/// Health mapping entry from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct HealthDef {
    pub value: String,
    pub health: Health,
}

/// Where resources of a family live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationKind {
    Global,
    Regional,
    /// Served per region; Get keys are `{zone}/{name}`
    Zonal,
}

/// How List is answered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    /// The list call returns complete resources
    #[default]
    Describe,
    /// The list call only names resources; each is then fetched
    AlwaysGet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMethod {
    #[default]
    Get,
    /// Query by the full self-link
    Search,
}

/// Relationship rule: every resource reference found at `path` becomes an
/// edge to `item_type` with this propagation
#[derive(Debug, Clone, Deserialize)]
pub struct LinkDef {
    pub path: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub method: LinkMethod,
    #[serde(rename = "in")]
    pub in_: bool,
    pub out: bool,
    pub reason: String,
}

/// Resource definition from JSON
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceDef {
    pub display_name: String,
    pub service: String,
    pub collection: String,
    pub location: LocationKind,
    /// Dot path of the item array in a list response
    pub response_path: String,
    pub unique_attribute: String,
    #[serde(default)]
    pub exclude_fields: Vec<String>,
    /// Field holding provider labels, moved to the item's tags
    #[serde(default)]
    pub tag_field: Option<String>,
    #[serde(default)]
    pub health_field: Option<String>,
    #[serde(default)]
    pub health_map: Option<String>,
    /// Resource Manager tag bindings are fetched for each item
    #[serde(default)]
    pub tag_bindings: bool,
    #[serde(default)]
    pub disable_list: bool,
    #[serde(default)]
    pub use_list_for_get: bool,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    #[serde(default)]
    pub list_params: BTreeMap<String, String>,
    #[serde(default)]
    pub get_params: BTreeMap<String, String>,
    #[serde(default)]
    pub cache_duration_secs: Option<u64>,
    #[serde(default)]
    pub links: Vec<LinkDef>,
}

impl ResourceDef {
    /// Shape of this family's Get keys, read off its unique attribute
    pub fn key_style(&self) -> KeyStyle {
        match self.unique_attribute.as_str() {
            "zonalName" => KeyStyle::Zonal,
            "locationName" => KeyStyle::Located,
            _ => KeyStyle::Name,
        }
    }
}

/// Root structure of resources/*.json
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceConfig {
    #[serde(default)]
    pub health_maps: HashMap<String, Vec<HealthDef>>,
    #[serde(default)]
    pub resources: BTreeMap<String, ResourceDef>,
}

/// Global registry loaded from JSON
static REGISTRY: OnceLock<ResourceConfig> = OnceLock::new();

/// Get the resource registry (loads from embedded JSON on first access)
pub fn get_registry() -> &'static ResourceConfig {
    REGISTRY.get_or_init(|| {
        let mut final_config = ResourceConfig::default();

        for content in RESOURCE_FILES {
            // Embedded at compile time; the registry tests pin every file as valid
            let partial: ResourceConfig = serde_json::from_str(content)
                .unwrap_or_else(|e| panic!("Failed to parse embedded resource JSON: {}", e));
            final_config.health_maps.extend(partial.health_maps);
            final_config.resources.extend(partial.resources);
        }

        final_config
    })
}

/// Get a resource definition by item type
pub fn get_resource(item_type: &str) -> Option<&'static ResourceDef> {
    get_registry().resources.get(item_type)
}

/// All item types, sorted
pub fn get_all_resource_keys() -> Vec<&'static str> {
    get_registry().resources.keys().map(|s| s.as_str()).collect()
}

/// Health for a provider status value; unmapped values are `Unknown`
pub fn get_health_for_value(health_map_name: &str, value: &str) -> Option<Health> {
    let map = get_registry().health_maps.get(health_map_name)?;
    Some(
        map.iter()
            .find(|h| h.value == value)
            .map(|h| h.health)
            .unwrap_or(Health::Unknown),
    )
}
