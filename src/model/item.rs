//! Item - the unit of the discovery graph

use super::attributes::Attributes;
use super::query::{LinkedItemQuery, Query};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Tag key holding the failure message when tags could not be fetched
pub const TAG_ERROR_KEY: &str = "error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Health {
    Ok,
    Pending,
    Error,
    Unknown,
}

impl Health {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ok" => Some(Health::Ok),
            "pending" => Some(Health::Pending),
            "error" => Some(Health::Error),
            "unknown" => Some(Health::Unknown),
            _ => None,
        }
    }
}

/// Where and when an item came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metadata {
    pub source_name: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "source_duration_ms", serialize_with = "serialize_millis")]
    pub source_duration: Duration,
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Primary key of an item: type, unique attribute value and scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemKey {
    pub item_type: String,
    pub unique_attribute_value: String,
    pub scope: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Item {
    #[serde(rename = "type")]
    pub item_type: String,
    pub unique_attribute: String,
    pub attributes: Attributes,
    pub scope: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health: Option<Health>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub linked_item_queries: Vec<LinkedItemQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl Item {
    pub fn new(
        item_type: impl Into<String>,
        unique_attribute: impl Into<String>,
        attributes: Attributes,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            item_type: item_type.into(),
            unique_attribute: unique_attribute.into(),
            attributes,
            scope: scope.into(),
            tags: BTreeMap::new(),
            health: None,
            linked_item_queries: Vec::new(),
            metadata: None,
        }
    }

    /// Value of the unique attribute, if the attributes carry it
    pub fn unique_attribute_value(&self) -> Option<String> {
        self.attributes.get_string(&self.unique_attribute)
    }

    pub fn key(&self) -> Option<ItemKey> {
        Some(ItemKey {
            item_type: self.item_type.clone(),
            unique_attribute_value: self.unique_attribute_value()?,
            scope: self.scope.clone(),
        })
    }

    /// `{scope}.{type}.{unique_attribute_value}`
    pub fn globally_unique_name(&self) -> String {
        format!(
            "{}.{}.{}",
            self.scope,
            self.item_type,
            self.unique_attribute_value().unwrap_or_default()
        )
    }

    /// A GET query that fetches this item again
    pub fn reference(&self) -> Query {
        Query::get(
            self.item_type.clone(),
            self.unique_attribute_value().unwrap_or_default(),
            self.scope.clone(),
        )
    }

    /// Add an edge unless an identical one is already declared
    pub fn add_linked_query(&mut self, link: LinkedItemQuery) {
        let duplicate = self.linked_item_queries.iter().any(|existing| {
            existing.query.same_request(&link.query)
                && existing.blast_propagation == link.blast_propagation
        });
        if !duplicate {
            self.linked_item_queries.push(link);
        }
    }

    /// Replace the tags with the failure sentinel
    pub fn set_tags_error(&mut self, err: &anyhow::Error) {
        self.tags = tags_error(err);
    }
}

/// Tag map recording why tags are missing
pub fn tags_error(err: &anyhow::Error) -> BTreeMap<String, String> {
    BTreeMap::from([(TAG_ERROR_KEY.to_string(), format!("failed to get tags: {:#}", err))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::query::BlastPropagation;
    use serde_json::json;

    fn network() -> Item {
        let attrs = Attributes::from_value(json!({"name": "default", "id": 42}), &[]).unwrap();
        Item::new("gcp-compute-network", "name", attrs, "p.global")
    }

    #[test]
    fn test_key_and_names() {
        let item = network();
        assert_eq!(item.unique_attribute_value().as_deref(), Some("default"));
        assert_eq!(item.globally_unique_name(), "p.global.gcp-compute-network.default");
        let key = item.key().unwrap();
        assert_eq!(key.unique_attribute_value, "default");
        assert_eq!(key.scope, "p.global");
    }

    #[test]
    fn test_missing_unique_attribute_has_no_key() {
        let mut item = network();
        item.unique_attribute = "selfLink".to_string();
        assert!(item.key().is_none());
    }

    #[test]
    fn test_add_linked_query_deduplicates() {
        let mut item = network();
        let link = || {
            LinkedItemQuery::new(
                Query::get("gcp-compute-subnetwork", "s1", "p.us-central1"),
                BlastPropagation::both(),
            )
        };
        item.add_linked_query(link());
        item.add_linked_query(link());
        assert_eq!(item.linked_item_queries.len(), 1);
    }

    #[test]
    fn test_tags_error_sentinel() {
        let mut item = network();
        item.set_tags_error(&anyhow::anyhow!("API request failed: 403 Forbidden"));
        let msg = item.tags.get(TAG_ERROR_KEY).unwrap();
        assert!(msg.starts_with("failed to get tags:"));
        assert!(msg.contains("403"));
    }

    #[test]
    fn test_health_parse() {
        assert_eq!(Health::parse("PENDING"), Some(Health::Pending));
        assert_eq!(Health::parse("ok"), Some(Health::Ok));
        assert_eq!(Health::parse("green"), None);
    }
}
