//! Adapter host - routes queries to the adapter serving their type

use super::{Adapter, AdapterMetadata};
use crate::model::{Item, Query, QueryError, QueryMethod, QueryResult};
use anyhow::Result;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
pub struct AdapterHost {
    adapters: BTreeMap<String, Arc<dyn Adapter>>,
}

impl AdapterHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register adapters; two adapters for one item type are a wiring bug
    pub fn add_adapters(&mut self, adapters: Vec<Arc<dyn Adapter>>) -> Result<()> {
        for adapter in adapters {
            let item_type = adapter.item_type().to_string();
            if self.adapters.contains_key(&item_type) {
                return Err(anyhow::anyhow!("Adapter for {} is already registered", item_type));
            }
            tracing::info!(
                "registered adapter {} for {} ({} scopes)",
                adapter.name(),
                item_type,
                adapter.scopes().len()
            );
            self.adapters.insert(item_type, adapter);
        }
        Ok(())
    }

    pub fn adapter(&self, item_type: &str) -> Option<&Arc<dyn Adapter>> {
        self.adapters.get(item_type)
    }

    /// All adapters, ordered by item type
    pub fn adapters(&self) -> impl Iterator<Item = &Arc<dyn Adapter>> {
        self.adapters.values()
    }

    pub fn metadata(&self) -> Vec<AdapterMetadata> {
        self.adapters.values().map(|a| a.metadata()).collect()
    }

    /// Run one query against the adapter for its type
    pub async fn execute(&self, query: &Query, ignore_cache: bool) -> QueryResult<Vec<Item>> {
        let Some(adapter) = self.adapter(&query.item_type) else {
            return Err(QueryError::no_scope(format!("no adapter serves type {}", query.item_type))
                .with_item_type(query.item_type.clone())
                .with_scope(query.scope.clone()));
        };

        tracing::debug!("executing {}", query);
        match query.method {
            QueryMethod::Get => adapter
                .get(&query.scope, &query.query, ignore_cache)
                .await
                .map(|item| vec![item]),
            QueryMethod::List => adapter.list(&query.scope, ignore_cache).await,
            QueryMethod::Search => adapter.search(&query.scope, &query.query, ignore_cache).await,
        }
    }
}
