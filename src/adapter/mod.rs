//! Adapter dispatcher
//!
//! Generic machinery turning per-resource mapper callbacks into the uniform
//! Get/List/Search query surface.
//!
//! # Architecture
//!
//! - [`cache`] - shared TTL cache with single-flight fetches
//! - [`paginator`] - iteration over provider page-token conventions
//! - [`describe`] - [`DescribeAdapter`], the standard dispatcher over a [`DescribeMapper`]
//! - [`always_get`] - [`AlwaysGetAdapter`], enumerate ids then fan out to individual gets
//! - [`host`] - [`AdapterHost`], routes a [`Query`](crate::model::Query) to the adapter serving its type
//!
//! Every verb follows the same path: validate the scope (failing with
//! `NOSCOPE` before any network call), build the provider input through the
//! mapper, consult the cache, and on a miss drive the paginator to exhaustion,
//! map each page into items, resolve tags and cache the result.

pub mod always_get;
pub mod cache;
pub mod describe;
pub mod host;
pub mod paginator;

pub use always_get::{AlwaysGetAdapter, AlwaysGetMapper};
pub use cache::{Cache, CacheKey, CacheStats};
pub use describe::{DescribeAdapter, DescribeMapper};
pub use host::AdapterHost;
pub use paginator::{collect_pages, BoxPaginator, Paginator, SinglePage, TokenPaginator};

use crate::model::{Item, ItemKey, Metadata, QueryError, QueryMethod, QueryResult, Scope};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default time a query result stays cached
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(60 * 60);

/// Default number of concurrent per-item gets for fan-out adapters
pub const DEFAULT_MAX_PARALLEL: usize = 10;

/// The query surface every adapter exposes
#[async_trait]
pub trait Adapter: Send + Sync {
    /// Item type this adapter returns
    fn item_type(&self) -> &str;

    /// Unique name of this adapter, used as the cache namespace
    fn name(&self) -> &str;

    fn scopes(&self) -> Vec<String>;

    fn metadata(&self) -> AdapterMetadata;

    /// Exactly one item, or a `NOTFOUND` error
    async fn get(&self, scope: &str, query: &str, ignore_cache: bool) -> QueryResult<Item>;

    /// Every item in the scope; an empty scope is not an error
    async fn list(&self, scope: &str, ignore_cache: bool) -> QueryResult<Vec<Item>>;

    /// Items matching an adapter-specific query
    async fn search(&self, scope: &str, query: &str, ignore_cache: bool) -> QueryResult<Vec<Item>>;
}

/// Capabilities of an adapter, as read by the layer deciding which query
/// methods to offer
#[derive(Debug, Clone, Serialize)]
pub struct AdapterMetadata {
    #[serde(rename = "type")]
    pub item_type: String,
    pub descriptive_name: String,
    pub supported_methods: Vec<QueryMethod>,
    pub get_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_description: Option<String>,
    pub disable_list: bool,
    pub use_list_for_get: bool,
    pub cache_duration_secs: u64,
    pub scopes: Vec<String>,
}

/// Declarative configuration binding a mapper to the dispatcher
#[derive(Debug, Clone)]
pub struct AdapterConfig {
    pub name: String,
    pub item_type: String,
    pub descriptive_name: String,
    pub scopes: Vec<Scope>,
    pub cache_duration: Duration,
    /// Upper bound on the upstream work of one fetch
    pub fetch_timeout: Option<Duration>,
    /// The provider has no usable bulk enumeration; callers must search
    pub disable_list: bool,
    /// Resolve Get by listing the scope and filtering on the unique attribute
    pub use_list_for_get: bool,
    pub max_parallel: usize,
    pub get_description: String,
    pub list_description: String,
    pub search_description: Option<String>,
}

impl AdapterConfig {
    pub fn new(item_type: impl Into<String>, scopes: Vec<Scope>) -> Self {
        let item_type = item_type.into();
        Self {
            name: format!("{}-adapter", item_type),
            descriptive_name: item_type.clone(),
            get_description: format!("Get a {} by its unique attribute", item_type),
            list_description: format!("List all {} items", item_type),
            search_description: None,
            item_type,
            scopes,
            cache_duration: DEFAULT_CACHE_DURATION,
            fetch_timeout: None,
            disable_list: false,
            use_list_for_get: false,
            max_parallel: DEFAULT_MAX_PARALLEL,
        }
    }

    pub fn with_descriptive_name(mut self, name: impl Into<String>) -> Self {
        self.descriptive_name = name.into();
        self
    }

    pub fn with_cache_duration(mut self, duration: Duration) -> Self {
        self.cache_duration = duration;
        self
    }

    pub fn with_fetch_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn with_disable_list(mut self, disable: bool) -> Self {
        self.disable_list = disable;
        self
    }

    pub fn with_use_list_for_get(mut self, use_list: bool) -> Self {
        self.use_list_for_get = use_list;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_descriptions(
        mut self,
        get: impl Into<String>,
        list: impl Into<String>,
        search: Option<String>,
    ) -> Self {
        self.get_description = get.into();
        self.list_description = list.into();
        self.search_description = search;
        self
    }

    pub(crate) fn metadata(&self, supports_search: bool) -> AdapterMetadata {
        let mut supported_methods = vec![QueryMethod::Get];
        if !self.disable_list {
            supported_methods.push(QueryMethod::List);
        }
        if supports_search {
            supported_methods.push(QueryMethod::Search);
        }

        AdapterMetadata {
            item_type: self.item_type.clone(),
            descriptive_name: self.descriptive_name.clone(),
            supported_methods,
            get_description: self.get_description.clone(),
            list_description: (!self.disable_list).then(|| self.list_description.clone()),
            search_description: self.search_description.clone(),
            disable_list: self.disable_list,
            use_list_for_get: self.use_list_for_get,
            cache_duration_secs: self.cache_duration.as_secs(),
            scopes: self.scopes.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Parse and validate a requested scope before any network call
    pub(crate) fn check_scope(&self, scope: &str) -> QueryResult<Scope> {
        let parsed = Scope::parse(scope).map_err(|e| self.contextualize(e, scope))?;
        if !self.scopes.contains(&parsed) {
            return Err(self.contextualize(
                QueryError::no_scope(format!("{} does not serve scope {}", self.name, scope)),
                scope,
            ));
        }
        Ok(parsed)
    }

    pub(crate) fn contextualize(&self, err: QueryError, scope: &str) -> QueryError {
        err.in_context(&self.name, &self.item_type, scope)
    }

    pub(crate) fn disabled_list_error(&self, scope: &str) -> QueryError {
        self.contextualize(
            QueryError::other(format!(
                "LIST is disabled for {}; use SEARCH instead",
                self.item_type
            )),
            scope,
        )
    }
}

/// Serve a query from the cache or run `upstream` once for all concurrent
/// callers. `single` marks get-style fetches, which must yield exactly one
/// item; list-style results also seed the cache for Gets of each item.
#[allow(clippy::too_many_arguments)]
pub(crate) async fn cached_fetch<Fut>(
    cache: &Arc<Cache>,
    config: &Arc<AdapterConfig>,
    method: QueryMethod,
    scope: &Scope,
    query: &str,
    single: bool,
    ignore_cache: bool,
    upstream: Fut,
) -> QueryResult<Vec<Item>>
where
    Fut: Future<Output = QueryResult<Vec<Item>>> + Send + 'static,
{
    let scope_str = scope.to_string();
    let key = CacheKey::new(&config.name, method, &scope_str, query);

    let seed_cache = cache.clone();
    let seed_config = config.clone();
    let query_owned = query.to_string();

    let items = cache
        .get_or_fetch(key, config.cache_duration, ignore_cache, move || async move {
            let items = with_fetch_timeout(seed_config.fetch_timeout, upstream).await?;
            if single {
                return expect_one(items, &query_owned);
            }
            for item in &items {
                if let Some(value) = item.unique_attribute_value() {
                    seed_cache.set(
                        CacheKey::new(&seed_config.name, QueryMethod::Get, &item.scope, &value),
                        Arc::new(vec![item.clone()]),
                        seed_config.cache_duration,
                    );
                }
            }
            Ok(items)
        })
        .await
        .map_err(|e| config.contextualize(e, &scope_str))?;

    Ok(items.as_ref().clone())
}

/// Run the upstream part of a fetch under the configured timeout
pub(crate) async fn with_fetch_timeout<Fut>(timeout: Option<Duration>, fetch: Fut) -> QueryResult<Vec<Item>>
where
    Fut: Future<Output = QueryResult<Vec<Item>>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fetch).await.unwrap_or_else(|_| {
            Err(QueryError::other(format!("fetch timed out after {:?}", limit)))
        }),
        None => fetch.await,
    }
}

/// Drop items sharing a primary key, keeping the first occurrence, and items
/// that do not carry their unique attribute at all
pub(crate) fn dedup_items(items: Vec<Item>) -> Vec<Item> {
    let mut seen: HashSet<ItemKey> = HashSet::new();
    let mut out = Vec::with_capacity(items.len());

    for item in items {
        let Some(key) = item.key() else {
            tracing::warn!(
                "dropping {} item in {}: no value for unique attribute {:?}",
                item.item_type,
                item.scope,
                item.unique_attribute
            );
            continue;
        };
        if seen.insert(key) {
            out.push(item);
        } else {
            tracing::debug!("dropping duplicate item {}", item.globally_unique_name());
        }
    }

    out
}

/// Merge side-channel tags into mapped items, degrading failures to the
/// error sentinel instead of failing the fetch
pub(crate) fn apply_tags(items: &mut [Item], results: Vec<Option<anyhow::Result<BTreeMap<String, String>>>>) {
    for (item, result) in items.iter_mut().zip(results) {
        match result {
            None => {},
            Some(Ok(tags)) => item.tags.extend(tags),
            Some(Err(err)) => {
                tracing::warn!("failed to get tags for {}: {:#}", item.globally_unique_name(), err);
                item.set_tags_error(&err);
            },
        }
    }
}

pub(crate) fn stamp_metadata(items: &mut [Item], source_name: &str, started: Instant) {
    let metadata = Metadata {
        source_name: source_name.to_string(),
        timestamp: chrono::Utc::now(),
        source_duration: started.elapsed(),
    };
    for item in items {
        item.metadata = Some(metadata.clone());
    }
}

/// Exactly one item from a get-style fetch
pub(crate) fn expect_one(items: Vec<Item>, query: &str) -> QueryResult<Vec<Item>> {
    match items.len() {
        0 => Err(QueryError::not_found(format!("{} not found", query))),
        1 => Ok(items),
        n => Err(QueryError::other(format!("expected 1 item for {}, got {}", query, n))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Attributes, ErrorKind, TAG_ERROR_KEY};
    use serde_json::json;

    fn item(name: Option<&str>, scope: &str) -> Item {
        let value = match name {
            Some(name) => json!({ "name": name }),
            None => json!({ "id": 1 }),
        };
        Item::new("thing", "name", Attributes::from_value(value, &[]).unwrap(), scope)
    }

    #[test]
    fn test_dedup_keeps_first_and_respects_scope() {
        let items = vec![
            item(Some("a"), "p.r1"),
            item(Some("a"), "p.r1"),
            item(Some("a"), "p.r2"),
            item(None, "p.r1"),
        ];
        let deduped = dedup_items(items);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].scope, "p.r1");
        assert_eq!(deduped[1].scope, "p.r2");
    }

    #[test]
    fn test_check_scope() {
        let config = AdapterConfig::new("thing", vec![Scope::new("p", "r1")]);
        assert!(config.check_scope("p.r1").is_ok());
        assert_eq!(config.check_scope("p.r2").unwrap_err().kind, ErrorKind::NoScope);
        assert_eq!(config.check_scope("garbage").unwrap_err().kind, ErrorKind::Other);
    }

    #[test]
    fn test_metadata_reflects_flags() {
        let config = AdapterConfig::new("thing", vec![Scope::new("p", "r1")])
            .with_disable_list(true)
            .with_cache_duration(Duration::from_secs(120));
        let metadata = config.metadata(true);
        assert_eq!(metadata.supported_methods, vec![QueryMethod::Get, QueryMethod::Search]);
        assert!(metadata.list_description.is_none());
        assert_eq!(metadata.cache_duration_secs, 120);
        assert_eq!(metadata.scopes, vec!["p.r1"]);
    }

    #[test]
    fn test_apply_tags_sentinel() {
        let mut items = vec![item(Some("a"), "p.r1"), item(Some("b"), "p.r1")];
        apply_tags(
            &mut items,
            vec![
                Some(Ok(BTreeMap::from([("env".to_string(), "prod".to_string())]))),
                Some(Err(anyhow::anyhow!("permission denied"))),
            ],
        );
        assert_eq!(items[0].tags.get("env").map(String::as_str), Some("prod"));
        assert!(items[1].tags[TAG_ERROR_KEY].contains("permission denied"));
    }

    #[test]
    fn test_expect_one() {
        assert_eq!(expect_one(vec![], "x").unwrap_err().kind, ErrorKind::NotFound);
        assert!(expect_one(vec![item(Some("a"), "p.r")], "a").is_ok());
        let two = vec![item(Some("a"), "p.r"), item(Some("b"), "p.r")];
        assert_eq!(expect_one(two, "a").unwrap_err().kind, ErrorKind::Other);
    }

    #[tokio::test]
    async fn test_fetch_timeout() {
        let result = with_fetch_timeout(Some(Duration::from_millis(10)), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        })
        .await;
        assert!(result.unwrap_err().message.contains("timed out"));
    }
}
