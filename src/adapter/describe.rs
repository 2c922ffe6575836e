//! DescribeAdapter - the standard dispatcher
//!
//! Binds a [`DescribeMapper`] (input constructors, a paged provider call and
//! an output mapper) to the shared cache and exposes Get/List/Search.

use super::cache::Cache;
use super::paginator::{collect_pages, BoxPaginator};
use super::{apply_tags, cached_fetch, dedup_items, stamp_metadata, Adapter, AdapterConfig, AdapterMetadata};
use crate::model::{Item, QueryError, QueryMethod, QueryResult, Scope};
use async_trait::async_trait;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

/// Per-resource-family callbacks consumed by [`DescribeAdapter`]
///
/// The dispatcher never looks inside `Input` or `Output`.
#[async_trait]
pub trait DescribeMapper: Send + Sync + 'static {
    type Input: Clone + Send + Sync + 'static;
    type Output: Send + 'static;

    /// Request for one item. A query in the wrong format must fail here,
    /// before any network call.
    fn input_get(&self, scope: &Scope, query: &str) -> QueryResult<Self::Input>;

    /// Request enumerating the scope
    fn input_list(&self, scope: &Scope) -> QueryResult<Self::Input>;

    /// Request for an adapter-specific search. `None` means the adapter has
    /// no search call and queries are treated as fully-qualified resource names.
    fn input_search(&self, _scope: &Scope, _query: &str) -> Option<QueryResult<Self::Input>> {
        None
    }

    /// Pages of the provider call for `input`
    fn paginate(&self, input: Self::Input) -> BoxPaginator<Self::Output>;

    /// Convert one page into zero or more items.
    ///
    /// Pages are mapped independently; an item appearing on two pages is
    /// collapsed by the dispatcher, which keeps the first occurrence.
    fn output(&self, scope: &Scope, input: &Self::Input, page: Self::Output) -> QueryResult<Vec<Item>>;

    /// Whether a provider error means the requested resource does not exist
    fn is_not_found(&self, _err: &anyhow::Error) -> bool {
        false
    }

    /// Side-channel tags for a mapped item. `None` when the family has none.
    async fn tags(&self, _scope: &Scope, _item: &Item) -> Option<anyhow::Result<BTreeMap<String, String>>> {
        None
    }

    /// Split a fully-qualified resource name into its scope and Get query
    fn parse_resource_name(&self, _name: &str) -> Option<(Scope, String)> {
        None
    }
}

pub struct DescribeAdapter<M: DescribeMapper> {
    mapper: Arc<M>,
    config: Arc<AdapterConfig>,
    cache: Arc<Cache>,
}

impl<M: DescribeMapper> DescribeAdapter<M> {
    pub fn new(mapper: M, config: AdapterConfig, cache: Arc<Cache>) -> Self {
        Self {
            mapper: Arc::new(mapper),
            config: Arc::new(config),
            cache,
        }
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.config
    }

    pub fn mapper(&self) -> &M {
        &self.mapper
    }

    /// Fetch through the cache; `single` marks a get-style fetch that must
    /// produce exactly one item
    async fn fetch(
        &self,
        method: QueryMethod,
        scope: Scope,
        query: &str,
        input: M::Input,
        single: bool,
        ignore_cache: bool,
    ) -> QueryResult<Vec<Item>> {
        let upstream = run_describe(self.mapper.clone(), self.config.clone(), scope.clone(), input);
        cached_fetch(
            &self.cache,
            &self.config,
            method,
            &scope,
            query,
            single,
            ignore_cache,
            upstream,
        )
        .await
    }

    async fn get_via_list(&self, scope: Scope, query: &str, ignore_cache: bool) -> QueryResult<Item> {
        let scope_str = scope.to_string();
        // The Get request is never sent, but a malformed query still fails here
        self.mapper
            .input_get(&scope, query)
            .map_err(|e| self.config.contextualize(e, &scope_str))?;

        let input = self
            .mapper
            .input_list(&scope)
            .map_err(|e| self.config.contextualize(e, &scope_str))?;
        let items = self
            .fetch(QueryMethod::List, scope, "", input, false, ignore_cache)
            .await?;

        items
            .into_iter()
            .find(|item| item.unique_attribute_value().as_deref() == Some(query))
            .ok_or_else(|| {
                self.config.contextualize(
                    QueryError::not_found(format!("{} not found in {}", query, scope_str)),
                    &scope_str,
                )
            })
    }
}

/// The upstream part of a fetch: page, map, de-duplicate, tag
async fn run_describe<M: DescribeMapper>(
    mapper: Arc<M>,
    config: Arc<AdapterConfig>,
    scope: Scope,
    input: M::Input,
) -> QueryResult<Vec<Item>> {
    let started = Instant::now();
    tracing::debug!("{}: fetching in {}", config.name, scope);

    let mut paginator = mapper.paginate(input.clone());
    let pages = collect_pages(paginator.as_mut()).await.map_err(|err| {
        if mapper.is_not_found(&err) {
            QueryError::not_found(format!("{:#}", err))
        } else {
            QueryError::from_provider(&err)
        }
    })?;

    let mut items = Vec::new();
    for page in pages {
        items.extend(mapper.output(&scope, &input, page)?);
    }
    let mut items = dedup_items(items);

    let tag_futures: Vec<_> = items.iter().map(|item| mapper.tags(&scope, item)).collect();
    let tags: Vec<_> = futures::stream::iter(tag_futures)
        .buffered(config.max_parallel.max(1))
        .collect()
        .await;
    apply_tags(&mut items, tags);
    stamp_metadata(&mut items, &config.name, started);

    tracing::debug!(
        "{}: {} items in {} ({:?})",
        config.name,
        items.len(),
        scope,
        started.elapsed()
    );
    Ok(items)
}

#[async_trait]
impl<M: DescribeMapper> Adapter for DescribeAdapter<M> {
    fn item_type(&self) -> &str {
        &self.config.item_type
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn scopes(&self) -> Vec<String> {
        self.config.scopes.iter().map(|s| s.to_string()).collect()
    }

    fn metadata(&self) -> AdapterMetadata {
        // Search is always answerable, by name when there is no search call
        self.config.metadata(true)
    }

    async fn get(&self, scope: &str, query: &str, ignore_cache: bool) -> QueryResult<Item> {
        let scope = self.config.check_scope(scope)?;

        if self.config.use_list_for_get {
            return self.get_via_list(scope, query, ignore_cache).await;
        }

        let scope_str = scope.to_string();
        let input = self
            .mapper
            .input_get(&scope, query)
            .map_err(|e| self.config.contextualize(e, &scope_str))?;

        let items = self
            .fetch(QueryMethod::Get, scope, query, input, true, ignore_cache)
            .await?;

        items.into_iter().next().ok_or_else(|| {
            self.config
                .contextualize(QueryError::not_found(format!("{} not found", query)), &scope_str)
        })
    }

    async fn list(&self, scope: &str, ignore_cache: bool) -> QueryResult<Vec<Item>> {
        let parsed = self.config.check_scope(scope)?;
        if self.config.disable_list {
            return Err(self.config.disabled_list_error(scope));
        }

        let input = self
            .mapper
            .input_list(&parsed)
            .map_err(|e| self.config.contextualize(e, scope))?;

        self.fetch(QueryMethod::List, parsed, "", input, false, ignore_cache)
            .await
    }

    async fn search(&self, scope: &str, query: &str, ignore_cache: bool) -> QueryResult<Vec<Item>> {
        let parsed = self.config.check_scope(scope)?;

        match self.mapper.input_search(&parsed, query) {
            Some(input) => {
                let input = input.map_err(|e| self.config.contextualize(e, scope))?;
                self.fetch(QueryMethod::Search, parsed, query, input, false, ignore_cache)
                    .await
            },
            None => {
                let (target_scope, key) = self.mapper.parse_resource_name(query).ok_or_else(|| {
                    self.config.contextualize(
                        QueryError::other(format!(
                            "{} supports search by resource name only; {:?} is not one",
                            self.config.item_type, query
                        )),
                        scope,
                    )
                })?;

                if target_scope != parsed {
                    return Err(self.config.contextualize(
                        QueryError::no_scope(format!(
                            "{} belongs to scope {}, not {}",
                            query, target_scope, scope
                        )),
                        scope,
                    ));
                }

                let item = self.get(scope, &key, ignore_cache).await?;
                Ok(vec![item])
            },
        }
    }
}
