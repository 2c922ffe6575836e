//! AlwaysGetAdapter - list identifiers, then get each resource
//!
//! For providers whose enumeration call returns identifiers (or summaries too
//! thin to map), List and Search page through the enumeration and fan out to
//! one Get per identifier with bounded concurrency.

use super::cache::Cache;
use super::paginator::{collect_pages, BoxPaginator};
use super::{apply_tags, cached_fetch, dedup_items, stamp_metadata, Adapter, AdapterConfig, AdapterMetadata};
use crate::model::{Item, QueryError, QueryMethod, QueryResult, Scope};
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

#[async_trait]
pub trait AlwaysGetMapper: Send + Sync + 'static {
    type ListInput: Clone + Send + Sync + 'static;
    type ListOutput: Send + 'static;
    type GetInput: Clone + Send + Sync + 'static;
    type GetOutput: Send + 'static;

    /// Request for one item; a query in the wrong format fails here
    fn input_get(&self, scope: &Scope, query: &str) -> QueryResult<Self::GetInput>;

    fn input_list(&self, scope: &Scope) -> QueryResult<Self::ListInput>;

    /// Enumeration request for an adapter-specific search; `None` means
    /// queries are treated as fully-qualified resource names
    fn input_search(&self, _scope: &Scope, _query: &str) -> Option<QueryResult<Self::ListInput>> {
        None
    }

    fn paginate_list(&self, input: Self::ListInput) -> BoxPaginator<Self::ListOutput>;

    /// Get requests for every resource on one enumeration page
    fn list_to_get_inputs(&self, scope: &Scope, page: Self::ListOutput) -> QueryResult<Vec<Self::GetInput>>;

    async fn get(&self, input: Self::GetInput) -> anyhow::Result<Self::GetOutput>;

    /// Map one resource; `None` filters it out
    fn output(&self, scope: &Scope, input: &Self::GetInput, output: Self::GetOutput) -> QueryResult<Option<Item>>;

    fn is_not_found(&self, _err: &anyhow::Error) -> bool {
        false
    }

    async fn tags(&self, _scope: &Scope, _item: &Item) -> Option<anyhow::Result<BTreeMap<String, String>>> {
        None
    }

    fn parse_resource_name(&self, _name: &str) -> Option<(Scope, String)> {
        None
    }
}

pub struct AlwaysGetAdapter<M: AlwaysGetMapper> {
    mapper: Arc<M>,
    config: Arc<AdapterConfig>,
    cache: Arc<Cache>,
}

impl<M: AlwaysGetMapper> AlwaysGetAdapter<M> {
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

    async fn fan_out(
        &self,
        method: QueryMethod,
        scope: Scope,
        query: &str,
        input: M::ListInput,
        ignore_cache: bool,
    ) -> QueryResult<Vec<Item>> {
        let upstream = run_list_then_get(self.mapper.clone(), self.config.clone(), scope.clone(), input);
        cached_fetch(&self.cache, &self.config, method, &scope, query, false, ignore_cache, upstream).await
    }
}

fn classify<M: AlwaysGetMapper>(mapper: &M, err: &anyhow::Error) -> QueryError {
    if mapper.is_not_found(err) {
        QueryError::not_found(format!("{:#}", err))
    } else {
        QueryError::from_provider(err)
    }
}

async fn get_one<M: AlwaysGetMapper>(mapper: &M, scope: &Scope, input: M::GetInput) -> QueryResult<Option<Item>> {
    let output = mapper.get(input.clone()).await.map_err(|e| classify(mapper, &e))?;
    mapper.output(scope, &input, output)
}

async fn finish<M: AlwaysGetMapper>(
    mapper: &M,
    config: &AdapterConfig,
    scope: &Scope,
    items: Vec<Item>,
    started: Instant,
) -> Vec<Item> {
    let mut items = dedup_items(items);
    let tag_futures: Vec<_> = items.iter().map(|item| mapper.tags(scope, item)).collect();
    let tags: Vec<_> = futures::stream::iter(tag_futures)
        .buffered(config.max_parallel.max(1))
        .collect()
        .await;
    apply_tags(&mut items, tags);
    stamp_metadata(&mut items, &config.name, started);
    items
}

async fn run_get<M: AlwaysGetMapper>(
    mapper: Arc<M>,
    config: Arc<AdapterConfig>,
    scope: Scope,
    input: M::GetInput,
) -> QueryResult<Vec<Item>> {
    let started = Instant::now();
    let items: Vec<Item> = get_one(mapper.as_ref(), &scope, input).await?.into_iter().collect();
    Ok(finish(mapper.as_ref(), &config, &scope, items, started).await)
}

async fn run_list_then_get<M: AlwaysGetMapper>(
    mapper: Arc<M>,
    config: Arc<AdapterConfig>,
    scope: Scope,
    input: M::ListInput,
) -> QueryResult<Vec<Item>> {
    let started = Instant::now();

    let mut paginator = mapper.paginate_list(input);
    let pages = collect_pages(paginator.as_mut())
        .await
        .map_err(|e| classify(mapper.as_ref(), &e))?;

    let mut get_inputs = Vec::new();
    for page in pages {
        get_inputs.extend(mapper.list_to_get_inputs(&scope, page)?);
    }
    tracing::debug!(
        "{}: enumerated {} resources in {}, fetching each",
        config.name,
        get_inputs.len(),
        scope
    );

    // A resource deleted between enumeration and its get is skipped
    let items: Vec<Item> = futures::stream::iter(get_inputs)
        .map(|input| {
            let mapper = mapper.clone();
            let scope = scope.clone();
            async move {
                match get_one(mapper.as_ref(), &scope, input).await {
                    Err(e) if e.is_not_found() => Ok(None),
                    other => other,
                }
            }
        })
        .buffered(config.max_parallel.max(1))
        .try_filter_map(|item| async move { Ok(item) })
        .try_collect()
        .await?;

    Ok(finish(mapper.as_ref(), &config, &scope, items, started).await)
}

#[async_trait]
impl<M: AlwaysGetMapper> Adapter for AlwaysGetAdapter<M> {
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
        self.config.metadata(true)
    }

    async fn get(&self, scope: &str, query: &str, ignore_cache: bool) -> QueryResult<Item> {
        let parsed = self.config.check_scope(scope)?;
        let input = self
            .mapper
            .input_get(&parsed, query)
            .map_err(|e| self.config.contextualize(e, scope))?;

        let upstream = run_get(self.mapper.clone(), self.config.clone(), parsed.clone(), input);
        let items = cached_fetch(
            &self.cache,
            &self.config,
            QueryMethod::Get,
            &parsed,
            query,
            true,
            ignore_cache,
            upstream,
        )
        .await?;

        items.into_iter().next().ok_or_else(|| {
            self.config
                .contextualize(QueryError::not_found(format!("{} not found", query)), scope)
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

        self.fan_out(QueryMethod::List, parsed, "", input, ignore_cache).await
    }

    async fn search(&self, scope: &str, query: &str, ignore_cache: bool) -> QueryResult<Vec<Item>> {
        let parsed = self.config.check_scope(scope)?;

        if let Some(input) = self.mapper.input_search(&parsed, query) {
            let input = input.map_err(|e| self.config.contextualize(e, scope))?;
            return self
                .fan_out(QueryMethod::Search, parsed, query, input, ignore_cache)
                .await;
        }

        let Some((target_scope, key)) = self.mapper.parse_resource_name(query) else {
            return Err(self.config.contextualize(
                QueryError::other(format!(
                    "{} supports search by resource name only; {:?} is not one",
                    self.config.item_type, query
                )),
                scope,
            ));
        };
        if target_scope != parsed {
            return Err(self.config.contextualize(
                QueryError::no_scope(format!("{} belongs to scope {}, not {}", query, target_scope, scope)),
                scope,
            ));
        }

        Ok(vec![self.get(scope, &key, ignore_cache).await?])
    }
}
