//! Dispatcher behavior against an in-memory provider
//!
//! A fake mapper counts every upstream call so caching, pagination,
//! single-flight and error classification can be checked without a network.

use async_trait::async_trait;
use futures::future::join_all;
use futures::FutureExt;
use gcp_discovery::adapter::{
    Adapter, AdapterConfig, AdapterHost, AlwaysGetAdapter, AlwaysGetMapper, BoxPaginator, Cache, DescribeAdapter,
    DescribeMapper, SinglePage, TokenPaginator,
};
use gcp_discovery::model::{
    Attributes, BlastPropagation, ErrorKind, Item, LinkedItemQuery, Query, QueryError, QueryMethod, QueryResult,
    Scope, TAG_ERROR_KEY,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SCOPE: &str = "111.eu-west-2";

#[derive(Debug, Clone)]
enum FakeInput {
    Get(String),
    List,
}

#[derive(Default)]
struct FakeProvider {
    pages: Vec<Vec<Value>>,
    calls: Arc<AtomicUsize>,
    /// Provider calls that ran to the end
    completed: Arc<AtomicUsize>,
    delay: Option<Duration>,
    fail_tags: bool,
    tag_delay: Option<Duration>,
    tags_running: Arc<AtomicUsize>,
    peak_tags: Arc<AtomicUsize>,
}

impl FakeProvider {
    fn new(pages: Vec<Vec<Value>>) -> Self {
        Self {
            pages,
            ..Self::default()
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn failing_tags(mut self) -> Self {
        self.fail_tags = true;
        self
    }

    fn with_tag_delay(mut self, delay: Duration) -> Self {
        self.tag_delay = Some(delay);
        self
    }

    fn calls(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }

    fn completed(&self) -> Arc<AtomicUsize> {
        self.completed.clone()
    }
}

fn vpc(name: &str) -> Value {
    json!({ "name": name, "network": format!("net-{}", name) })
}

fn to_item(scope: &Scope, value: Value) -> QueryResult<Item> {
    let network = value.get("network").and_then(Value::as_str).map(str::to_string);
    let mut item = Item::new("fake-vpc", "name", Attributes::from_value(value, &[])?, scope.to_string());
    if let Some(network) = network {
        item.add_linked_query(LinkedItemQuery::new(
            Query::get("fake-network", network, scope.to_string()),
            BlastPropagation::new(true, false),
        ));
    }
    Ok(item)
}

#[async_trait]
impl DescribeMapper for FakeProvider {
    type Input = FakeInput;
    type Output = Vec<Value>;

    fn input_get(&self, _scope: &Scope, query: &str) -> QueryResult<FakeInput> {
        if query.is_empty() || query.contains('/') {
            return Err(QueryError::other(format!("malformed query {:?}", query)));
        }
        Ok(FakeInput::Get(query.to_string()))
    }

    fn input_list(&self, _scope: &Scope) -> QueryResult<FakeInput> {
        Ok(FakeInput::List)
    }

    fn paginate(&self, input: FakeInput) -> BoxPaginator<Vec<Value>> {
        let pages = Arc::new(self.pages.clone());
        let calls = self.calls.clone();
        let completed = self.completed.clone();
        let delay = self.delay;

        match input {
            FakeInput::Get(name) => Box::new(SinglePage::new(
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    completed.fetch_add(1, Ordering::SeqCst);
                    let found: Vec<Value> = pages
                        .iter()
                        .flatten()
                        .filter(|v| v["name"] == name.as_str())
                        .cloned()
                        .collect();
                    if found.is_empty() {
                        anyhow::bail!("API request failed: 404 Not Found");
                    }
                    Ok(found)
                }
                .boxed(),
            )),
            FakeInput::List => Box::new(TokenPaginator::new(move |token: Option<String>| {
                let pages = pages.clone();
                let calls = calls.clone();
                let completed = completed.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    completed.fetch_add(1, Ordering::SeqCst);
                    let index = token.as_deref().map(str::parse::<usize>).transpose()?.unwrap_or(0);
                    let next = (index + 1 < pages.len()).then(|| (index + 1).to_string());
                    Ok((pages.get(index).cloned().unwrap_or_default(), next))
                }
                .boxed()
            })),
        }
    }

    fn output(&self, scope: &Scope, _input: &FakeInput, page: Vec<Value>) -> QueryResult<Vec<Item>> {
        page.into_iter().map(|value| to_item(scope, value)).collect()
    }

    fn is_not_found(&self, err: &anyhow::Error) -> bool {
        err.to_string().contains("404")
    }

    async fn tags(&self, _scope: &Scope, _item: &Item) -> Option<anyhow::Result<BTreeMap<String, String>>> {
        if let Some(delay) = self.tag_delay {
            let running = self.tags_running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_tags.fetch_max(running, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            self.tags_running.fetch_sub(1, Ordering::SeqCst);
        }
        if self.fail_tags {
            Some(Err(anyhow::anyhow!("API request failed: 403 Forbidden")))
        } else {
            Some(Ok(BTreeMap::from([("team".to_string(), "net".to_string())])))
        }
    }
}

fn config() -> AdapterConfig {
    AdapterConfig::new("fake-vpc", vec![Scope::parse(SCOPE).unwrap()])
}

fn describe(provider: FakeProvider) -> Arc<DescribeAdapter<FakeProvider>> {
    Arc::new(DescribeAdapter::new(provider, config(), Cache::new()))
}

/// DescribeAdapter against the paged fake provider
mod describe_adapter {
    use super::*;

    /// Test Get returns the item in the requested scope with source metadata
    #[tokio::test]
    async fn test_get_preserves_scope() {
        let provider = FakeProvider::new(vec![vec![vpc("rg-1")]]);
        let calls = provider.calls();
        let adapter = describe(provider);

        let item = adapter.get(SCOPE, "rg-1", false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(item.scope, SCOPE);
        assert_eq!(item.unique_attribute_value().as_deref(), Some("rg-1"));
        assert_eq!(item.metadata.as_ref().unwrap().source_name, "fake-vpc-adapter");
    }

    /// Test a repeated Get hits the cache unless ignore_cache is set
    #[tokio::test]
    async fn test_second_get_is_served_from_cache() {
        let provider = FakeProvider::new(vec![vec![vpc("rg-1")]]);
        let calls = provider.calls();
        let adapter = describe(provider);

        adapter.get(SCOPE, "rg-1", false).await.unwrap();
        let again = adapter.get(SCOPE, "rg-1", false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(again.unique_attribute_value().as_deref(), Some("rg-1"));

        adapter.get(SCOPE, "rg-1", true).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Test List follows page tokens to the end
    #[tokio::test]
    async fn test_list_walks_every_page() {
        let provider = FakeProvider::new(vec![
            vec![vpc("a"), vpc("b"), vpc("c")],
            vec![vpc("d"), vpc("e")],
        ]);
        let calls = provider.calls();
        let adapter = describe(provider);

        let items = adapter.list(SCOPE, false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        let names: Vec<String> = items.iter().filter_map(|i| i.unique_attribute_value()).collect();
        assert_eq!(names, vec!["a", "b", "c", "d", "e"]);
    }

    /// Test items from a List answer later Gets without a call
    #[tokio::test]
    async fn test_list_seeds_gets() {
        let provider = FakeProvider::new(vec![vec![vpc("a"), vpc("b")]]);
        let calls = provider.calls();
        let adapter = describe(provider);

        adapter.list(SCOPE, false).await.unwrap();
        adapter.get(SCOPE, "b", false).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Test an item repeated on a later page keeps its first version
    #[tokio::test]
    async fn test_duplicates_across_pages_keep_first() {
        let mut later = vpc("a");
        later["network"] = json!("other");
        let provider = FakeProvider::new(vec![vec![vpc("a"), vpc("b")], vec![later, vpc("c")]]);
        let adapter = describe(provider);

        let items = adapter.list(SCOPE, false).await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].attributes.get_string("network").as_deref(), Some("net-a"));
    }

    /// Empty scope lists as an empty result
    #[tokio::test]
    async fn test_empty_list_is_not_an_error() {
        let adapter = describe(FakeProvider::new(vec![]));
        assert!(adapter.list(SCOPE, false).await.unwrap().is_empty());
    }

    /// Test mapped edges carry their query and propagation
    #[tokio::test]
    async fn test_edge_direction() {
        let adapter = describe(FakeProvider::new(vec![vec![vpc("rg-1")]]));
        let item = adapter.get(SCOPE, "rg-1", false).await.unwrap();

        assert_eq!(item.linked_item_queries.len(), 1);
        let link = &item.linked_item_queries[0];
        assert_eq!(link.query.item_type, "fake-network");
        assert_eq!(link.query.method, QueryMethod::Get);
        assert_eq!(link.query.query, "net-rg-1");
        assert!(link.blast_propagation.in_);
        assert!(!link.blast_propagation.out);
    }

    /// Test an unserved scope fails with NOSCOPE before any call
    #[tokio::test]
    async fn test_unserved_scope_makes_no_call() {
        let provider = FakeProvider::new(vec![vec![vpc("rg-1")]]);
        let calls = provider.calls();
        let adapter = describe(provider);

        let err = adapter.get("222.eu-west-2", "rg-1", false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoScope);
        assert_eq!(err.scope.as_deref(), Some("222.eu-west-2"));
        assert_eq!(err.item_type.as_deref(), Some("fake-vpc"));

        assert_eq!(adapter.list("111.us-east-1", false).await.unwrap_err().kind, ErrorKind::NoScope);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Test NOTFOUND is reported and never cached
    #[tokio::test]
    async fn test_missing_item_is_not_found_and_not_cached() {
        let provider = FakeProvider::new(vec![vec![vpc("rg-1")]]);
        let calls = provider.calls();
        let adapter = describe(provider);

        for _ in 0..2 {
            let err = adapter.get(SCOPE, "missing", false).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::NotFound);
            assert_eq!(err.source_name.as_deref(), Some("fake-vpc-adapter"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Test concurrent Gets for one key make one upstream call
    #[tokio::test]
    async fn test_concurrent_gets_share_one_fetch() {
        let provider = FakeProvider::new(vec![vec![vpc("rg-1")]]).with_delay(Duration::from_millis(50));
        let calls = provider.calls();
        let adapter = describe(provider);

        let results = join_all((0..10).map(|_| adapter.get(SCOPE, "rg-1", false))).await;
        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Test concurrent waiters all see the one failure
    #[tokio::test]
    async fn test_concurrent_failures_share_one_error() {
        let provider = FakeProvider::new(vec![]).with_delay(Duration::from_millis(50));
        let calls = provider.calls();
        let adapter = describe(provider);

        let results = join_all((0..5).map(|_| adapter.get(SCOPE, "gone", false))).await;
        assert!(results
            .iter()
            .all(|r| r.as_ref().unwrap_err().kind == ErrorKind::NotFound));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Test one waiter going away leaves the shared fetch running
    #[tokio::test]
    async fn test_dropped_waiter_does_not_cancel_others() {
        let provider = FakeProvider::new(vec![vec![vpc("rg-1")]]).with_delay(Duration::from_millis(100));
        let calls = provider.calls();
        let adapter = describe(provider);

        let first = {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.get(SCOPE, "rg-1", false).await })
        };
        let second = {
            let adapter = adapter.clone();
            tokio::spawn(async move { adapter.get(SCOPE, "rg-1", false).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        first.abort();

        let item = second.await.unwrap().unwrap();
        assert_eq!(item.unique_attribute_value().as_deref(), Some("rg-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    /// Test the upstream call is dropped once every waiter has gone
    #[tokio::test]
    async fn test_fetch_is_cancelled_with_its_last_waiter() {
        let provider = FakeProvider::new(vec![vec![vpc("rg-1")]]).with_delay(Duration::from_millis(100));
        let calls = provider.calls();
        let completed = provider.completed();
        let cache = Cache::new();
        let adapter = Arc::new(DescribeAdapter::new(provider, config(), cache.clone()));

        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let adapter = adapter.clone();
                tokio::spawn(async move { adapter.get(SCOPE, "rg-1", false).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.in_flight_count(), 1);

        for waiter in &waiters {
            waiter.abort();
        }
        for waiter in waiters {
            assert!(waiter.await.unwrap_err().is_cancelled());
        }
        assert_eq!(cache.in_flight_count(), 0);

        // Outlive the provider delay: the abandoned call never finishes
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(completed.load(Ordering::SeqCst), 0);

        // A later Get starts over rather than joining the dead fetch
        let item = adapter.get(SCOPE, "rg-1", false).await.unwrap();
        assert_eq!(item.unique_attribute_value().as_deref(), Some("rg-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(completed.load(Ordering::SeqCst), 1);
    }

    /// Test a tag lookup failure is recorded on the item, not raised
    #[tokio::test]
    async fn test_tag_failure_becomes_sentinel() {
        let adapter = describe(FakeProvider::new(vec![vec![vpc("a"), vpc("b")]]).failing_tags());
        let items = adapter.list(SCOPE, false).await.unwrap();

        assert_eq!(items.len(), 2);
        for item in &items {
            assert_eq!(item.tags.len(), 1);
            let message = &item.tags[TAG_ERROR_KEY];
            assert!(message.starts_with("failed to get tags:"));
            assert!(message.contains("403"));
        }
    }

    /// Test tag lookups never exceed the configured parallelism
    #[tokio::test]
    async fn test_tag_lookups_are_bounded() {
        let names = ["a", "b", "c", "d", "e", "f", "g", "h"];
        let provider =
            FakeProvider::new(vec![names.iter().map(|n| vpc(n)).collect()]).with_tag_delay(Duration::from_millis(20));
        let peak = provider.peak_tags.clone();
        let adapter = DescribeAdapter::new(provider, config().with_max_parallel(3), Cache::new());

        let items = adapter.list(SCOPE, false).await.unwrap();
        assert_eq!(items.len(), names.len());
        assert!(items.iter().all(|i| i.tags.get("team").map(String::as_str) == Some("net")));
        assert_eq!(peak.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_tags_are_merged() {
        let adapter = describe(FakeProvider::new(vec![vec![vpc("a")]]));
        let item = adapter.get(SCOPE, "a", false).await.unwrap();
        assert_eq!(item.tags.get("team").map(String::as_str), Some("net"));
    }

    /// Test a disabled List errors without calling the provider
    #[tokio::test]
    async fn test_disabled_list() {
        let provider = FakeProvider::new(vec![vec![vpc("a")]]);
        let calls = provider.calls();
        let adapter = DescribeAdapter::new(provider, config().with_disable_list(true), Cache::new());

        let err = adapter.list(SCOPE, false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);
        assert!(err.message.contains("SEARCH"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!adapter.metadata().supported_methods.contains(&QueryMethod::List));
    }

    /// Test Get can be answered by filtering the cached scope listing
    #[tokio::test]
    async fn test_get_via_list() {
        let provider = FakeProvider::new(vec![vec![vpc("a")], vec![vpc("b")]]);
        let calls = provider.calls();
        let adapter = DescribeAdapter::new(provider, config().with_use_list_for_get(true), Cache::new());

        let item = adapter.get(SCOPE, "b", false).await.unwrap();
        assert_eq!(item.unique_attribute_value().as_deref(), Some("b"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let err = adapter.get(SCOPE, "zzz", false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        // The scope listing is cached, so the miss costs nothing upstream
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    /// Test a malformed key fails before listing instead of reporting not found
    #[tokio::test]
    async fn test_get_via_list_rejects_malformed_key() {
        let provider = FakeProvider::new(vec![vec![vpc("a")]]);
        let calls = provider.calls();
        let adapter = DescribeAdapter::new(provider, config().with_use_list_for_get(true), Cache::new());

        for malformed in ["", "a/b"] {
            let err = adapter.get(SCOPE, malformed, false).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::Other);
            assert!(err.message.contains("malformed"));
            assert_eq!(err.source_name.as_deref(), Some("fake-vpc-adapter"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    /// Search with no search call needs a resource name
    #[tokio::test]
    async fn test_search_without_resource_names_fails() {
        let adapter = describe(FakeProvider::new(vec![vec![vpc("a")]]));
        let err = adapter.search(SCOPE, "anything", false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);
    }

    /// Test a slow provider call is cut off by the fetch timeout
    #[tokio::test]
    async fn test_fetch_timeout() {
        let provider = FakeProvider::new(vec![vec![vpc("a")]]).with_delay(Duration::from_millis(500));
        let adapter = DescribeAdapter::new(
            provider,
            config().with_fetch_timeout(Some(Duration::from_millis(20))),
            Cache::new(),
        );

        let err = adapter.get(SCOPE, "a", false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Other);
        assert!(err.message.contains("timed out"));
    }
}

/// Enumeration yields ids only; each resource needs its own get
struct FakeInventory {
    ids: Vec<Vec<String>>,
    existing: Vec<String>,
    gets: Arc<AtomicUsize>,
}

impl FakeInventory {
    fn new(ids: Vec<Vec<&str>>, existing: Vec<&str>) -> Self {
        Self {
            ids: ids
                .into_iter()
                .map(|page| page.into_iter().map(str::to_string).collect())
                .collect(),
            existing: existing.into_iter().map(str::to_string).collect(),
            gets: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl AlwaysGetMapper for FakeInventory {
    type ListInput = ();
    type ListOutput = Vec<String>;
    type GetInput = String;
    type GetOutput = Value;

    fn input_get(&self, _scope: &Scope, query: &str) -> QueryResult<String> {
        Ok(query.to_string())
    }

    fn input_list(&self, _scope: &Scope) -> QueryResult<()> {
        Ok(())
    }

    fn paginate_list(&self, _input: ()) -> BoxPaginator<Vec<String>> {
        let pages = Arc::new(self.ids.clone());
        Box::new(TokenPaginator::new(move |token: Option<String>| {
            let pages = pages.clone();
            async move {
                let index = token.as_deref().map(str::parse::<usize>).transpose()?.unwrap_or(0);
                let next = (index + 1 < pages.len()).then(|| (index + 1).to_string());
                Ok((pages.get(index).cloned().unwrap_or_default(), next))
            }
            .boxed()
        }))
    }

    fn list_to_get_inputs(&self, _scope: &Scope, page: Vec<String>) -> QueryResult<Vec<String>> {
        Ok(page)
    }

    async fn get(&self, input: String) -> anyhow::Result<Value> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if !self.existing.contains(&input) {
            anyhow::bail!("API request failed: 404 Not Found");
        }
        Ok(json!({ "name": input, "sizeGb": 10 }))
    }

    fn output(&self, scope: &Scope, _input: &String, output: Value) -> QueryResult<Option<Item>> {
        Ok(Some(Item::new(
            "fake-bucket",
            "name",
            Attributes::from_value(output, &[])?,
            scope.to_string(),
        )))
    }

    fn is_not_found(&self, err: &anyhow::Error) -> bool {
        err.to_string().contains("404")
    }
}

mod always_get_adapter {
    use super::*;

    fn adapter(inventory: FakeInventory) -> AlwaysGetAdapter<FakeInventory> {
        let config = AdapterConfig::new("fake-bucket", vec![Scope::global("111")]).with_max_parallel(2);
        AlwaysGetAdapter::new(inventory, config, Cache::new())
    }

    /// Test per-id gets come back in enumeration order
    #[tokio::test]
    async fn test_list_fans_out_in_enumeration_order() {
        let inventory = FakeInventory::new(vec![vec!["a", "b"], vec!["c"]], vec!["a", "b", "c"]);
        let gets = inventory.gets.clone();
        let adapter = adapter(inventory);

        let items = adapter.list("111.global", false).await.unwrap();
        let names: Vec<String> = items.iter().filter_map(|i| i.unique_attribute_value()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(gets.load(Ordering::SeqCst), 3);
    }

    /// Test an id deleted before its get is skipped
    #[tokio::test]
    async fn test_resource_deleted_after_enumeration_is_skipped() {
        let inventory = FakeInventory::new(vec![vec!["a", "gone", "c"]], vec!["a", "c"]);
        let adapter = adapter(inventory);

        let items = adapter.list("111.global", false).await.unwrap();
        assert_eq!(items.len(), 2);
    }

    /// Test a missing id is NOTFOUND
    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let adapter = adapter(FakeInventory::new(vec![], vec!["a"]));
        let err = adapter.get("111.global", "gone", false).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
        tokio_test::assert_ok!(adapter.get("111.global", "a", false).await);
    }

    /// Test listed items answer later Gets from the cache
    #[tokio::test]
    async fn test_listed_items_seed_gets() {
        let inventory = FakeInventory::new(vec![vec!["a", "b"]], vec!["a", "b"]);
        let gets = inventory.gets.clone();
        let adapter = adapter(inventory);

        adapter.list("111.global", false).await.unwrap();
        adapter.get("111.global", "b", false).await.unwrap();
        assert_eq!(gets.load(Ordering::SeqCst), 2);
    }
}

/// Query routing by item type
mod host {
    use super::*;

    fn host() -> AdapterHost {
        let adapter: Arc<dyn Adapter> = describe(FakeProvider::new(vec![vec![vpc("a")]]));
        let mut host = AdapterHost::new();
        host.add_adapters(vec![adapter]).unwrap();
        host
    }

    /// Test queries reach the adapter registered for their type
    #[tokio::test]
    async fn test_routes_by_type() {
        let items = host().execute(&Query::list("fake-vpc", SCOPE), false).await.unwrap();
        assert_eq!(items.len(), 1);

        let items = host()
            .execute(&Query::get("fake-vpc", "a", SCOPE), false)
            .await
            .unwrap();
        assert_eq!(items[0].item_type, "fake-vpc");
    }

    /// Test an unregistered type is NOSCOPE
    #[tokio::test]
    async fn test_unknown_type_is_no_scope() {
        let err = host()
            .execute(&Query::list("fake-subnet", SCOPE), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoScope);
        assert_eq!(err.item_type.as_deref(), Some("fake-subnet"));
    }

    /// Two adapters cannot serve one type
    #[test]
    fn test_duplicate_registration_is_rejected() {
        let mut host = host();
        let again: Arc<dyn Adapter> = describe(FakeProvider::new(vec![]));
        assert!(host.add_adapters(vec![again]).is_err());
    }
}
