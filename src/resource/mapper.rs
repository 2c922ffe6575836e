//! Definition-driven mapper
//!
//! One [`GcpMapper`] serves any resource family described in the registry:
//! it builds requests through [`dispatch`](super::dispatch), pages them
//! through the [`fetcher`](super::fetcher) and turns raw resources into items
//! with tags, health and linked item queries.

use super::dispatch;
use super::fetcher::{item_region, paginate, post_process_item, GcpRequest};
use super::registry::{get_health_for_value, get_resource, LinkMethod, ResourceDef};
use crate::adapter::{AlwaysGetMapper, BoxPaginator, DescribeMapper};
use crate::gcp::client::GcpClient;
use crate::gcp::http;
use crate::gcp::links::{KeyStyle, ResourceLink};
use crate::model::{Attributes, BlastPropagation, Item, LinkedItemQuery, Query, QueryResult, Scope};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;

pub struct GcpMapper {
    item_type: String,
    def: &'static ResourceDef,
    client: GcpClient,
}

impl GcpMapper {
    pub fn new(item_type: &str, client: GcpClient) -> Option<Self> {
        Some(Self {
            item_type: item_type.to_string(),
            def: get_resource(item_type)?,
            client,
        })
    }

    /// Map one raw resource into an item in `scope`
    pub fn build_item(&self, scope: &Scope, raw: Value) -> QueryResult<Item> {
        let raw = post_process_item(raw);

        let tags = self
            .def
            .tag_field
            .as_deref()
            .and_then(|field| raw.get(field))
            .map(string_map)
            .unwrap_or_default();

        let health = match (&self.def.health_field, &self.def.health_map) {
            (Some(field), Some(map)) => raw
                .get(field.as_str())
                .and_then(Value::as_str)
                .and_then(|status| get_health_for_value(map, status)),
            _ => None,
        };

        let mut exclude: Vec<&str> = self.def.exclude_fields.iter().map(String::as_str).collect();
        exclude.extend(self.def.tag_field.as_deref());

        let attributes = Attributes::from_value(raw, &exclude)?;
        let mut item = Item::new(&self.item_type, &self.def.unique_attribute, attributes, scope.to_string());
        item.tags = tags;
        item.health = health;

        for rule in &self.def.links {
            for reference in item.attributes.find_strings(&rule.path) {
                let Some(link) = ResourceLink::parse(&reference) else {
                    tracing::debug!(
                        "{}: {:?} at {} is not a resource reference",
                        self.item_type,
                        reference,
                        rule.path
                    );
                    continue;
                };

                let target_scope = link.scope().to_string();
                let query = match rule.method {
                    LinkMethod::Get => {
                        let style = get_resource(&rule.item_type).map_or(KeyStyle::Name, ResourceDef::key_style);
                        Query::get(&rule.item_type, link.get_query(style), target_scope)
                    },
                    LinkMethod::Search => Query::search(&rule.item_type, reference.as_str(), target_scope),
                };
                item.add_linked_query(LinkedItemQuery::new(query, BlastPropagation::new(rule.in_, rule.out)));
            }
        }

        Ok(item)
    }

    fn map_page(&self, scope: &Scope, input: &GcpRequest, page: Vec<Value>) -> QueryResult<Vec<Item>> {
        let region = input.region_filter();
        page.into_iter()
            .filter(|raw| region.is_none() || item_region(raw).as_deref() == region)
            .map(|raw| self.build_item(scope, raw))
            .collect()
    }

    fn resource_name(&self, name: &str) -> Option<(Scope, String)> {
        if self.def.service == "storage" {
            // Buckets are project-less: https://www.googleapis.com/storage/v1/b/{bucket}
            return None;
        }
        let link = ResourceLink::parse(name)?;
        if link.collection != self.def.collection {
            return None;
        }
        Some((link.scope(), link.get_query(self.def.key_style())))
    }

    async fn tag_bindings(&self, item: &Item) -> Option<anyhow::Result<BTreeMap<String, String>>> {
        if !self.def.tag_bindings {
            return None;
        }
        Some(dispatch::fetch_tag_bindings(&self.client, item).await)
    }
}

fn string_map(value: &Value) -> BTreeMap<String, String> {
    value
        .as_object()
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl DescribeMapper for GcpMapper {
    type Input = GcpRequest;
    type Output = Vec<Value>;

    fn input_get(&self, scope: &Scope, query: &str) -> QueryResult<GcpRequest> {
        dispatch::get_request(&self.client, self.def, scope, query)
    }

    fn input_list(&self, scope: &Scope) -> QueryResult<GcpRequest> {
        dispatch::list_request(&self.client, self.def, scope)
    }

    fn paginate(&self, input: GcpRequest) -> BoxPaginator<Vec<Value>> {
        let def: &'static ResourceDef = self.def;
        paginate(self.client.clone(), input, def.response_path.as_str())
    }

    fn output(&self, scope: &Scope, input: &GcpRequest, page: Vec<Value>) -> QueryResult<Vec<Item>> {
        self.map_page(scope, input, page)
    }

    fn is_not_found(&self, err: &anyhow::Error) -> bool {
        http::is_not_found(err)
    }

    async fn tags(&self, _scope: &Scope, item: &Item) -> Option<anyhow::Result<BTreeMap<String, String>>> {
        self.tag_bindings(item).await
    }

    fn parse_resource_name(&self, name: &str) -> Option<(Scope, String)> {
        self.resource_name(name)
    }
}

#[async_trait]
impl AlwaysGetMapper for GcpMapper {
    type ListInput = GcpRequest;
    type ListOutput = Vec<Value>;
    type GetInput = GcpRequest;
    type GetOutput = Value;

    fn input_get(&self, scope: &Scope, query: &str) -> QueryResult<GcpRequest> {
        dispatch::get_request(&self.client, self.def, scope, query)
    }

    fn input_list(&self, scope: &Scope) -> QueryResult<GcpRequest> {
        dispatch::list_request(&self.client, self.def, scope)
    }

    fn paginate_list(&self, input: GcpRequest) -> BoxPaginator<Vec<Value>> {
        let def: &'static ResourceDef = self.def;
        paginate(self.client.clone(), input, def.response_path.as_str())
    }

    fn list_to_get_inputs(&self, scope: &Scope, page: Vec<Value>) -> QueryResult<Vec<GcpRequest>> {
        page.iter()
            .filter_map(|summary| match summary.get("name").and_then(Value::as_str) {
                Some(name) => Some(dispatch::get_request(&self.client, self.def, scope, name)),
                None => {
                    tracing::warn!("{}: skipping listed resource without a name", self.item_type);
                    None
                },
            })
            .collect()
    }

    async fn get(&self, input: GcpRequest) -> anyhow::Result<Value> {
        match input {
            GcpRequest::Get { url, params } => self.client.get(&url, &params).await,
            GcpRequest::List { url, .. } => Err(anyhow::anyhow!("expected a get request, got a list of {}", url)),
        }
    }

    fn output(&self, scope: &Scope, _input: &GcpRequest, output: Value) -> QueryResult<Option<Item>> {
        self.build_item(scope, output).map(Some)
    }

    fn is_not_found(&self, err: &anyhow::Error) -> bool {
        http::is_not_found(err)
    }

    async fn tags(&self, _scope: &Scope, item: &Item) -> Option<anyhow::Result<BTreeMap<String, String>>> {
        self.tag_bindings(item).await
    }

    fn parse_resource_name(&self, name: &str) -> Option<(Scope, String)> {
        self.resource_name(name)
    }
}
