//! Request Dispatch
//!
//! Maps a resource definition plus a scope and query onto the concrete REST
//! request of its service, and fetches Resource Manager tag bindings.

use super::fetcher::GcpRequest;
use super::registry::{LocationKind, ResourceDef};
use crate::adapter::{collect_pages, TokenPaginator};
use crate::gcp::client::GcpClient;
use crate::gcp::links::{looks_like_location, region_of_location, split_location_key};
use crate::model::{region_from_zone, Item, QueryError, QueryResult, Scope};
use anyhow::Context;
use futures::FutureExt;
use serde_json::Value;
use std::collections::BTreeMap;

/// Request for one resource of `def` in `scope`
pub fn get_request(client: &GcpClient, def: &ResourceDef, scope: &Scope, query: &str) -> QueryResult<GcpRequest> {
    let params = to_params(&def.get_params);
    let project = scope.account.as_str();

    let url = match (def.service.as_str(), def.location) {
        ("compute", LocationKind::Zonal) => {
            let Some((zone, name)) = split_location_key(query) else {
                return Err(QueryError::other(format!(
                    "malformed query {:?}: expected {{zone}}/{{name}}",
                    query
                )));
            };
            if region_from_zone(zone) != scope.region {
                return Err(QueryError::other(format!(
                    "zone {} is not in region {}",
                    zone, scope.region
                )));
            }
            client.compute_zonal_url(project, zone, &format!("{}/{}", def.collection, name))
        },
        ("compute", LocationKind::Regional) => {
            let name = plain_name(query)?;
            client.compute_regional_url(project, &scope.region, &format!("{}/{}", def.collection, name))
        },
        ("compute", LocationKind::Global) => {
            let name = plain_name(query)?;
            client.compute_global_url(project, &format!("{}/{}", def.collection, name))
        },
        ("storage", _) => client.storage_bucket_url(plain_name(query)?),
        ("container", _) => {
            let (location, name) = located_name(query)?;
            if region_of_location(location) != scope.region {
                return Err(QueryError::other(format!(
                    "location {} is not in region {}",
                    location, scope.region
                )));
            }
            client.container_location_url(project, location, &format!("{}/{}", def.collection, name))
        },
        (service, _) => {
            return Err(QueryError::other(format!(
                "{} resources of service {} have no get call",
                def.collection, service
            )))
        },
    };

    Ok(GcpRequest::Get { url, params })
}

/// Request enumerating `def` in `scope`
pub fn list_request(client: &GcpClient, def: &ResourceDef, scope: &Scope) -> QueryResult<GcpRequest> {
    let mut params = to_params(&def.list_params);
    let project = scope.account.as_str();

    let (url, aggregated, region) = match (def.service.as_str(), def.location) {
        // Zones are served per region; one aggregated call covers them all
        ("compute", LocationKind::Zonal) => (
            client.compute_aggregated_url(project, &def.collection),
            true,
            Some(scope.region.clone()),
        ),
        ("compute", LocationKind::Regional) => (
            client.compute_regional_url(project, &scope.region, &def.collection),
            false,
            None,
        ),
        ("compute", LocationKind::Global) => (client.compute_global_url(project, &def.collection), false, None),
        ("storage", _) => {
            params.push(("project".to_string(), project.to_string()));
            (client.storage_url(&def.collection), false, None)
        },
        // GKE lists every location at once
        ("container", _) => (
            client.container_location_url(project, "-", &def.collection),
            false,
            (def.location != LocationKind::Global).then(|| scope.region.clone()),
        ),
        (service, _) => return Err(QueryError::other(format!("unknown service: {}", service))),
    };

    Ok(GcpRequest::List {
        url,
        params,
        aggregated,
        region,
    })
}

/// Tag bindings attached to a Compute Engine item, as `key -> value`
pub async fn fetch_tag_bindings(client: &GcpClient, item: &Item) -> anyhow::Result<BTreeMap<String, String>> {
    let parent = tag_binding_parent(item)
        .with_context(|| format!("cannot address {} for tag bindings", item.globally_unique_name()))?;
    let url = client.resource_manager_url("tagBindings");

    let client = client.clone();
    let mut paginator = TokenPaginator::new(move |token: Option<String>| {
        let client = client.clone();
        let url = url.clone();
        let mut params = vec![("parent".to_string(), parent.clone())];
        async move {
            if let Some(token) = token {
                params.push(("pageToken".to_string(), token));
            }
            let response = client.get(&url, &params).await?;
            let next_token = response
                .get("nextPageToken")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Ok((response, next_token))
        }
        .boxed()
    });

    let mut tags = BTreeMap::new();
    for page in collect_pages(&mut paginator).await? {
        let bindings = page.get("tagBindings").and_then(Value::as_array);
        for binding in bindings.into_iter().flatten() {
            let Some(namespaced) = binding.get("tagValueNamespacedName").and_then(Value::as_str) else {
                continue;
            };
            // {parent}/{key}/{value}
            let mut parts = namespaced.rsplitn(3, '/');
            if let (Some(value), Some(key)) = (parts.next(), parts.next()) {
                tags.insert(key.to_string(), value.to_string());
            }
        }
    }

    Ok(tags)
}

/// Full resource name of a Compute Engine resource, numeric id in place of its name
fn tag_binding_parent(item: &Item) -> Option<String> {
    let self_link = item.attributes.get_string("selfLink")?;
    let id = item.attributes.get_string("id")?;
    let (_, path) = self_link.split_once("/compute/v1/")?;
    let (collection_path, _) = path.rsplit_once('/')?;
    Some(format!("//compute.googleapis.com/{}/{}", collection_path, id))
}

fn located_name(query: &str) -> QueryResult<(&str, &str)> {
    match split_location_key(query) {
        Some((location, name)) if looks_like_location(location) => Ok((location, name)),
        _ => Err(QueryError::other(format!(
            "malformed query {:?}: expected {{location}}/{{name}}",
            query
        ))),
    }
}

fn plain_name(query: &str) -> QueryResult<&str> {
    if query.is_empty() || query.contains('/') {
        return Err(QueryError::other(format!(
            "malformed query {:?}: expected a resource name",
            query
        )));
    }
    Ok(query)
}

fn to_params(params: &BTreeMap<String, String>) -> Vec<(String, String)> {
    params.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}
