//! Resource Fetcher
//!
//! Executes requests built from resource definitions against the GCP APIs:
//! page iteration, aggregated-list flattening and item post-processing.

use crate::adapter::{BoxPaginator, SinglePage, TokenPaginator};
use crate::gcp::client::GcpClient;
use crate::gcp::links::{location_key, looks_like_location, looks_like_zone, region_of_location, short_name};
use anyhow::Context;
use futures::FutureExt;
use serde_json::Value;

/// Provider request for one resource family
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GcpRequest {
    /// One resource by URL
    Get { url: String, params: Vec<(String, String)> },
    /// A collection, page by page
    List {
        url: String,
        params: Vec<(String, String)>,
        /// Compute `aggregated/` response keyed by location
        aggregated: bool,
        /// Keep only items located in this region
        region: Option<String>,
    },
}

impl GcpRequest {
    pub fn url(&self) -> &str {
        match self {
            GcpRequest::Get { url, .. } | GcpRequest::List { url, .. } => url,
        }
    }

    pub fn region_filter(&self) -> Option<&str> {
        match self {
            GcpRequest::List { region, .. } => region.as_deref(),
            GcpRequest::Get { .. } => None,
        }
    }
}

/// Pages of raw resources for a request
///
/// A Get yields a single page holding the one resource; a List follows
/// `nextPageToken` until the API stops returning one.
pub fn paginate(client: GcpClient, request: GcpRequest, response_path: &'static str) -> BoxPaginator<Vec<Value>> {
    match request {
        GcpRequest::Get { url, params } => Box::new(SinglePage::new(
            async move {
                let resource = client
                    .get(&url, &params)
                    .await
                    .with_context(|| format!("GET {}", url))?;
                Ok(vec![resource])
            }
            .boxed(),
        )),
        GcpRequest::List {
            url,
            params,
            aggregated,
            ..
        } => Box::new(TokenPaginator::new(move |token: Option<String>| {
            let client = client.clone();
            let url = url.clone();
            let mut params = params.clone();
            async move {
                if let Some(token) = token {
                    params.push(("pageToken".to_string(), token));
                }
                let response = client
                    .get(&url, &params)
                    .await
                    .with_context(|| format!("GET {}", url))?;

                let next_token = response
                    .get("nextPageToken")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string());

                let response = if aggregated {
                    flatten_aggregated_response(response)
                } else {
                    response
                };

                Ok((extract_items(&response, response_path), next_token))
            }
            .boxed()
        })),
    }
}

/// Extract items from response using the response_path
pub fn extract_items(response: &Value, path: &str) -> Vec<Value> {
    if path.is_empty() {
        return response.as_array().cloned().unwrap_or_default();
    }

    let mut current = response;
    for part in path.split('.') {
        current = match current.get(part) {
            Some(v) => v,
            None => return vec![],
        };
    }

    current.as_array().cloned().unwrap_or_default()
}

/// Flatten an aggregated API response into a standard list response.
/// Aggregated responses have format: { "items": { "zones/us-central1-a": { "instances": [...] }, ... } }
/// We flatten to: { "items": [...all instances...] }
pub fn flatten_aggregated_response(response: Value) -> Value {
    let Some(items) = response.get("items").and_then(|v| v.as_object()) else {
        return serde_json::json!({ "items": [] });
    };

    let mut all_items: Vec<Value> = Vec::new();

    for (location_key, location_data) in items {
        let Some(obj) = location_data.as_object() else {
            continue;
        };
        for (key, value) in obj {
            // Locations without resources carry only a warning
            if key == "warning" {
                continue;
            }
            if let Some(arr) = value.as_array() {
                tracing::trace!("{}: {} {}", location_key, arr.len(), key);
                all_items.extend(arr.iter().cloned());
            }
        }
    }

    serde_json::json!({ "items": all_items })
}

/// Post-process an item to add computed/derived fields
pub fn post_process_item(mut item: Value) -> Value {
    if let Value::Object(ref mut map) = item {
        let mut computed: Vec<(&str, String)> = Vec::new();

        // Extract short names from full URLs
        for (field, short_field) in [
            ("zone", "zone_short"),
            ("region", "region_short"),
            ("machineType", "machineType_short"),
            ("network", "network_short"),
        ] {
            if let Some(url) = map.get(field).and_then(|v| v.as_str()) {
                computed.push((short_field, short_name(url).to_string()));
            }
        }

        // Zonal resources are addressed by zone and name together
        if let (Some(zone), Some(name)) = (
            map.get("zone").and_then(|v| v.as_str()).map(short_name),
            map.get("name").and_then(|v| v.as_str()),
        ) {
            if looks_like_zone(zone) {
                computed.push(("zonal_name", location_key(zone, name)));
            }
        }

        // GKE resources are addressed by location (region or zone) and name
        if let (Some(location), Some(name)) = (
            map.get("location").and_then(|v| v.as_str()),
            map.get("name").and_then(|v| v.as_str()),
        ) {
            if looks_like_location(location) {
                computed.push(("location_name", location_key(location, name)));
            }
        }

        for (key, value) in computed {
            map.insert(key.to_string(), Value::String(value));
        }
    }

    item
}

/// Region a raw resource lives in, from its GKE location, zone or region
pub fn item_region(item: &Value) -> Option<String> {
    for field in ["location", "zone"] {
        if let Some(location) = item.get(field).and_then(|v| v.as_str()) {
            return Some(region_of_location(short_name(location)));
        }
    }
    let region = item.get("region").and_then(|v| v.as_str())?;
    Some(short_name(region).to_string())
}
