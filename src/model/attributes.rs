//! Attribute codec
//!
//! Converts an arbitrary provider response into the ordered, nested attribute
//! bag stored on an [`Item`](super::Item). Pure and stateless.
//!
//! Conversion rules:
//! - top-level fields named in the exclude list are dropped (tags are carried
//!   separately on the item)
//! - `null` values are dropped at every depth
//! - top-level identifier-like keys are normalized to camelCase; nested keys
//!   (labels, metadata items) are user data and kept verbatim
//! - a key whose camelCase form is already taken keeps its original spelling
//! - field order of the source is preserved

use super::error::{QueryError, QueryResult};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    /// Serialize any provider type into attributes
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T, exclude: &[&str]) -> QueryResult<Self> {
        let value = serde_json::to_value(value)
            .map_err(|e| QueryError::other(format!("failed to convert response to attributes: {}", e)))?;
        Self::from_value(value, exclude)
    }

    /// Build attributes from an already-decoded JSON object
    pub fn from_value(value: Value, exclude: &[&str]) -> QueryResult<Self> {
        let Value::Object(map) = value else {
            return Err(QueryError::other(format!(
                "failed to convert response to attributes: expected an object, got {}",
                json_type_name(&value)
            )));
        };

        let originals: HashSet<String> = map.keys().cloned().collect();
        let mut out = Map::new();
        for (key, value) in map {
            if exclude.contains(&key.as_str()) {
                continue;
            }
            let Some(value) = normalize(value) else {
                continue;
            };
            let cased = to_camel_case(&key);
            let key = if cased != key && (originals.contains(&cased) || out.contains_key(&cased)) {
                key
            } else {
                cased
            };
            out.insert(key, value);
        }

        Ok(Self(out))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }

    /// Look up a value by dot path; numeric segments index into arrays
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let first = parts.next()?;
        let mut current = self.0.get(first)?;

        for part in parts {
            current = match part.parse::<usize>() {
                Ok(idx) => current.get(idx)?,
                Err(_) => current.get(part)?,
            };
        }

        Some(current)
    }

    /// Look up a scalar by dot path and render it as a string
    pub fn get_string(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Collect every string found at a dot path, walking through arrays
    ///
    /// `networkInterfaces.subnetwork` yields the subnetwork of each interface.
    pub fn find_strings(&self, path: &str) -> Vec<String> {
        let mut found = Vec::new();
        let parts: Vec<&str> = path.split('.').collect();
        let Some((first, rest)) = parts.split_first() else {
            return found;
        };
        if let Some(value) = self.0.get(*first) {
            collect_strings(value, rest, &mut found);
        }
        found
    }
}

fn collect_strings(value: &Value, rest: &[&str], found: &mut Vec<String>) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_strings(item, rest, found);
            }
        },
        Value::String(s) if rest.is_empty() => found.push(s.clone()),
        Value::Object(map) => {
            if let Some((next, rest)) = rest.split_first() {
                if let Some(child) = map.get(*next) {
                    collect_strings(child, rest, found);
                }
            }
        },
        _ => {},
    }
}

fn normalize(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        Value::Object(map) => {
            let map = map.into_iter().filter_map(|(k, v)| normalize(v).map(|v| (k, v))).collect();
            Some(Value::Object(map))
        },
        Value::Array(items) => Some(Value::Array(items.into_iter().filter_map(normalize).collect())),
        other => Some(other),
    }
}

/// Normalize identifier-like keys to camelCase
///
/// Keys containing anything other than ASCII alphanumerics and underscores
/// (label keys, URLs, zone names) are user data and are left untouched.
pub fn to_camel_case(key: &str) -> String {
    if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return key.to_string();
    }

    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = !out.is_empty();
            continue;
        }
        if out.is_empty() {
            out.push(c.to_ascii_lowercase());
        } else if upper_next {
            out.push(c.to_ascii_uppercase());
        } else {
            out.push(c);
        }
        upper_next = false;
    }

    if out.is_empty() {
        key.to_string()
    } else {
        out
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
