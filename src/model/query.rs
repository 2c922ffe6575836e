//! Queries and graph edges
//!
//! A [`LinkedItemQuery`] is an edge that has not been resolved: it describes
//! how to fetch the related item(s) and which way a change propagates. The
//! consuming graph engine decides whether and when to run it.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueryMethod {
    Get,
    List,
    Search,
}

impl fmt::Display for QueryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryMethod::Get => "GET",
            QueryMethod::List => "LIST",
            QueryMethod::Search => "SEARCH",
        };
        f.write_str(s)
    }
}

/// A request for items of one type in one scope
#[derive(Debug, Clone, Serialize)]
pub struct Query {
    #[serde(rename = "type")]
    pub item_type: String,
    pub method: QueryMethod,
    /// Key for GET, adapter-specific text for SEARCH, empty for LIST
    pub query: String,
    pub scope: String,
    pub uuid: Uuid,
}

impl Query {
    pub fn new(
        item_type: impl Into<String>,
        method: QueryMethod,
        query: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            item_type: item_type.into(),
            method,
            query: query.into(),
            scope: scope.into(),
            uuid: Uuid::new_v4(),
        }
    }

    pub fn get(item_type: impl Into<String>, query: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(item_type, QueryMethod::Get, query, scope)
    }

    pub fn list(item_type: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(item_type, QueryMethod::List, "", scope)
    }

    pub fn search(item_type: impl Into<String>, query: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::new(item_type, QueryMethod::Search, query, scope)
    }

    /// Same type, method, query and scope; the UUID is ignored
    pub fn same_request(&self, other: &Query) -> bool {
        self.item_type == other.item_type
            && self.method == other.method
            && self.query == other.query
            && self.scope == other.scope
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {:?} in {}", self.method, self.item_type, self.query, self.scope)
    }
}

/// Directional impact flags of an edge
///
/// `in_` - a change to the target of the query can affect this item.
/// `out` - a change to this item can affect the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct BlastPropagation {
    #[serde(rename = "in")]
    pub in_: bool,
    pub out: bool,
}

impl BlastPropagation {
    pub const fn new(in_: bool, out: bool) -> Self {
        Self { in_, out }
    }

    /// Tightly coupled: changes flow both ways
    pub const fn both() -> Self {
        Self::new(true, true)
    }

    /// This item depends on the target
    pub const fn inbound() -> Self {
        Self::new(true, false)
    }

    /// The target depends on this item
    pub const fn outbound() -> Self {
        Self::new(false, true)
    }

    /// Informational link only
    pub const fn none() -> Self {
        Self::new(false, false)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkedItemQuery {
    pub query: Query,
    pub blast_propagation: BlastPropagation,
}

impl LinkedItemQuery {
    pub fn new(query: Query, blast_propagation: BlastPropagation) -> Self {
        Self {
            query,
            blast_propagation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_request_ignores_uuid() {
        let a = Query::get("gcp-compute-network", "default", "p.global");
        let b = Query::get("gcp-compute-network", "default", "p.global");
        assert_ne!(a.uuid, b.uuid);
        assert!(a.same_request(&b));
        assert!(!a.same_request(&Query::search("gcp-compute-network", "default", "p.global")));
    }

    #[test]
    fn test_blast_propagation_serializes_in() {
        let json = serde_json::to_value(BlastPropagation::inbound()).unwrap();
        assert_eq!(json, serde_json::json!({"in": true, "out": false}));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(QueryMethod::Search.to_string(), "SEARCH");
        let q = Query::list("gcp-storage-bucket", "p.global");
        assert_eq!(q.to_string(), "LIST gcp-storage-bucket \"\" in p.global");
    }
}
