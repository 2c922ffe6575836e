//! Scope - the two-part locality key partitioning the resource namespace
//!
//! Formatted as `{account}.{region}`. For GCP the account is the project ID
//! and the region is a region name or `global`. Adapters treat scopes as
//! opaque routing keys; only mappers that rebuild a related item's scope from
//! a resource link look inside.

use super::error::QueryError;
use std::fmt;
use std::str::FromStr;

/// Region segment used for resources that are not bound to a region
pub const GLOBAL_REGION: &str = "global";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Scope {
    pub account: String,
    pub region: String,
}

impl Scope {
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            region: region.into(),
        }
    }

    pub fn global(account: impl Into<String>) -> Self {
        Self::new(account, GLOBAL_REGION)
    }

    pub fn is_global(&self) -> bool {
        self.region == GLOBAL_REGION
    }

    /// Parse a scope string, failing with an `OTHER` query error
    pub fn parse(s: &str) -> Result<Self, QueryError> {
        s.parse()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.account, self.region)
    }
}

impl FromStr for Scope {
    type Err = QueryError;

    // Split on the last dot: domain-scoped project IDs ("example.com:proj")
    // contain dots, region names never do.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((account, region)) = s.rsplit_once('.') else {
            return Err(QueryError::other(format!(
                "malformed scope {:?}: expected {{account}}.{{region}}",
                s
            )));
        };

        if account.is_empty() || region.is_empty() {
            return Err(QueryError::other(format!(
                "malformed scope {:?}: empty segment",
                s
            )));
        }

        Ok(Self::new(account, region))
    }
}

/// Derive the region from a zone name ("us-central1-a" -> "us-central1")
pub fn region_from_zone(zone: &str) -> String {
    match zone.rsplit_once('-') {
        Some((region, _)) if !region.is_empty() => region.to_string(),
        _ => zone.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_and_parse() {
        let scope = Scope::new("111", "eu-west-2");
        assert_eq!(scope.to_string(), "111.eu-west-2");
        assert_eq!(Scope::parse("111.eu-west-2").unwrap(), scope);
    }

    #[test]
    fn test_domain_scoped_project() {
        let scope = Scope::parse("example.com:my-project.us-central1").unwrap();
        assert_eq!(scope.account, "example.com:my-project");
        assert_eq!(scope.region, "us-central1");
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(Scope::parse("no-dot").is_err());
        assert!(Scope::parse(".region").is_err());
        assert!(Scope::parse("account.").is_err());
    }

    #[test]
    fn test_global() {
        let scope = Scope::global("my-project");
        assert!(scope.is_global());
        assert_eq!(scope.to_string(), "my-project.global");
    }

    #[test]
    fn test_region_from_zone() {
        assert_eq!(region_from_zone("us-central1-a"), "us-central1");
        assert_eq!(region_from_zone("europe-west2-c"), "europe-west2");
        assert_eq!(region_from_zone("global"), "global");
    }
}
