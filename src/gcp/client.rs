//! GCP Client
//!
//! Authenticated access to the control-plane REST APIs, combining
//! credentials, the HTTP wrapper and URL construction per service.

use super::auth::GcpCredentials;
use super::http::{api_error, GcpHttpClient};
use anyhow::{Context, Result};
use reqwest::StatusCode;
use serde_json::Value;

/// Base URLs of the APIs the resource families read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub compute: String,
    pub storage: String,
    pub container: String,
    pub resource_manager: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
            storage: "https://storage.googleapis.com/storage/v1".to_string(),
            container: "https://container.googleapis.com/v1".to_string(),
            resource_manager: "https://cloudresourcemanager.googleapis.com/v3".to_string(),
        }
    }
}

impl Endpoints {
    /// All services behind one host, as with a local emulator or mock server
    pub fn with_base(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            compute: format!("{}/compute/v1", base),
            storage: format!("{}/storage/v1", base),
            container: format!("{}/v1", base),
            resource_manager: format!("{}/v3", base),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    credentials: GcpCredentials,
    http: GcpHttpClient,
    endpoints: Endpoints,
}

impl GcpClient {
    /// Create a client authenticated with Application Default Credentials
    pub async fn new() -> Result<Self> {
        let credentials = GcpCredentials::new()
            .await
            .context("Failed to initialize GCP credentials")?;

        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            endpoints: Endpoints::default(),
        })
    }

    /// Create a client presenting a fixed token to the given endpoints
    pub fn with_static_token(token: &str, endpoints: Endpoints) -> Result<Self> {
        Ok(Self {
            credentials: GcpCredentials::from_static_token(token),
            http: GcpHttpClient::new()?,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Make a GET request to a GCP API
    ///
    /// A 401 is retried once with a freshly minted token.
    pub async fn get(&self, url: &str, query: &[(String, String)]) -> Result<Value> {
        let token = self.credentials.get_token().await?;
        match self.http.get(url, &token, query).await {
            Err(err) if api_error(&err).is_some_and(|e| e.status == StatusCode::UNAUTHORIZED) => {
                tracing::debug!("Token rejected for {}, refreshing", url);
                let token = self.credentials.refresh_token().await?;
                self.http.get(url, &token, query).await
            },
            result => result,
        }
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    pub fn compute_url(&self, project: &str, path: &str) -> String {
        format!("{}/projects/{}/{}", self.endpoints.compute, project, path)
    }

    pub fn compute_global_url(&self, project: &str, resource: &str) -> String {
        self.compute_url(project, &format!("global/{}", resource))
    }

    pub fn compute_regional_url(&self, project: &str, region: &str, resource: &str) -> String {
        self.compute_url(project, &format!("regions/{}/{}", region, resource))
    }

    pub fn compute_zonal_url(&self, project: &str, zone: &str, resource: &str) -> String {
        self.compute_url(project, &format!("zones/{}/{}", zone, resource))
    }

    /// Build aggregated Compute Engine API URL (all zones)
    pub fn compute_aggregated_url(&self, project: &str, resource: &str) -> String {
        self.compute_url(project, &format!("aggregated/{}", resource))
    }

    // =========================================================================
    // Cloud Storage API helpers
    // =========================================================================

    pub fn storage_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.storage, path)
    }

    pub fn storage_bucket_url(&self, bucket: &str) -> String {
        self.storage_url(&format!("b/{}", urlencoding::encode(bucket)))
    }

    // =========================================================================
    // GKE API helpers
    // =========================================================================

    pub fn container_url(&self, project: &str, path: &str) -> String {
        format!("{}/projects/{}/{}", self.endpoints.container, project, path)
    }

    /// Build GKE location URL; `-` addresses every location
    pub fn container_location_url(&self, project: &str, location: &str, resource: &str) -> String {
        self.container_url(project, &format!("locations/{}/{}", location, resource))
    }

    // =========================================================================
    // Resource Manager API helpers
    // =========================================================================

    pub fn resource_manager_url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.resource_manager, path)
    }
}
