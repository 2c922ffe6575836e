//! Resource abstraction layer
//!
//! This module provides a data-driven approach to GCP resource families.
//! Resource definitions are loaded from JSON files at compile time, allowing
//! new resource types to be added without code changes.
//!
//! # Architecture
//!
//! - [`registry`] - Loads and caches resource definitions from embedded JSON
//! - [`dispatch`] - Builds the REST request of a definition's service for a scope and query
//! - [`fetcher`] - Pages requests through the GCP client and post-processes raw resources
//! - [`mapper`] - [`GcpMapper`], the definition-driven input and output mapper
//! - [`adapters`] - Builds one adapter per definition
//!
//! # Resource Definitions
//!
//! Resources are defined in JSON files under `src/resources/`:
//! - `common.json` - Health maps shared by the families
//! - `compute.json` - Compute Engine resources (VMs, disks, networks, load balancing)
//! - `storage.json` - Cloud Storage buckets
//! - `container.json` - GKE clusters
//!
//! # Example
//!
//! ```ignore
//! use gcp_discovery::adapter::{AdapterHost, Cache};
//! use gcp_discovery::resource::{build_adapters, DiscoverySettings};
//!
//! async fn list_vms(client: &GcpClient) -> anyhow::Result<()> {
//!     let settings = DiscoverySettings::new("my-project", vec!["us-central1".into()]);
//!     let mut host = AdapterHost::new();
//!     host.add_adapters(build_adapters(client, &settings, &Cache::new()))?;
//!     let vms = host.execute(&Query::list("gcp-compute-instance", "my-project.us-central1"), false).await?;
//!     Ok(())
//! }
//! ```

pub mod adapters;
pub mod dispatch;
pub mod fetcher;
pub mod mapper;
pub mod registry;

pub use adapters::{adapter_config, build_adapters, DiscoverySettings};
pub use fetcher::GcpRequest;
pub use mapper::GcpMapper;
pub use registry::{get_all_resource_keys, get_resource, ResourceDef};
