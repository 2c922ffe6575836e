//! GCP API interaction module
//!
//! This module provides the core functionality for reading Google Cloud
//! Platform control-plane APIs: authentication, the HTTP client and the
//! parsing of resource references.
//!
//! # Module Structure
//!
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client for making API requests
//! - [`http`] - HTTP utilities for REST API calls
//! - [`links`] - Self-link parsing into scopes and Get queries
//!
//! # Example
//!
//! ```ignore
//! use gcp_discovery::gcp::client::GcpClient;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let client = GcpClient::new().await?;
//!     let url = client.compute_zonal_url("my-project", "us-central1-a", "instances");
//!     let instances = client.get(&url, &[]).await?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod client;
pub mod http;
pub mod links;
