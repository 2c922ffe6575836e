//! Resource discovery for Google Cloud
//!
//! Every supported resource family is exposed through the same
//! Get/List/Search surface, backed by a shared single-flight cache, and
//! every returned [`Item`](model::Item) declares its relationships as
//! unresolved [`LinkedItemQuery`](model::LinkedItemQuery) edges.

pub mod adapter;
pub mod config;
pub mod gcp;
pub mod model;
pub mod resource;
