//! Relationship graph data model
//!
//! The types every mapper populates and every adapter returns:
//!
//! - [`item`] - [`Item`], its [`Health`] and [`Metadata`]
//! - [`query`] - [`Query`], [`LinkedItemQuery`] and [`BlastPropagation`] edges
//! - [`scope`] - the `{account}.{region}` locality key
//! - [`attributes`] - the attribute codec turning provider responses into [`Attributes`]
//! - [`error`] - the closed query error taxonomy

pub mod attributes;
pub mod error;
pub mod item;
pub mod query;
pub mod scope;

pub use attributes::Attributes;
pub use error::{ErrorKind, QueryError, QueryResult};
pub use item::{tags_error, Health, Item, ItemKey, Metadata, TAG_ERROR_KEY};
pub use query::{BlastPropagation, LinkedItemQuery, Query, QueryMethod};
pub use scope::{region_from_zone, Scope, GLOBAL_REGION};
