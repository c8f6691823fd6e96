//! The web app catalog
//!
//! - [`record`]: the [`WebApp`] record and timestamp normalization
//! - [`normalize`]: resolved fields to a complete record
//! - [`pipeline`]: URL in, record out
//! - [`store`]: storage contract, in-memory store, optimistic view
//! - [`access`]: identities and the allowlist
//! - [`service`]: all of the above for an identified caller

pub mod access;
pub mod normalize;
pub mod pipeline;
pub mod record;
pub mod service;
pub mod store;

pub use access::{AccessPolicy, Identity};
pub use normalize::{CategoryRule, CategoryTable, RecordNormalizer};
pub use pipeline::{Analysis, AppAnalyzer, PipelineStage};
pub use record::{normalize_timestamp, NewWebApp, RawTimestamp, TimestampSource, WebApp};
pub use service::Catalog;
pub use store::{AppStore, CatalogView, MemoryStore, StoredRef};
