//! Web App Catalog - URL to display-ready app record
//!
//! Submit a URL; get back a complete catalog record. The page is fetched once
//! under a hard timeout, its `<meta>`/`<title>` tags are extracted with a
//! tolerant scanner, canonical fields are picked by ordered precedence lists,
//! and a normalizer fills every field, falling back to deterministic defaults
//! when anything upstream is missing.
//!
//! # Features
//!
//! - **Fetcher**: reqwest with timeout, byte budget and content-type gate
//! - **Tag Extraction**: regex-based, tolerant of broken markup
//! - **Field Resolution**: precedence lists as data
//! - **Normalization**: total; never fails on a valid URL
//! - **Catalog**: storage contract, in-memory store, allowlist, HTTP API
//!
//! # Architecture
//!
//! ```text
//! URL ──▶ UrlValidator ──▶ PageFetcher ──▶ TagExtractor ──▶ FieldResolver
//!              │                │                                │
//!              ▼                ▼ (failure: defaults)            ▼
//!         InputError      ResolvedFields::unavailable ──▶ RecordNormalizer ──▶ WebApp
//!                                                          ▲
//!                                        Enricher (optional)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use webapp_catalog::{AppAnalyzer, CatalogConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let analyzer = AppAnalyzer::from_config(&CatalogConfig::from_env()?)?;
//!     let app = analyzer.analyze("https://example.com").await?;
//!     println!("{} ({})", app.name, app.category);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod catalog;
pub mod config;
pub mod cors;
pub mod enrich;
pub mod error;
pub mod extraction;
pub mod fetch;
pub mod handlers;
pub mod metrics;

// Re-exports for convenience
pub use catalog::{AppAnalyzer, Catalog, MemoryStore, WebApp};
pub use config::CatalogConfig;
pub use error::{Error, Result};
pub use extraction::{FieldResolver, TagExtractor};
pub use fetch::{PageFetcher, UrlValidator};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
