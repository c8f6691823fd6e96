//! Page fetching
//!
//! URL validation happens here too, so nothing reaches the network without
//! passing [`UrlValidator`] first.

pub mod client;
pub mod validate;

pub use client::{is_html_content_type, FetchOptions, PageFetcher, PageSource, RawPage};
pub use validate::UrlValidator;
