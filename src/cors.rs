//! CORS policy for the HTTP API
//!
//! Browser callers are allowed from loopback origins only (`localhost`,
//! `127.0.0.1`, `[::1]`, any port). Other deployments are expected to sit
//! behind the same identity-aware proxy that supplies the identity headers.

use std::time::Duration;

use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::Method;
use tower_http::cors::{AllowOrigin, CorsLayer};
use url::{Host, Url};

use crate::handlers::apps::{CLAIMS_HEADER, EMAIL_HEADER, NAME_HEADER};

/// Methods used by the API
pub const ALLOWED_METHODS: [Method; 4] = [Method::GET, Method::POST, Method::DELETE, Method::OPTIONS];

/// Preflight cache lifetime
pub const DEFAULT_MAX_AGE_SECS: u64 = 3600;

/// Request headers a browser may send
pub fn allowed_headers() -> [HeaderName; 5] {
    [
        CONTENT_TYPE,
        AUTHORIZATION,
        HeaderName::from_static(EMAIL_HEADER),
        HeaderName::from_static(NAME_HEADER),
        HeaderName::from_static(CLAIMS_HEADER),
    ]
}

/// Loopback-only CORS layer
pub fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(|origin, _| is_localhost_origin(origin)))
        .allow_methods(ALLOWED_METHODS)
        .allow_headers(allowed_headers())
        .max_age(Duration::from_secs(DEFAULT_MAX_AGE_SECS))
}

/// Whether an `Origin` header names a loopback host over http(s)
///
/// ```rust
/// use http::header::HeaderValue;
/// use webapp_catalog::cors::is_localhost_origin;
///
/// assert!(is_localhost_origin(&HeaderValue::from_static("http://localhost:5173")));
/// assert!(!is_localhost_origin(&HeaderValue::from_static("http://localhost.evil.com")));
/// ```
pub fn is_localhost_origin(origin: &HeaderValue) -> bool {
    let Ok(raw) = origin.to_str() else {
        return false;
    };
    let Ok(url) = Url::parse(raw) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
