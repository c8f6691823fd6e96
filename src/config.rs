//! Runtime configuration
//!
//! All settings come from environment variables (see [`CatalogConfig::from_env`])
//! and can be overridden by CLI flags. The field-precedence and category tables
//! are data, loaded from an optional JSON policy file; their defaults are the
//! reference policy.
//!
//! ```rust,no_run
//! use webapp_catalog::config::CatalogConfig;
//!
//! let config = CatalogConfig::from_env().expect("config error");
//! println!("fetch timeout: {:?}", config.fetch_timeout());
//! ```

use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::normalize::CategoryTable;
use crate::error::ConfigError;
use crate::extraction::PrecedenceTable;

/// Default fetch budget (milliseconds)
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;

/// Accepted fetch budget range (milliseconds)
pub const FETCH_TIMEOUT_RANGE_MS: std::ops::RangeInclusive<u64> = 1_000..=30_000;

/// Default number of whitespace-collapsed characters fed to the tag extractor
pub const DEFAULT_SNAPSHOT_LIMIT: usize = 8_000;

/// Largest accepted snapshot limit
pub const MAX_SNAPSHOT_LIMIT: usize = 1_000_000;

/// Default byte budget for a response body
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default enrichment budget (milliseconds)
pub const DEFAULT_ENRICH_TIMEOUT_MS: u64 = 8_000;

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 3000;

/// Precedence and category tables, overridable as one JSON document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTables {
    /// Tag keys tried per canonical field
    #[serde(default)]
    pub precedence: PrecedenceTable,
    /// Keyword rules for category inference
    #[serde(default)]
    pub categories: CategoryTable,
}

impl PolicyTables {
    /// Load tables from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::PolicyFile(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&raw)
            .map_err(|e| ConfigError::PolicyFile(format!("{}: {}", path.display(), e)))
    }
}

/// Complete catalog configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Hard timeout for one page fetch
    pub fetch_timeout_ms: u64,
    /// Characters of normalized markup considered by the tag extractor
    pub snapshot_limit: usize,
    /// Bytes read from a response body before reading stops
    pub max_body_bytes: usize,
    /// Descriptive client identifier sent with every fetch
    pub user_agent: String,
    /// Lower-cased email allowlist; empty means every authenticated email
    pub allowed_emails: Vec<String>,
    /// Custom claim that grants access when set to `true`
    pub access_claim: Option<String>,
    /// Budget for the optional enrichment call
    pub enrich_timeout_ms: u64,
    /// Text-generation API key; enrichment is off without it
    pub gemini_api_key: Option<String>,
    /// Bind 0.0.0.0 instead of localhost
    pub bind_all: bool,
    /// HTTP port
    pub port: u16,
    /// Precedence and category tables
    pub policy: PolicyTables,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            snapshot_limit: DEFAULT_SNAPSHOT_LIMIT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: default_user_agent(),
            allowed_emails: Vec::new(),
            access_claim: None,
            enrich_timeout_ms: DEFAULT_ENRICH_TIMEOUT_MS,
            gemini_api_key: None,
            bind_all: false,
            port: DEFAULT_PORT,
            policy: PolicyTables::default(),
        }
    }
}

/// `WebAppCatalog/<version> (+metadata fetcher)`
pub fn default_user_agent() -> String {
    format!("WebAppCatalog/{} (+metadata fetcher)", crate::VERSION)
}

impl CatalogConfig {
    /// Load configuration from environment variables
    ///
    /// # Environment Variables
    ///
    /// - `CATALOG_FETCH_TIMEOUT_MS` (default 5000, 1000..=30000)
    /// - `CATALOG_SNAPSHOT_LIMIT` (default 8000)
    /// - `CATALOG_MAX_BODY_BYTES` (default 1 MiB)
    /// - `CATALOG_USER_AGENT`
    /// - `CATALOG_ALLOWED_EMAILS`: comma-separated allowlist
    /// - `CATALOG_ACCESS_CLAIM`: claim name granting access
    /// - `CATALOG_POLICY_FILE`: JSON precedence/category tables
    /// - `CATALOG_ENRICH_TIMEOUT_MS` (default 8000)
    /// - `GEMINI_API_KEY`: enables enrichment
    /// - `CATALOG_BIND_ALL`: "true" binds 0.0.0.0
    /// - `PORT` (default 3000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let fetch_timeout_ms = match get("CATALOG_FETCH_TIMEOUT_MS") {
            Some(v) => parse_number("CATALOG_FETCH_TIMEOUT_MS", &v)?,
            None => defaults.fetch_timeout_ms,
        };
        let snapshot_limit = match get("CATALOG_SNAPSHOT_LIMIT") {
            Some(v) => parse_number("CATALOG_SNAPSHOT_LIMIT", &v)?,
            None => defaults.snapshot_limit,
        };
        let max_body_bytes = match get("CATALOG_MAX_BODY_BYTES") {
            Some(v) => parse_number("CATALOG_MAX_BODY_BYTES", &v)?,
            None => defaults.max_body_bytes,
        };
        let enrich_timeout_ms = match get("CATALOG_ENRICH_TIMEOUT_MS") {
            Some(v) => parse_number("CATALOG_ENRICH_TIMEOUT_MS", &v)?,
            None => defaults.enrich_timeout_ms,
        };
        let port = match get("PORT") {
            Some(v) => parse_number("PORT", &v)?,
            None => defaults.port,
        };

        let policy = match get("CATALOG_POLICY_FILE") {
            Some(path) => {
                info!("Loading policy tables from {}", path);
                PolicyTables::from_file(&path)?
            }
            None => PolicyTables::default(),
        };

        let config = Self {
            fetch_timeout_ms,
            snapshot_limit,
            max_body_bytes,
            user_agent: get("CATALOG_USER_AGENT").unwrap_or(defaults.user_agent),
            allowed_emails: get("CATALOG_ALLOWED_EMAILS")
                .map(|raw| parse_email_list(&raw))
                .unwrap_or_default(),
            access_claim: get("CATALOG_ACCESS_CLAIM"),
            enrich_timeout_ms,
            gemini_api_key: get("GEMINI_API_KEY"),
            bind_all: get("CATALOG_BIND_ALL")
                .map(|v| v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            port,
            policy,
        };
        config.validate()?;

        if config.allowed_emails.is_empty() {
            warn!("CATALOG_ALLOWED_EMAILS is empty: every authenticated email may use the catalog");
        }
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !FETCH_TIMEOUT_RANGE_MS.contains(&self.fetch_timeout_ms) {
            return Err(ConfigError::InvalidValue {
                key: "CATALOG_FETCH_TIMEOUT_MS".to_string(),
                value: self.fetch_timeout_ms.to_string(),
                reason: format!(
                    "must be within {}..={}",
                    FETCH_TIMEOUT_RANGE_MS.start(),
                    FETCH_TIMEOUT_RANGE_MS.end()
                ),
            });
        }
        if self.snapshot_limit == 0 || self.snapshot_limit > MAX_SNAPSHOT_LIMIT {
            return Err(ConfigError::InvalidValue {
                key: "CATALOG_SNAPSHOT_LIMIT".to_string(),
                value: self.snapshot_limit.to_string(),
                reason: format!("must be within 1..={MAX_SNAPSHOT_LIMIT}"),
            });
        }
        if self.max_body_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                key: "CATALOG_MAX_BODY_BYTES".to_string(),
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Fetch budget as a duration
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms)
    }

    /// Enrichment budget as a duration
    pub fn enrich_timeout(&self) -> Duration {
        Duration::from_millis(self.enrich_timeout_ms)
    }

    /// Address the HTTP server binds to
    pub fn bind_addr(&self) -> SocketAddr {
        let ip = if self.bind_all {
            IpAddr::V4(Ipv4Addr::UNSPECIFIED)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        };
        SocketAddr::new(ip, self.port)
    }
}

/// Split a comma-separated allowlist into trimmed, lower-cased entries
pub fn parse_email_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}
