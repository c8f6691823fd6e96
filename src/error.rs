//! Error types for the web app catalog
//!
//! One `thiserror` enum per concern, folded into [`Error`]. Only
//! [`InputError`], [`PersistenceError`] and access denials ever reach a user;
//! fetch and enrichment failures are recovered inside the pipeline and show up
//! only in logs and metrics.

use crate::catalog::WebApp;
use thiserror::Error;

/// The main error type for catalog operations
#[derive(Error, Debug)]
pub enum Error {
    /// Submitted URL was rejected before the pipeline started
    #[error("Input error: {0}")]
    Input(#[from] InputError),

    /// Page retrieval failed
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Storage collaborator call failed
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Optional text-generation call failed
    #[error("Enrichment error: {0}")]
    Enrichment(#[from] EnrichmentError),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A record was built but the store refused it; the record still stands
    #[error("Record {} was not saved: {source}", .app.id)]
    Unsaved {
        /// The in-memory record
        app: Box<WebApp>,
        /// Why the store refused it
        source: PersistenceError,
    },

    /// Identity is not allowed to use the catalog
    #[error("Access denied: {0}")]
    AccessDenied(String),

}

/// Rejections of user-submitted URLs
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    /// Nothing was submitted
    #[error("URL cannot be empty")]
    Empty,

    /// Not an absolute URL
    #[error("Invalid URL: {0}")]
    Invalid(String),

    /// Parsed, but not http/https
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Longer than the accepted maximum
    #[error("URL exceeds maximum length of {0} characters")]
    TooLong(usize),
}

/// Page retrieval failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Hard timeout expired
    #[error("Fetch timed out after {0}ms")]
    Timeout(u64),

    /// DNS, connect, TLS or body read failure
    #[error("Network error: {0}")]
    Network(String),

    /// Non-2xx response
    #[error("HTTP error {status}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
    },

    /// Response was not an HTML document
    #[error("Not an HTML document (content-type: {content_type})")]
    NotHtml {
        /// Content-Type header value
        content_type: String,
    },

    /// HTTP client could not be built
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl FetchError {
    /// Short label used for metrics breakdowns
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Network(_) => "network",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::NotHtml { .. } => "not_html",
            FetchError::Client(_) => "client",
        }
    }

    /// Whether the remote server answered at all
    pub fn server_responded(&self) -> bool {
        matches!(self, FetchError::HttpStatus { .. } | FetchError::NotHtml { .. })
    }
}

/// Storage collaborator failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// Store could not be reached
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// No record with this id
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Store refused the write
    #[error("Write rejected: {0}")]
    Rejected(String),
}

/// Text-generation enrichment failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentError {
    /// No API key configured
    #[error("Enrichment is not configured")]
    NotConfigured,

    /// Call exceeded its budget
    #[error("Enrichment timed out after {0}ms")]
    Timeout(u64),

    /// Transport or HTTP failure
    #[error("Enrichment request failed: {0}")]
    Request(String),

    /// Response could not be interpreted
    #[error("Enrichment response unusable: {0}")]
    BadResponse(String),
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable or flag had an unusable value
    #[error("Invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        /// Variable or flag name
        key: String,
        /// Offending value
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// Policy tables file could not be read or parsed
    #[error("Policy file error: {0}")]
    PolicyFile(String),
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether this error is meant to be shown to the person who submitted the request
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Error::Input(_) | Error::Persistence(_) | Error::Unsaved { .. } | Error::AccessDenied(_)
        )
    }
}
