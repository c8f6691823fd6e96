//! URL validation
//!
//! Submitted URLs are validated before the pipeline starts. A rejected URL is
//! an [`InputError`] and never reaches the fetcher.

use crate::error::InputError;
use url::Url;

/// Maximum accepted URL length (common browser limit)
pub const MAX_URL_LENGTH: usize = 2048;

/// URL validation utilities
pub struct UrlValidator;

impl UrlValidator {
    /// Validate a submitted URL and return it parsed
    ///
    /// Surrounding whitespace is ignored. The URL must be absolute, use
    /// `http` or `https`, and carry a host.
    pub fn validate(raw: &str) -> Result<Url, InputError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(InputError::Empty);
        }

        if trimmed.len() > MAX_URL_LENGTH {
            return Err(InputError::TooLong(MAX_URL_LENGTH));
        }

        let url = Url::parse(trimmed).map_err(|e| InputError::Invalid(format!("{trimmed}: {e}")))?;

        match url.scheme() {
            "http" | "https" => {}
            other => return Err(InputError::UnsupportedScheme(other.to_string())),
        }

        if url.host_str().map_or(true, str::is_empty) {
            return Err(InputError::Invalid(format!("{trimmed}: missing host")));
        }

        Ok(url)
    }

    /// Host of a URL, including a non-default port, as shown to people
    ///
    /// Mirrors the browser notion of `URL.host`: `example.com`,
    /// `localhost:8080`.
    pub fn display_host(url: &Url) -> Option<String> {
        let host = url.host_str().filter(|h| !h.is_empty())?;
        Some(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        })
    }
}
