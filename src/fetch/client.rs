//! HTTP page fetcher
//!
//! One outbound GET per call, bounded by a hard timeout and a body byte
//! budget. Every failure is a [`FetchError`]; callers recover from all of them.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::config::CatalogConfig;
use crate::error::FetchError;

/// `Accept` hint sent with every fetch
pub const ACCEPT_HTML: &str = "text/html, application/xhtml+xml";

/// A fetched HTML document
#[derive(Debug, Clone)]
pub struct RawPage {
    /// Final URL after redirects
    pub url: Url,
    /// HTTP status code
    pub status: u16,
    /// Content-Type header value
    pub content_type: String,
    /// Body decoded as UTF-8 (lossy)
    pub body: String,
    /// Whether reading stopped at the byte budget
    pub truncated: bool,
    /// Fetch duration in milliseconds
    pub duration_ms: u64,
}

/// Anything that can retrieve a page for the pipeline
#[async_trait]
pub trait PageSource: Send + Sync {
    /// Retrieve `url` as an HTML document
    async fn fetch(&self, url: &Url) -> Result<RawPage, FetchError>;
}

/// Options for the HTTP fetcher
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Hard timeout covering connect, headers and body
    pub timeout: Duration,
    /// Bytes read before the body is cut off
    pub max_body_bytes: usize,
    /// Client identifier
    pub user_agent: String,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::from_config(&CatalogConfig::default())
    }
}

impl FetchOptions {
    /// Build fetch options from the catalog configuration
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            timeout: config.fetch_timeout(),
            max_body_bytes: config.max_body_bytes,
            user_agent: config.user_agent.clone(),
        }
    }
}

/// reqwest-backed [`PageSource`]
#[derive(Debug, Clone)]
pub struct PageFetcher {
    client: Client,
    options: FetchOptions,
}

impl PageFetcher {
    /// Create a fetcher with the given options
    pub fn new(options: FetchOptions) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));

        let client = Client::builder()
            .timeout(options.timeout)
            .user_agent(options.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        Ok(Self { client, options })
    }

    /// Fetch options in use
    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    async fn fetch_inner(&self, url: &Url, start: Instant) -> Result<RawPage, FetchError> {
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();

        if !is_html_content_type(&content_type) {
            return Err(FetchError::NotHtml { content_type });
        }

        let final_url = response.url().clone();
        let budget = self.options.max_body_bytes;
        let mut bytes: Vec<u8> = Vec::with_capacity(budget.min(64 * 1024));
        let mut truncated = false;

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| self.map_reqwest_error(e))?
        {
            let room = budget - bytes.len();
            if chunk.len() > room {
                bytes.extend_from_slice(&chunk[..room]);
                truncated = true;
                break;
            }
            bytes.extend_from_slice(&chunk);
            if bytes.len() == budget {
                // Budget filled exactly; any further data means the body was cut
                truncated = match response.chunk().await {
                    Ok(Some(next)) => !next.is_empty(),
                    Ok(None) => false,
                    Err(_) => true,
                };
                break;
            }
        }

        if truncated {
            debug!("Body cut off at {} bytes", budget);
        }

        Ok(RawPage {
            url: final_url,
            status: status.as_u16(),
            content_type,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            truncated,
            duration_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn map_reqwest_error(&self, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout(self.options.timeout.as_millis() as u64)
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl PageSource for PageFetcher {
    #[instrument(skip(self, url), fields(url = %url))]
    async fn fetch(&self, url: &Url) -> Result<RawPage, FetchError> {
        info!("Fetching page");
        let start = Instant::now();

        // The client timeout covers each request; this one also bounds the body loop.
        let result = match tokio::time::timeout(self.options.timeout, self.fetch_inner(url, start))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout(self.options.timeout.as_millis() as u64)),
        };

        match &result {
            Ok(page) => debug!(
                status = page.status,
                bytes = page.body.len(),
                duration_ms = page.duration_ms,
                "Fetched page"
            ),
            Err(e) => warn!(kind = e.kind(), "Fetch failed: {}", e),
        }
        result
    }
}

/// Whether a Content-Type value announces an HTML document
pub fn is_html_content_type(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    mime == "text/html" || mime == "application/xhtml+xml"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_html_content_types() {
        assert!(is_html_content_type("text/html"));
        assert!(is_html_content_type("text/html; charset=utf-8"));
        assert!(is_html_content_type("TEXT/HTML;charset=UTF-8"));
        assert!(is_html_content_type("application/xhtml+xml"));
    }

    #[test]
    fn test_non_html_content_types() {
        assert!(!is_html_content_type(""));
        assert!(!is_html_content_type("application/json"));
        assert!(!is_html_content_type("image/png"));
        assert!(!is_html_content_type("text/plain; charset=utf-8"));
    }

    #[test]
    fn test_fetch_options_default() {
        let opts = FetchOptions::default();
        assert_eq!(opts.timeout, Duration::from_millis(5000));
        assert_eq!(opts.max_body_bytes, 1024 * 1024);
        assert!(opts.user_agent.contains("WebAppCatalog"));
    }

    #[test]
    fn test_fetcher_builds() {
        let fetcher = PageFetcher::new(FetchOptions::default()).unwrap();
        assert_eq!(fetcher.options().timeout, Duration::from_millis(5000));
    }
}
