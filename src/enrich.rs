//! Optional text-generation enrichment
//!
//! When a page yields no description, the pipeline may ask an [`Enricher`]
//! for a substitute. Enrichment never blocks a record: every failure is an
//! [`EnrichmentError`] that the caller logs and drops.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, instrument};
use url::Url;

use crate::config::CatalogConfig;
use crate::error::EnrichmentError;
use crate::extraction::ResolvedFields;

/// Generative-language REST endpoint
pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for descriptions
pub const GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Substitute values offered by an enricher
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Enrichment {
    /// Substitute description
    pub description: Option<String>,
    /// Substitute icon, used only when no favicon applies
    #[serde(rename = "iconUrl", alias = "icon_url")]
    pub icon_url: Option<String>,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Suggested category; informational only
    pub category: Option<String>,
}

impl Enrichment {
    /// Whether there is nothing usable in this enrichment
    pub fn is_empty(&self) -> bool {
        let blank = |v: &Option<String>| v.as_deref().map_or(true, |s| s.trim().is_empty());
        blank(&self.description) && blank(&self.icon_url)
    }
}

/// Anything that can suggest a description for a page
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Suggest values for `url`, given what the page already yielded
    async fn enrich(&self, url: &Url, fields: &ResolvedFields)
        -> Result<Enrichment, EnrichmentError>;
}

/// Gemini-backed [`Enricher`]
#[derive(Debug, Clone)]
pub struct GeminiEnricher {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
    timeout: Duration,
}

impl GeminiEnricher {
    /// Create an enricher for the default endpoint and model
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, EnrichmentError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(EnrichmentError::NotConfigured);
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EnrichmentError::Request(e.to_string()))?;

        Ok(Self {
            client,
            api_key,
            endpoint: GEMINI_ENDPOINT.to_string(),
            model: GEMINI_MODEL.to_string(),
            timeout,
        })
    }

    /// Build from configuration; `Ok(None)` when no key is configured
    pub fn from_config(config: &CatalogConfig) -> Result<Option<Self>, EnrichmentError> {
        match config.gemini_api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {
                Self::new(key, config.enrich_timeout()).map(Some)
            }
            _ => Ok(None),
        }
    }

    /// Point at a different API base (e.g. a local stand-in)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim_end_matches('/').to_string();
        self
    }

    /// Use a different model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn request_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent?key={}",
            self.endpoint, self.model, self.api_key
        )
    }
}

#[async_trait]
impl Enricher for GeminiEnricher {
    #[instrument(skip(self, url, fields), fields(url = %url, model = %self.model))]
    async fn enrich(
        &self,
        url: &Url,
        fields: &ResolvedFields,
    ) -> Result<Enrichment, EnrichmentError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": build_prompt(url, fields) }] }]
        });

        let response = self
            .client
            .post(self.request_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EnrichmentError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    EnrichmentError::Request(e.without_url().to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::Request(format!("HTTP {}", status.as_u16())));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| EnrichmentError::BadResponse(e.without_url().to_string()))?;

        let text = response_text(&payload)
            .ok_or_else(|| EnrichmentError::BadResponse("no candidate text".to_string()))?;
        let enrichment = parse_model_text(text)?;

        debug!(
            has_description = enrichment.description.is_some(),
            tags = enrichment.tags.len(),
            "Enrichment received"
        );
        Ok(enrichment)
    }
}

/// Prompt asking the model for a JSON description of the page
pub fn build_prompt(url: &Url, fields: &ResolvedFields) -> String {
    let mut prompt = format!(
        "You are a web app analyzer. Provide a brief description of what the web application at {url} does.\n"
    );
    if !fields.title.trim().is_empty() {
        prompt.push_str(&format!("Its page title is \"{}\".\n", fields.title.trim()));
    }
    prompt.push_str(
        "\nReturn your response as a JSON object with this exact structure:\n\
         {\n  \"description\": \"A concise 1-2 sentence description of what the app does\",\n  \
         \"tags\": [\"tag1\", \"tag2\", \"tag3\"],\n  \
         \"category\": \"One of: Productivity, Social, Entertainment, Education, Business, Utility, Other\"\n}\n\n\
         Only respond with valid JSON, no additional text.",
    );
    prompt
}

/// First candidate's first text part
pub fn response_text(payload: &Value) -> Option<&str> {
    payload
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?
        .iter()
        .find_map(|part| part.get("text").and_then(Value::as_str))
}

fn json_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("json block pattern"))
}

/// Pull the outermost `{...}` block out of model text and parse it
pub fn parse_model_text(text: &str) -> Result<Enrichment, EnrichmentError> {
    let block = json_block_re()
        .find(text)
        .ok_or_else(|| EnrichmentError::BadResponse("no JSON object in response".to_string()))?;

    let mut enrichment: Enrichment = serde_json::from_str(block.as_str())
        .map_err(|e| EnrichmentError::BadResponse(e.to_string()))?;

    enrichment.description = enrichment
        .description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty());
    Ok(enrichment)
}
