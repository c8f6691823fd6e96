//! Record normalization
//!
//! Maps resolved fields (plus optional enrichment) into a complete
//! [`WebApp`]. Every field has a deterministic default, so this step cannot
//! fail. ID generation is the only source of randomness.

use serde::{Deserialize, Serialize};
use url::{form_urlencoded, Url};
use uuid::Uuid;

use crate::catalog::record::{now_millis, WebApp};
use crate::enrich::Enrichment;
use crate::extraction::{FieldSource, ResolvedFields};
use crate::fetch::UrlValidator;

/// Name used when neither a title nor a host is available
pub const DEFAULT_NAME: &str = "Web Application";

/// Tagline used when no description is available
pub const PENDING_TAGLINE: &str = "Web application";

/// Description used when no description is available
pub const PENDING_DESCRIPTION: &str = "Details are being prepared.";

/// Category used when no keyword rule matches
pub const DEFAULT_CATEGORY: &str = "General";

/// Maximum tagline length in characters
pub const TAGLINE_MAX_CHARS: usize = 90;

/// Favicon service, keyed by host
pub const FAVICON_SERVICE: &str = "https://www.google.com/s2/favicons";

/// Placeholder avatar service, keyed by name
pub const AVATAR_SERVICE: &str = "https://api.dicebear.com/7.x/shapes/svg";

/// One keyword rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category assigned on match
    pub category: String,
    /// Lower-case substrings, any of which matches
    pub keywords: Vec<String>,
}

impl CategoryRule {
    fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

/// Ordered keyword rules; the first matching rule wins
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryTable {
    /// Rules in priority order
    pub rules: Vec<CategoryRule>,
    /// Category when nothing matches
    pub fallback: String,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self {
            rules: vec![
                CategoryRule::new("Health", &["health", "wellness", "medic", "clinic", "fitness"]),
                CategoryRule::new("E-commerce", &["shop", "store", "commerce"]),
                CategoryRule::new("Developer Tools", &["dev", "api", "code"]),
                CategoryRule::new(
                    "Productivity",
                    &["project", "task", "todo", "productivity", "calendar"],
                ),
                CategoryRule::new("Social", &["social", "community", "chat", "message"]),
                CategoryRule::new("Finance", &["finance", "bank", "payment", "wallet"]),
            ],
            fallback: DEFAULT_CATEGORY.to_string(),
        }
    }
}

impl CategoryTable {
    /// Category for `text`, matched case-insensitively
    pub fn infer(&self, text: &str) -> &str {
        let text = text.to_lowercase();
        self.rules
            .iter()
            .find(|rule| {
                rule.keywords
                    .iter()
                    .filter(|k| !k.is_empty())
                    .any(|k| text.contains(&k.to_lowercase()))
            })
            .map(|rule| rule.category.as_str())
            .unwrap_or(&self.fallback)
    }
}

/// Builds [`WebApp`] records from resolved fields
#[derive(Debug, Clone, Default)]
pub struct RecordNormalizer {
    categories: CategoryTable,
}

impl RecordNormalizer {
    /// Create a normalizer with the given category table
    pub fn new(categories: CategoryTable) -> Self {
        Self { categories }
    }

    /// Category table in use
    pub fn categories(&self) -> &CategoryTable {
        &self.categories
    }

    /// Build a record with a fresh local id and the current time
    pub fn normalize(
        &self,
        url: &Url,
        fields: &ResolvedFields,
        enrichment: Option<&Enrichment>,
    ) -> WebApp {
        self.normalize_with(
            url,
            fields,
            enrichment,
            Uuid::new_v4().to_string(),
            now_millis(),
        )
    }

    /// Build a record with caller-supplied identity and creation time
    pub fn normalize_with(
        &self,
        url: &Url,
        fields: &ResolvedFields,
        enrichment: Option<&Enrichment>,
        id: String,
        created_at: i64,
    ) -> WebApp {
        let host = UrlValidator::display_host(url);

        let name = non_empty(&fields.title)
            .map(String::from)
            .or_else(|| host.clone())
            .unwrap_or_else(|| DEFAULT_NAME.to_string());

        let enriched_description = enrichment
            .and_then(|e| e.description.as_deref())
            .and_then(non_empty);
        let known_description = non_empty(&fields.description).or(enriched_description);

        let description = known_description
            .unwrap_or(PENDING_DESCRIPTION)
            .to_string();
        let tagline = known_description
            .map(|d| truncate_chars(d, TAGLINE_MAX_CHARS))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| PENDING_TAGLINE.to_string());

        let category_text = match known_description {
            Some(d) => format!("{name} {d}"),
            None => name.clone(),
        };
        let category = self.categories.infer(&category_text).to_string();

        let icon_url = match (&host, fields.source) {
            (Some(host), FieldSource::Page | FieldSource::HostOnly) => favicon_url(host),
            _ => enrichment
                .and_then(|e| e.icon_url.as_deref())
                .and_then(non_empty)
                .map(String::from)
                .unwrap_or_else(|| avatar_url(&name)),
        };

        WebApp {
            id,
            url: url.to_string(),
            name,
            tagline,
            description,
            category,
            icon_url,
            created_at,
            og_title: fields.open_graph.title.clone(),
            og_description: fields.open_graph.description.clone(),
            og_image: fields.open_graph.image.clone(),
            screenshot_url: None,
            created_by: None,
        }
    }
}

/// Favicon-service URL for a host
pub fn favicon_url(host: &str) -> String {
    format!("{FAVICON_SERVICE}?domain={}&sz=128", encode(host))
}

/// Placeholder-avatar URL for a name
pub fn avatar_url(name: &str) -> String {
    let seed = non_empty(name).unwrap_or("App");
    format!("{AVATAR_SERVICE}?seed={}", encode(seed))
}

/// First `max` characters of `text`, trailing whitespace removed
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.trim_end().to_string(),
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn encode(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
