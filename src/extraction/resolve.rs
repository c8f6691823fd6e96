//! Field resolution
//!
//! Picks canonical title, description, image and site name out of an
//! extracted tag set using ordered precedence lists. The lists are data
//! ([`PrecedenceTable`]) so alternative policies are configuration, not code.

use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::extraction::tags::ExtractedTags;
use crate::fetch::UrlValidator;

/// Ordered tag keys tried for each canonical field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrecedenceTable {
    /// Title keys; falls back to `<title>`, then the host
    pub title: Vec<String>,
    /// Description keys; falls back to empty
    pub description: Vec<String>,
    /// Image keys; falls back to empty
    pub image: Vec<String>,
    /// Site name keys; falls back to the host
    pub site_name: Vec<String>,
}

impl Default for PrecedenceTable {
    fn default() -> Self {
        fn keys(list: &[&str]) -> Vec<String> {
            list.iter().map(|k| k.to_string()).collect()
        }
        Self {
            title: keys(&["og:title", "twitter:title"]),
            description: keys(&["og:description", "twitter:description", "description"]),
            image: keys(&["og:image", "twitter:image"]),
            site_name: keys(&["og:site_name"]),
        }
    }
}

/// Open Graph values carried through to the record unmodified
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenGraphData {
    /// og:title
    pub title: Option<String>,
    /// og:description
    pub description: Option<String>,
    /// og:image
    pub image: Option<String>,
}

/// Where resolved values came from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldSource {
    /// An HTML document was fetched and scanned
    Page,
    /// The server answered, but not with usable HTML
    HostOnly,
    /// Nothing was retrieved
    #[default]
    Unavailable,
}

/// Canonical fields; an empty string means "absent"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedFields {
    /// Page title
    pub title: String,
    /// Description
    pub description: String,
    /// Absolute image URL
    pub image: String,
    /// Site name
    pub site_name: String,
    /// Raw Open Graph values
    pub open_graph: OpenGraphData,
    /// Provenance
    pub source: FieldSource,
}

impl ResolvedFields {
    /// Fields for a failed fetch: everything absent
    pub fn unavailable() -> Self {
        Self::default()
    }

    /// Fields for a server that answered without HTML: host as title and site name
    pub fn host_only(url: &Url) -> Self {
        let host = UrlValidator::display_host(url).unwrap_or_default();
        Self {
            title: host.clone(),
            site_name: host,
            source: FieldSource::HostOnly,
            ..Self::default()
        }
    }
}

/// Precedence-driven resolver
#[derive(Debug, Clone, Default)]
pub struct FieldResolver {
    precedence: PrecedenceTable,
}

impl FieldResolver {
    /// Create a resolver with the given precedence lists
    pub fn new(precedence: PrecedenceTable) -> Self {
        Self { precedence }
    }

    /// Precedence lists in use
    pub fn precedence(&self) -> &PrecedenceTable {
        &self.precedence
    }

    /// Resolve canonical fields for the page at `page_url`
    ///
    /// `page_url` supplies the host fallbacks and the base for relative image
    /// URLs.
    pub fn resolve(&self, tags: &ExtractedTags, page_url: &Url) -> ResolvedFields {
        self.resolve_with_base(tags, page_url, page_url)
    }

    /// Resolve canonical fields when the page was served from another URL
    ///
    /// Host fallbacks come from `submitted`; relative images are joined onto
    /// `base`, the URL the document was actually served from.
    pub fn resolve_with_base(
        &self,
        tags: &ExtractedTags,
        submitted: &Url,
        base: &Url,
    ) -> ResolvedFields {
        let host = UrlValidator::display_host(submitted).unwrap_or_default();

        let title = first_match(tags, &self.precedence.title)
            .or_else(|| tags.title.clone())
            .unwrap_or_else(|| host.clone());
        let description = first_match(tags, &self.precedence.description).unwrap_or_default();
        let image = first_match(tags, &self.precedence.image)
            .map(|img| absolutize(&img, base))
            .unwrap_or_default();
        let site_name =
            first_match(tags, &self.precedence.site_name).unwrap_or_else(|| host.clone());

        let open_graph = OpenGraphData {
            title: lookup(tags, "og:title"),
            description: lookup(tags, "og:description"),
            image: lookup(tags, "og:image"),
        };

        debug!(
            title = %title,
            has_description = !description.is_empty(),
            has_image = !image.is_empty(),
            "Resolved fields"
        );

        ResolvedFields {
            title,
            description,
            image,
            site_name,
            open_graph,
            source: FieldSource::Page,
        }
    }
}

/// First non-empty `content` for the keys in list order; ties go to document order
pub fn first_match(tags: &ExtractedTags, keys: &[String]) -> Option<String> {
    keys.iter().find_map(|key| lookup(tags, key))
}

/// First non-empty trimmed `content` of a tag whose `property`/`name` is `key`
pub fn lookup(tags: &ExtractedTags, key: &str) -> Option<String> {
    tags.meta
        .iter()
        .filter(|tag| tag.matches_key(key))
        .filter_map(|tag| tag.content())
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(String::from)
}

fn absolutize(image: &str, base: &Url) -> String {
    if Url::parse(image).is_ok() {
        return image.to_string();
    }
    base.join(image)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| image.to_string())
}
