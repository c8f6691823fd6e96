//! Tolerant meta/title tag extraction
//!
//! Works on raw markup with regular expressions rather than a DOM, so
//! unclosed tags, unquoted attributes and truncated documents never fail.
//! Input is whitespace-collapsed and capped before matching, which bounds the
//! cost on huge pages.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::DEFAULT_SNAPSHOT_LIMIT;

/// Attributes of one `<meta>` element, names lower-cased
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTag {
    /// Attribute name to literal (entity-decoded) value
    pub attributes: BTreeMap<String, String>,
}

impl MetaTag {
    /// Build a tag from `(name, value)` pairs; the first occurrence of a name wins
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut attributes = BTreeMap::new();
        for (k, v) in pairs {
            attributes
                .entry(k.into().to_ascii_lowercase())
                .or_insert_with(|| v.into());
        }
        Self { attributes }
    }

    /// Attribute value by (lower-case) name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// `content` attribute
    pub fn content(&self) -> Option<&str> {
        self.get("content")
    }

    /// Whether `property` or `name` equals `key`, ignoring ASCII case
    pub fn matches_key(&self, key: &str) -> bool {
        ["property", "name"]
            .iter()
            .filter_map(|attr| self.get(attr))
            .any(|v| v.trim().eq_ignore_ascii_case(key))
    }
}

/// Everything the extractor found in one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTags {
    /// `<meta>` elements in document order
    pub meta: Vec<MetaTag>,
    /// Text of the first `<title>` element, trimmed; `None` when absent or blank
    pub title: Option<String>,
    /// Whether the snapshot limit cut the input
    pub truncated: bool,
}

impl ExtractedTags {
    /// Nothing was found
    pub fn is_empty(&self) -> bool {
        self.meta.is_empty() && self.title.is_none()
    }
}

/// Regex-based extractor for `<meta>` and `<title>`
#[derive(Debug, Clone)]
pub struct TagExtractor {
    snapshot_limit: usize,
}

impl Default for TagExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_SNAPSHOT_LIMIT)
    }
}

fn meta_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Attribute run stops at '>' or '<' outside quotes, or at end of input.
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<meta\b((?:[^<>"']|"[^"]*"|'[^']*')*)"#).expect("meta pattern")
    })
}

fn attr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"([^\s"'<>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#)
            .expect("attribute pattern")
    })
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)<title\b[^>]*>([^<]*)").expect("title pattern"))
}

impl TagExtractor {
    /// Create an extractor that considers at most `snapshot_limit` characters
    pub fn new(snapshot_limit: usize) -> Self {
        Self { snapshot_limit }
    }

    /// Character cap in use
    pub fn snapshot_limit(&self) -> usize {
        self.snapshot_limit
    }

    /// Extract meta tags and the first title from raw markup
    pub fn extract(&self, html: &str) -> ExtractedTags {
        let (snapshot, truncated) = snapshot(html, self.snapshot_limit);

        let meta: Vec<MetaTag> = meta_re()
            .captures_iter(&snapshot)
            .filter_map(|cap| cap.get(1))
            .map(|attrs| parse_attributes(attrs.as_str()))
            .filter(|tag| !tag.attributes.is_empty())
            .collect();

        let title = title_re()
            .captures(&snapshot)
            .and_then(|cap| cap.get(1))
            .map(|m| decode_entities(m.as_str().trim()))
            .filter(|t| !t.is_empty());

        debug!(
            meta_tags = meta.len(),
            has_title = title.is_some(),
            truncated,
            "Extracted tags"
        );

        ExtractedTags {
            meta,
            title,
            truncated,
        }
    }
}

/// Collapse whitespace runs to one space and keep at most `limit` characters
///
/// Returns the snapshot and whether anything was cut.
pub fn snapshot(html: &str, limit: usize) -> (String, bool) {
    let mut out = String::with_capacity(html.len().min(limit.saturating_mul(4)));
    let mut count = 0usize;
    let mut prev_space = false;

    for c in html.chars() {
        let c = if c.is_whitespace() {
            if prev_space {
                continue;
            }
            prev_space = true;
            ' '
        } else {
            prev_space = false;
            c
        };
        if count == limit {
            return (out, true);
        }
        out.push(c);
        count += 1;
    }
    (out, false)
}

fn parse_attributes(raw: &str) -> MetaTag {
    let pairs = attr_re().captures_iter(raw).filter_map(|cap| {
        let name = cap.get(1)?.as_str();
        let value = cap
            .get(2)
            .or_else(|| cap.get(3))
            .or_else(|| cap.get(4))
            .map(|m| decode_entities(m.as_str()))
            .unwrap_or_default();
        Some((name.to_string(), value))
    });
    MetaTag::from_pairs(pairs)
}

/// Decode HTML entities, keeping the literal text when it does not decode
pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    htmlescape::decode_html(raw).unwrap_or_else(|_| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extracts_meta_in_document_order() {
        let html = r#"<html><head>
            <meta charset="utf-8">
            <meta property="og:title" content="Acme Tasks">
            <meta name="description" content="Organize your team's tasks.">
        </head></html>"#;

        let tags = TagExtractor::default().extract(html);
        assert_eq!(tags.meta.len(), 3);
        assert_eq!(tags.meta[0].get("charset"), Some("utf-8"));
        assert_eq!(tags.meta[1].get("property"), Some("og:title"));
        assert_eq!(tags.meta[1].content(), Some("Acme Tasks"));
        assert_eq!(tags.meta[2].content(), Some("Organize your team's tasks."));
    }

    #[test]
    fn test_attribute_names_lowercased() {
        let tags = TagExtractor::default().extract(r#"<META PROPERTY="og:image" CONTENT="/a.png">"#);
        assert_eq!(tags.meta[0].get("property"), Some("og:image"));
        assert_eq!(tags.meta[0].content(), Some("/a.png"));
    }

    #[test]
    fn test_quoting_styles() {
        let html = r#"<meta name='twitter:title' content='Single'><meta name=description content=Bare>"#;
        let tags = TagExtractor::default().extract(html);
        assert_eq!(tags.meta[0].content(), Some("Single"));
        assert_eq!(tags.meta[1].get("name"), Some("description"));
        assert_eq!(tags.meta[1].content(), Some("Bare"));
    }

    #[test]
    fn test_gt_inside_quoted_value() {
        let tags =
            TagExtractor::default().extract(r#"<meta name="description" content="a > b">"#);
        assert_eq!(tags.meta[0].content(), Some("a > b"));
    }

    #[test]
    fn test_unclosed_meta_tag() {
        let html = r#"<meta property="og:title" content="Broken" <meta name="description" content="Next">"#;
        let tags = TagExtractor::default().extract(html);
        assert_eq!(tags.meta.len(), 2);
        assert_eq!(tags.meta[0].content(), Some("Broken"));
        assert_eq!(tags.meta[0].get("name"), None);
        assert_eq!(tags.meta[1].content(), Some("Next"));
    }

    #[test]
    fn test_truncated_document() {
        let tags = TagExtractor::default().extract(r#"<meta property="og:title" content="Cut"#);
        // The unterminated value is dropped, the tag survives
        assert_eq!(tags.meta.len(), 1);
        assert_eq!(tags.meta[0].get("property"), Some("og:title"));
        assert_eq!(tags.meta[0].content(), Some(""));
    }

    #[test]
    fn test_duplicate_attribute_first_wins() {
        let tags =
            TagExtractor::default().extract(r#"<meta name="description" content="one" content="two">"#);
        assert_eq!(tags.meta[0].content(), Some("one"));
    }

    #[test]
    fn test_title_extraction() {
        let tags = TagExtractor::default()
            .extract("<title>\n  Hello &amp; Welcome  </title><title>Second</title>");
        assert_eq!(tags.title, Some("Hello & Welcome".to_string()));
    }

    #[test]
    fn test_title_without_close_tag() {
        let tags = TagExtractor::default().extract("<head><title data-x=1>Open ended");
        assert_eq!(tags.title, Some("Open ended".to_string()));
    }

    #[test]
    fn test_blank_title_is_none() {
        let tags = TagExtractor::default().extract("<title>   </title>");
        assert_eq!(tags.title, None);
    }

    #[test]
    fn test_metadata_is_not_meta() {
        let tags = TagExtractor::default().extract(r#"<metadata content="x"></metadata>"#);
        assert!(tags.meta.is_empty());
    }

    #[test]
    fn test_entity_decoding() {
        let tags = TagExtractor::default()
            .extract(r#"<meta name="description" content="Fast &amp; simple &quot;apps&quot;">"#);
        assert_eq!(tags.meta[0].content(), Some("Fast & simple \"apps\""));
    }

    #[test]
    fn test_undecodable_entity_kept() {
        assert_eq!(decode_entities("Tom & Jerry"), "Tom & Jerry");
        assert_eq!(decode_entities("plain"), "plain");
    }

    #[test]
    fn test_snapshot_collapses_and_caps() {
        let (s, truncated) = snapshot("a \n\t b    c", 100);
        assert_eq!(s, "a b c");
        assert!(!truncated);

        let (s, truncated) = snapshot("abcdef", 3);
        assert_eq!(s, "abc");
        assert!(truncated);

        // Multi-byte characters count once
        let (s, truncated) = snapshot("ééé", 2);
        assert_eq!(s, "éé");
        assert!(truncated);
    }

    #[test]
    fn test_unbounded_limit_does_not_overflow() {
        let tags = TagExtractor::new(usize::MAX).extract("<title>x</title>");
        assert_eq!(tags.title, Some("x".to_string()));
        assert!(!tags.truncated);
    }

    #[test]
    fn test_limit_bounds_extraction() {
        let padding = "x".repeat(100);
        let html = format!(r#"{padding}<meta property="og:title" content="Late">"#);
        let tags = TagExtractor::new(50).extract(&html);
        assert!(tags.meta.is_empty());
        assert!(tags.truncated);
    }

    #[test]
    fn test_empty_input() {
        let tags = TagExtractor::default().extract("");
        assert!(tags.is_empty());
        assert!(!tags.truncated);
    }

    #[test]
    fn test_matches_key_case_insensitive() {
        let tag = MetaTag::from_pairs([("Property", "OG:Title"), ("content", "x")]);
        assert!(tag.matches_key("og:title"));
        assert!(!tag.matches_key("og:description"));
    }
}
