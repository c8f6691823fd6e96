//! The WebApp record
//!
//! `id` and `url` are identity and are set once. Everything else is derived
//! by the normalizer. There is no update operation, only create and delete.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One cataloged web application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebApp {
    /// Opaque identifier (local UUID until the store assigns one)
    pub id: String,
    /// Canonical source URL
    pub url: String,
    /// Human-readable title
    pub name: String,
    /// Short promotional line
    pub tagline: String,
    /// Longer description
    pub description: String,
    /// Category from the fixed vocabulary
    pub category: String,
    /// Favicon-service or placeholder-avatar URL
    pub icon_url: String,
    /// Creation time, milliseconds since epoch
    pub created_at: i64,
    /// og:title, carried through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    /// og:description, carried through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,
    /// og:image, carried through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    /// Screenshot URL, carried through
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    /// Who added the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl WebApp {
    /// Title to show on a card: og:title when present
    pub fn display_title(&self) -> &str {
        self.og_title.as_deref().unwrap_or(&self.name)
    }

    /// Description to show on a card: og:description when present
    pub fn display_description(&self) -> &str {
        self.og_description.as_deref().unwrap_or(&self.description)
    }

    /// Image to show on a card: screenshot, then og:image, then the icon
    pub fn display_image(&self) -> &str {
        self.screenshot_url
            .as_deref()
            .or(self.og_image.as_deref())
            .unwrap_or(&self.icon_url)
    }

    /// Store payload: the record minus `id` and `createdAt`
    pub fn to_new(&self) -> NewWebApp {
        NewWebApp {
            url: self.url.clone(),
            name: self.name.clone(),
            tagline: self.tagline.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            icon_url: self.icon_url.clone(),
            og_title: self.og_title.clone(),
            og_description: self.og_description.clone(),
            og_image: self.og_image.clone(),
            screenshot_url: self.screenshot_url.clone(),
            created_by: self.created_by.clone(),
        }
    }

    /// Adopt the store-assigned identifier and server timestamp
    pub fn into_persisted(mut self, id: String, created_at: &impl TimestampSource) -> Self {
        self.id = id;
        if let Some(ms) = normalize_timestamp(created_at) {
            self.created_at = ms;
        }
        self
    }
}

/// Create payload accepted by the store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWebApp {
    /// Canonical source URL
    pub url: String,
    /// Human-readable title
    pub name: String,
    /// Short promotional line
    pub tagline: String,
    /// Longer description
    pub description: String,
    /// Category
    pub category: String,
    /// Icon URL
    pub icon_url: String,
    /// og:title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_title: Option<String>,
    /// og:description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_description: Option<String>,
    /// og:image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub og_image: Option<String>,
    /// Screenshot URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot_url: Option<String>,
    /// Who added the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl NewWebApp {
    /// Complete the payload with identity and creation time
    pub fn into_record(self, id: String, created_at: i64) -> WebApp {
        WebApp {
            id,
            url: self.url,
            name: self.name,
            tagline: self.tagline,
            description: self.description,
            category: self.category,
            icon_url: self.icon_url,
            created_at,
            og_title: self.og_title,
            og_description: self.og_description,
            og_image: self.og_image,
            screenshot_url: self.screenshot_url,
            created_by: self.created_by,
        }
    }
}

/// A value convertible to milliseconds since epoch
pub trait TimestampSource {
    /// Milliseconds since epoch, or `None` when the value is not a timestamp
    fn to_millis(&self) -> Option<i64>;
}

/// Normalize any supported timestamp shape to milliseconds
pub fn normalize_timestamp<T: TimestampSource + ?Sized>(value: &T) -> Option<i64> {
    value.to_millis()
}

/// Current time in milliseconds since epoch
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

impl TimestampSource for i64 {
    fn to_millis(&self) -> Option<i64> {
        Some(*self)
    }
}

impl TimestampSource for f64 {
    fn to_millis(&self) -> Option<i64> {
        self.is_finite().then(|| self.round() as i64)
    }
}

impl TimestampSource for DateTime<Utc> {
    fn to_millis(&self) -> Option<i64> {
        Some(self.timestamp_millis())
    }
}

impl TimestampSource for SystemTime {
    fn to_millis(&self) -> Option<i64> {
        match self.duration_since(UNIX_EPOCH) {
            Ok(d) => i64::try_from(d.as_millis()).ok(),
            Err(e) => i64::try_from(e.duration().as_millis()).ok().map(|ms| -ms),
        }
    }
}

/// Server timestamp shapes a document store may hand back
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Already milliseconds
    Millis(i64),
    /// Fractional milliseconds
    Fractional(f64),
    /// `{seconds, nanoseconds}` object
    Seconds {
        /// Whole seconds since epoch
        #[serde(alias = "_seconds")]
        seconds: i64,
        /// Sub-second part
        #[serde(default, alias = "_nanoseconds", alias = "nanos")]
        nanoseconds: i64,
    },
    /// RFC 3339 string
    Text(String),
}

impl TimestampSource for RawTimestamp {
    fn to_millis(&self) -> Option<i64> {
        match self {
            RawTimestamp::Millis(ms) => Some(*ms),
            RawTimestamp::Fractional(ms) => ms.to_millis(),
            RawTimestamp::Seconds {
                seconds,
                nanoseconds,
            } => seconds
                .checked_mul(1000)
                .and_then(|ms| ms.checked_add(nanoseconds / 1_000_000)),
            RawTimestamp::Text(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.timestamp_millis()),
        }
    }
}

impl TimestampSource for Value {
    fn to_millis(&self) -> Option<i64> {
        serde_json::from_value::<RawTimestamp>(self.clone())
            .ok()
            .and_then(|raw| raw.to_millis())
    }
}
