//! Identity and access allowlist
//!
//! Identities come from an external authentication collaborator; this module
//! only decides whether an identity may use the catalog.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{parse_email_list, CatalogConfig};
use crate::error::Error;

/// An authenticated (or anonymous) caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Verified email address
    pub email: Option<String>,
    /// Human-readable name
    pub display_name: Option<String>,
    /// Boolean custom claims
    #[serde(default)]
    pub claims: BTreeMap<String, bool>,
}

impl Identity {
    /// Identity with only an email
    pub fn with_email(email: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            ..Self::default()
        }
    }

    /// Nobody signed in
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Attach a display name
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Attach a boolean claim
    pub fn with_claim(mut self, claim: impl Into<String>, value: bool) -> Self {
        self.claims.insert(claim.into(), value);
        self
    }

    /// Trimmed, lower-cased email, if any
    pub fn normalized_email(&self) -> Option<String> {
        self.email
            .as_deref()
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }

    /// Attribution string for `createdBy`: email, else display name
    pub fn attribution(&self) -> Option<String> {
        self.normalized_email().or_else(|| {
            self.display_name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(String::from)
        })
    }

    /// Whether `claim` is present and true
    pub fn has_claim(&self, claim: &str) -> bool {
        self.claims.get(claim).copied().unwrap_or(false)
    }
}

/// Email allowlist plus an optional claim that grants access outright
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    allowed_emails: Vec<String>,
    access_claim: Option<String>,
}

impl AccessPolicy {
    /// Create a policy; emails are trimmed and lower-cased
    pub fn new<I, S>(allowed_emails: I, access_claim: Option<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed_emails = allowed_emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        Self {
            allowed_emails,
            access_claim: access_claim.filter(|c| !c.trim().is_empty()),
        }
    }

    /// Build from a comma-separated list
    pub fn from_list(raw: &str) -> Self {
        Self::new(parse_email_list(raw), None)
    }

    /// Build from configuration
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(&config.allowed_emails, config.access_claim.clone())
    }

    /// Configured allowlist
    pub fn allowed_emails(&self) -> &[String] {
        &self.allowed_emails
    }

    /// Whether `identity` may use the catalog
    ///
    /// The access claim wins outright. Otherwise an email is required, and an
    /// empty allowlist admits every email.
    pub fn is_allowed(&self, identity: &Identity) -> bool {
        if let Some(claim) = &self.access_claim {
            if identity.has_claim(claim) {
                return true;
            }
        }
        match identity.normalized_email() {
            Some(email) => {
                self.allowed_emails.is_empty() || self.allowed_emails.contains(&email)
            }
            None => false,
        }
    }

    /// `Ok` when allowed, `AccessDenied` otherwise
    pub fn check(&self, identity: &Identity) -> Result<(), Error> {
        if self.is_allowed(identity) {
            Ok(())
        } else {
            Err(Error::AccessDenied(match identity.normalized_email() {
                Some(email) => format!("{email} is not on the allowlist"),
                None => "sign-in required".to_string(),
            }))
        }
    }
}
