//! Catalog operations for an identified caller
//!
//! Ties the analyzer, the store and the access policy together. Analysis
//! itself needs no identity; everything touching stored records does.

use std::sync::Arc;

use futures::stream::BoxStream;
use tracing::{info, instrument, warn};

use crate::catalog::access::{AccessPolicy, Identity};
use crate::catalog::pipeline::AppAnalyzer;
use crate::catalog::record::WebApp;
use crate::catalog::store::AppStore;
use crate::error::{Error, Result};
use crate::metrics::global_metrics;

/// The catalog as seen by the API layer
#[derive(Clone)]
pub struct Catalog {
    analyzer: Arc<AppAnalyzer>,
    store: Arc<dyn AppStore>,
    policy: AccessPolicy,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog")
            .field("analyzer", &self.analyzer)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Catalog {
    /// Create a catalog
    pub fn new(analyzer: Arc<AppAnalyzer>, store: Arc<dyn AppStore>, policy: AccessPolicy) -> Self {
        Self {
            analyzer,
            store,
            policy,
        }
    }

    /// The analyzer in use
    pub fn analyzer(&self) -> &AppAnalyzer {
        &self.analyzer
    }

    /// The access policy in use
    pub fn policy(&self) -> &AccessPolicy {
        &self.policy
    }

    /// Analyze a URL without persisting anything
    pub async fn describe(&self, raw_url: &str) -> Result<WebApp> {
        self.analyzer.analyze(raw_url).await
    }

    /// Analyze a URL and persist the record
    ///
    /// When the store refuses, the error is [`Error::Unsaved`] and still
    /// carries the in-memory record.
    #[instrument(skip(self, identity, raw_url), fields(user = ?identity.attribution()))]
    pub async fn add(&self, identity: &Identity, raw_url: &str) -> Result<WebApp> {
        self.policy.check(identity)?;

        let mut app = self.analyzer.analyze(raw_url).await?;
        app.created_by = identity.attribution();

        match self.store.create(app.to_new()).await {
            Ok(stored) => {
                global_metrics().record_created();
                let app = app.into_persisted(stored.id, &stored.created_at);
                info!(id = %app.id, "Record added");
                Ok(app)
            }
            Err(source) => {
                global_metrics().record_persistence_failure();
                warn!(id = %app.id, "Record not persisted: {}", source);
                Err(Error::Unsaved {
                    app: Box::new(app),
                    source,
                })
            }
        }
    }

    /// Stored records, newest first
    pub async fn list(&self, identity: &Identity) -> Result<Vec<WebApp>> {
        self.policy.check(identity)?;
        self.store.list().await.map_err(|e| {
            global_metrics().record_persistence_failure();
            Error::from(e)
        })
    }

    /// Delete a stored record
    #[instrument(skip(self, identity), fields(user = ?identity.attribution()))]
    pub async fn delete(&self, identity: &Identity, id: &str) -> Result<()> {
        self.policy.check(identity)?;
        match self.store.delete(id).await {
            Ok(()) => {
                global_metrics().record_deleted();
                info!("Record deleted");
                Ok(())
            }
            Err(e) => {
                global_metrics().record_persistence_failure();
                warn!("Delete failed: {}", e);
                Err(e.into())
            }
        }
    }

    /// Change stream of ordered snapshots
    pub fn subscribe(&self, identity: &Identity) -> Result<BoxStream<'static, Vec<WebApp>>> {
        self.policy.check(identity)?;
        Ok(self.store.subscribe())
    }
}
