//! URL analysis pipeline
//!
//! `Idle → Validating → Fetching → Extracting → Resolving → Normalizing → Done`
//!
//! Invalid URLs stop at `Validating` with an [`InputError`](crate::error::InputError)
//! and never reach the network. Every later failure degrades into default
//! field values, so a valid URL always yields a complete [`WebApp`].

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::catalog::normalize::RecordNormalizer;
use crate::catalog::record::WebApp;
use crate::config::CatalogConfig;
use crate::enrich::{Enricher, Enrichment, GeminiEnricher};
use crate::error::{FetchError, Result};
use crate::extraction::{FieldResolver, ResolvedFields, TagExtractor};
use crate::fetch::{FetchOptions, PageFetcher, PageSource, UrlValidator};
use crate::metrics::global_metrics;

/// Pipeline stages, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Not started
    Idle,
    /// Checking the submitted URL
    Validating,
    /// Waiting on the page
    Fetching,
    /// Scanning markup for tags
    Extracting,
    /// Applying precedence lists
    Resolving,
    /// Building the record
    Normalizing,
    /// Record produced
    Done,
}

impl PipelineStage {
    /// Lower-case stage name
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Idle => "idle",
            PipelineStage::Validating => "validating",
            PipelineStage::Fetching => "fetching",
            PipelineStage::Extracting => "extracting",
            PipelineStage::Resolving => "resolving",
            PipelineStage::Normalizing => "normalizing",
            PipelineStage::Done => "done",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything one pipeline run produced
#[derive(Debug, Clone)]
pub struct Analysis {
    /// The normalized record
    pub app: WebApp,
    /// Fields the record was built from
    pub fields: ResolvedFields,
    /// Recovered fetch failure, if any
    pub fetch_error: Option<FetchError>,
    /// Whether enrichment contributed
    pub enriched: bool,
    /// Stages visited, in order
    pub stages: Vec<PipelineStage>,
    /// Wall time for the run
    pub duration: Duration,
}

/// Runs the pipeline for submitted URLs
///
/// Holds no per-request state; one analyzer serves any number of concurrent
/// calls.
#[derive(Clone)]
pub struct AppAnalyzer {
    source: Arc<dyn PageSource>,
    extractor: TagExtractor,
    resolver: FieldResolver,
    normalizer: RecordNormalizer,
    enricher: Option<Arc<dyn Enricher>>,
    enrich_timeout: Duration,
}

impl fmt::Debug for AppAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppAnalyzer")
            .field("extractor", &self.extractor)
            .field("resolver", &self.resolver)
            .field("normalizer", &self.normalizer)
            .field("enricher", &self.enricher.is_some())
            .field("enrich_timeout", &self.enrich_timeout)
            .finish()
    }
}

impl AppAnalyzer {
    /// Analyzer over `source` with the reference policy and no enrichment
    pub fn new(source: Arc<dyn PageSource>) -> Self {
        Self {
            source,
            extractor: TagExtractor::default(),
            resolver: FieldResolver::default(),
            normalizer: RecordNormalizer::default(),
            enricher: None,
            enrich_timeout: CatalogConfig::default().enrich_timeout(),
        }
    }

    /// Analyzer wired from configuration: HTTP fetcher, policy tables, and
    /// the Gemini enricher when a key is configured
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        let fetcher = PageFetcher::new(FetchOptions::from_config(config))?;
        let mut analyzer = Self::new(Arc::new(fetcher))
            .with_extractor(TagExtractor::new(config.snapshot_limit))
            .with_resolver(FieldResolver::new(config.policy.precedence.clone()))
            .with_normalizer(RecordNormalizer::new(config.policy.categories.clone()))
            .with_enrich_timeout(config.enrich_timeout());

        if let Some(gemini) = GeminiEnricher::from_config(config)? {
            info!("Enrichment enabled");
            analyzer = analyzer.with_enricher(Arc::new(gemini));
        }
        Ok(analyzer)
    }

    /// Replace the tag extractor
    pub fn with_extractor(mut self, extractor: TagExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Replace the field resolver
    pub fn with_resolver(mut self, resolver: FieldResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Replace the normalizer
    pub fn with_normalizer(mut self, normalizer: RecordNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Enable enrichment
    pub fn with_enricher(mut self, enricher: Arc<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    /// Disable enrichment
    pub fn without_enricher(mut self) -> Self {
        self.enricher = None;
        self
    }

    /// Budget for one enrichment call
    pub fn with_enrich_timeout(mut self, timeout: Duration) -> Self {
        self.enrich_timeout = timeout;
        self
    }

    /// Whether an enricher is configured
    pub fn has_enricher(&self) -> bool {
        self.enricher.is_some()
    }

    /// Analyze `raw_url` into a record
    ///
    /// Fails only when the URL is rejected.
    pub async fn analyze(&self, raw_url: &str) -> Result<WebApp> {
        self.analyze_detailed(raw_url).await.map(|a| a.app)
    }

    /// Analyze `raw_url`, keeping intermediate results
    #[instrument(skip(self, raw_url), fields(url = %raw_url.trim()))]
    pub async fn analyze_detailed(&self, raw_url: &str) -> Result<Analysis> {
        let start = Instant::now();
        let mut stages = vec![PipelineStage::Idle];
        let mut enter = |stage: PipelineStage| {
            debug!(stage = %stage, "Pipeline stage");
            stages.push(stage);
        };

        enter(PipelineStage::Validating);
        let url = match UrlValidator::validate(raw_url) {
            Ok(url) => url,
            Err(e) => {
                global_metrics().record_rejected_input();
                warn!("Rejected URL: {}", e);
                return Err(e.into());
            }
        };

        enter(PipelineStage::Fetching);
        let (fields, fetch_error) = match self.source.fetch(&url).await {
            Ok(page) => {
                enter(PipelineStage::Extracting);
                let tags = self.extractor.extract(&page.body);
                enter(PipelineStage::Resolving);
                (self.resolver.resolve_with_base(&tags, &url, &page.url), None)
            }
            Err(e) => {
                global_metrics().record_fetch_failure(e.kind());
                warn!(kind = e.kind(), "Continuing with defaults: {}", e);
                let fields = if e.server_responded() {
                    ResolvedFields::host_only(&url)
                } else {
                    ResolvedFields::unavailable()
                };
                (fields, Some(e))
            }
        };

        let enrichment = if fields.description.trim().is_empty() {
            self.enrich(&url, &fields).await
        } else {
            None
        };

        enter(PipelineStage::Normalizing);
        let app = self.normalizer.normalize(&url, &fields, enrichment.as_ref());
        enter(PipelineStage::Done);

        let duration = start.elapsed();
        global_metrics().record_analysis(duration);
        info!(
            name = %app.name,
            category = %app.category,
            degraded = fetch_error.is_some(),
            duration_ms = duration.as_millis() as u64,
            "Analysis complete"
        );

        Ok(Analysis {
            app,
            fields,
            fetch_error,
            enriched: enrichment.is_some(),
            stages,
            duration,
        })
    }

    async fn enrich(&self, url: &Url, fields: &ResolvedFields) -> Option<Enrichment> {
        let enricher = self.enricher.as_ref()?;

        match tokio::time::timeout(self.enrich_timeout, enricher.enrich(url, fields)).await {
            Ok(Ok(enrichment)) if !enrichment.is_empty() => {
                global_metrics().record_enrichment(true);
                Some(enrichment)
            }
            Ok(Ok(_)) => {
                debug!("Enrichment returned nothing usable");
                global_metrics().record_enrichment(false);
                None
            }
            Ok(Err(e)) => {
                global_metrics().record_enrichment(false);
                warn!("Enrichment dropped: {}", e);
                None
            }
            Err(_) => {
                global_metrics().record_enrichment(false);
                warn!(
                    timeout_ms = self.enrich_timeout.as_millis() as u64,
                    "Enrichment timed out"
                );
                None
            }
        }
    }
}
