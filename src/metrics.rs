//! Process-wide catalog metrics
//!
//! Atomic counters for requests, analyses and failures, labeled breakdowns
//! behind locks, and a Prometheus text export served at `/metrics`.
//!
//! # Example
//!
//! ```rust
//! use webapp_catalog::metrics::global_metrics;
//!
//! global_metrics().record_request("/api/apps", 200);
//! let output = global_metrics().to_prometheus_format();
//! assert!(output.contains("catalog_requests_total"));
//! ```

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Duration;

use parking_lot::RwLock;

/// Duration samples kept for percentiles
const MAX_DURATION_SAMPLES: usize = 1000;

/// Catalog metrics collector
#[derive(Debug)]
pub struct Metrics {
    /// HTTP requests served
    pub requests_total: AtomicU64,
    /// Pipeline runs that produced a record
    pub analyses_total: AtomicU64,
    /// Pipeline runs rejected at validation
    pub rejected_inputs_total: AtomicU64,
    /// Fetches that failed and were recovered
    pub fetch_failures_total: AtomicU64,
    /// Enrichment calls that returned something usable
    pub enrichments_total: AtomicU64,
    /// Enrichment calls that failed and were dropped
    pub enrichment_failures_total: AtomicU64,
    /// Records persisted
    pub records_created_total: AtomicU64,
    /// Records deleted
    pub records_deleted_total: AtomicU64,
    /// Store calls that failed
    pub persistence_failures_total: AtomicU64,

    /// Requests currently in flight
    pub active_requests: AtomicU32,

    analysis_durations: RwLock<RingBuffer<Duration>>,
    requests_by_path_status: RwLock<BTreeMap<(String, u16), u64>>,
    fetch_failures_by_kind: RwLock<BTreeMap<String, u64>>,
}

#[derive(Debug)]
struct RingBuffer<T> {
    data: Vec<T>,
    capacity: usize,
    write_pos: usize,
}

impl<T: Clone + Ord> RingBuffer<T> {
    fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            write_pos: 0,
        }
    }

    fn push(&mut self, value: T) {
        if self.data.len() < self.capacity {
            self.data.push(value);
        } else {
            self.data[self.write_pos] = value;
        }
        self.write_pos = (self.write_pos + 1) % self.capacity;
    }

    /// Nearest-rank percentile, `p` in 0.0..=1.0
    fn percentile(&self, p: f64) -> Option<T> {
        if self.data.is_empty() {
            return None;
        }
        let mut sorted = self.data.clone();
        sorted.sort();
        let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
        sorted.get(idx).cloned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create an empty collector
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            analyses_total: AtomicU64::new(0),
            rejected_inputs_total: AtomicU64::new(0),
            fetch_failures_total: AtomicU64::new(0),
            enrichments_total: AtomicU64::new(0),
            enrichment_failures_total: AtomicU64::new(0),
            records_created_total: AtomicU64::new(0),
            records_deleted_total: AtomicU64::new(0),
            persistence_failures_total: AtomicU64::new(0),
            active_requests: AtomicU32::new(0),
            analysis_durations: RwLock::new(RingBuffer::new(MAX_DURATION_SAMPLES)),
            requests_by_path_status: RwLock::new(BTreeMap::new()),
            fetch_failures_by_kind: RwLock::new(BTreeMap::new()),
        }
    }

    /// Record a served request
    pub fn record_request(&self, path: &str, status_code: u16) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        *self
            .requests_by_path_status
            .write()
            .entry((path.to_string(), status_code))
            .or_insert(0) += 1;
    }

    /// Record a finished pipeline run
    pub fn record_analysis(&self, duration: Duration) {
        self.analyses_total.fetch_add(1, Ordering::Relaxed);
        self.analysis_durations.write().push(duration);
    }

    /// Record a URL rejected before fetching
    pub fn record_rejected_input(&self) {
        self.rejected_inputs_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a recovered fetch failure
    pub fn record_fetch_failure(&self, kind: &str) {
        self.fetch_failures_total.fetch_add(1, Ordering::Relaxed);
        *self
            .fetch_failures_by_kind
            .write()
            .entry(kind.to_string())
            .or_insert(0) += 1;
    }

    /// Record an enrichment outcome
    pub fn record_enrichment(&self, succeeded: bool) {
        if succeeded {
            self.enrichments_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.enrichment_failures_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a persisted record
    pub fn record_created(&self) {
        self.records_created_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a deleted record
    pub fn record_deleted(&self) {
        self.records_deleted_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a failed store call
    pub fn record_persistence_failure(&self) {
        self.persistence_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a request as started
    pub fn inc_active_requests(&self) {
        self.active_requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a request as finished
    pub fn dec_active_requests(&self) {
        let _ = self
            .active_requests
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Recovered fetch failures for one kind label
    pub fn fetch_failures_of(&self, kind: &str) -> u64 {
        self.fetch_failures_by_kind
            .read()
            .get(kind)
            .copied()
            .unwrap_or(0)
    }

    /// Render all metrics in Prometheus text format
    pub fn to_prometheus_format(&self) -> String {
        let mut output = String::new();

        let counters = [
            ("catalog_requests_total", &self.requests_total),
            ("catalog_analyses_total", &self.analyses_total),
            ("catalog_rejected_inputs_total", &self.rejected_inputs_total),
            ("catalog_fetch_failures_total", &self.fetch_failures_total),
            ("catalog_enrichments_total", &self.enrichments_total),
            (
                "catalog_enrichment_failures_total",
                &self.enrichment_failures_total,
            ),
            ("catalog_records_created_total", &self.records_created_total),
            ("catalog_records_deleted_total", &self.records_deleted_total),
            (
                "catalog_persistence_failures_total",
                &self.persistence_failures_total,
            ),
        ];
        for (name, counter) in counters {
            output.push_str(&format!("# TYPE {name} counter\n"));
            output.push_str(&format!("{name} {}\n", counter.load(Ordering::Relaxed)));
        }

        output.push_str("# TYPE catalog_active_requests gauge\n");
        output.push_str(&format!(
            "catalog_active_requests {}\n",
            self.active_requests.load(Ordering::Relaxed)
        ));

        for ((path, status), count) in self.requests_by_path_status.read().iter() {
            output.push_str(&format!(
                "catalog_requests{{path=\"{path}\",status=\"{status}\"}} {count}\n"
            ));
        }
        for (kind, count) in self.fetch_failures_by_kind.read().iter() {
            output.push_str(&format!(
                "catalog_fetch_failures{{kind=\"{kind}\"}} {count}\n"
            ));
        }

        let durations = self.analysis_durations.read();
        for (label, p) in [("p50", 0.5), ("p95", 0.95), ("p99", 0.99)] {
            if let Some(d) = durations.percentile(p) {
                output.push_str(&format!(
                    "catalog_analysis_duration_{label}_ms {}\n",
                    d.as_millis()
                ));
            }
        }

        output
    }
}

/// Global metrics instance
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

/// Get or initialize the global metrics instance
pub fn global_metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}
