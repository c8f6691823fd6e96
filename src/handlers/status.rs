//! Status and health check handlers
//!
//! - `/health` - liveness, always `{"status":"healthy"}`
//! - `/ready` - readiness
//! - `/status` - uptime, counters, memory and request latency percentiles
//!
//! # Example Response
//!
//! ```json
//! {
//!   "version": "0.1.0",
//!   "name": "webapp-catalog",
//!   "uptime_seconds": 3600,
//!   "analyses_processed": 1024,
//!   "errors": 3,
//!   "memory": { "rss_bytes": 52428800, "virtual_bytes": 268435456 },
//!   "latency": { "p50_ms": 12.5, "p95_ms": 45.2, "p99_ms": 98.7, ... },
//!   "status": "running",
//!   "timestamp": "2026-01-01T12:00:00+00:00"
//! }
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use hdrhistogram::Histogram;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, instrument};

/// Server version from Cargo.toml
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Server name from Cargo.toml
pub const SERVER_NAME: &str = env!("CARGO_PKG_NAME");

// ============================================================================
// Response Types
// ============================================================================

/// Liveness/readiness response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// "healthy" whenever the server answers
    pub status: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "healthy".to_string(),
        }
    }
}

/// Detailed server status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Server version
    pub version: String,
    /// Server name
    pub name: String,
    /// Seconds since start
    pub uptime_seconds: u64,
    /// Pipeline runs served by the API
    pub analyses_processed: u64,
    /// Requests answered with a 5xx
    pub errors: u64,
    /// Process memory
    pub memory: MemoryMetrics,
    /// Request latency percentiles
    pub latency: LatencyMetrics,
    /// Always "running"
    pub status: String,
    /// RFC 3339 generation time
    pub timestamp: String,
}

/// Process memory from sysinfo
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryMetrics {
    /// Resident set size (bytes)
    pub rss_bytes: u64,
    /// Virtual memory size (bytes)
    pub virtual_bytes: u64,
}

/// Request latency percentiles in milliseconds
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatencyMetrics {
    /// Median
    pub p50_ms: f64,
    /// 95th percentile
    pub p95_ms: f64,
    /// 99th percentile
    pub p99_ms: f64,
    /// Requests recorded
    pub total_requests: u64,
    /// Mean
    pub mean_ms: f64,
    /// Maximum
    pub max_ms: f64,
}

// ============================================================================
// Latency Histogram
// ============================================================================

/// Thread-safe HdrHistogram over request latencies, 1us to 60s, 3 significant figures
#[derive(Debug)]
pub struct LatencyHistogram {
    inner: RwLock<Histogram<u64>>,
}

impl LatencyHistogram {
    /// Create an empty histogram
    pub fn new() -> Self {
        let histogram =
            Histogram::new_with_bounds(1, 60_000_000, 3).expect("Failed to create histogram");
        Self {
            inner: RwLock::new(histogram),
        }
    }

    /// Record a latency in microseconds; out-of-range values are ignored
    pub fn record(&self, latency_us: u64) {
        let _ = self.inner.write().record(latency_us);
    }

    /// Record a latency duration
    pub fn record_duration(&self, duration: Duration) {
        self.record(duration.as_micros() as u64);
    }

    /// Number of recorded values
    pub fn count(&self) -> u64 {
        self.inner.read().len()
    }

    /// Snapshot as milliseconds
    pub fn metrics(&self) -> LatencyMetrics {
        let hist = self.inner.read();
        LatencyMetrics {
            p50_ms: hist.value_at_percentile(50.0) as f64 / 1000.0,
            p95_ms: hist.value_at_percentile(95.0) as f64 / 1000.0,
            p99_ms: hist.value_at_percentile(99.0) as f64 / 1000.0,
            total_requests: hist.len(),
            mean_ms: hist.mean() / 1000.0,
            max_ms: hist.max() as f64 / 1000.0,
        }
    }

    /// Clear all recorded values
    pub fn reset(&self) {
        self.inner.write().reset();
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Application State
// ============================================================================

/// Counters behind `/status`
#[derive(Debug)]
pub struct AppState {
    start_time: Instant,
    analyses_processed: AtomicU64,
    latency_histogram: LatencyHistogram,
    error_count: AtomicU64,
}

impl AppState {
    /// Fresh state; uptime starts now
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            analyses_processed: AtomicU64::new(0),
            latency_histogram: LatencyHistogram::new(),
            error_count: AtomicU64::new(0),
        }
    }

    /// Seconds since start
    #[inline]
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Pipeline runs served
    #[inline]
    pub fn analyses_processed(&self) -> u64 {
        self.analyses_processed.load(Ordering::Relaxed)
    }

    /// Count a pipeline run; returns the new total
    #[inline]
    pub fn record_analysis(&self) -> u64 {
        self.analyses_processed.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Record a request latency
    #[inline]
    pub fn record_latency(&self, duration: Duration) {
        self.latency_histogram.record_duration(duration);
    }

    /// Latency snapshot
    #[inline]
    pub fn latency_metrics(&self) -> LatencyMetrics {
        self.latency_histogram.metrics()
    }

    /// Requests with a recorded latency
    #[inline]
    pub fn total_requests(&self) -> u64 {
        self.latency_histogram.count()
    }

    /// Count a server error; returns the new total
    #[inline]
    pub fn record_error(&self) -> u64 {
        self.error_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Server errors so far
    #[inline]
    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_memory_metrics() -> MemoryMetrics {
    let pid = Pid::from_u32(std::process::id());
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    match system.process(pid) {
        Some(process) => MemoryMetrics {
            rss_bytes: process.memory(),
            virtual_bytes: process.virtual_memory(),
        },
        None => {
            debug!("Could not find current process in sysinfo");
            MemoryMetrics::default()
        }
    }
}

// ============================================================================
// HTTP Handlers
// ============================================================================

/// `GET /health`
#[instrument(skip_all)]
pub async fn health_handler() -> impl IntoResponse {
    debug!("Health check requested");
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// `GET /status`
#[instrument(skip_all)]
pub async fn status_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    debug!("Status check requested");

    let response = StatusResponse {
        version: SERVER_VERSION.to_string(),
        name: SERVER_NAME.to_string(),
        uptime_seconds: state.uptime_seconds(),
        analyses_processed: state.analyses_processed(),
        errors: state.error_count(),
        memory: collect_memory_metrics(),
        latency: state.latency_metrics(),
        status: "running".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(response))
}

/// `GET /ready`
///
/// The pipeline has no warm-up and the store is checked per request, so
/// readiness equals liveness.
#[instrument(skip_all)]
pub async fn readiness_handler() -> impl IntoResponse {
    debug!("Readiness check requested");
    (StatusCode::OK, Json(HealthResponse::default()))
}

/// Router with `/health`, `/status` and `/ready`, mergeable into any app router
pub fn status_router<S>(state: Arc<AppState>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/ready", get(readiness_handler))
        .with_state(state)
}

// ============================================================================
// Tests
// ============================================================================
