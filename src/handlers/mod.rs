//! HTTP surface
//!
//! ```text
//! Request ──> CORS ──> track_requests ──> /api/* ──> Catalog ──> AppAnalyzer
//!                                     │                 └──────> AppStore
//!                                     └─> /health /ready /status /metrics
//! ```

pub mod apps;
pub mod status;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;

use crate::catalog::Catalog;
use crate::cors::cors_layer;

pub use apps::{ApiError, ApiState, CallerIdentity, UrlRequest};
pub use status::{status_router, AppState};

/// Full application router
pub fn router(catalog: Arc<Catalog>) -> Router {
    let status = Arc::new(AppState::new());
    let state = ApiState {
        catalog,
        status: status.clone(),
    };

    Router::new()
        .route("/api/describe-app", post(apps::describe_app))
        .route("/api/apps", get(apps::list_apps).post(apps::create_app))
        .route("/api/apps/:id", delete(apps::delete_app))
        .route("/metrics", get(apps::metrics_handler))
        .merge(status_router(status.clone()))
        .route_layer(middleware::from_fn_with_state(status, apps::track_requests))
        .layer(cors_layer())
        .with_state(state)
}
