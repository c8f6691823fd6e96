//! Catalog API handlers
//!
//! - `POST /api/describe-app` - analyze a URL, persist nothing
//! - `GET /api/apps` - stored records, newest first
//! - `POST /api/apps` - analyze and persist (201)
//! - `DELETE /api/apps/:id` - delete (204)
//! - `GET /metrics` - Prometheus text
//!
//! Identity arrives in headers set by an upstream identity-aware proxy.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::async_trait;
use axum::extract::{FromRef, FromRequestParts, MatchedPath, Path, Request, State};
use axum::http::request::Parts;
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, instrument, warn};

use crate::catalog::{Catalog, Identity, WebApp};
use crate::error::{Error, PersistenceError};
use crate::handlers::status::AppState;
use crate::metrics::global_metrics;

/// Header carrying the authenticated email
pub const EMAIL_HEADER: &str = "x-authenticated-email";

/// Header carrying the display name
pub const NAME_HEADER: &str = "x-authenticated-name";

/// Header carrying comma-separated names of claims that are true
pub const CLAIMS_HEADER: &str = "x-authenticated-claims";

/// Shared state for API routes
#[derive(Debug, Clone)]
pub struct ApiState {
    /// Catalog operations
    pub catalog: Arc<Catalog>,
    /// Status counters
    pub status: Arc<AppState>,
}

impl FromRef<ApiState> for Arc<AppState> {
    fn from_ref(state: &ApiState) -> Self {
        state.status.clone()
    }
}

/// Body for the URL-taking endpoints
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UrlRequest {
    /// URL to analyze
    #[serde(default)]
    pub url: String,
}

/// Caller identity read from proxy headers; anonymous when absent
#[derive(Debug, Clone, Default)]
pub struct CallerIdentity(pub Identity);

#[async_trait]
impl<S> FromRequestParts<S> for CallerIdentity
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(String::from)
        };

        let mut identity = Identity {
            email: header(EMAIL_HEADER),
            display_name: header(NAME_HEADER),
            ..Identity::default()
        };
        if let Some(claims) = header(CLAIMS_HEADER) {
            for claim in claims.split(',').map(str::trim).filter(|c| !c.is_empty()) {
                identity.claims.insert(claim.to_string(), true);
            }
        }
        Ok(CallerIdentity(identity))
    }
}

/// [`Error`] rendered as an HTTP response
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    /// Status code for the wrapped error
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::Input(_) => StatusCode::BAD_REQUEST,
            Error::AccessDenied(_) => StatusCode::FORBIDDEN,
            Error::Persistence(PersistenceError::NotFound(_)) => StatusCode::NOT_FOUND,
            Error::Persistence(_) | Error::Unsaved { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.0.is_user_visible() {
            self.0.to_string()
        } else {
            error!("Internal error: {}", self.0);
            "Internal server error".to_string()
        };

        let body = match &self.0 {
            Error::Unsaved { app, .. } => json!({ "error": message, "app": app }),
            _ => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

/// `POST /api/describe-app`
#[instrument(skip_all)]
pub async fn describe_app(
    State(state): State<ApiState>,
    Json(request): Json<UrlRequest>,
) -> Result<Json<WebApp>, ApiError> {
    let app = state.catalog.describe(&request.url).await?;
    state.status.record_analysis();
    Ok(Json(app))
}

/// `GET /api/apps`
#[instrument(skip_all)]
pub async fn list_apps(
    State(state): State<ApiState>,
    CallerIdentity(identity): CallerIdentity,
) -> Result<Json<Vec<WebApp>>, ApiError> {
    Ok(Json(state.catalog.list(&identity).await?))
}

/// `POST /api/apps`
#[instrument(skip_all)]
pub async fn create_app(
    State(state): State<ApiState>,
    CallerIdentity(identity): CallerIdentity,
    Json(request): Json<UrlRequest>,
) -> Result<(StatusCode, Json<WebApp>), ApiError> {
    let result = state.catalog.add(&identity, &request.url).await;
    if matches!(&result, Ok(_) | Err(Error::Unsaved { .. })) {
        state.status.record_analysis();
    }
    Ok((StatusCode::CREATED, Json(result?)))
}

/// `DELETE /api/apps/:id`
#[instrument(skip_all)]
pub async fn delete_app(
    State(state): State<ApiState>,
    CallerIdentity(identity): CallerIdentity,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.catalog.delete(&identity, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /metrics`
pub async fn metrics_handler() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        global_metrics().to_prometheus_format(),
    )
}

/// Per-request latency, counters and error tracking
pub async fn track_requests(
    State(status): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    let metrics = global_metrics();
    metrics.inc_active_requests();
    let start = Instant::now();

    let response = next.run(request).await;

    status.record_latency(start.elapsed());
    metrics.dec_active_requests();
    metrics.record_request(&path, response.status().as_u16());
    if response.status().is_server_error() {
        status.record_error();
        warn!(path = %path, status = response.status().as_u16(), "Request failed");
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConfigError, FetchError, InputError};
    use axum::http::Request as HttpRequest;

    async fn identity_from(headers: &[(&str, &str)]) -> Identity {
        let mut builder = HttpRequest::builder().uri("/");
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        let CallerIdentity(identity) = CallerIdentity::from_request_parts(&mut parts, &())
            .await
            .unwrap();
        identity
    }

    #[tokio::test]
    async fn test_identity_from_headers() {
        let identity = identity_from(&[
            (EMAIL_HEADER, " me@example.com "),
            (NAME_HEADER, "Me"),
            (CLAIMS_HEADER, "catalogAccess, admin,"),
        ])
        .await;
        assert_eq!(identity.email.as_deref(), Some("me@example.com"));
        assert_eq!(identity.display_name.as_deref(), Some("Me"));
        assert!(identity.has_claim("catalogAccess"));
        assert!(identity.has_claim("admin"));
        assert_eq!(identity.claims.len(), 2);
    }

    #[tokio::test]
    async fn test_missing_headers_mean_anonymous() {
        let identity = identity_from(&[(EMAIL_HEADER, "   ")]).await;
        assert_eq!(identity, Identity::anonymous());
    }

    #[test]
    fn test_error_status_mapping() {
        let status = |e: Error| ApiError(e).status();
        assert_eq!(status(InputError::Empty.into()), StatusCode::BAD_REQUEST);
        assert_eq!(status(Error::AccessDenied("x".into())), StatusCode::FORBIDDEN);
        assert_eq!(
            status(PersistenceError::NotFound("x".into()).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status(PersistenceError::Unavailable("x".into()).into()),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            status(FetchError::Client("boom".into()).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let response = ApiError(Error::Config(ConfigError::PolicyFile(
            "/etc/secret/policy.json".into(),
        )))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(!body.contains("secret"));
        assert!(body.contains("Internal server error"));
    }
}
