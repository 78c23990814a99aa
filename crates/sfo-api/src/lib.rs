//! ---
//! sfo_section: "05-networking-external-interfaces"
//! sfo_subsection: "module"
//! sfo_type: "source"
//! sfo_scope: "code"
//! sfo_description: "HTTP health check routes for external monitors."
//! sfo_version: "v0.0.0-prealpha"
//! sfo_owner: "tbd"
//! ---
//! Health check routes.
//!
//! `GET <route>` probes every enabled kind and answers 200, 207 or 503 by overall
//! status. `GET <route>/:kind` probes one kind and answers 200 only when all of its
//! resources are healthy, 503 otherwise, and 404 for kinds that are not monitored.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use sfo_common::ResourceKind;
use sfo_core::{AggregateReport, HealthAggregator, OverallStatus};
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Shared state handed to the health handlers.
#[derive(Debug)]
pub struct HealthApiState {
    aggregator: Arc<HealthAggregator>,
    services: Vec<ResourceKind>,
    version: String,
}

impl HealthApiState {
    pub fn new(
        aggregator: Arc<HealthAggregator>,
        services: Vec<ResourceKind>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            aggregator,
            services,
            version: version.into(),
        }
    }

    pub fn services(&self) -> &[ResourceKind] {
        &self.services
    }

    async fn report(&self) -> AggregateReport {
        self.aggregator.check_all(&self.services).await
    }

    async fn report_for(&self, raw_kind: &str) -> Result<AggregateReport, ApiError> {
        let kind: ResourceKind = raw_kind
            .parse()
            .map_err(|err: String| ApiError::new(StatusCode::NOT_FOUND, err))?;
        if !self.services.contains(&kind) || !self.aggregator.has_probe(kind) {
            return Err(ApiError::new(
                StatusCode::NOT_FOUND,
                format!("{} is not monitored", kind),
            ));
        }
        let report = self.aggregator.check_kind(kind).await;
        report.for_kind(kind).ok_or_else(|| {
            ApiError::new(StatusCode::NOT_FOUND, format!("{} is not monitored", kind))
        })
    }

    fn response(&self, report: AggregateReport) -> HealthResponse {
        HealthResponse {
            report,
            version: self.version.clone(),
        }
    }
}

/// Mount the health routes under `route_path`.
pub fn health_router(state: Arc<HealthApiState>, route_path: &str) -> Router {
    let base = route_path.trim_end_matches('/');
    let root = if base.is_empty() { "/" } else { base };
    Router::new()
        .route(root, get(get_health))
        .route(&format!("{}/:kind", base), get(get_kind_health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Aggregate report plus the running version.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    #[serde(flatten)]
    pub report: AggregateReport,
    pub version: String,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

fn overall_code(status: OverallStatus) -> StatusCode {
    StatusCode::from_u16(status.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

async fn get_health(
    State(state): State<Arc<HealthApiState>>,
) -> (StatusCode, Json<HealthResponse>) {
    let report = state.report().await;
    debug!(status = %report.overall_status, total = report.summary.total, "health report served");
    (overall_code(report.overall_status), Json(state.response(report)))
}

async fn get_kind_health(
    State(state): State<Arc<HealthApiState>>,
    Path(kind): Path<String>,
) -> Result<(StatusCode, Json<HealthResponse>), ApiError> {
    let report = state.report_for(&kind).await?;
    let code = if report.overall_status == OverallStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((code, Json(state.response(report))))
}
