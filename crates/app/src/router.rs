use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, SecondsFormat, Utc};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info};
use uuid::Uuid;

use strata_client::{ReferenceApi, ReferenceRepository};
use strata_core::types::{
    AnalysisReport, AnalysisRequest, DatasetListing, ListQuery, ReferenceReport,
};
use strata_core::Service;
use strata_storage::{AggregateRepository, Database, DatasetPageRepository, DatasetRepository};
use strata_util::Environment;

use crate::auth;
use crate::respond::{Enveloped, ProblemResponse};
use crate::service::{AnalysisService, Clock, DatasetListService, ReferenceService};
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    reference: ReferenceApi,
    environment: Environment,
    clock: Clock,
}

impl AppState {
    pub fn new(
        metrics: PrometheusHandle,
        storage: Database,
        reference: ReferenceApi,
        environment: Environment,
    ) -> Self {
        Self {
            metrics,
            storage,
            reference,
            environment,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    fn analysis_service(&self) -> AnalysisService<DatasetRepository, AggregateRepository> {
        AnalysisService::new(
            self.storage.datasets(),
            self.storage.aggregates(),
            self.clock.clone(),
        )
    }

    fn listing_service(&self) -> DatasetListService<DatasetPageRepository> {
        DatasetListService::new(self.storage.dataset_pages())
    }

    fn reference_service(&self) -> ReferenceService<ReferenceRepository> {
        ReferenceService::new(
            ReferenceRepository::new(self.reference.clone()),
            self.clock.clone(),
        )
    }
}

pub fn app_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/version", get(version))
        .route("/metrics", get(metrics))
        .route("/api/v1/datasets", get(list_datasets))
        .route("/api/v1/datasets/analyze", post(analyze_dataset))
        .route("/api/v1/reference/:category", get(reference_lookup))
        .route("/api/v1/system/db-check", get(db_check))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Json<Value> {
    counter!("http_requests_total", "route" => "healthz").increment(1);
    Json(json!({ "status": "ok", "env": state.environment().as_str() }))
}

async fn version(State(state): State<AppState>) -> Json<Value> {
    counter!("http_requests_total", "route" => "version").increment(1);
    Json(json!({
        "app_name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "env": state.environment().as_str(),
    }))
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let body = telemetry::render_metrics(state.metrics());
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/plain; version=0.0.4")
        .body(Body::from(body))
        .unwrap()
}

#[derive(Debug, Deserialize)]
struct ListParams {
    #[serde(default)]
    skip: Option<i64>,
    #[serde(default)]
    limit: Option<i64>,
    #[serde(default)]
    category: Option<String>,
}

impl ListParams {
    /// Out-of-range paging values are clamped here rather than rejected;
    /// the service still validates for non-HTTP callers.
    fn into_query(self) -> ListQuery {
        ListQuery {
            skip: self.skip.unwrap_or(0).max(0),
            limit: self.limit.unwrap_or(100).clamp(1, 1000),
            category: self.category,
        }
    }
}

async fn list_datasets(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
    headers: HeaderMap,
) -> Enveloped<DatasetListing> {
    counter!("http_requests_total", "route" => "datasets_list").increment(1);
    let request_id = Uuid::new_v4();
    let query = params.into_query();
    info!(
        %request_id,
        skip = query.skip,
        limit = query.limit,
        category = query.category.as_deref().unwrap_or("*"),
        "dataset listing requested"
    );

    let actor = auth::optional_actor(&headers);
    let service = state.listing_service();
    let started = Instant::now();
    let result = service.execute(query, actor).await;
    histogram!("service_execute_duration_seconds", "service" => service.name())
        .record(started.elapsed().as_secs_f64());
    Enveloped(result)
}

async fn analyze_dataset(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<AnalysisRequest>,
) -> Enveloped<AnalysisReport> {
    counter!("http_requests_total", "route" => "datasets_analyze").increment(1);
    let request_id = Uuid::new_v4();
    info!(
        %request_id,
        data_id = request.data_id,
        kind = %request.analysis_type,
        "analysis requested"
    );

    let actor = auth::optional_actor(&headers);
    let service = state.analysis_service();
    let started = Instant::now();
    let result = service.execute(request, actor).await;
    histogram!("service_execute_duration_seconds", "service" => service.name())
        .record(started.elapsed().as_secs_f64());
    Enveloped(result)
}

async fn reference_lookup(
    State(state): State<AppState>,
    Path(category): Path<String>,
    headers: HeaderMap,
) -> Enveloped<ReferenceReport> {
    counter!("http_requests_total", "route" => "reference").increment(1);
    let request_id = Uuid::new_v4();
    info!(%request_id, %category, "reference lookup requested");

    let actor = auth::optional_actor(&headers);
    let service = state.reference_service();
    let started = Instant::now();
    let result = service.execute(category, actor).await;
    histogram!("service_execute_duration_seconds", "service" => service.name())
        .record(started.elapsed().as_secs_f64());
    Enveloped(result)
}

async fn db_check(State(state): State<AppState>) -> Result<Json<Value>, ProblemResponse> {
    counter!("http_requests_total", "route" => "db_check").increment(1);
    let probes = state.storage().probes();
    let checked = async {
        probes.record("connectivity check", state.now()).await?;
        probes.latest().await
    }
    .await;

    match checked {
        Ok(Some(probe)) => Ok(Json(json!({
            "success": true,
            "message": probe.message,
            "timestamp": probe
                .created_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }))),
        Ok(None) => {
            counter!("db_probe_failures_total").increment(1);
            error!("probe row missing after write");
            Err(ProblemResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "db_probe_failed",
                "probe row missing after write",
            ))
        }
        Err(err) => {
            counter!("db_probe_failures_total").increment(1);
            error!(error = %err, "database probe failed");
            Err(ProblemResponse::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "db_probe_failed",
                format!("database probe failed: {err}"),
            ))
        }
    }
}
