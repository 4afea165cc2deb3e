use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use metrics::counter;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use strata_core::types::{
    Actor, AggregateStats, AnalysisDetails, AnalysisInput, AnalysisKind, AnalysisReport,
    AnalysisRequest, DatasetListing, DatasetPage, DatasetRecord, ListQuery, ListingInput,
    ReferenceFigures, ReferenceInput, ReferenceReport, ReportInput, ScoreComponents,
};
use strata_core::{
    ActiveItemsCalculator, AnalysisCalculator, Calculator, DatasetListFormatter, Formatter,
    PipelineError, ReferenceFormatter, ReportFormatter, Repository, ScoreCalculator, Service,
    ServiceResult, ERROR_TYPE_KEY,
};

/// Injectable time source shared by the services and the router state.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

fn observe_outcome(service: &'static str, success: bool) {
    let outcome = if success { "ok" } else { "error" };
    counter!("service_executions_total", "service" => service, "outcome" => outcome).increment(1);
}

fn invalid_kind_message() -> String {
    format!(
        "Invalid analysis_type. Must be one of: {}",
        AnalysisKind::ALLOWED.join(", ")
    )
}

/// Orchestrates the dataset analysis flow: load the dataset, run the
/// requested analysis, optionally enrich with aggregate figures and a
/// composite score, then shape the report.
pub struct AnalysisService<R, G> {
    datasets: R,
    aggregates: G,
    analysis: AnalysisCalculator,
    scores: ScoreCalculator,
    formatter: ReportFormatter,
    clock: Clock,
}

impl<R, G> AnalysisService<R, G> {
    pub fn new(datasets: R, aggregates: G, clock: Clock) -> Self {
        Self {
            datasets,
            aggregates,
            analysis: AnalysisCalculator,
            scores: ScoreCalculator::default(),
            formatter: ReportFormatter,
            clock,
        }
    }
}

fn score_components(record: &DatasetRecord, aggregate: &AggregateStats) -> ScoreComponents {
    let performance = if aggregate.max_value > 0.0 {
        (record.value / aggregate.max_value).clamp(0.0, 1.0)
    } else {
        0.0
    };
    ScoreComponents {
        quality: record.score,
        performance,
        reliability: if record.active { 1.0 } else { 0.5 },
    }
}

#[async_trait]
impl<R, G> Service for AnalysisService<R, G>
where
    R: Repository<Input = i64, Output = Option<DatasetRecord>>,
    G: Repository<Input = Option<String>, Output = AggregateStats>,
{
    type Request = AnalysisRequest;
    type Response = AnalysisReport;

    fn name(&self) -> &'static str {
        "dataset_analysis"
    }

    async fn validate_request(&self, request: &AnalysisRequest) -> Result<(), PipelineError> {
        if request.data_id < 1 {
            return Err(PipelineError::validation(
                "data_id must be a positive integer",
            ));
        }
        if request.analysis_type.len() > 50 {
            return Err(PipelineError::validation(
                "analysis_type must be at most 50 characters",
            ));
        }
        if AnalysisKind::from_str(&request.analysis_type).is_err() {
            return Err(PipelineError::validation(invalid_kind_message()));
        }
        if let Some(threshold) = request.threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(PipelineError::validation(
                    "threshold must be between 0 and 1",
                ));
            }
        }
        Ok(())
    }

    async fn before_execute(&self, request: &AnalysisRequest) -> Result<(), PipelineError> {
        debug!(
            service = self.name(),
            data_id = request.data_id,
            kind = %request.analysis_type,
            "starting analysis"
        );
        Ok(())
    }

    async fn run(&self, request: &AnalysisRequest) -> Result<AnalysisReport, PipelineError> {
        // validate_request already vetted the kind string.
        let kind = AnalysisKind::from_str(&request.analysis_type)
            .map_err(|()| PipelineError::validation(invalid_kind_message()))?;

        let record = self.datasets.fetch(request.data_id).await?.ok_or_else(|| {
            PipelineError::not_found(format!("dataset {} does not exist", request.data_id))
                .with_details(json!({ "data_id": request.data_id }))
        })?;

        let outcome = self.analysis.compute(AnalysisInput {
            kind,
            value: record.value,
            score: Some(record.score),
            threshold: request.threshold,
        })?;

        let details = if request.include_details {
            let aggregate = self.aggregates.fetch(Some(record.category.clone())).await?;
            let composite_score = self.scores.compute(score_components(&record, &aggregate))?;
            Some(AnalysisDetails {
                aggregate,
                composite_score,
            })
        } else {
            None
        };

        self.formatter.format(ReportInput {
            data_id: record.id,
            name: record.name,
            kind,
            outcome,
            details,
            analyzed_at: (self.clock)(),
        })
    }

    fn success_metadata(
        &self,
        request: &AnalysisRequest,
        actor: Option<&Actor>,
    ) -> Option<Map<String, Value>> {
        let mut metadata = Map::new();
        metadata.insert("user_id".to_string(), json!(actor.map(|actor| actor.id)));
        metadata.insert("analysis_type".to_string(), json!(request.analysis_type));
        Some(metadata)
    }

    fn handle_error(
        &self,
        error: PipelineError,
        request: &AnalysisRequest,
    ) -> ServiceResult<AnalysisReport> {
        let mut metadata = Map::new();
        metadata.insert(ERROR_TYPE_KEY.to_string(), json!(error.kind().as_str()));
        metadata.insert("data_id".to_string(), json!(request.data_id));
        ServiceResult::fail_with(error.to_string(), metadata)
    }

    async fn after_execute(
        &self,
        request: &AnalysisRequest,
        result: &ServiceResult<AnalysisReport>,
    ) {
        observe_outcome(self.name(), result.success());
        if result.success() {
            info!(
                service = self.name(),
                data_id = request.data_id,
                "analysis completed"
            );
        } else {
            warn!(
                service = self.name(),
                data_id = request.data_id,
                error = result.error().unwrap_or("unknown"),
                "analysis failed"
            );
        }
    }
}

/// Orchestrates the dataset listing flow: load one page, keep the active
/// rows in display form, then attach the pagination envelope.
pub struct DatasetListService<R> {
    pages: R,
    selector: ActiveItemsCalculator,
    formatter: DatasetListFormatter,
}

impl<R> DatasetListService<R> {
    pub fn new(pages: R) -> Self {
        Self {
            pages,
            selector: ActiveItemsCalculator,
            formatter: DatasetListFormatter,
        }
    }
}

#[async_trait]
impl<R> Service for DatasetListService<R>
where
    R: Repository<Input = ListQuery, Output = DatasetPage>,
{
    type Request = ListQuery;
    type Response = DatasetListing;

    fn name(&self) -> &'static str {
        "dataset_listing"
    }

    async fn validate_request(&self, request: &ListQuery) -> Result<(), PipelineError> {
        if request.skip < 0 {
            return Err(PipelineError::validation("skip must be non-negative"));
        }
        if !(1..=1000).contains(&request.limit) {
            return Err(PipelineError::validation("limit must be between 1 and 1000"));
        }
        if let Some(category) = &request.category {
            if category.trim().is_empty() {
                return Err(PipelineError::validation(
                    "category must not be empty when provided",
                ));
            }
        }
        Ok(())
    }

    async fn before_execute(&self, request: &ListQuery) -> Result<(), PipelineError> {
        debug!(
            service = self.name(),
            skip = request.skip,
            limit = request.limit,
            "starting listing"
        );
        Ok(())
    }

    async fn run(&self, request: &ListQuery) -> Result<DatasetListing, PipelineError> {
        let page = self.pages.fetch(request.clone()).await?;
        let total = page.total;
        let selection = self.selector.compute(page.records)?;
        self.formatter.format(ListingInput {
            selection,
            total,
            skip: request.skip,
            limit: request.limit,
        })
    }

    fn success_metadata(
        &self,
        request: &ListQuery,
        _actor: Option<&Actor>,
    ) -> Option<Map<String, Value>> {
        let mut metadata = Map::new();
        metadata.insert("skip".to_string(), json!(request.skip));
        metadata.insert("limit".to_string(), json!(request.limit));
        if let Some(category) = &request.category {
            metadata.insert("category".to_string(), json!(category));
        }
        Some(metadata)
    }

    async fn after_execute(&self, request: &ListQuery, result: &ServiceResult<DatasetListing>) {
        observe_outcome(self.name(), result.success());
        if result.success() {
            info!(
                service = self.name(),
                skip = request.skip,
                limit = request.limit,
                "listing completed"
            );
        } else {
            warn!(
                service = self.name(),
                skip = request.skip,
                limit = request.limit,
                error = result.error().unwrap_or("unknown"),
                "listing failed"
            );
        }
    }
}

/// Orchestrates the reference lookup flow against the external benchmark API.
pub struct ReferenceService<X> {
    benchmarks: X,
    formatter: ReferenceFormatter,
    clock: Clock,
}

impl<X> ReferenceService<X> {
    pub fn new(benchmarks: X, clock: Clock) -> Self {
        Self {
            benchmarks,
            formatter: ReferenceFormatter,
            clock,
        }
    }
}

#[async_trait]
impl<X> Service for ReferenceService<X>
where
    X: Repository<Input = String, Output = ReferenceFigures>,
{
    type Request = String;
    type Response = ReferenceReport;

    fn name(&self) -> &'static str {
        "reference_lookup"
    }

    async fn validate_request(&self, request: &String) -> Result<(), PipelineError> {
        if request.trim().is_empty() {
            return Err(PipelineError::validation("category must not be empty"));
        }
        Ok(())
    }

    async fn before_execute(&self, request: &String) -> Result<(), PipelineError> {
        debug!(service = self.name(), category = %request, "starting lookup");
        Ok(())
    }

    async fn run(&self, request: &String) -> Result<ReferenceReport, PipelineError> {
        let figures = self.benchmarks.fetch(request.clone()).await?;
        self.formatter.format(ReferenceInput {
            figures,
            retrieved_at: (self.clock)(),
        })
    }

    fn success_metadata(
        &self,
        request: &String,
        _actor: Option<&Actor>,
    ) -> Option<Map<String, Value>> {
        let mut metadata = Map::new();
        metadata.insert("category".to_string(), json!(request));
        Some(metadata)
    }

    async fn after_execute(&self, request: &String, result: &ServiceResult<ReferenceReport>) {
        observe_outcome(self.name(), result.success());
        if result.success() {
            info!(service = self.name(), category = %request, "lookup completed");
        } else {
            warn!(
                service = self.name(),
                category = %request,
                error = result.error().unwrap_or("unknown"),
                "reference lookup failed"
            );
        }
    }
}
