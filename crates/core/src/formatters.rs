use crate::error::PipelineError;
use crate::pipeline::Formatter;
use crate::result::PageMeta;
use crate::types::{
    AnalysisKind, AnalysisReport, DatasetListing, ListingInput, ReferenceInput, ReferenceReport,
    ReportInput,
};

/// Builds the externally visible analysis report.
#[derive(Debug, Default)]
pub struct ReportFormatter;

impl Formatter for ReportFormatter {
    type Input = ReportInput;
    type Output = AnalysisReport;

    fn format(&self, input: ReportInput) -> Result<AnalysisReport, PipelineError> {
        let summary = summarize(
            input.kind,
            input.outcome.metrics.len(),
            input.outcome.insights.len(),
        );
        Ok(AnalysisReport {
            data_id: input.data_id,
            name: input.name,
            analysis_type: input.kind,
            summary,
            metrics: input.outcome.metrics,
            insights: input.outcome.insights,
            details: input.details,
            analyzed_at: input.analyzed_at,
        })
    }
}

fn summarize(kind: AnalysisKind, metrics: usize, insights: usize) -> String {
    format!(
        "{} analysis completed. {} metrics and {} insights generated.",
        kind.label(),
        metrics,
        insights
    )
}

/// Builds the dataset listing response, including the pagination envelope.
#[derive(Debug, Default)]
pub struct DatasetListFormatter;

impl Formatter for DatasetListFormatter {
    type Input = ListingInput;
    type Output = DatasetListing;

    fn format(&self, input: ListingInput) -> Result<DatasetListing, PipelineError> {
        if input.limit <= 0 {
            return Err(PipelineError::formatter("page size must be positive"));
        }
        let message = listing_message(input.selection.active_count);
        Ok(DatasetListing {
            items: input.selection.items,
            total_count: input.selection.active_count,
            message,
            page: PageMeta::new(input.total, input.skip, input.limit),
        })
    }
}

fn listing_message(count: usize) -> String {
    match count {
        0 => "No datasets matched the query.".to_string(),
        1 => "Fetched 1 dataset.".to_string(),
        n => format!("Fetched {n} datasets."),
    }
}

/// Reshapes benchmark figures into the reference response.
#[derive(Debug, Default)]
pub struct ReferenceFormatter;

impl Formatter for ReferenceFormatter {
    type Input = ReferenceInput;
    type Output = ReferenceReport;

    fn format(&self, input: ReferenceInput) -> Result<ReferenceReport, PipelineError> {
        if !input.figures.benchmark_value.is_finite() {
            return Err(PipelineError::formatter("benchmark value must be finite"));
        }
        Ok(ReferenceReport {
            category: input.figures.category,
            benchmark_value: input.figures.benchmark_value,
            sample_size: input.figures.sample_size,
            retrieved_at: input.retrieved_at,
        })
    }
}
