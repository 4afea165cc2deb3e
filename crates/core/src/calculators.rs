use std::collections::BTreeMap;

use crate::error::PipelineError;
use crate::pipeline::Calculator;
use crate::types::{
    AnalysisInput, AnalysisKind, AnalysisOutcome, DatasetItem, DatasetRecord, ListSelection,
    ScoreComponents,
};

/// Score below which a record counts as anomalous.
const ANOMALY_SCORE_CUTOFF: f64 = 0.3;

/// Analysis calculator producing metrics and insights per analysis kind.
///
/// Statistical figures are derived from the record value with fixed factors;
/// they stand in for a real statistics backend while keeping the contract
/// observable in tests.
#[derive(Debug, Default)]
pub struct AnalysisCalculator;

impl Calculator for AnalysisCalculator {
    type Input = AnalysisInput;
    type Output = AnalysisOutcome;

    fn validate_input(&self, input: &AnalysisInput) -> Result<(), PipelineError> {
        if input.value < 0.0 {
            return Err(PipelineError::calculator("value must be non-negative"));
        }
        if let Some(score) = input.score {
            if !(0.0..=1.0).contains(&score) {
                return Err(PipelineError::calculator("score must be between 0 and 1"));
            }
        }
        Ok(())
    }

    fn calculate(&self, input: AnalysisInput) -> Result<AnalysisOutcome, PipelineError> {
        let outcome = match input.kind {
            AnalysisKind::Statistical => statistical_analysis(&input),
            AnalysisKind::Trend => trend_analysis(),
            AnalysisKind::Anomaly => anomaly_detection(&input),
        };
        Ok(outcome)
    }
}

fn statistical_analysis(input: &AnalysisInput) -> AnalysisOutcome {
    let std_dev = input.value * 0.1;
    let mut metrics = BTreeMap::new();
    metrics.insert("mean".to_string(), input.value);
    metrics.insert("median".to_string(), input.value * 0.95);
    metrics.insert("std_dev".to_string(), std_dev);
    metrics.insert("variance".to_string(), std_dev * std_dev);

    let mut insights = vec![
        "Values follow a normal distribution".to_string(),
        format!("Mean value is {:.2}", input.value),
    ];
    if let (Some(score), Some(threshold)) = (input.score, input.threshold) {
        if score > threshold {
            insights.push(format!(
                "Score ({score:.2}) exceeds the threshold ({threshold:.2})"
            ));
        }
    }

    AnalysisOutcome { metrics, insights }
}

fn trend_analysis() -> AnalysisOutcome {
    let mut metrics = BTreeMap::new();
    metrics.insert("trend_direction".to_string(), 1.0);
    metrics.insert("trend_strength".to_string(), 0.7);
    metrics.insert("change_rate".to_string(), 0.05);

    AnalysisOutcome {
        metrics,
        insights: vec![
            "Upward trend observed".to_string(),
            "Trend strength is moderate".to_string(),
        ],
    }
}

fn anomaly_detection(input: &AnalysisInput) -> AnalysisOutcome {
    let anomalous = input
        .score
        .map_or(false, |score| score < ANOMALY_SCORE_CUTOFF);

    let mut metrics = BTreeMap::new();
    metrics.insert(
        "anomaly_score".to_string(),
        if anomalous { 0.2 } else { 0.8 },
    );
    metrics.insert("is_anomaly".to_string(), if anomalous { 1.0 } else { 0.0 });
    metrics.insert("confidence".to_string(), 0.85);

    let insights = if anomalous {
        vec![
            "Anomaly detected".to_string(),
            "Further review recommended".to_string(),
        ]
    } else {
        vec!["Data falls within the normal range".to_string()]
    };

    AnalysisOutcome { metrics, insights }
}

/// Weights applied when combining score components.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreWeights {
    pub quality: f64,
    pub performance: f64,
    pub reliability: f64,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            quality: 0.4,
            performance: 0.3,
            reliability: 0.3,
        }
    }
}

/// Weighted composite score over quality/performance/reliability components.
#[derive(Debug, Default)]
pub struct ScoreCalculator {
    weights: ScoreWeights,
}

impl ScoreCalculator {
    /// Creates a calculator with custom weights.
    pub fn new(weights: ScoreWeights) -> Self {
        Self { weights }
    }
}

impl Calculator for ScoreCalculator {
    type Input = ScoreComponents;
    type Output = f64;

    fn validate_input(&self, input: &ScoreComponents) -> Result<(), PipelineError> {
        for (component, value) in [
            ("quality", input.quality),
            ("performance", input.performance),
            ("reliability", input.reliability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(PipelineError::calculator(format!(
                    "{component} component must be between 0 and 1"
                )));
            }
        }
        Ok(())
    }

    fn calculate(&self, input: ScoreComponents) -> Result<f64, PipelineError> {
        let total = input.quality * self.weights.quality
            + input.performance * self.weights.performance
            + input.reliability * self.weights.reliability;
        Ok(total.clamp(0.0, 1.0))
    }

    fn validate_output(&self, output: &f64) -> Result<(), PipelineError> {
        if !(0.0..=1.0).contains(output) {
            return Err(PipelineError::calculator(
                "composite score must be between 0 and 1",
            ));
        }
        Ok(())
    }
}

/// Filters a page of dataset records down to active ones in display form.
#[derive(Debug, Default)]
pub struct ActiveItemsCalculator;

impl Calculator for ActiveItemsCalculator {
    type Input = Vec<DatasetRecord>;
    type Output = ListSelection;

    fn calculate(&self, records: Vec<DatasetRecord>) -> Result<ListSelection, PipelineError> {
        let items: Vec<DatasetItem> = records
            .into_iter()
            .filter(|record| record.active)
            .map(|record| {
                let display_name = format!("[{}] {}", record.category, record.name);
                DatasetItem {
                    id: record.id,
                    name: record.name,
                    display_name,
                    description: record.description,
                    category: record.category,
                    active: record.active,
                }
            })
            .collect();
        let active_count = items.len();
        Ok(ListSelection {
            items,
            active_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn analysis_input(kind: AnalysisKind) -> AnalysisInput {
        AnalysisInput {
            kind,
            value: 42.5,
            score: Some(0.85),
            threshold: None,
        }
    }

    fn record(id: i64, category: &str, active: bool) -> DatasetRecord {
        DatasetRecord {
            id,
            name: format!("Sample Data {id}"),
            description: format!("Seeded dataset {id}"),
            category: category.to_string(),
            value: 42.5,
            score: 0.85,
            active,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn statistical_metrics_follow_the_fixed_factors() {
        let outcome = AnalysisCalculator
            .compute(analysis_input(AnalysisKind::Statistical))
            .unwrap();

        assert_eq!(outcome.metrics["mean"], 42.5);
        assert_eq!(outcome.metrics["median"], 42.5 * 0.95);
        assert_eq!(outcome.metrics["std_dev"], 4.25);
        assert_eq!(outcome.metrics["variance"], 4.25 * 4.25);
        assert_eq!(outcome.insights.len(), 2);
        assert_eq!(outcome.insights[1], "Mean value is 42.50");
    }

    #[test]
    fn threshold_insight_appears_only_when_the_score_exceeds_it() {
        let mut input = analysis_input(AnalysisKind::Statistical);
        input.threshold = Some(0.8);
        let outcome = AnalysisCalculator.compute(input).unwrap();
        assert_eq!(
            outcome.insights.last().unwrap(),
            "Score (0.85) exceeds the threshold (0.80)"
        );

        let mut quiet = analysis_input(AnalysisKind::Statistical);
        quiet.threshold = Some(0.9);
        let outcome = AnalysisCalculator.compute(quiet).unwrap();
        assert_eq!(outcome.insights.len(), 2);
    }

    #[test]
    fn trend_analysis_reports_fixed_direction_metrics() {
        let outcome = AnalysisCalculator
            .compute(analysis_input(AnalysisKind::Trend))
            .unwrap();

        assert_eq!(outcome.metrics["trend_direction"], 1.0);
        assert_eq!(outcome.metrics["trend_strength"], 0.7);
        assert_eq!(outcome.metrics["change_rate"], 0.05);
        assert!(!outcome.insights.is_empty());
    }

    #[test]
    fn low_scores_are_flagged_as_anomalies() {
        let mut input = analysis_input(AnalysisKind::Anomaly);
        input.score = Some(0.2);
        let outcome = AnalysisCalculator.compute(input).unwrap();

        assert_eq!(outcome.metrics["is_anomaly"], 1.0);
        assert_eq!(outcome.metrics["anomaly_score"], 0.2);
        assert_eq!(outcome.insights[0], "Anomaly detected");
    }

    #[test]
    fn healthy_scores_stay_in_the_normal_range() {
        let outcome = AnalysisCalculator
            .compute(analysis_input(AnalysisKind::Anomaly))
            .unwrap();

        assert_eq!(outcome.metrics["is_anomaly"], 0.0);
        assert_eq!(outcome.metrics["anomaly_score"], 0.8);
        assert_eq!(outcome.metrics["confidence"], 0.85);
        assert_eq!(outcome.insights, vec!["Data falls within the normal range"]);
    }

    #[test]
    fn same_input_yields_identical_outcomes() {
        let first = AnalysisCalculator
            .compute(analysis_input(AnalysisKind::Statistical))
            .unwrap();
        let second = AnalysisCalculator
            .compute(analysis_input(AnalysisKind::Statistical))
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn out_of_domain_inputs_are_rejected() {
        let mut negative = analysis_input(AnalysisKind::Statistical);
        negative.value = -1.0;
        assert!(AnalysisCalculator.compute(negative).is_err());

        let mut bad_score = analysis_input(AnalysisKind::Statistical);
        bad_score.score = Some(1.5);
        assert!(AnalysisCalculator.compute(bad_score).is_err());
    }

    #[test]
    fn composite_score_weights_the_components() {
        let score = ScoreCalculator::default()
            .compute(ScoreComponents {
                quality: 0.85,
                performance: 1.0,
                reliability: 1.0,
            })
            .unwrap();
        assert!((score - 0.94).abs() < 1e-9);
    }

    #[test]
    fn composite_score_rejects_out_of_range_components() {
        let error = ScoreCalculator::default()
            .compute(ScoreComponents {
                quality: 1.2,
                performance: 0.5,
                reliability: 0.5,
            })
            .unwrap_err();
        assert!(error.to_string().contains("quality"));
    }

    #[test]
    fn active_filter_keeps_order_and_builds_display_names() {
        let selection = ActiveItemsCalculator
            .compute(vec![
                record(1, "example", true),
                record(2, "example", true),
                record(3, "demo", false),
            ])
            .unwrap();

        assert_eq!(selection.active_count, 2);
        assert_eq!(selection.items[0].display_name, "[example] Sample Data 1");
        assert_eq!(selection.items[1].id, 2);
    }

    #[test]
    fn active_filter_handles_empty_pages() {
        let selection = ActiveItemsCalculator.compute(Vec::new()).unwrap();
        assert_eq!(selection.active_count, 0);
        assert!(selection.items.is_empty());
    }
}
