use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::result::PageMeta;

/// Authenticated identity attached to a request, when present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Actor {
    pub id: i64,
    pub username: String,
}

/// Supported analysis types for the dataset analysis flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisKind {
    Statistical,
    Trend,
    Anomaly,
}

impl AnalysisKind {
    /// Wire names accepted by the analysis request, in declaration order.
    pub const ALLOWED: [&'static str; 3] = ["statistical", "trend", "anomaly"];

    /// Returns the canonical wire representation for the kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Statistical => "statistical",
            Self::Trend => "trend",
            Self::Anomaly => "anomaly",
        }
    }

    /// Returns the capitalized label used in summaries.
    pub fn label(self) -> &'static str {
        match self {
            Self::Statistical => "Statistical",
            Self::Trend => "Trend",
            Self::Anomaly => "Anomaly",
        }
    }
}

impl FromStr for AnalysisKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "statistical" => Ok(Self::Statistical),
            "trend" => Ok(Self::Trend),
            "anomaly" => Ok(Self::Anomaly),
            _ => Err(()),
        }
    }
}

impl Serialize for AnalysisKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AnalysisKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        AnalysisKind::from_str(&value).map_err(|_| D::Error::custom("unknown analysis kind"))
    }
}

/// Request body for the dataset analysis flow.
///
/// `analysis_type` stays a free-form string here so that unsupported values
/// reach the service's `validate_request` stage instead of failing during
/// deserialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub data_id: i64,
    #[serde(default = "default_analysis_type")]
    pub analysis_type: String,
    #[serde(default)]
    pub threshold: Option<f64>,
    #[serde(default)]
    pub include_details: bool,
}

fn default_analysis_type() -> String {
    "statistical".to_string()
}

/// One dataset row as persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub value: f64,
    pub score: f64,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// Aggregate figures over one dataset category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub count: i64,
    pub avg_value: f64,
    pub min_value: f64,
    pub max_value: f64,
}

/// Input consumed by the analysis calculator.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisInput {
    pub kind: AnalysisKind,
    pub value: f64,
    pub score: Option<f64>,
    pub threshold: Option<f64>,
}

/// Analysis calculator output: named metrics plus human-readable insights.
///
/// Metrics use an ordered map so that equal inputs serialize identically.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisOutcome {
    pub metrics: BTreeMap<String, f64>,
    pub insights: Vec<String>,
}

/// Component values feeding the composite score, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreComponents {
    pub quality: f64,
    pub performance: f64,
    pub reliability: f64,
}

/// Supplementary figures returned when `include_details` is requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisDetails {
    pub aggregate: AggregateStats,
    pub composite_score: f64,
}

/// Formatter input for the analysis flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportInput {
    pub data_id: i64,
    pub name: String,
    pub kind: AnalysisKind,
    pub outcome: AnalysisOutcome,
    pub details: Option<AnalysisDetails>,
    pub analyzed_at: DateTime<Utc>,
}

/// Externally visible analysis response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisReport {
    pub data_id: i64,
    pub name: String,
    pub analysis_type: AnalysisKind,
    pub summary: String,
    pub metrics: BTreeMap<String, f64>,
    pub insights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<AnalysisDetails>,
    pub analyzed_at: DateTime<Utc>,
}

/// Query for the dataset listing flow, already clamped by the transport layer.
#[derive(Debug, Clone, PartialEq)]
pub struct ListQuery {
    pub skip: i64,
    pub limit: i64,
    pub category: Option<String>,
}

/// One page of dataset rows plus the total row count before paging.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetPage {
    pub records: Vec<DatasetRecord>,
    pub total: i64,
}

/// Display-ready dataset item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetItem {
    pub id: i64,
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub category: String,
    pub active: bool,
}

/// List calculator output: the active records in display form.
#[derive(Debug, Clone, PartialEq)]
pub struct ListSelection {
    pub items: Vec<DatasetItem>,
    pub active_count: usize,
}

/// Formatter input for the listing flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingInput {
    pub selection: ListSelection,
    pub total: i64,
    pub skip: i64,
    pub limit: i64,
}

/// Externally visible listing response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetListing {
    pub items: Vec<DatasetItem>,
    pub total_count: usize,
    pub message: String,
    pub page: PageMeta,
}

/// Benchmark figures served by the external reference API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceFigures {
    pub category: String,
    pub benchmark_value: f64,
    pub sample_size: i64,
}

/// Formatter input for the reference flow.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceInput {
    pub figures: ReferenceFigures,
    pub retrieved_at: DateTime<Utc>,
}

/// Externally visible reference response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReferenceReport {
    pub category: String,
    pub benchmark_value: f64,
    pub sample_size: i64,
    pub retrieved_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn analysis_kind_round_trips_through_its_wire_name() {
        for name in AnalysisKind::ALLOWED {
            let kind = AnalysisKind::from_str(name).unwrap();
            assert_eq!(kind.as_str(), name);
        }
        assert!(AnalysisKind::from_str("unsupported").is_err());
    }

    #[test]
    fn analysis_request_fills_defaults() {
        let request: AnalysisRequest = serde_json::from_value(json!({ "data_id": 3 })).unwrap();
        assert_eq!(request.data_id, 3);
        assert_eq!(request.analysis_type, "statistical");
        assert_eq!(request.threshold, None);
        assert!(!request.include_details);
    }

    #[test]
    fn analysis_kind_serializes_as_its_wire_name() {
        assert_eq!(
            serde_json::to_value(AnalysisKind::Anomaly).unwrap(),
            json!("anomaly")
        );
    }
}
