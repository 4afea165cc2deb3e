pub mod calculators;
pub mod error;
pub mod formatters;
pub mod pipeline;
pub mod result;
pub mod types;

pub use calculators::{ActiveItemsCalculator, AnalysisCalculator, ScoreCalculator, ScoreWeights};
pub use error::{ErrorKind, PipelineError};
pub use formatters::{DatasetListFormatter, ReferenceFormatter, ReportFormatter};
pub use pipeline::{Calculator, Formatter, Repository, Service};
pub use result::{PageMeta, ServiceResult, ERROR_TYPE_KEY};
