use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Classification of pipeline failures.
///
/// The kind name is what services record under the `error_type` metadata key
/// and what the transport layer reads back when picking a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Unauthorized,
    Forbidden,
    BusinessLogic,
    ExternalService,
    Repository,
    Calculator,
    Formatter,
}

impl ErrorKind {
    /// Returns the canonical kind name used in envelope metadata.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "ValidationError",
            Self::NotFound => "NotFoundError",
            Self::Unauthorized => "UnauthorizedError",
            Self::Forbidden => "ForbiddenError",
            Self::BusinessLogic => "BusinessLogicError",
            Self::ExternalService => "ExternalServiceError",
            Self::Repository => "RepositoryError",
            Self::Calculator => "CalculatorError",
            Self::Formatter => "FormatterError",
        }
    }
}

impl FromStr for ErrorKind {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ValidationError" => Ok(Self::Validation),
            "NotFoundError" => Ok(Self::NotFound),
            "UnauthorizedError" => Ok(Self::Unauthorized),
            "ForbiddenError" => Ok(Self::Forbidden),
            "BusinessLogicError" => Ok(Self::BusinessLogic),
            "ExternalServiceError" => Ok(Self::ExternalService),
            "RepositoryError" => Ok(Self::Repository),
            "CalculatorError" => Ok(Self::Calculator),
            "FormatterError" => Ok(Self::Formatter),
            _ => Err(()),
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ErrorKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        ErrorKind::from_str(&value).map_err(|_| D::Error::custom("unknown error kind"))
    }
}

/// Error raised by any stage of the request pipeline.
///
/// Stages construct the kind that matches their responsibility (a repository
/// raises [`ErrorKind::Repository`], a calculator [`ErrorKind::Calculator`],
/// and so on) and the error propagates unmodified up to the service, which is
/// the single point converting it into a failure envelope.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineError {
    kind: ErrorKind,
    message: String,
    details: Option<Value>,
}

impl PipelineError {
    /// Creates an error of an arbitrary kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
        }
    }

    /// Input failed a declared constraint.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A referenced entity does not exist.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Actor identity is missing or invalid.
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    /// Actor lacks permission for the request.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    /// A domain rule was violated.
    pub fn business(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BusinessLogic, message)
    }

    /// A downstream dependency failed.
    pub fn external(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, message)
    }

    /// Data-source access failed.
    pub fn repository(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Repository, message)
    }

    /// A computation precondition was violated.
    pub fn calculator(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Calculator, message)
    }

    /// An output-shaping precondition was violated.
    pub fn formatter(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Formatter, message)
    }

    /// Attaches structured details describing the failure context.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Returns the failure classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the human-readable message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the structured details, when attached.
    pub fn details(&self) -> Option<&Value> {
        self.details.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const ALL_KINDS: [ErrorKind; 9] = [
        ErrorKind::Validation,
        ErrorKind::NotFound,
        ErrorKind::Unauthorized,
        ErrorKind::Forbidden,
        ErrorKind::BusinessLogic,
        ErrorKind::ExternalService,
        ErrorKind::Repository,
        ErrorKind::Calculator,
        ErrorKind::Formatter,
    ];

    #[test]
    fn kind_names_round_trip() {
        for kind in ALL_KINDS {
            assert_eq!(ErrorKind::from_str(kind.as_str()), Ok(kind));
        }
    }

    #[test]
    fn unknown_kind_name_is_rejected() {
        assert!(ErrorKind::from_str("TeapotError").is_err());
        assert!(ErrorKind::from_str("").is_err());
    }

    #[test]
    fn kind_serializes_as_its_name() {
        let serialized = serde_json::to_value(ErrorKind::NotFound).unwrap();
        assert_eq!(serialized, json!("NotFoundError"));
        let parsed: ErrorKind = serde_json::from_value(json!("RepositoryError")).unwrap();
        assert_eq!(parsed, ErrorKind::Repository);
    }

    #[test]
    fn display_matches_message() {
        let error = PipelineError::validation("data_id must be positive");
        assert_eq!(error.to_string(), "data_id must be positive");
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert!(error.details().is_none());
    }

    #[test]
    fn details_are_attached_without_changing_the_message() {
        let error = PipelineError::repository("query failed")
            .with_details(json!({ "data_id": 7 }));
        assert_eq!(error.to_string(), "query failed");
        assert_eq!(error.details(), Some(&json!({ "data_id": 7 })));
    }
}
