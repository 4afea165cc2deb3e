use std::str::FromStr;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ErrorKind;

/// Metadata key under which the failure kind name is recorded.
pub const ERROR_TYPE_KEY: &str = "error_type";

/// Uniform success/failure envelope returned by every service invocation.
///
/// The fields are private so the envelope can only be built through the
/// factories below, which keeps the invariant intact by construction:
/// success implies data present and error absent, failure implies the
/// opposite. Absent fields are omitted from the serialized form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServiceResult<T> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
}

impl<T> ServiceResult<T> {
    /// Produces a success envelope carrying `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            metadata: None,
        }
    }

    /// Produces a success envelope carrying `data` and request metadata.
    pub fn ok_with(data: T, metadata: Map<String, Value>) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::ok(data)
        }
    }

    /// Produces a failure envelope carrying a human-readable message.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
            metadata: None,
        }
    }

    /// Produces a failure envelope carrying a message and failure metadata.
    pub fn fail_with(error: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::fail(error)
        }
    }

    /// Returns whether the invocation succeeded.
    pub fn success(&self) -> bool {
        self.success
    }

    /// Returns the payload of a success envelope.
    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    /// Returns the message of a failure envelope.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Returns the attached metadata, when present.
    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    /// Parses the failure kind recorded under [`ERROR_TYPE_KEY`].
    ///
    /// Returns `None` for success envelopes and for failures whose metadata
    /// does not name a known kind; the transport layer treats those as 500s.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.metadata
            .as_ref()?
            .get(ERROR_TYPE_KEY)?
            .as_str()
            .and_then(|name| ErrorKind::from_str(name).ok())
    }

    /// Consumes the envelope, returning the payload of a success.
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}

/// Pagination envelope describing how a page relates to the full row set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl PageMeta {
    /// Derives the envelope from skip/limit paging parameters.
    ///
    /// `limit` must be positive; callers clamp query parameters before the
    /// pipeline runs.
    pub fn new(total: i64, skip: i64, limit: i64) -> Self {
        Self {
            page: skip / limit + 1,
            page_size: limit,
            total,
            total_pages: (total + limit - 1) / limit,
        }
    }
}
