use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use strata_core::{ErrorKind, ServiceResult};

/// Maps a pipeline failure kind to its HTTP status.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::BusinessLogic => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
        ErrorKind::Repository | ErrorKind::Calculator | ErrorKind::Formatter => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Result envelope plus the HTTP status derived from it.
///
/// Success envelopes respond 200. Failure envelopes take their status from
/// the recorded failure kind; an absent or unrecognized kind falls back to
/// 500 so unknown failures never surface as client errors.
pub struct Enveloped<T>(pub ServiceResult<T>);

impl<T: Serialize> IntoResponse for Enveloped<T> {
    fn into_response(self) -> Response {
        let status = if self.0.success() {
            StatusCode::OK
        } else {
            self.0
                .error_kind()
                .map(status_for)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
        };
        let mut response = Json(self.0).into_response();
        *response.status_mut() = status;
        response
    }
}

#[derive(Debug, Serialize)]
struct ProblemDetails {
    #[serde(rename = "type")]
    problem_type: &'static str,
    title: &'static str,
    detail: String,
}

/// RFC 7807 response used for failures outside the pipeline envelope.
pub struct ProblemResponse {
    status: StatusCode,
    body: ProblemDetails,
}

impl ProblemResponse {
    pub fn new<S: Into<String>>(status: StatusCode, problem_type: &'static str, detail: S) -> Self {
        Self {
            status,
            body: ProblemDetails {
                problem_type,
                title: status.canonical_reason().unwrap_or("error"),
                detail: detail.into(),
            },
        }
    }
}

impl IntoResponse for ProblemResponse {
    fn into_response(self) -> Response {
        let mut response = Json(self.body).into_response();
        *response.status_mut() = self.status;
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            axum::http::HeaderValue::from_static("application/problem+json"),
        );
        response
    }
}
