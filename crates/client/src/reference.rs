use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde_json::json;
use thiserror::Error;
use url::Url;

use strata_core::types::ReferenceFigures;
use strata_core::{PipelineError, Repository};

/// Client for the external benchmark publication API.
#[derive(Clone)]
pub struct ReferenceApi {
    http: Client,
    base_url: Url,
}

impl ReferenceApi {
    /// Creates a new client against the provided base URL.
    ///
    /// The base URL should end with a slash so relative joins keep its path.
    pub fn new(base_url: Url, http: Client) -> Self {
        Self { http, base_url }
    }

    /// Fetches the published benchmark figures for one category.
    pub async fn fetch_benchmarks(&self, category: &str) -> Result<ReferenceFigures, ReferenceError> {
        let url = self.base_url.join(&format!("v1/benchmarks/{category}"))?;
        let response = self.http.get(url).send().await?;
        parse_json(response).await
    }
}

/// Errors produced by the reference API client.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("failed to build url: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
}

async fn parse_json(response: Response) -> Result<ReferenceFigures, ReferenceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<unavailable>"));
        return Err(ReferenceError::Status { status, body });
    }

    Ok(response.json().await?)
}

/// Repository adapter exposing the benchmark API to the pipeline.
#[derive(Clone)]
pub struct ReferenceRepository {
    api: ReferenceApi,
}

impl ReferenceRepository {
    pub fn new(api: ReferenceApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Repository for ReferenceRepository {
    type Input = String;
    type Output = ReferenceFigures;

    async fn validate_input(&self, input: &String) -> Result<(), PipelineError> {
        if input.trim().is_empty() {
            return Err(PipelineError::validation("category must not be empty"));
        }
        Ok(())
    }

    async fn provide(&self, input: String) -> Result<ReferenceFigures, PipelineError> {
        match self.api.fetch_benchmarks(&input).await {
            Ok(figures) => Ok(figures),
            Err(ReferenceError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(PipelineError::not_found(format!(
                    "no benchmarks published for category '{input}'"
                ))
                .with_details(json!({ "category": input })))
            }
            Err(ReferenceError::Status { status, body }) => Err(PipelineError::external(
                format!("reference api returned status {status}"),
            )
            .with_details(json!({ "status": status.as_u16(), "body": body }))),
            Err(ReferenceError::Http(err)) if err.is_decode() => Err(PipelineError::external(
                format!("reference api returned a malformed body: {err}"),
            )),
            Err(err) => Err(PipelineError::external(format!(
                "reference api unreachable: {err}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use strata_core::ErrorKind;

    fn api(base_url: &Url) -> ReferenceApi {
        ReferenceApi::new(
            base_url.clone(),
            Client::builder().build().expect("client"),
        )
    }

    #[tokio::test]
    async fn fetch_benchmarks_parses_response() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/")).expect("url");

        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/benchmarks/example");
                then.status(200).json_body(json!({
                    "category": "example",
                    "benchmark_value": 40.0,
                    "sample_size": 128
                }));
            })
            .await;

        let figures = api(&base)
            .fetch_benchmarks("example")
            .await
            .expect("fetch benchmarks");
        mock.assert_async().await;

        assert_eq!(figures.category, "example");
        assert_eq!(figures.benchmark_value, 40.0);
        assert_eq!(figures.sample_size, 128);
    }

    #[tokio::test]
    async fn missing_category_maps_to_not_found() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/")).expect("url");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/benchmarks/unknown");
                then.status(404).body("no such category");
            })
            .await;

        let repository = ReferenceRepository::new(api(&base));
        let error = repository.fetch("unknown".to_string()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn upstream_failure_maps_to_external_service() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/")).expect("url");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/benchmarks/example");
                then.status(503).body("maintenance window");
            })
            .await;

        let repository = ReferenceRepository::new(api(&base));
        let error = repository.fetch("example".to_string()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ExternalService);
        let details = error.details().expect("details recorded");
        assert_eq!(details["status"], 503);
    }

    #[tokio::test]
    async fn malformed_body_maps_to_external_service() {
        let server = MockServer::start_async().await;
        let base = Url::parse(&server.url("/")).expect("url");

        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/benchmarks/example");
                then.status(200).body("not json");
            })
            .await;

        let repository = ReferenceRepository::new(api(&base));
        let error = repository.fetch("example".to_string()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::ExternalService);
    }

    #[tokio::test]
    async fn blank_category_is_rejected_before_any_call() {
        let base = Url::parse("http://127.0.0.1:9/").expect("url");
        let repository = ReferenceRepository::new(api(&base));

        let error = repository.fetch("  ".to_string()).await.unwrap_err();
        assert_eq!(error.kind(), ErrorKind::Validation);
    }
}
