use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::PipelineError;
use crate::result::{ServiceResult, ERROR_TYPE_KEY};
use crate::types::Actor;

/// Data-access stage of the pipeline.
///
/// A repository retrieves one unit of domain data from exactly one source
/// (a database pool, an HTTP client, a test double) and translates
/// source-specific failures into [`ErrorKind::Repository`] or
/// [`ErrorKind::ExternalService`] errors. Implementations whose output is an
/// `Option` report "not found" as `None` and leave the decision whether
/// absence is an error to the calling service.
///
/// [`ErrorKind::Repository`]: crate::error::ErrorKind::Repository
/// [`ErrorKind::ExternalService`]: crate::error::ErrorKind::ExternalService
#[async_trait]
pub trait Repository: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    /// Retrieves the requested data from the backing source.
    async fn provide(&self, input: Self::Input) -> Result<Self::Output, PipelineError>;

    /// Validates the input before `provide` runs. Default accepts everything.
    async fn validate_input(&self, _input: &Self::Input) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Acquires any resources `provide` needs. Default does nothing.
    async fn prepare(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Releases resources acquired by `prepare`. Default does nothing.
    async fn cleanup(&self) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Full acquisition cycle: prepare, validate, provide, cleanup.
    ///
    /// `cleanup` runs whenever `prepare` succeeded, including when validation
    /// or `provide` fail; the earlier error wins when both fail.
    async fn fetch(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
        self.prepare().await?;
        let fetched = match self.validate_input(&input).await {
            Ok(()) => self.provide(input).await,
            Err(error) => Err(error),
        };
        let released = self.cleanup().await;
        let output = fetched?;
        released?;
        Ok(output)
    }
}

/// Pure computation stage of the pipeline.
///
/// Calculators are referentially transparent: the same input always produces
/// the same output, with no I/O, no hidden state and no wall-clock reads.
/// When time matters it arrives as an explicit input field.
pub trait Calculator {
    type Input;
    type Output;

    /// Computes the output for the given input.
    fn calculate(&self, input: Self::Input) -> Result<Self::Output, PipelineError>;

    /// Pre-assertion over the input. Default accepts everything.
    fn validate_input(&self, _input: &Self::Input) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Post-assertion over the output. Default accepts everything.
    fn validate_output(&self, _output: &Self::Output) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Runs both validation hooks around `calculate`.
    fn compute(&self, input: Self::Input) -> Result<Self::Output, PipelineError> {
        self.validate_input(&input)?;
        let output = self.calculate(input)?;
        self.validate_output(&output)?;
        Ok(output)
    }
}

/// Output-shaping stage of the pipeline.
///
/// Formatters convert computed values into their externally visible shape
/// (renaming, display strings, serialization structure) and never make
/// business decisions or invoke other stages.
pub trait Formatter {
    type Input;
    type Output;

    /// Reshapes one value into its externally visible form.
    fn format(&self, input: Self::Input) -> Result<Self::Output, PipelineError>;

    /// Applies `format` elementwise, preserving order and stopping at the
    /// first failure.
    fn format_list(&self, items: Vec<Self::Input>) -> Result<Vec<Self::Output>, PipelineError> {
        items.into_iter().map(|item| self.format(item)).collect()
    }
}

/// Orchestration stage of the pipeline.
///
/// `execute` is a template method with a fixed stage order; implementations
/// supply `run` (fetch, then compute, then format) and override the hooks
/// they need. The order is part of the contract and must not be re-derived
/// per service:
///
/// 1. `validate_request`
/// 2. `check_permissions`
/// 3. `before_execute`
/// 4. `run`
/// 5. wrap in a success envelope with `success_metadata`
/// 6. on any error from 1 through 4: `handle_error` builds the failure envelope
/// 7. `after_execute` observes the final envelope on both branches
#[async_trait]
pub trait Service: Send + Sync {
    type Request: Send + Sync;
    type Response: Send + Sync;

    /// Name used in logs and metrics labels.
    fn name(&self) -> &'static str;

    /// The working stages of the flow: fetch raw data through repositories,
    /// compute through calculators, shape the response through formatters.
    async fn run(&self, request: &Self::Request) -> Result<Self::Response, PipelineError>;

    /// Validates the request beyond what deserialization guarantees.
    /// Failures carry [`ErrorKind::Validation`].
    ///
    /// [`ErrorKind::Validation`]: crate::error::ErrorKind::Validation
    async fn validate_request(&self, _request: &Self::Request) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Authorizes the actor for this request. Failures carry
    /// [`ErrorKind::Forbidden`] or [`ErrorKind::Unauthorized`].
    ///
    /// [`ErrorKind::Forbidden`]: crate::error::ErrorKind::Forbidden
    /// [`ErrorKind::Unauthorized`]: crate::error::ErrorKind::Unauthorized
    async fn check_permissions(
        &self,
        _request: &Self::Request,
        _actor: Option<&Actor>,
    ) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Side-effecting hook before the fetch stage; failures propagate like
    /// any other stage error.
    async fn before_execute(&self, _request: &Self::Request) -> Result<(), PipelineError> {
        Ok(())
    }

    /// Side-effecting hook that observes the final envelope. Runs on success
    /// and failure alike.
    async fn after_execute(
        &self,
        _request: &Self::Request,
        _result: &ServiceResult<Self::Response>,
    ) {
    }

    /// Metadata attached to success envelopes. Default: none.
    fn success_metadata(
        &self,
        _request: &Self::Request,
        _actor: Option<&Actor>,
    ) -> Option<Map<String, Value>> {
        None
    }

    /// Converts a stage error into the failure envelope. The default records
    /// the kind name under the `error_type` metadata key, which is what the
    /// transport layer maps to a status code.
    fn handle_error(
        &self,
        error: PipelineError,
        _request: &Self::Request,
    ) -> ServiceResult<Self::Response> {
        let mut metadata = Map::new();
        metadata.insert(
            ERROR_TYPE_KEY.to_string(),
            Value::String(error.kind().as_str().to_string()),
        );
        ServiceResult::fail_with(error.to_string(), metadata)
    }

    /// Template method running the stages in their fixed order.
    async fn execute(
        &self,
        request: Self::Request,
        actor: Option<Actor>,
    ) -> ServiceResult<Self::Response> {
        let staged = async {
            self.validate_request(&request).await?;
            self.check_permissions(&request, actor.as_ref()).await?;
            self.before_execute(&request).await?;
            self.run(&request).await
        }
        .await;

        let result = match staged {
            Ok(response) => match self.success_metadata(&request, actor.as_ref()) {
                Some(metadata) => ServiceResult::ok_with(response, metadata),
                None => ServiceResult::ok(response),
            },
            Err(error) => self.handle_error(error, &request),
        };

        self.after_execute(&request, &result).await;
        result
    }

    /// Applies the full template to each request in order, one envelope per
    /// request.
    async fn execute_batch(
        &self,
        requests: Vec<Self::Request>,
        actor: Option<Actor>,
    ) -> Vec<ServiceResult<Self::Response>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            results.push(self.execute(request, actor.clone()).await);
        }
        results
    }
}
