/// Grading Service Client
///
/// **Core Responsibility:**
/// Send one assembled grading request to the remote grader and hand back the
/// flat per-case result list.
///
/// **Failure Mapping:**
/// - Transport error: `GradingService` with the default message
/// - Non-2xx status: `GradingService` carrying the body's `message` when present
/// - Body that does not decode: `GradingService` with the default message
///
/// No retries and no request fencing here; fencing is the session's job.

use async_trait::async_trait;
use practice_common::config::{PracticeConfig, GRADING_PATH};
use practice_common::types::{GradingRequest, GradingResponse};
use reqwest::Client;
use serde::Deserialize;
use tracing::{error, info};

use crate::error::PracticeError;

#[async_trait]
pub trait GradingService: Send + Sync {
    async fn grade(&self, request: &GradingRequest) -> Result<GradingResponse, PracticeError>;
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpGradingService {
    client: Client,
    url: String,
}

impl HttpGradingService {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    /// Build a client against `{backend_url}/api/v1/test-cpsubmissions`
    pub fn from_config(config: &PracticeConfig) -> Result<Self, PracticeError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.grading_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| PracticeError::grading(Some(format!("Failed to build HTTP client: {}", e)), None))?;
        Ok(Self::new(client, config.endpoint(GRADING_PATH)))
    }
}

#[async_trait]
impl GradingService for HttpGradingService {
    async fn grade(&self, request: &GradingRequest) -> Result<GradingResponse, PracticeError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!(question_id = %request.question_id, error = %e, "Grading request failed");
                PracticeError::grading(None, None)
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.message);
            error!(
                question_id = %request.question_id,
                status = status.as_u16(),
                message = ?message,
                "Grading service returned an error status"
            );
            return Err(PracticeError::grading(message, Some(status.as_u16())));
        }

        let body: GradingResponse = response.json().await.map_err(|e| {
            error!(question_id = %request.question_id, error = %e, "Malformed grading response");
            PracticeError::grading(None, Some(status.as_u16()))
        })?;

        info!(
            question_id = %request.question_id,
            language = %request.language,
            cases = request.hidden_test_cases.len(),
            results = body.results.len(),
            "Grading response received"
        );
        Ok(body)
    }
}
