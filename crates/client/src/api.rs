//! REST client for the lumeo backend job endpoints.
//!
//! Wraps the HTTP API (job creation, fetch, recovery query,
//! cancellation, output lookup) using [`reqwest`], and implements the
//! [`JobBackend`] seam so the tracker never sees HTTP details.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use lumeo_core::backend::{JobBackend, SubmittedJob};
use lumeo_core::error::CoreError;
use lumeo_core::job::{Job, JobType};
use lumeo_core::types::JobId;

/// HTTP client for one backend deployment.
pub struct BackendApi {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by `POST /api/v1/jobs` after the backend has
/// queued a job.
#[derive(Debug, Deserialize)]
pub struct CreateJobResponse {
    /// The freshly created job record.
    pub job: Job,
    /// Credits the backend estimates the job will consume.
    pub credits_estimated: Option<i64>,
}

/// Response returned by `GET /api/v1/jobs/:id/outputs`.
#[derive(Debug, Deserialize)]
pub struct OutputsResponse {
    #[serde(default)]
    pub outputs: Vec<String>,
}

/// Errors from the backend REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The backend returned a non-2xx status code.
    #[error("backend API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl ApiError {
    /// Whether the error is a plain HTTP 404.
    fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Api { status: 404, .. })
    }
}

impl BackendApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:3000`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self { client, api_url }
    }

    /// Submit a new generation job.
    ///
    /// Sends `POST /api/v1/jobs` with the job type and parameters.
    pub async fn create(
        &self,
        job_type: JobType,
        parameters: &serde_json::Value,
    ) -> Result<CreateJobResponse, ApiError> {
        let body = serde_json::json!({
            "job_type": job_type,
            "parameters": parameters,
        });

        let response = self
            .client
            .post(format!("{}/api/v1/jobs", self.api_url))
            .json(&body)
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// Fetch a job record by id (`GET /api/v1/jobs/:id`).
    pub async fn fetch(&self, job_id: JobId) -> Result<Job, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/{}", self.api_url, job_id))
            .send()
            .await?;

        Self::parse_response(response).await
    }

    /// The newest non-terminal job for the current user created within
    /// the last `window` (`GET /api/v1/jobs/active`). `None` when the
    /// backend answers 404.
    pub async fn recent_active(&self, window: Duration) -> Result<Option<Job>, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/active", self.api_url))
            .query(&[("window_secs", window.as_secs())])
            .send()
            .await?;

        match Self::parse_response(response).await {
            Ok(job) => Ok(Some(job)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Request deletion of a queued or running job
    /// (`DELETE /api/v1/jobs/:id`).
    pub async fn cancel(&self, job_id: JobId) -> Result<(), ApiError> {
        let response = self
            .client
            .delete(format!("{}/api/v1/jobs/{}", self.api_url, job_id))
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// Look up the assets a job produced
    /// (`GET /api/v1/jobs/:id/outputs`).
    pub async fn outputs(&self, job_id: JobId) -> Result<Vec<String>, ApiError> {
        let response = self
            .client
            .get(format!("{}/api/v1/jobs/{}/outputs", self.api_url, job_id))
            .send()
            .await?;

        let parsed: OutputsResponse = Self::parse_response(response).await?;
        Ok(parsed.outputs)
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or an [`ApiError::Api`] with the
    /// status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ApiError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), ApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

#[async_trait]
impl JobBackend for BackendApi {
    async fn create_job(
        &self,
        job_type: JobType,
        parameters: &serde_json::Value,
    ) -> Result<SubmittedJob, CoreError> {
        let response = self
            .create(job_type, parameters)
            .await
            .map_err(|e| CoreError::Submission(e.to_string()))?;

        if let Some(credits) = response.credits_estimated {
            tracing::info!(job_id = response.job.id, credits, "Backend estimated credits");
        }

        Ok(SubmittedJob {
            job: response.job,
            credits_estimated: response.credits_estimated,
        })
    }

    async fn fetch_job(&self, job_id: JobId) -> Result<Job, CoreError> {
        self.fetch(job_id)
            .await
            .map_err(|e| CoreError::Channel(e.to_string()))
    }

    async fn recent_active_job(&self, window: Duration) -> Result<Option<Job>, CoreError> {
        self.recent_active(window)
            .await
            .map_err(|e| CoreError::RecoveryQuery(e.to_string()))
    }

    async fn cancel_job(&self, job_id: JobId) -> Result<(), CoreError> {
        self.cancel(job_id).await.map_err(|e| CoreError::Cancel {
            job_id,
            reason: e.to_string(),
        })
    }

    async fn fetch_outputs(&self, job_id: JobId) -> Result<Vec<String>, CoreError> {
        self.outputs(job_id)
            .await
            .map_err(|e| CoreError::Channel(e.to_string()))
    }
}
