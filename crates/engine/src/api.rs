//! REST API client for the automation engine's HTTP endpoints.
//!
//! Wraps job launch and execution listing using [`reqwest`].

use jobwatch_core::execution::{ExecutionListBody, ExecutionRecord};

/// Header carrying the engine API key, when one is configured.
pub const API_KEY_HEADER: &str = "X-API-Key";

/// HTTP client for a single automation engine.
#[derive(Debug, Clone)]
pub struct EngineApi {
    client: reqwest::Client,
    api_url: String,
    webhook_url: String,
    api_key: Option<String>,
}

/// Errors from the engine REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum EngineApiError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The engine returned a non-2xx status code.
    #[error("Engine API error ({status}): {body}")]
    ApiError {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

impl EngineApi {
    /// Create a new API client.
    ///
    /// * `api_url` - Base URL of the engine REST API, e.g. `http://host:5678/api/v1`.
    ///   Launch paths are resolved against the same base unless
    ///   [`with_webhook_url`](Self::with_webhook_url) is used.
    pub fn new(api_url: String) -> Self {
        Self::with_client(reqwest::Client::new(), api_url)
    }

    /// Create an API client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling and custom timeouts).
    pub fn with_client(client: reqwest::Client, api_url: String) -> Self {
        Self {
            client,
            webhook_url: api_url.clone(),
            api_url,
            api_key: None,
        }
    }

    /// Resolve launch paths against a different base URL.
    pub fn with_webhook_url(mut self, webhook_url: String) -> Self {
        self.webhook_url = webhook_url;
        self
    }

    /// Send `api_key` in the [`API_KEY_HEADER`] header on every request.
    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Ask the engine to start a job.
    ///
    /// Sends `POST <webhook base>/<launch_path>` with `payload` as the JSON
    /// body. Any 2xx status counts as accepted; the body is ignored.
    pub async fn trigger(
        &self,
        launch_path: &str,
        payload: &serde_json::Value,
    ) -> Result<(), EngineApiError> {
        let response = self
            .authorized(self.client.post(join_url(&self.webhook_url, launch_path)))
            .json(payload)
            .send()
            .await?;

        Self::check_status(response).await
    }

    /// List the most recent executions, newest first.
    ///
    /// Sends `GET <api base>/executions?limit=N[&workflowId=R]`. The engine
    /// is not required to honour the filter, so callers must still match
    /// records client-side.
    pub async fn get_executions(
        &self,
        limit: usize,
        workflow_id: Option<&str>,
    ) -> Result<Vec<ExecutionRecord>, EngineApiError> {
        let mut query: Vec<(&str, String)> = vec![("limit", limit.to_string())];
        if let Some(id) = workflow_id {
            query.push(("workflowId", id.to_string()));
        }

        let response = self
            .authorized(self.client.get(join_url(&self.api_url, "executions")))
            .query(&query)
            .send()
            .await?;

        let body: ExecutionListBody = Self::parse_response(response).await?;
        Ok(body.into_records())
    }

    // ---- private helpers ----

    fn authorized(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`EngineApiError::ApiError`]
    /// containing the status and body text on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, EngineApiError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineApiError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineApiError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), EngineApiError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Join a base URL and a relative path with exactly one slash between them.
pub fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
