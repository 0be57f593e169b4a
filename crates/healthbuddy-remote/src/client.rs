//! HealthBuddy API client
//!
//! Provides a JSON HTTP client for the HealthBuddy API. Every request is
//! bounded by the configured timeout and every non-2xx status is mapped
//! onto an [`ApiError`].
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use healthbuddy_remote::client::ApiClient;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = ApiClient::new("http://localhost:3000/api/v1", Duration::from_secs(30))?;
//! client.health().await?;
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use healthbuddy_core::{config::RemoteConfig, domain::newtypes::IdempotencyKey};
use reqwest::{header::RETRY_AFTER, Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, warn};

use crate::ApiError;

/// Header carrying the operation's idempotency key
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Longest error body kept in an error message
const MAX_ERROR_BODY: usize = 512;

/// HTTP client for HealthBuddy API calls
///
/// Wraps `reqwest::Client` with base URL construction and a per-request
/// timeout.
#[derive(Clone)]
pub struct ApiClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests, without a trailing slash
    base_url: String,
    /// Timeout applied to every request
    timeout: Duration,
}

impl ApiClient {
    /// Creates a client for `base_url` with the given per-request timeout
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;

        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    /// Creates a client from the `remote` configuration section
    pub fn from_config(config: &RemoteConfig) -> Result<Self, ApiError> {
        Self::new(config.base_url.clone(), config.request_timeout())
    }

    /// Returns the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the per-request timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Creates a request builder for the given method and path
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - API path relative to the base URL (e.g. "/goals")
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, url)
    }

    /// Sends a JSON body and returns the JSON response, if any
    ///
    /// Returns `Ok(None)` for a 2xx response without a body.
    pub async fn send_json(
        &self,
        method: Method,
        path: &str,
        body: &Value,
        idempotency_key: Option<&IdempotencyKey>,
    ) -> Result<Option<Value>, ApiError> {
        let mut builder = self.request(method.clone(), path).json(body);
        if let Some(key) = idempotency_key {
            builder = builder.header(IDEMPOTENCY_HEADER, key.to_string());
        }

        debug!(%method, path, "Sending request");
        let response = self.execute(builder).await?;
        self.read_json(response).await
    }

    /// Performs a GET and returns the JSON body
    pub async fn get_json(&self, path: &str) -> Result<Value, ApiError> {
        let response = self.execute(self.request(Method::GET, path)).await?;
        self.read_json(response)
            .await?
            .ok_or_else(|| ApiError::InvalidResponse(format!("GET {} returned no body", path)))
    }

    /// Checks that the API answers `GET /health` with a success status
    pub async fn health(&self) -> Result<(), ApiError> {
        self.execute(self.request(Method::GET, "/health")).await?;
        Ok(())
    }

    /// Sends the request and maps transport errors and error statuses
    async fn execute(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::from_transport(e, self.timeout))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs);

        let mut message = response.text().await.unwrap_or_default();
        if message.len() > MAX_ERROR_BODY {
            let mut cut = MAX_ERROR_BODY;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }

        warn!(status = status.as_u16(), "API returned error status");
        Err(ApiError::from_status(status, message, retry_after))
    }

    /// Parses a success body; empty bodies yield `None`
    async fn read_json(&self, response: Response) -> Result<Option<Value>, ApiError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(e, self.timeout))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}
