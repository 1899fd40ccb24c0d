//! HTTP Client Implementation using Reqwest

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy},
};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Reqwest-based HTTP client implementation
///
/// Connection pooling and TLS come from reqwest; transport errors and
/// 5xx/429 responses are retried with exponential backoff.
pub struct ReqwestHttpClient {
    client: Client,
}

impl ReqwestHttpClient {
    /// Create a new HTTP client with default configuration.
    ///
    /// The timeout is generous because asset downloads can be large originals.
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(120))
    }

    /// Create a new HTTP client with custom timeout
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("photostream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                BridgeError::NotAvailable(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Convert bridge HttpMethod to reqwest Method
    fn convert_method(method: HttpMethod) -> reqwest::Method {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }

    /// Build reqwest request from bridge request
    fn build_request(&self, request: HttpRequest) -> reqwest::RequestBuilder {
        let method = Self::convert_method(request.method);
        let mut req = self.client.request(method, &request.url);

        // Add headers
        for (key, value) in request.headers {
            req = req.header(key, value);
        }

        // Add body if present
        if let Some(body) = request.body {
            req = req.body(body);
        }

        // Add timeout if specified
        if let Some(timeout) = request.timeout {
            req = req.timeout(timeout);
        }

        req
    }

    /// Send a request once, classifying the result for the retry loop
    async fn send_once(&self, request: HttpRequest) -> Attempt {
        let response = match self.build_request(request).send().await {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                return Attempt::Retry(BridgeError::OperationFailed(
                    "Request timed out".to_string(),
                ))
            }
            Err(e) if e.is_connect() => {
                return Attempt::Retry(BridgeError::OperationFailed(format!(
                    "Connection failed: {}",
                    e
                )))
            }
            Err(e) => return Attempt::Retry(BridgeError::OperationFailed(e.to_string())),
        };

        let status = response.status().as_u16();
        if status >= 500 || status == 429 {
            return Attempt::Retry(BridgeError::OperationFailed(format!(
                "HTTP {} error",
                status
            )));
        }

        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect();

        match response.bytes().await {
            Ok(body) => Attempt::Done(HttpResponse {
                status,
                headers,
                body,
            }),
            // Body cut off mid-transfer
            Err(e) => Attempt::Retry(BridgeError::OperationFailed(e.to_string())),
        }
    }
}

enum Attempt {
    Done(HttpResponse),
    Retry(BridgeError),
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.execute_with_retry(request, RetryPolicy::default())
            .await
    }

    async fn execute_with_retry(
        &self,
        request: HttpRequest,
        policy: RetryPolicy,
    ) -> Result<HttpResponse> {
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(
                attempt,
                max_attempts,
                method = ?request.method,
                url = %request.url,
                "Executing HTTP request"
            );

            let error = match self.send_once(request.clone()).await {
                Attempt::Done(response) => return Ok(response),
                Attempt::Retry(error) => error,
            };

            if attempt >= max_attempts {
                return Err(error);
            }

            let delay = policy.delay_after(attempt);
            warn!(
                error = %error,
                attempt,
                delay_ms = delay.as_millis() as u64,
                "HTTP request failed, retrying"
            );
            sleep(delay).await;
        }
    }
}
