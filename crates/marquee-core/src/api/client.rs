//! Bounded HTTP client shared by the shell and its modules.
//!
//! Every call races the network against a fixed deadline. The outcome is
//! always exactly one of a [`Payload`] or an [`ApiError`]; the deadline timer
//! lives inside the settling future and is dropped with it.

use std::time::Duration;

use anyhow::Result;
use futures::future::{AbortHandle, Abortable, Aborted, BoxFuture};
use futures::FutureExt;
use reqwest::{header, Client, Method};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::config::ShellConfig;

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default request timeout in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Body of a successful response, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Success with an empty body
    Empty,
    /// Success with a body that is not JSON
    Text(String),
    /// Success with a JSON body
    Json(Value),
}

impl Payload {
    fn classify(text: String) -> Self {
        if text.trim().is_empty() {
            return Payload::Empty;
        }
        match serde_json::from_str(&text) {
            Ok(value) => Payload::Json(value),
            Err(_) => Payload::Text(text),
        }
    }

    /// Collapse into a JSON value: empty is `null`, raw text is a string.
    pub fn into_value(self) -> Value {
        match self {
            Payload::Empty => Value::Null,
            Payload::Text(text) => Value::String(text),
            Payload::Json(value) => value,
        }
    }

    /// Deserialize the payload into a typed structure.
    pub fn decode<T: DeserializeOwned>(self) -> Result<T, ApiError> {
        serde_json::from_value(self.into_value())
            .map_err(|e| ApiError::InvalidResponse(e.to_string()))
    }
}

/// The bookkeeping for one outbound call. Dropped when the call settles.
#[derive(Debug)]
pub struct RequestRecord {
    pub url: String,
    pub method: Method,
    pub deadline: Instant,
    abort: AbortHandle,
}

/// A request that has been issued but not yet awaited.
///
/// Hold on to [`PendingRequest::abort_handle`] to cancel explicitly; the
/// deadline applies either way.
pub struct PendingRequest {
    record: RequestRecord,
    timeout: Duration,
    call: Abortable<BoxFuture<'static, Result<Payload, ApiError>>>,
}

impl PendingRequest {
    pub fn record(&self) -> &RequestRecord {
        &self.record
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.record.abort.clone()
    }

    /// Drive the call to completion against its deadline.
    pub async fn settle(self) -> Result<Payload, ApiError> {
        let PendingRequest {
            record,
            timeout,
            call,
        } = self;

        let outcome = tokio::select! {
            result = call => match result {
                Ok(result) => result,
                Err(Aborted) => Err(ApiError::Network {
                    message: "request aborted".to_string(),
                }),
            },
            _ = tokio::time::sleep_until(record.deadline) => {
                record.abort.abort();
                warn!(method = %record.method, url = %record.url, timeout_ms = timeout.as_millis() as u64, "Request timed out");
                Err(ApiError::Timeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        };

        match &outcome {
            Ok(_) => debug!(method = %record.method, url = %record.url, "Request settled"),
            Err(e) => debug!(method = %record.method, url = %record.url, status = e.status(), error = %e, "Request failed"),
        }
        outcome
    }
}

/// API client for the site backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl ApiClient {
    /// Create a new API client against `base_url`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            client,
            base_url,
            timeout,
        })
    }

    pub fn from_config(config: &ShellConfig) -> Result<Self> {
        Self::new(config.api_base_url.clone(), config.api_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Join an endpoint onto the base URL. Absolute URLs pass through.
    pub fn url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Issue a request and return it un-awaited.
    pub fn begin(&self, method: Method, endpoint: &str, body: Option<Value>) -> PendingRequest {
        let url = self.url(endpoint);
        debug!(%method, %url, "Sending request");

        let mut builder = self
            .client
            .request(method.clone(), &url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json");
        if let Some(ref body) = body {
            builder = builder.json(body);
        }

        let call = async move {
            let response = builder.send().await.map_err(|e| ApiError::Network {
                message: e.to_string(),
            })?;
            let status = response.status();
            let text = response.text().await.map_err(|e| ApiError::Network {
                message: e.to_string(),
            })?;

            if status.is_success() {
                Ok(Payload::classify(text))
            } else {
                warn!(status = status.as_u16(), body = %ApiError::truncate_body(&text), "Request returned error status");
                Err(ApiError::from_status(status.as_u16(), &text))
            }
        }
        .boxed();

        let (abort, registration) = AbortHandle::new_pair();
        PendingRequest {
            record: RequestRecord {
                url,
                method,
                deadline: Instant::now() + self.timeout,
                abort,
            },
            timeout: self.timeout,
            call: Abortable::new(call, registration),
        }
    }

    pub async fn get(&self, endpoint: &str) -> Result<Payload, ApiError> {
        self.begin(Method::GET, endpoint, None).settle().await
    }

    pub async fn post<B: Serialize>(&self, endpoint: &str, body: &B) -> Result<Payload, ApiError> {
        let body = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(e.to_string()))?;
        self.begin(Method::POST, endpoint, Some(body)).settle().await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        self.get(endpoint).await?.decode()
    }

    pub async fn post_json<T: DeserializeOwned, B: Serialize>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.post(endpoint, body).await?.decode()
    }
}
