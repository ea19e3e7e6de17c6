//! HTTP transport for the collector API.

use crate::signing::sign_payload;
use crate::{Batch, ResponseMeta, Transport, TransportError, TransportResult};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Fallback collector endpoint when none is configured.
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:3000";

const SDK_TYPE_HEADER: &str = "x-stream-tracker-sdk-type";
const SDK_VERSION_HEADER: &str = "x-stream-tracker-sdk-version";
const SDK_TYPE: &str = "rust";

/// HTTP method for one-shot sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    #[default]
    Post,
}

/// HTTP transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Collector base URL.
    pub endpoint: String,
    /// Shared HMAC secret. Empty disables signing.
    pub auth: String,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Version reported in the SDK header.
    pub sdk_version: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth: String::new(),
            timeout_ms: 30_000,
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Request body for POST sends.
#[derive(Debug, Serialize)]
struct PostBody<'a> {
    stream: &'a str,
    auth: String,
    /// JSON-encoded events, sent as a string so the signature covers exact bytes.
    data: String,
    bulk: bool,
}

/// Payload embedded (base64) in the query string for GET sends.
#[derive(Debug, Serialize)]
struct GetPayload<'a> {
    data: String,
    stream: &'a str,
    auth: String,
}

/// Transport that posts batches to the collector over HTTP.
pub struct HttpTransport {
    config: TransportConfig,
    client: Client,
}

impl HttpTransport {
    /// Create a transport with its own HTTP client.
    pub fn new(config: TransportConfig) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| TransportError::bad_request(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn base_url(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url(), path)
    }

    fn with_sdk_headers(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header(SDK_TYPE_HEADER, SDK_TYPE)
            .header(SDK_VERSION_HEADER, &self.config.sdk_version)
    }

    /// Send one event immediately, bypassing any buffering.
    pub async fn put_event<E: Serialize>(
        &self,
        stream: &str,
        event: &E,
        method: Method,
    ) -> TransportResult<ResponseMeta> {
        if stream.is_empty() {
            return Err(TransportError::bad_request("Stream is required"));
        }
        let data = encode_data(event)?;
        self.send(stream, data, method, false).await
    }

    /// Send a list of events immediately as one bulk request.
    pub async fn put_events<E: Serialize>(
        &self,
        stream: &str,
        events: &[E],
        method: Method,
    ) -> TransportResult<ResponseMeta> {
        if method == Method::Get {
            return Err(TransportError::bad_request(
                "GET is not a valid method for bulk sends",
            ));
        }
        if events.is_empty() {
            return Err(TransportError::bad_request("Data must be a non-empty array"));
        }
        if stream.is_empty() {
            return Err(TransportError::bad_request("Stream is required"));
        }

        let data = encode_data(&events)?;
        self.send(stream, data, Method::Post, true).await
    }

    /// Probe the collector's health endpoint.
    pub async fn health(&self) -> TransportResult<ResponseMeta> {
        let request = self.with_sdk_headers(self.client.get(self.url("health")));
        match request.send().await {
            Ok(response) if response.status().as_u16() == 200 => {
                Ok(ResponseMeta::ok("API is up"))
            }
            Ok(response) => Err(TransportError::new(
                response.status().as_u16(),
                "API is down",
            )),
            Err(e) => {
                let err = TransportError::from(e);
                Err(TransportError::new(err.status, "API is down"))
            }
        }
    }

    async fn send(
        &self,
        stream: &str,
        data: String,
        method: Method,
        bulk: bool,
    ) -> TransportResult<ResponseMeta> {
        let auth = sign_payload(&self.config.auth, &data);

        let request = match method {
            Method::Post => {
                let url = if bulk {
                    self.url("bulk")
                } else {
                    self.config.endpoint.clone()
                };
                let body = PostBody {
                    stream,
                    auth,
                    data,
                    bulk,
                };
                self.client.post(url).json(&body)
            }
            Method::Get => {
                let payload = GetPayload { data, stream, auth };
                let encoded = encode_get_payload(&payload)?;
                self.client
                    .get(&self.config.endpoint)
                    .query(&[("data", encoded)])
            }
        };

        debug!(stream = %stream, bulk = bulk, ?method, "Sending to collector");

        let response = self.with_sdk_headers(request).send().await?;
        let status = response.status();
        let message = response.text().await.unwrap_or_default();

        if status.is_success() {
            Ok(ResponseMeta::new(status.as_u16(), message))
        } else {
            warn!(stream = %stream, status = %status, "Collector rejected request");
            Err(TransportError::new(status.as_u16(), message))
        }
    }
}

#[async_trait]
impl<E> Transport<E> for HttpTransport
where
    E: Serialize + Send + Sync + 'static,
{
    async fn post(&self, batch: &Batch<E>) -> Result<ResponseMeta, TransportError> {
        let data = encode_data(&batch.data)?;
        self.send(&batch.stream, data, Method::Post, true).await
    }
}

fn encode_data<T: Serialize + ?Sized>(value: &T) -> TransportResult<String> {
    serde_json::to_string(value)
        .map_err(|e| TransportError::bad_request(format!("data can't be serialized: {e}")))
}

fn encode_get_payload(payload: &GetPayload<'_>) -> TransportResult<String> {
    let json = serde_json::to_vec(payload)
        .map_err(|e| TransportError::bad_request(format!("payload can't be serialized: {e}")))?;
    Ok(BASE64.encode(json))
}
