//! Transport: turns a [`ChatRequest`] into a stream of [`ChatResponseDelta`]s.
//!
//! The chat engine only sees the [`ChatTransport`] trait. [`HttpTransport`]
//! is the production implementation: it POSTs to `{base_url}/api/chat` and
//! decodes the response body as newline-delimited JSON, one delta per line.
//!
//! ```text
//! {"model":"llama3.1","message":{"role":"assistant","content":"The"},"done":false}
//! {"model":"llama3.1","message":{"role":"assistant","content":" sky"},"done":false}
//! {"model":"llama3.1","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop",...}
//! ```
//!
//! Lines may be split across network chunks; the decoder buffers bytes until a
//! full line is available. A line carrying an `error` field ends the stream
//! with an error instead of being parsed as a delta.

use crate::retry::{RetryConfig, retry_with_backoff_conditional};
use crate::types::{ChatOptions, ChatRequest, ChatResponseDelta};
use crate::{Error, Result};
use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use serde_json::Value;
use std::pin::Pin;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A pinned, boxed stream of response deltas for one request.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<ChatResponseDelta>> + Send>>;

/// Something that can run a streaming chat request.
///
/// Implementations must yield deltas in arrival order and finish with exactly
/// one delta whose `done` flag is set.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn chat(&self, request: ChatRequest, cancel: CancellationToken) -> Result<DeltaStream>;
}

/// NDJSON-over-HTTP transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    retry: RetryConfig,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(base_url, client))
    }

    /// Use an existing `reqwest::Client` (shared pools, custom TLS, ...).
    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        }
    }

    pub fn from_options(options: &ChatOptions) -> Result<Self> {
        Ok(Self::new(&options.base_url, Duration::from_secs(options.timeout))?
            .with_retry(options.retry.clone()))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    async fn open(&self, url: &str, request: &ChatRequest) -> Result<reqwest::Response> {
        let response = self.client.post(url).json(request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|e| {
                log::warn!("Failed to read error response body: {}", e);
                "Unknown error (failed to read response body)".to_string()
            });
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("error")?.as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(match Error::from_server_message(message) {
                Error::Api(msg) => Error::api(format!("HTTP {}: {}", status, msg)),
                other => other,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn chat(&self, request: ChatRequest, cancel: CancellationToken) -> Result<DeltaStream> {
        let url = self.chat_url();
        log::debug!(
            "POST {} (model: {}, {} message(s))",
            url,
            request.model,
            request.messages.len()
        );

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::cancelled()),
            response = retry_with_backoff_conditional(self.retry.clone(), || self.open(&url, &request)) => response?,
        };

        Ok(decode_ndjson(
            response.bytes_stream().map(|chunk| chunk.map_err(Error::from)),
        ))
    }
}

/// Decode a byte stream of newline-delimited JSON into deltas.
pub fn decode_ndjson<S, B>(bytes: S) -> DeltaStream
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(ndjson_deltas(bytes))
}

fn ndjson_deltas<S, B>(bytes: S) -> impl Stream<Item = Result<ChatResponseDelta>> + Send
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    try_stream! {
        let mut bytes = Box::pin(bytes);
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            buffer.extend_from_slice(chunk.as_ref());

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                if let Some(delta) = decode_line(&line)? {
                    yield delta;
                }
            }
        }

        if let Some(delta) = decode_line(&buffer)? {
            yield delta;
        }
    }
}

/// Decode one response line. Blank lines yield `None`.
pub fn decode_line(line: &[u8]) -> Result<Option<ChatResponseDelta>> {
    let text = std::str::from_utf8(line)
        .map_err(|e| Error::stream(format!("Invalid UTF-8 in response line: {}", e)))?
        .trim();
    if text.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| Error::stream(format!("Malformed response line: {}", e)))?;

    if let Some(error) = value.get("error") {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(Error::from_server_message(message));
    }

    let delta = serde_json::from_value(value)
        .map_err(|e| Error::stream(format!("Unexpected response line: {}", e)))?;
    Ok(Some(delta))
}
