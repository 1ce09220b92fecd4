//! Client for the remote speech-synthesis service.
//!
//! The session engine talks to a [`SpeechBackend`] trait object so tests can
//! script synthesis outcomes without a network. [`OpenAiSpeech`] is the real
//! implementation: a blocking HTTP client for OpenAI-compatible
//! `/audio/speech` endpoints, with a buffered whole-payload mode and a chunked
//! PCM streaming mode.

use serde_json::json;
use std::fmt;
use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};

/// Default endpoint: the forwarding proxy, not the vendor's own URL, so
/// packaged builds work without extra setup. Overridden by `--base-url` or
/// `OPENAI_BASE_URL`.
pub const DEFAULT_BASE_URL: &str = "https://api.castralhub.com/openai/v1";

/// Sample rate of the service's PCM stream format (s16le, mono).
pub const STREAM_SAMPLE_RATE: u32 = 24_000;

const STREAM_CHUNK_BYTES: usize = 8 * 1024;
const ERROR_BODY_MAX_CHARS: usize = 300;

/// One synthesis request. The credential is resolved by the engine before the
/// request is built; a request never exists without one.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub text: String,
    pub voice: String,
    pub api_key: String,
}

/// Failure surfaced by the synthesis client. `Auth` is never retryable and
/// should send the user back to credential entry; service errors carry a
/// retryable classification the engine consults for the streaming fallback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthError {
    Auth(String),
    Service { message: String, retryable: bool },
}

impl SynthError {
    pub fn retryable(&self) -> bool {
        match self {
            SynthError::Auth(_) => false,
            SynthError::Service { retryable, .. } => *retryable,
        }
    }
}

impl fmt::Display for SynthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthError::Auth(msg) => write!(f, "authentication failed: {msg}"),
            SynthError::Service { message, .. } => write!(f, "{message}"),
        }
    }
}

/// Lazy, finite, non-restartable sequence of audio chunks.
pub trait AudioChunkStream: Send {
    /// Next chunk of PCM bytes, `Ok(None)` once the stream is exhausted.
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SynthError>;
}

/// Seam between the engine and the speech service.
pub trait SpeechBackend: Send + Sync {
    /// Buffered mode: block until the full audio payload is available.
    fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthError>;

    /// Streaming mode: open a chunk stream; the first chunk may be played
    /// before the last one is fetched.
    fn open_stream(&self, request: &SpeechRequest) -> Result<Box<dyn AudioChunkStream>, SynthError>;
}

/// Blocking HTTP implementation for OpenAI-compatible speech endpoints.
pub struct OpenAiSpeech {
    http: reqwest::blocking::Client,
    base_url: String,
    model: String,
}

impl OpenAiSpeech {
    pub fn new(base_url: Option<&str>, model: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: resolve_base_url(base_url),
            model: model.to_string(),
        })
    }

    fn speech_url(&self) -> String {
        format!("{}/audio/speech", self.base_url.trim_end_matches('/'))
    }

    fn send(
        &self,
        request: &SpeechRequest,
        streaming: bool,
    ) -> Result<reqwest::blocking::Response, SynthError> {
        let mut body = json!({
            "model": self.model,
            "voice": request.voice,
            "input": request.text,
        });
        if streaming {
            body["response_format"] = json!("pcm");
        }
        let response = self
            .http
            .post(self.speech_url())
            .bearer_auth(&request.api_key)
            .json(&body)
            .send()
            .map_err(classify_transport)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(classify_status(status.as_u16(), &body))
    }
}

impl SpeechBackend for OpenAiSpeech {
    fn synthesize(&self, request: &SpeechRequest) -> Result<Vec<u8>, SynthError> {
        tracing::info!(voice = %request.voice, chars = request.text.len(), "buffered synthesis");
        let response = self.send(request, false)?;
        let bytes = response.bytes().map_err(classify_transport)?;
        Ok(bytes.to_vec())
    }

    fn open_stream(&self, request: &SpeechRequest) -> Result<Box<dyn AudioChunkStream>, SynthError> {
        tracing::info!(voice = %request.voice, chars = request.text.len(), "streaming synthesis");
        let response = self.send(request, true)?;
        Ok(Box::new(HttpChunkStream { response }))
    }
}

struct HttpChunkStream {
    response: reqwest::blocking::Response,
}

impl AudioChunkStream for HttpChunkStream {
    fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, SynthError> {
        let mut buf = vec![0u8; STREAM_CHUNK_BYTES];
        // Reads at the network's pace; backpressure toward the player is
        // implicit because the worker only pulls when the sink wants more.
        match self.response.read(&mut buf) {
            Ok(0) => Ok(None),
            Ok(n) => {
                buf.truncate(n);
                Ok(Some(buf))
            }
            Err(err) => Err(SynthError::Service {
                message: format!("stream interrupted: {err}"),
                retryable: true,
            }),
        }
    }
}

/// Pick the effective base URL: explicit flag/env value, else the proxy.
pub fn resolve_base_url(override_url: Option<&str>) -> String {
    match override_url {
        Some(url) if !url.trim().is_empty() => url.trim().trim_end_matches('/').to_string(),
        _ => DEFAULT_BASE_URL.to_string(),
    }
}

fn classify_transport(err: reqwest::Error) -> SynthError {
    let retryable = err.is_timeout() || err.is_connect() || err.is_request();
    SynthError::Service {
        message: format!("request failed: {err}"),
        retryable,
    }
}

pub(crate) fn classify_status(status: u16, body: &str) -> SynthError {
    let detail: String = body.chars().take(ERROR_BODY_MAX_CHARS).collect();
    match status {
        401 | 403 => SynthError::Auth(if detail.is_empty() {
            "credential rejected by the service".to_string()
        } else {
            detail
        }),
        408 | 429 | 500..=599 => SynthError::Service {
            message: format!("service error {status}: {detail}"),
            retryable: true,
        },
        _ => SynthError::Service {
            message: format!("service error {status}: {detail}"),
            retryable: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_are_non_retryable() {
        for status in [401, 403] {
            let err = classify_status(status, "bad key");
            assert!(matches!(err, SynthError::Auth(_)), "{status}");
            assert!(!err.retryable());
        }
    }

    #[test]
    fn transient_statuses_are_retryable() {
        for status in [408, 429, 500, 502, 503] {
            assert!(classify_status(status, "").retryable(), "{status}");
        }
    }

    #[test]
    fn other_client_errors_are_not_retryable() {
        for status in [400, 404, 422] {
            assert!(!classify_status(status, "").retryable(), "{status}");
        }
    }

    #[test]
    fn oversized_error_bodies_are_truncated() {
        let body = "x".repeat(10_000);
        match classify_status(500, &body) {
            SynthError::Service { message, .. } => {
                assert!(message.len() < 500, "message not truncated: {}", message.len());
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn base_url_falls_back_to_the_proxy_default() {
        assert_eq!(resolve_base_url(None), DEFAULT_BASE_URL);
        assert_eq!(resolve_base_url(Some("  ")), DEFAULT_BASE_URL);
        assert_eq!(
            resolve_base_url(Some("https://example.com/v1/")),
            "https://example.com/v1"
        );
    }
}
