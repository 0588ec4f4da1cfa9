use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tracing::debug;

use crate::recorder::Segment;

/// Fixed upload filename for finalized segments
const SEGMENT_FILE_NAME: &str = "audio.wav";
const SEGMENT_MIME: &str = "audio/wav";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Errors raised while dispatching one segment. Terminal to the attempt,
/// never to the session; dispatch failures are reported once and the
/// pipeline moves on to the next segment. No retry.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Transport-level failure (DNS, connection reset, timeout)
    Network(String),
    /// The service answered with a non-success HTTP status
    Service { status: u16, message: String },
    /// The service answered, but with no recognizable text
    EmptyResult,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Network(msg) => write!(f, "Network error: {}", msg),
            DispatchError::Service { status, message } => {
                write!(f, "Transcription service error (HTTP {}): {}", status, message)
            }
            DispatchError::EmptyResult => write!(f, "Transcription returned no text"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// Transcription dispatch seam: takes one finalized segment and returns the
/// recognized text. The segment is consumed; it is not retained after
/// dispatch.
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, segment: Segment) -> Result<String, DispatchError>;
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: Option<String>,
}

/// Client for an OpenAI-compatible `audio/transcriptions` endpoint
pub struct WhisperClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
}

impl WhisperClient {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, credential: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", credential))
                .context("Invalid authorization header value")?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }
}

#[async_trait::async_trait]
impl Transcriber for WhisperClient {
    async fn transcribe(&self, segment: Segment) -> Result<String, DispatchError> {
        debug!(
            "Dispatching segment {} ({} bytes) to {}",
            segment.index,
            segment.data.len(),
            self.endpoint
        );

        let audio_part = Part::bytes(segment.data)
            .file_name(SEGMENT_FILE_NAME)
            .mime_str(SEGMENT_MIME)
            .map_err(|e| DispatchError::Network(format!("Failed to build audio part: {}", e)))?;

        let form = Form::new()
            .part("file", audio_part)
            .text("model", self.model.clone());

        let response = self
            .http
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(DispatchError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| DispatchError::Network(e.to_string()))?;

        let parsed: TranscriptionResponse =
            serde_json::from_str(&body).map_err(|_| DispatchError::EmptyResult)?;

        match parsed.text {
            Some(text) if !text.trim().is_empty() => {
                debug!("Segment {} transcribed ({} chars)", segment.index, text.len());
                Ok(text.trim().to_string())
            }
            _ => Err(DispatchError::EmptyResult),
        }
    }
}
