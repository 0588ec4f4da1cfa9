use anyhow::{bail, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub capture: CaptureConfig,
    pub recorder: RecorderConfig,
    pub transcriber: TranscriberConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct CaptureConfig {
    /// Input device to capture from (e.g. a loopback/monitor device).
    /// Omit to use the platform default.
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Deserialize)]
pub struct RecorderConfig {
    /// Duration of each transcribed segment in milliseconds
    pub chunk_duration_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct TranscriberConfig {
    pub endpoint: String,
    pub model: String,
    /// Bearer credential for the transcription service.
    /// Overridable via TABSCRIBE__TRANSCRIBER__API_KEY.
    pub api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    /// Path of the JSON file holding the persisted transcript
    pub path: String,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("TABSCRIBE").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Bearer credential for the transcription endpoint
    pub fn credential(&self) -> Result<String> {
        match &self.transcriber.api_key {
            Some(key) if !key.trim().is_empty() => Ok(key.clone()),
            _ => bail!(
                "No transcription credential configured \
                (set transcriber.api_key or TABSCRIBE__TRANSCRIBER__API_KEY)"
            ),
        }
    }
}
