//! Pipeline configuration.
//!
//! Configuration is plain data with sensible defaults. It can be loaded from
//! a TOML file and then patched from `NARRATE_*` environment variables, which
//! is how the speech key usually reaches the process.

use crate::error::{NarrateError, NarrateResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the configuration file looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "narrate.toml";

/// What the pipeline does when synthesis cannot be recovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Write a silent clip of `fallback_duration_ms` and report the fallback
    #[default]
    SilentFallback,
    /// Return the error to the caller
    Propagate,
}

/// What the assembler does with artifacts recorded at different sample rates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SampleRatePolicy {
    /// Resample every artifact to the rate of the first one
    #[default]
    Resample,
    /// Refuse to concatenate mismatched artifacts
    Reject,
}

/// Connection settings for the neural voice engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL; when empty it is derived from `region`
    pub endpoint: String,
    /// Service region, e.g. `eastus`
    pub region: String,
    /// Subscription key
    pub api_key: String,
    /// Value of the `X-Microsoft-OutputFormat` header
    pub output_format: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            region: "eastus".to_string(),
            api_key: String::new(),
            output_format: "audio-24khz-96kbitrate-mono-mp3".to_string(),
            timeout_secs: 60,
            user_agent: format!("narrate/{}", crate::VERSION),
        }
    }
}

impl EngineConfig {
    /// Base URL requests are sent to
    #[must_use]
    pub fn base_url(&self) -> String {
        if self.endpoint.is_empty() {
            format!("https://{}.tts.speech.microsoft.com", self.region)
        } else {
            self.endpoint.trim_end_matches('/').to_string()
        }
    }
}

/// Rendering pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Longest text handed to the engine in one call
    pub max_segment_length: usize,
    /// Split long input into segments; when false the whole text goes in one call
    pub segmentation: bool,
    /// Root for intermediate artifacts
    pub temp_dir: PathBuf,
    /// Length of the silent fallback clip
    pub fallback_duration_ms: u64,
    /// Behaviour on unrecoverable failure
    pub failure_policy: FailurePolicy,
    /// Behaviour on sample rate mismatch during assembly
    pub sample_rate_policy: SampleRatePolicy,
    /// Pause inserted at sentence boundaries by the engine
    pub sentence_silence_ms: u32,
    /// Bitrate for compressed output
    pub output_bitrate_kbps: u32,
    /// Voice engine connection
    pub engine: EngineConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_segment_length: crate::MAX_SEGMENT_LENGTH,
            segmentation: true,
            temp_dir: std::env::temp_dir().join("tts_generator"),
            fallback_duration_ms: crate::FALLBACK_DURATION_MS,
            failure_policy: FailurePolicy::default(),
            sample_rate_policy: SampleRatePolicy::default(),
            sentence_silence_ms: 100,
            output_bitrate_kbps: crate::OUTPUT_BITRATE_KBPS,
            engine: EngineConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from TOML text. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the TOML is malformed or the values
    /// fail validation.
    pub fn from_toml_str(text: &str) -> NarrateResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load<P: AsRef<Path>>(path: P) -> NarrateResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            NarrateError::configuration(format!("Cannot read {}: {e}", path.display()))
        })?;
        info!("Loaded configuration from {}", path.display());
        Self::from_toml_str(&text)
    }

    /// Load `narrate.toml` from the platform config directory if present,
    /// otherwise use defaults. Environment overrides are applied either way.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but is invalid.
    pub fn load_default() -> NarrateResult<Self> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::load(&path)?,
            _ => {
                debug!("No configuration file found, using defaults");
                Self::default()
            }
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Patch values from `NARRATE_*` environment variables
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup("NARRATE_SPEECH_KEY") {
            self.engine.api_key = key;
        }
        if let Some(region) = lookup("NARRATE_SPEECH_REGION") {
            self.engine.region = region;
        }
        if let Some(endpoint) = lookup("NARRATE_SPEECH_ENDPOINT") {
            self.engine.endpoint = endpoint;
        }
        if let Some(dir) = lookup("NARRATE_TEMP_DIR") {
            self.temp_dir = PathBuf::from(dir);
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first invalid field.
    pub fn validate(&self) -> NarrateResult<()> {
        if self.max_segment_length == 0 {
            return Err(NarrateError::configuration(
                "max_segment_length must be greater than 0",
            ));
        }
        if self.fallback_duration_ms == 0 {
            return Err(NarrateError::configuration(
                "fallback_duration_ms must be greater than 0",
            ));
        }
        if self.output_bitrate_kbps == 0 {
            return Err(NarrateError::configuration(
                "output_bitrate_kbps must be greater than 0",
            ));
        }
        if self.engine.endpoint.is_empty() && self.engine.region.is_empty() {
            return Err(NarrateError::configuration(
                "either engine.endpoint or engine.region must be set",
            ));
        }
        if self.engine.timeout_secs == 0 {
            return Err(NarrateError::configuration(
                "engine.timeout_secs must be greater than 0",
            ));
        }
        Ok(())
    }
}

/// Location of `narrate.toml` in the platform config directory
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "narrate")
        .map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
}
