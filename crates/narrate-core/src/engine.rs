//! Neural voice engines.
//!
//! [`SpeechEngine`] is the seam between the pipeline and whatever produces
//! audio for one piece of text. [`HttpSpeechEngine`] talks to a cloud speech
//! service over its REST interface.

use crate::audio::AudioFormat;
use crate::config::EngineConfig;
use crate::error::{NarrateError, NarrateResult};
use crate::ssml::{self, Prosody};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// What the engine is asked to read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechInput {
    /// Plain text; the engine applies voice and prosody
    Text(String),
    /// Caller-supplied markup, passed through as-is apart from adding a root
    Ssml(String),
}

/// One synthesis call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeechRequest {
    /// Content to read
    pub input: SpeechInput,
    /// Engine voice id, e.g. `en-US-JennyNeural`
    pub voice_id: String,
    /// Rate and pitch; ignored for SSML input
    pub prosody: Prosody,
}

impl SpeechRequest {
    /// SSML document to send for this request
    #[must_use]
    pub fn to_ssml(&self) -> String {
        match &self.input {
            SpeechInput::Text(text) => ssml::build_document(text, &self.voice_id, &self.prosody),
            SpeechInput::Ssml(markup) => ssml::prepare_markup(markup, &self.voice_id),
        }
    }
}

/// Encoded audio returned by an engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    /// File contents
    pub bytes: Vec<u8>,
    /// Container of `bytes`
    pub format: AudioFormat,
}

/// Voice advertised by an engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EngineVoice {
    /// Voice id used in requests
    pub short_name: String,
    /// Human-readable name
    #[serde(default)]
    pub display_name: String,
    /// `Male` or `Female`
    #[serde(default)]
    pub gender: String,
    /// Locale, e.g. `en-US`
    #[serde(default)]
    pub locale: String,
}

/// Produces encoded audio for a single request
#[async_trait]
pub trait SpeechEngine: Send + Sync + std::fmt::Debug {
    /// Engine name for logging
    fn name(&self) -> &str;

    /// Synthesize one request
    ///
    /// # Errors
    ///
    /// Returns an error if the engine is unreachable, rejects the request,
    /// or returns no audio.
    async fn synthesize(&self, request: &SpeechRequest) -> NarrateResult<EncodedAudio>;

    /// Voices the engine offers
    ///
    /// # Errors
    ///
    /// Returns an error if the voice list cannot be fetched.
    async fn list_voices(&self) -> NarrateResult<Vec<EngineVoice>>;
}

/// Cloud speech service client
#[derive(Debug, Clone)]
pub struct HttpSpeechEngine {
    client: reqwest::Client,
    base_url: String,
    output_format: String,
}

impl HttpSpeechEngine {
    /// Header carrying the subscription key
    pub const KEY_HEADER: &'static str = "ocp-apim-subscription-key";
    /// Header selecting the returned audio format
    pub const FORMAT_HEADER: &'static str = "X-Microsoft-OutputFormat";

    /// Build a client from `config`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is missing or not a valid
    /// header value, or a network error if the HTTP client cannot be built.
    pub fn new(config: &EngineConfig) -> NarrateResult<Self> {
        if config.api_key.trim().is_empty() {
            return Err(NarrateError::configuration(
                "engine.api_key is empty; set it in the config file or NARRATE_SPEECH_KEY",
            ));
        }

        let mut key = HeaderValue::from_str(config.api_key.trim())
            .map_err(|e| NarrateError::configuration(format!("Invalid api key: {e}")))?;
        key.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(Self::KEY_HEADER), key);

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url(),
            output_format: config.output_format.clone(),
        })
    }

    /// Container implied by the configured output format
    #[must_use]
    pub fn output_container(&self) -> AudioFormat {
        if self.output_format.contains("mp3") {
            AudioFormat::Mp3
        } else {
            AudioFormat::Wav
        }
    }

    fn status_error(status: StatusCode, body: &str) -> NarrateError {
        let detail = if body.trim().is_empty() {
            status.to_string()
        } else {
            format!("{status}: {}", body.trim())
        };
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                NarrateError::configuration(format!("Speech service rejected credentials ({detail})"))
            }
            StatusCode::BAD_REQUEST => {
                NarrateError::synthesis(format!("Speech service rejected request ({detail})"))
            }
            s if s == StatusCode::TOO_MANY_REQUESTS || s.is_server_error() => {
                NarrateError::network(format!("Speech service unavailable ({detail})"))
            }
            _ => NarrateError::synthesis(format!("Unexpected response ({detail})")),
        }
    }
}

#[async_trait]
impl SpeechEngine for HttpSpeechEngine {
    fn name(&self) -> &str {
        "http"
    }

    #[instrument(skip(self, request), fields(voice = %request.voice_id))]
    async fn synthesize(&self, request: &SpeechRequest) -> NarrateResult<EncodedAudio> {
        let body = request.to_ssml();
        debug!("Sending {} bytes of SSML", body.len());

        let response = self
            .client
            .post(format!("{}/cognitiveservices/v1", self.base_url))
            .header(CONTENT_TYPE, "application/ssml+xml")
            .header(Self::FORMAT_HEADER, self.output_format.as_str())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let err = Self::status_error(status, &text);
            warn!("Synthesis request failed: {}", err);
            return Err(err);
        }

        let bytes = response.bytes().await?.to_vec();
        if bytes.is_empty() {
            return Err(NarrateError::synthesis("Speech service returned no audio"));
        }
        debug!("Received {} bytes of audio", bytes.len());
        Ok(EncodedAudio {
            bytes,
            format: self.output_container(),
        })
    }

    async fn list_voices(&self) -> NarrateResult<Vec<EngineVoice>> {
        let response = self
            .client
            .get(format!("{}/cognitiveservices/voices/list", self.base_url))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, &text));
        }
        Ok(response.json::<Vec<EngineVoice>>().await?)
    }
}
