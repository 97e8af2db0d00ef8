//! Turns one piece of text into one audio artifact on disk.

use crate::audio::AudioArtifact;
use crate::engine::{SpeechEngine, SpeechInput, SpeechRequest};
use crate::error::{NarrateError, NarrateResult};
use crate::ssml::Prosody;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Per-call voice settings
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings<'a> {
    /// Engine voice id
    pub voice_id: &'a str,
    /// Playback-speed multiplier
    pub speed: f32,
    /// Treat the text as markup
    pub is_ssml: bool,
}

/// Wraps a [`SpeechEngine`] and persists what it returns
#[derive(Debug, Clone)]
pub struct SynthesisAdapter {
    engine: Arc<dyn SpeechEngine>,
    sentence_silence_ms: u32,
}

impl SynthesisAdapter {
    /// Adapter over `engine`
    #[must_use]
    pub fn new(engine: Arc<dyn SpeechEngine>, sentence_silence_ms: u32) -> Self {
        Self {
            engine,
            sentence_silence_ms,
        }
    }

    /// Underlying engine
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn SpeechEngine> {
        &self.engine
    }

    /// Build the engine request for `text`
    #[must_use]
    pub fn request_for(&self, text: &str, settings: &VoiceSettings<'_>) -> SpeechRequest {
        let input = if settings.is_ssml {
            SpeechInput::Ssml(text.to_string())
        } else {
            SpeechInput::Text(text.to_string())
        };
        SpeechRequest {
            input,
            voice_id: settings.voice_id.to_string(),
            prosody: Prosody::for_speed(settings.speed, self.sentence_silence_ms),
        }
    }

    /// Synthesize `text` into a uniquely named file under `scratch_dir`.
    ///
    /// `label` becomes part of the file name so artifacts can be told apart
    /// in logs.
    ///
    /// # Errors
    ///
    /// Returns a synthesis error if the engine returns nothing, returns audio
    /// that cannot be decoded, or returns a container with no samples. Engine
    /// errors are passed through.
    pub async fn synthesize(
        &self,
        text: &str,
        settings: &VoiceSettings<'_>,
        scratch_dir: &Path,
        label: &str,
    ) -> NarrateResult<AudioArtifact> {
        let request = self.request_for(text, settings);
        debug!(
            "Synthesizing {label} with {} ({} characters, rate {})",
            self.engine.name(),
            text.len(),
            request.prosody.rate_attribute()
        );

        let audio = self.engine.synthesize(&request).await?;
        if audio.bytes.is_empty() {
            return Err(NarrateError::synthesis(format!(
                "Engine produced no audio for {label}"
            )));
        }

        let path = scratch_dir.join(format!(
            "{label}_{}.{}",
            Uuid::new_v4().simple(),
            audio.format.extension()
        ));
        tokio::fs::write(&path, &audio.bytes).await?;

        let artifact = AudioArtifact::probe(&path).map_err(|e| {
            NarrateError::synthesis(format!("Engine output for {label} is unusable: {e}"))
        })?;
        if artifact.duration.is_zero() {
            return Err(NarrateError::synthesis(format!(
                "Engine output for {label} holds no samples"
            )));
        }
        info!(
            "Synthesized {label}: {:.2}s at {} Hz",
            artifact.duration.as_secs_f32(),
            artifact.sample_rate
        );
        Ok(artifact)
    }
}
