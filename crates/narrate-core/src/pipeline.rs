//! Request orchestration.
//!
//! A request moves `Pending -> Processing -> Completed | Failed`. Plain text
//! is normalized for fluency, synthesized in one call or segment by segment,
//! assembled, optionally post-processed and written to the caller's output
//! path. Unrecoverable failures become a silent clip unless the configured
//! [`FailurePolicy`] says otherwise; either way the outcome says which
//! happened.

use crate::assembler::Assembler;
use crate::audio::{AudioArtifact, AudioBuffer, AudioFormat, AudioWriter};
use crate::config::{FailurePolicy, PipelineConfig};
use crate::engine::SpeechEngine;
use crate::error::{NarrateError, NarrateResult};
use crate::fluency;
use crate::postprocess::{DepthProcessor, MAX_DEPTH, MIN_DEPTH};
use crate::segmenter::segment_text;
use crate::synthesis::{SynthesisAdapter, VoiceSettings};
use crate::tools;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, error, info, instrument, warn};

/// Lifecycle of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Accepted, not started
    Pending,
    /// Running
    Processing,
    /// Finished with an artifact
    Completed,
    /// Finished without an artifact
    Failed,
}

impl PipelineState {
    /// Whether moving to `next` is allowed
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Failed)
                | (Self::Processing, Self::Completed | Self::Failed)
        )
    }

    /// Completed or failed
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for PipelineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Processing => write!(f, "processing"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Everything needed to render one piece of text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisRequest {
    /// Plain text or SSML markup
    pub text: String,
    /// Whether `text` is SSML
    pub is_ssml: bool,
    /// Engine voice id
    pub voice_id: String,
    /// Playback-speed multiplier; 1.0 is natural
    pub speed: f32,
    /// Darkening level, 1 (none) to 9
    pub depth: u8,
}

impl SynthesisRequest {
    /// Plain-text request with the default voice, speed 1.0 and depth 1
    #[must_use]
    pub fn text<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            is_ssml: false,
            voice_id: crate::DEFAULT_VOICE.to_string(),
            speed: 1.0,
            depth: MIN_DEPTH,
        }
    }

    /// SSML request; markup is passed to the engine untouched
    #[must_use]
    pub fn ssml<S: Into<String>>(markup: S) -> Self {
        Self {
            is_ssml: true,
            ..Self::text(markup)
        }
    }

    /// Read a script from disk. Files ending in `.xml` or `.ssml` are SSML.
    ///
    /// # Errors
    ///
    /// Returns a file error if the script cannot be read as UTF-8.
    pub fn from_script<P: AsRef<Path>>(path: P) -> NarrateResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| NarrateError::file(format!("Cannot read script {}: {e}", path.display())))?;
        let is_ssml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml") || ext.eq_ignore_ascii_case("ssml"));
        Ok(if is_ssml {
            Self::ssml(text)
        } else {
            Self::text(text)
        })
    }

    /// Set the voice
    #[must_use]
    pub fn with_voice<S: Into<String>>(mut self, voice_id: S) -> Self {
        self.voice_id = voice_id.into();
        self
    }

    /// Set the speed multiplier
    #[must_use]
    pub const fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// Set the depth
    #[must_use]
    pub const fn with_depth(mut self, depth: u8) -> Self {
        self.depth = depth;
        self
    }

    /// Reject requests the pipeline cannot serve
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::InvalidInput`] for blank text, an empty voice,
    /// a non-positive or non-finite speed, or a depth outside `1..=9`.
    pub fn validate(&self) -> NarrateResult<()> {
        if self.text.trim().is_empty() {
            return Err(NarrateError::invalid_input("Text cannot be empty"));
        }
        if self.voice_id.trim().is_empty() {
            return Err(NarrateError::invalid_input("Voice ID cannot be empty"));
        }
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(NarrateError::invalid_input(format!(
                "Speed must be a positive number, got {}",
                self.speed
            )));
        }
        if !(MIN_DEPTH..=MAX_DEPTH).contains(&self.depth) {
            return Err(NarrateError::invalid_input(format!(
                "Depth must be between {MIN_DEPTH} and {MAX_DEPTH}, got {}",
                self.depth
            )));
        }
        Ok(())
    }
}

/// How the output was produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Synthesized speech
    Rendered,
    /// Silence standing in for a failed request
    Fallback {
        /// The error that triggered the fallback
        reason: NarrateError,
    },
}

/// Result of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineOutcome {
    /// The file at the requested output path
    pub artifact: AudioArtifact,
    /// Rendered or fallback
    pub status: OutcomeStatus,
    /// Engine calls made, including failed ones
    pub segments_total: usize,
    /// One [`NarrateError::SegmentError`] per failed engine call
    pub segment_errors: Vec<NarrateError>,
}

impl PipelineOutcome {
    /// Whether the artifact is the silent fallback
    #[must_use]
    pub const fn is_fallback(&self) -> bool {
        matches!(self.status, OutcomeStatus::Fallback { .. })
    }

    /// Engine calls that failed
    #[must_use]
    pub fn segments_failed(&self) -> usize {
        self.segment_errors.len()
    }
}

/// Engine calls made so far for one request
#[derive(Debug, Default)]
struct SegmentTally {
    total: usize,
    errors: Vec<NarrateError>,
}

impl SegmentTally {
    fn record_failure(&mut self, index: usize, err: &NarrateError) -> NarrateError {
        let failure = NarrateError::segment(index, err.to_string());
        self.errors.push(failure.clone());
        failure
    }

    fn into_outcome(self, artifact: AudioArtifact, status: OutcomeStatus) -> PipelineOutcome {
        PipelineOutcome {
            artifact,
            status,
            segments_total: self.total,
            segment_errors: self.errors,
        }
    }
}

/// Synthesized audio before post-processing
enum Synthesized {
    /// One engine call; still encoded on disk
    Artifact(AudioArtifact),
    /// Segments joined in memory
    Buffer(AudioBuffer),
}

/// The rendering pipeline
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    adapter: SynthesisAdapter,
    assembler: Assembler,
    writer: AudioWriter,
}

impl Pipeline {
    /// Pipeline over `engine`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid.
    pub fn new(config: PipelineConfig, engine: Arc<dyn SpeechEngine>) -> NarrateResult<Self> {
        config.validate()?;
        Ok(Self {
            adapter: SynthesisAdapter::new(engine, config.sentence_silence_ms),
            assembler: Assembler::new(config.sample_rate_policy),
            writer: AudioWriter::new(config.output_bitrate_kbps),
            config,
        })
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Check that everything needed to write `format` is installed
    ///
    /// # Errors
    ///
    /// Returns [`NarrateError::DependencyMissing`] if the encoder is absent.
    pub fn ensure_ready_for(format: AudioFormat) -> NarrateResult<()> {
        match format {
            AudioFormat::Mp3 => tools::require_ffmpeg().map(|_| ()),
            AudioFormat::Wav => Ok(()),
        }
    }

    /// Render `request` to `output_path`.
    ///
    /// Intermediate files live in a private directory that is removed when
    /// the call returns.
    ///
    /// # Errors
    ///
    /// Invalid requests and unsupported output paths are always returned.
    /// Anything that fails after that, engine rejections included, is
    /// returned only under [`FailurePolicy::Propagate`] or when even the
    /// fallback clip cannot be written.
    #[instrument(skip_all, fields(voice = %request.voice_id, speed = request.speed, depth = request.depth))]
    pub async fn synthesize(
        &self,
        request: &SynthesisRequest,
        output_path: &Path,
    ) -> NarrateResult<PipelineOutcome> {
        request.validate()?;
        let output_format = AudioFormat::from_path(output_path)?;
        info!(
            "Request {} -> {} ({} characters, ssml: {})",
            PipelineState::Pending,
            PipelineState::Processing,
            request.text.chars().count(),
            request.is_ssml
        );

        let mut tally = SegmentTally::default();
        match self.run(request, output_path, output_format, &mut tally).await {
            Ok(artifact) => {
                info!(
                    "Request {}: {} ({:.2}s)",
                    PipelineState::Completed,
                    artifact.path.display(),
                    artifact.duration.as_secs_f32()
                );
                Ok(tally.into_outcome(artifact, OutcomeStatus::Rendered))
            }
            Err(err) => self.recover(err, tally, output_path),
        }
    }

    /// Render the script at `script_path`
    ///
    /// # Errors
    ///
    /// Same as [`Self::synthesize`], plus a file error if the script cannot
    /// be read.
    pub async fn synthesize_file(
        &self,
        script_path: &Path,
        output_path: &Path,
        voice_id: &str,
        speed: f32,
        depth: u8,
    ) -> NarrateResult<PipelineOutcome> {
        let request = SynthesisRequest::from_script(script_path)?
            .with_voice(voice_id)
            .with_speed(speed)
            .with_depth(depth);
        self.synthesize(&request, output_path).await
    }

    async fn run(
        &self,
        request: &SynthesisRequest,
        output_path: &Path,
        output_format: AudioFormat,
        tally: &mut SegmentTally,
    ) -> NarrateResult<AudioArtifact> {
        let scratch = self.scratch_dir()?;
        let synthesized = self.render(request, scratch.path(), tally).await?;
        self.finish(synthesized, request, output_path, output_format)
    }

    fn scratch_dir(&self) -> NarrateResult<TempDir> {
        std::fs::create_dir_all(&self.config.temp_dir).map_err(|e| {
            NarrateError::file(format!(
                "Cannot create temp dir {}: {e}",
                self.config.temp_dir.display()
            ))
        })?;
        Ok(tempfile::Builder::new()
            .prefix("narrate_")
            .tempdir_in(&self.config.temp_dir)?)
    }

    async fn render(
        &self,
        request: &SynthesisRequest,
        scratch: &Path,
        tally: &mut SegmentTally,
    ) -> NarrateResult<Synthesized> {
        let settings = VoiceSettings {
            voice_id: &request.voice_id,
            speed: request.speed,
            is_ssml: request.is_ssml,
        };
        let text: Cow<'_, str> = if request.is_ssml {
            Cow::Borrowed(&request.text)
        } else {
            Cow::Owned(fluency::normalize(&request.text))
        };

        let max_length = self.config.max_segment_length;
        if request.is_ssml || !self.config.segmentation || text.chars().count() <= max_length {
            debug!("Synthesizing in a single call");
            tally.total = 1;
            return match self
                .adapter
                .synthesize(text.trim(), &settings, scratch, "single")
                .await
            {
                Ok(artifact) => Ok(Synthesized::Artifact(artifact)),
                Err(err) => {
                    tally.record_failure(0, &err);
                    Err(err)
                }
            };
        }

        let mut artifacts = Vec::new();
        for segment in segment_text(&text, max_length) {
            tally.total += 1;
            let label = format!("segment_{:03}", segment.index);
            match self
                .adapter
                .synthesize(segment.text, &settings, scratch, &label)
                .await
            {
                Ok(artifact) => artifacts.push(artifact),
                Err(err) => {
                    let failure = tally.record_failure(segment.index, &err);
                    warn!("{failure}; skipping");
                }
            }
        }
        info!("Synthesized {} of {} segments", artifacts.len(), tally.total);

        if artifacts.is_empty() {
            return Err(NarrateError::synthesis(format!(
                "All {} segments failed",
                tally.total
            )));
        }
        Ok(Synthesized::Buffer(self.assembler.assemble(&artifacts)?))
    }

    fn finish(
        &self,
        synthesized: Synthesized,
        request: &SynthesisRequest,
        output_path: &Path,
        output_format: AudioFormat,
    ) -> NarrateResult<AudioArtifact> {
        let processor = DepthProcessor::new(request.depth, request.speed);
        if processor.is_active() {
            let buffer = match synthesized {
                Synthesized::Artifact(artifact) => artifact.load()?,
                Synthesized::Buffer(buffer) => buffer,
            };
            info!("Post-processing at depth {}, speed {}", request.depth, request.speed);
            return self.writer.write(&processor.process(&buffer), output_path);
        }

        match synthesized {
            Synthesized::Artifact(artifact) if artifact.format == output_format => {
                debug!("Copying engine output unchanged");
                if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::copy(&artifact.path, output_path)?;
                Ok(AudioArtifact {
                    path: output_path.to_path_buf(),
                    ..artifact
                })
            }
            Synthesized::Artifact(artifact) => self.writer.write(&artifact.load()?, output_path),
            Synthesized::Buffer(buffer) => self.writer.write(&buffer, output_path),
        }
    }

    fn recover(
        &self,
        err: NarrateError,
        tally: SegmentTally,
        output_path: &Path,
    ) -> NarrateResult<PipelineOutcome> {
        if self.config.failure_policy == FailurePolicy::Propagate {
            error!("Request {} ({}): {err}", PipelineState::Failed, err.category());
            return Err(err);
        }

        error!(
            "Synthesis failed ({}), writing {} ms of silence: {err}",
            err.category(),
            self.config.fallback_duration_ms
        );
        let silence = AudioBuffer::silent(
            Duration::from_millis(self.config.fallback_duration_ms),
            crate::DEFAULT_SAMPLE_RATE,
        );
        let artifact = self.writer.write(&silence, output_path)?;
        Ok(tally.into_outcome(artifact, OutcomeStatus::Fallback { reason: err }))
    }
}
