//! # Narrate Core
//!
//! Long-form text and SSML to finished speech audio.
//!
//! ## Features
//!
//! - Sentence-aware segmentation of long scripts
//! - Punctuation clean-up that avoids unnatural engine pauses
//! - Neural voice synthesis through a pluggable [`SpeechEngine`]
//! - Concatenation with sample-rate reconciliation
//! - Depth (voice darkening) and speed post-processing
//! - WAV and MP3 output
//!
//! ## Example
//!
//! ```rust,no_run
//! use narrate_core::{HttpSpeechEngine, Pipeline, PipelineConfig, SynthesisRequest};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::load_default()?;
//!     let engine = Arc::new(HttpSpeechEngine::new(&config.engine)?);
//!     let pipeline = Pipeline::new(config, engine)?;
//!
//!     let request = SynthesisRequest::text("Hello. This is a test.").with_depth(3);
//!     let outcome = pipeline.synthesize(&request, Path::new("hello.mp3")).await?;
//!     println!("{} (fallback: {})", outcome.artifact.path.display(), outcome.is_fallback());
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod assembler;
pub mod audio;
pub mod config;
pub mod dsp;
pub mod engine;
pub mod error;
pub mod fluency;
pub mod jobs;
pub mod pipeline;
pub mod postprocess;
pub mod segmenter;
pub mod ssml;
pub mod synthesis;
pub mod tools;
pub mod voices;

// Re-export main types for convenience
pub use assembler::Assembler;
pub use audio::{AudioArtifact, AudioBuffer, AudioFormat, AudioWriter};
pub use config::{EngineConfig, FailurePolicy, PipelineConfig, SampleRatePolicy};
pub use engine::{
    EncodedAudio, EngineVoice, HttpSpeechEngine, SpeechEngine, SpeechInput, SpeechRequest,
};
pub use error::{NarrateError, NarrateResult};
pub use jobs::{JobId, JobRecord, JobStore};
pub use pipeline::{OutcomeStatus, Pipeline, PipelineOutcome, PipelineState, SynthesisRequest};
pub use postprocess::DepthProcessor;
pub use segmenter::{segment_text, TextSegment};
pub use ssml::Prosody;
pub use synthesis::{SynthesisAdapter, VoiceSettings};
pub use voices::{Gender, Voice, VoiceCatalog};

/// Version information for the narrate-core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Sample rate of generated silence
pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;

/// Longest text sent to the engine in one call, in characters
pub const MAX_SEGMENT_LENGTH: usize = 3000;

/// Length of the silent fallback clip
pub const FALLBACK_DURATION_MS: u64 = 5000;

/// Bitrate of compressed output
pub const OUTPUT_BITRATE_KBPS: u32 = 192;

/// Voice used when none is given
pub const DEFAULT_VOICE: &str = "en-US-JennyNeural";
