//! Shared fixtures: a scripted in-process speech engine and pipeline setup.

#![allow(dead_code)]

use async_trait::async_trait;
use narrate_core::{
    AudioFormat, EncodedAudio, EngineVoice, NarrateError, NarrateResult, Pipeline, PipelineConfig,
    SpeechEngine, SpeechInput, SpeechRequest,
};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::f32::consts::TAU;
use std::io::Cursor;
use std::sync::Arc;
use tempfile::TempDir;

/// Seconds of audio rendered per word
pub const SECONDS_PER_WORD: f32 = 0.05;
/// Shortest clip the engine returns
pub const MIN_SECONDS: f32 = 0.2;

/// Renders each request as a two-tone WAV whose length follows the word count
#[derive(Debug, Default)]
pub struct ToneEngine {
    requests: Mutex<Vec<SpeechRequest>>,
    frames: Mutex<Vec<usize>>,
    failure: Option<NarrateError>,
    fail_calls: HashSet<usize>,
    rates: Vec<u32>,
    header_only: bool,
}

impl ToneEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call fails
    pub fn failing() -> Self {
        Self::failing_with(NarrateError::synthesis("simulated engine outage"))
    }

    /// Every call fails with `err`
    pub fn failing_with(err: NarrateError) -> Self {
        Self {
            failure: Some(err),
            ..Self::default()
        }
    }

    /// Every call returns a WAV header with no samples
    pub fn header_only() -> Self {
        Self {
            header_only: true,
            ..Self::default()
        }
    }

    /// Calls with these zero-based indices fail
    pub fn failing_calls(calls: &[usize]) -> Self {
        Self {
            fail_calls: calls.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Call `n` renders at `rates[n % rates.len()]`
    pub fn with_rates(rates: Vec<u32>) -> Self {
        Self {
            rates,
            ..Self::default()
        }
    }

    pub fn requests(&self) -> Vec<SpeechRequest> {
        self.requests.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Frames rendered by each successful call, in call order
    pub fn rendered_frames(&self) -> Vec<usize> {
        self.frames.lock().clone()
    }

    fn words(input: &SpeechInput) -> usize {
        match input {
            SpeechInput::Text(text) | SpeechInput::Ssml(text) => text.split_whitespace().count(),
        }
    }
}

/// Mono 16-bit WAV of a quiet 300 Hz tone plus a louder high tone
pub fn tone_wav(seconds: f32, rate: u32) -> (Vec<u8>, usize) {
    let frames = (seconds * rate as f32) as usize;
    let high = (rate as f32 * 0.42).min(10_000.0);
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let t = i as f32 / rate as f32;
            let sample = 0.05 * (TAU * 300.0 * t).sin() + 0.2 * (TAU * high * t).sin();
            writer
                .write_sample((sample * f32::from(i16::MAX)) as i16)
                .unwrap();
        }
        writer.finalize().unwrap();
    }
    (cursor.into_inner(), frames)
}

#[async_trait]
impl SpeechEngine for ToneEngine {
    fn name(&self) -> &str {
        "tone"
    }

    async fn synthesize(&self, request: &SpeechRequest) -> NarrateResult<EncodedAudio> {
        let index = {
            let mut requests = self.requests.lock();
            requests.push(request.clone());
            requests.len() - 1
        };
        if let Some(err) = &self.failure {
            return Err(err.clone());
        }
        if self.fail_calls.contains(&index) {
            return Err(NarrateError::synthesis("simulated engine outage"));
        }

        let rate = if self.rates.is_empty() {
            24_000
        } else {
            self.rates[index % self.rates.len()]
        };
        let seconds = if self.header_only {
            0.0
        } else {
            (Self::words(&request.input) as f32 * SECONDS_PER_WORD).max(MIN_SECONDS)
        };
        let (bytes, frames) = tone_wav(seconds, rate);
        self.frames.lock().push(frames);
        Ok(EncodedAudio {
            bytes,
            format: AudioFormat::Wav,
        })
    }

    async fn list_voices(&self) -> NarrateResult<Vec<EngineVoice>> {
        Ok(vec![])
    }
}

/// Config writing intermediates under `scratch`
pub fn config_in(scratch: &TempDir) -> PipelineConfig {
    PipelineConfig {
        temp_dir: scratch.path().join("tts_generator"),
        ..PipelineConfig::default()
    }
}

pub fn pipeline_with(engine: &Arc<ToneEngine>, config: PipelineConfig) -> Pipeline {
    Pipeline::new(config, engine.clone()).unwrap()
}

/// About 7000 characters of punctuated prose
pub fn long_prose() -> String {
    let sentence = "The committee reviewed the quarterly figures in detail. ";
    sentence.repeat(7000 / sentence.len() + 1)
}
