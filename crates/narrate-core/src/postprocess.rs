//! Depth and tone post-processing.
//!
//! Higher depth darkens the voice: a lower low-pass cutoff plus a boosted
//! 180-700 Hz band mixed back in. Extreme speed requests get a mild tempo
//! correction, and every processed clip is faded at both ends.

use crate::audio::AudioBuffer;
use crate::dsp;
use tracing::debug;

/// Lowest depth; no darkening
pub const MIN_DEPTH: u8 = 1;
/// Highest depth
pub const MAX_DEPTH: u8 = 9;

/// Low-pass cutoff at depth 0
pub const BASE_CUTOFF_HZ: f32 = 18_000.0;
/// Cutoff reduction per depth step
pub const CUTOFF_STEP_HZ: f32 = 1_200.0;
/// Lower edge of the boosted band
pub const BOOST_LOW_HZ: f32 = 180.0;
/// Upper edge of the boosted band
pub const BOOST_HIGH_HZ: f32 = 700.0;
/// Band gain per depth step above 1
pub const BOOST_DB_PER_STEP: f32 = 1.5;

/// Requests slower than this get [`SLOW_CORRECTION`]
pub const SLOW_SPEED_THRESHOLD: f32 = 0.8;
/// Requests faster than this get [`FAST_CORRECTION`]
pub const FAST_SPEED_THRESHOLD: f32 = 1.2;
/// Tempo multiplier applied to slow requests
pub const SLOW_CORRECTION: f32 = 0.9;
/// Tempo multiplier applied to fast requests
pub const FAST_CORRECTION: f32 = 1.15;

/// Fade length cap
pub const MAX_FADE_MS: u64 = 100;
/// Fades never exceed this fraction of the clip
pub const FADE_FRACTION: u64 = 30;

/// Low-pass cutoff for `depth`
#[must_use]
pub fn cutoff_for_depth(depth: u8) -> f32 {
    CUTOFF_STEP_HZ.mul_add(-f32::from(depth), BASE_CUTOFF_HZ)
}

/// Gain applied to the 180-700 Hz band for `depth`
#[must_use]
pub fn boost_db_for_depth(depth: u8) -> f32 {
    f32::from(depth.saturating_sub(1)) * BOOST_DB_PER_STEP
}

/// Tempo correction for requests outside the comfortable speed range
#[must_use]
pub fn speed_correction(speed: f32) -> Option<f32> {
    if speed < SLOW_SPEED_THRESHOLD {
        Some(SLOW_CORRECTION)
    } else if speed > FAST_SPEED_THRESHOLD {
        Some(FAST_CORRECTION)
    } else {
        None
    }
}

/// Whether a request with these settings is post-processed at all
#[must_use]
pub fn needs_processing(depth: u8, speed: f32) -> bool {
    depth > MIN_DEPTH || speed_correction(speed).is_some()
}

/// Fade length in samples: `min(100 ms, duration / 30)`
#[must_use]
pub fn fade_samples(buffer: &AudioBuffer) -> usize {
    let cap = (u64::from(buffer.sample_rate) * MAX_FADE_MS / 1000) as usize;
    cap.min(buffer.len() / FADE_FRACTION as usize)
}

/// Applies depth darkening, speed correction and edge fades
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DepthProcessor {
    depth: u8,
    speed: f32,
}

impl DepthProcessor {
    /// Processor for a request at `depth` and `speed`. Depth is clamped to
    /// `1..=9`.
    #[must_use]
    pub fn new(depth: u8, speed: f32) -> Self {
        Self {
            depth: depth.clamp(MIN_DEPTH, MAX_DEPTH),
            speed,
        }
    }

    /// Configured depth
    #[must_use]
    pub const fn depth(&self) -> u8 {
        self.depth
    }

    /// Whether [`Self::process`] would change anything
    #[must_use]
    pub fn is_active(&self) -> bool {
        needs_processing(self.depth, self.speed)
    }

    /// Produce a processed copy of `input`
    #[must_use]
    pub fn process(&self, input: &AudioBuffer) -> AudioBuffer {
        let rate = input.sample_rate;
        let mut samples = match speed_correction(self.speed) {
            Some(factor) => {
                debug!("Applying speed correction {factor} for requested speed {}", self.speed);
                dsp::time_stretch(&input.samples, rate, factor)
            }
            None => input.samples.clone(),
        };

        if self.depth > MIN_DEPTH {
            let cutoff = cutoff_for_depth(self.depth);
            let boost = boost_db_for_depth(self.depth);
            debug!("Depth {}: low-pass at {cutoff} Hz, +{boost} dB body", self.depth);

            samples = dsp::low_pass(&samples, rate, cutoff);
            let mut body = dsp::band_pass(&samples, rate, BOOST_LOW_HZ, BOOST_HIGH_HZ);
            dsp::apply_gain_db(&mut body, boost);
            dsp::overlay(&mut samples, &body);
        }

        let mut output = AudioBuffer::new(samples, rate);
        let fade = fade_samples(&output);
        dsp::fade_in(&mut output.samples, fade);
        dsp::fade_out(&mut output.samples, fade);
        output
    }
}
