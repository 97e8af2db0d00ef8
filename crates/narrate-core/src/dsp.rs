//! Signal processing primitives on mono `f32` PCM.

use crate::error::NarrateResult;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use std::f32::consts::{FRAC_1_SQRT_2, PI, TAU};
use tracing::debug;

/// Frames fed to the resampler per call
const RESAMPLE_CHUNK: usize = 1024;

/// Length of one time-stretch analysis window
const STRETCH_FRAME_SECONDS: f32 = 0.040;
/// How far the time-stretch may deviate from the nominal read position
/// when searching for the best-aligned window
const STRETCH_TOLERANCE_SECONDS: f32 = 0.005;
/// Sample stride used when scoring candidate alignments
const STRETCH_CORRELATION_STEP: usize = 4;

/// Second-order IIR section (RBJ cookbook), transposed direct form II
#[derive(Debug, Clone, Copy)]
pub struct Biquad {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
}

impl Biquad {
    fn from_coefficients(b: [f32; 3], a: [f32; 3]) -> Self {
        Self {
            b0: b[0] / a[0],
            b1: b[1] / a[0],
            b2: b[2] / a[0],
            a1: a[1] / a[0],
            a2: a[2] / a[0],
            z1: 0.0,
            z2: 0.0,
        }
    }

    fn prewarp(sample_rate: u32, cutoff_hz: f32, q: f32) -> (f32, f32) {
        let w0 = TAU * cutoff_hz / sample_rate as f32;
        (w0.cos(), w0.sin() / (2.0 * q))
    }

    /// Butterworth low-pass at `cutoff_hz`
    #[must_use]
    pub fn low_pass(sample_rate: u32, cutoff_hz: f32) -> Self {
        let (cos, alpha) = Self::prewarp(sample_rate, cutoff_hz, FRAC_1_SQRT_2);
        Self::from_coefficients(
            [(1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    /// Butterworth high-pass at `cutoff_hz`
    #[must_use]
    pub fn high_pass(sample_rate: u32, cutoff_hz: f32) -> Self {
        let (cos, alpha) = Self::prewarp(sample_rate, cutoff_hz, FRAC_1_SQRT_2);
        Self::from_coefficients(
            [(1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0],
            [1.0 + alpha, -2.0 * cos, 1.0 - alpha],
        )
    }

    /// Filter one sample
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.b0.mul_add(x, self.z1);
        self.z1 = self.b1.mul_add(x, -self.a1 * y) + self.z2;
        self.z2 = self.b2.mul_add(x, -self.a2 * y);
        y
    }

    /// Filter a whole buffer in place
    pub fn run(&mut self, samples: &mut [f32]) {
        for sample in samples {
            *sample = self.process(*sample);
        }
    }
}

/// Whether `cutoff_hz` lies strictly inside the representable band
fn in_band(sample_rate: u32, cutoff_hz: f32) -> bool {
    cutoff_hz > 0.0 && cutoff_hz < sample_rate as f32 * 0.49
}

/// Attenuate content above `cutoff_hz`. A cutoff at or above Nyquist leaves
/// the signal untouched.
#[must_use]
pub fn low_pass(samples: &[f32], sample_rate: u32, cutoff_hz: f32) -> Vec<f32> {
    let mut output = samples.to_vec();
    if in_band(sample_rate, cutoff_hz) {
        Biquad::low_pass(sample_rate, cutoff_hz).run(&mut output);
    } else {
        debug!("Low-pass at {cutoff_hz} Hz is outside the band of {sample_rate} Hz audio, skipping");
    }
    output
}

/// Attenuate content below `cutoff_hz`
#[must_use]
pub fn high_pass(samples: &[f32], sample_rate: u32, cutoff_hz: f32) -> Vec<f32> {
    let mut output = samples.to_vec();
    if in_band(sample_rate, cutoff_hz) {
        Biquad::high_pass(sample_rate, cutoff_hz).run(&mut output);
    }
    output
}

/// Keep only the band between `low_hz` and `high_hz`
#[must_use]
pub fn band_pass(samples: &[f32], sample_rate: u32, low_hz: f32, high_hz: f32) -> Vec<f32> {
    low_pass(&high_pass(samples, sample_rate, low_hz), sample_rate, high_hz)
}

/// Convert decibels to a linear amplitude factor
#[must_use]
pub fn db_to_gain(db: f32) -> f32 {
    10.0_f32.powf(db / 20.0)
}

/// Scale every sample by `db` decibels
pub fn apply_gain_db(samples: &mut [f32], db: f32) {
    let gain = db_to_gain(db);
    for sample in samples {
        *sample *= gain;
    }
}

/// Mix `other` onto `base`, clipping to `[-1.0, 1.0]`. Samples of `other`
/// beyond the end of `base` are dropped.
pub fn overlay(base: &mut [f32], other: &[f32]) {
    for (sample, added) in base.iter_mut().zip(other) {
        *sample = (*sample + added).clamp(-1.0, 1.0);
    }
}

/// Linear ramp up over the first `length` samples
pub fn fade_in(samples: &mut [f32], length: usize) {
    let length = length.min(samples.len());
    for (i, sample) in samples.iter_mut().take(length).enumerate() {
        *sample *= i as f32 / length as f32;
    }
}

/// Linear ramp down over the last `length` samples
pub fn fade_out(samples: &mut [f32], length: usize) {
    let length = length.min(samples.len());
    let start = samples.len() - length;
    for (i, sample) in samples[start..].iter_mut().enumerate() {
        *sample *= (length - i) as f32 / length as f32;
    }
}

/// Root mean square level
#[must_use]
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| f64::from(*s) * f64::from(*s)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// RMS level of the content above `frequency_hz`
#[must_use]
pub fn energy_above(samples: &[f32], sample_rate: u32, frequency_hz: f32) -> f32 {
    rms(&high_pass(samples, sample_rate, frequency_hz))
}

fn hann(length: usize) -> Vec<f32> {
    (0..length)
        .map(|i| 0.5 - 0.5 * (TAU * i as f32 / length as f32).cos())
        .collect()
}

/// Change tempo by `speed` without changing pitch.
///
/// Uses waveform-similarity overlap-add: each output window is read from
/// near its nominal input position, nudged to the offset that best continues
/// the previous window. `speed > 1.0` shortens the audio.
#[must_use]
pub fn time_stretch(samples: &[f32], sample_rate: u32, speed: f32) -> Vec<f32> {
    if samples.is_empty() || !speed.is_finite() || speed <= 0.0 || (speed - 1.0).abs() < 1e-6 {
        return samples.to_vec();
    }

    let frame = ((sample_rate as f32 * STRETCH_FRAME_SECONDS) as usize).max(32);
    let hop_out = frame / 2;
    let hop_in = hop_out as f32 * speed;
    let tolerance = ((sample_rate as f32 * STRETCH_TOLERANCE_SECONDS) as usize).max(1);
    let out_len = (samples.len() as f32 / speed).round() as usize;
    let window = hann(frame);

    let mut output = vec![0.0_f32; out_len + frame];
    let mut weight = vec![0.0_f32; out_len + frame];
    let mut previous = 0_usize;

    for k in 0.. {
        let out_pos = k * hop_out;
        if out_pos >= out_len {
            break;
        }
        let nominal = (k as f32 * hop_in).round() as usize;
        let source = if k == 0 {
            0
        } else {
            best_alignment(samples, previous + hop_out, nominal, tolerance, hop_out)
        };

        for (i, w) in window.iter().enumerate() {
            let x = samples.get(source + i).copied().unwrap_or(0.0);
            output[out_pos + i] += x * w;
            weight[out_pos + i] += w;
        }
        previous = source;
    }

    for (sample, w) in output.iter_mut().zip(&weight) {
        if *w > 1e-3 {
            *sample /= w;
        }
    }
    output.truncate(out_len);
    debug!(
        "Time-stretched {} -> {} samples (speed {speed})",
        samples.len(),
        output.len()
    );
    output
}

/// Input offset within `nominal ± tolerance` whose next `length` samples
/// correlate best with the natural continuation at `natural`
fn best_alignment(
    samples: &[f32],
    natural: usize,
    nominal: usize,
    tolerance: usize,
    length: usize,
) -> usize {
    let at = |i: usize| samples.get(i).copied().unwrap_or(0.0);
    let mut best = nominal;
    let mut best_score = f32::NEG_INFINITY;
    for candidate in nominal.saturating_sub(tolerance)..=nominal + tolerance {
        let score: f32 = (0..length)
            .step_by(STRETCH_CORRELATION_STEP)
            .map(|i| at(natural + i) * at(candidate + i))
            .sum();
        if score > best_score {
            best_score = score;
            best = candidate;
        }
    }
    best
}

/// Convert `samples` from `from_rate` to `to_rate`
///
/// # Errors
///
/// Returns an error if the resampler cannot be built for this ratio.
pub fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> NarrateResult<Vec<f32>> {
    if from_rate == to_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let ratio = f64::from(to_rate) / f64::from(from_rate);
    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };
    let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)?;

    let delay = resampler.output_delay();
    let expected = (samples.len() as f64 * ratio).round() as usize;
    let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);

    let mut chunks = samples.chunks_exact(RESAMPLE_CHUNK);
    for chunk in &mut chunks {
        let frames = resampler.process(&[chunk], None)?;
        output.extend_from_slice(&frames[0]);
    }
    let remainder = chunks.remainder();
    if !remainder.is_empty() {
        let input: [&[f32]; 1] = [remainder];
        let frames = resampler.process_partial(Some(&input[..]), None)?;
        output.extend_from_slice(&frames[0]);
    }
    while output.len() < expected + delay {
        let frames = resampler.process_partial(None::<&[&[f32]]>, None)?;
        if frames[0].is_empty() {
            break;
        }
        output.extend_from_slice(&frames[0]);
    }

    debug!(
        "Resampled {} samples {from_rate} Hz -> {to_rate} Hz",
        samples.len()
    );
    Ok(output.into_iter().skip(delay).take(expected).collect())
}

/// Sine tone, mostly for tests and benchmarks
#[must_use]
pub fn sine(frequency_hz: f32, amplitude: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
    let frames = (seconds * sample_rate as f32) as usize;
    (0..frames)
        .map(|i| amplitude * (2.0 * PI * frequency_hz * i as f32 / sample_rate as f32).sin())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 24_000;

    #[test]
    fn test_low_pass_attenuates_high_tone() {
        let high = sine(10_000.0, 0.5, 0.5, RATE);
        let low = sine(300.0, 0.5, 0.5, RATE);

        let high_out = rms(&low_pass(&high, RATE, 3_000.0));
        let low_out = rms(&low_pass(&low, RATE, 3_000.0));

        assert!(high_out < rms(&high) * 0.1);
        assert!((low_out - rms(&low)).abs() < rms(&low) * 0.05);
    }

    #[test]
    fn test_cutoff_above_nyquist_is_transparent() {
        let tone = sine(1_000.0, 0.5, 0.1, RATE);
        assert_eq!(low_pass(&tone, RATE, 16_800.0), tone);
    }

    #[test]
    fn test_band_pass_keeps_voice_band() {
        let inside = sine(400.0, 0.5, 0.5, RATE);
        let outside = sine(5_000.0, 0.5, 0.5, RATE);
        let kept = rms(&band_pass(&inside, RATE, 180.0, 700.0));
        let removed = rms(&band_pass(&outside, RATE, 180.0, 700.0));
        assert!(kept > removed * 5.0);
    }

    #[test]
    fn test_gain_and_overlay() {
        assert!((db_to_gain(6.0) - 1.995).abs() < 0.01);
        assert!((db_to_gain(0.0) - 1.0).abs() < f32::EPSILON);

        let mut base = vec![0.5, -0.5, 0.9];
        let mut boost = vec![0.25, -0.25, 0.25];
        apply_gain_db(&mut boost, 0.0);
        overlay(&mut base, &boost);
        assert_eq!(base, vec![0.75, -0.75, 1.0]);
    }

    #[test]
    fn test_fades() {
        let mut samples = vec![1.0; 10];
        fade_in(&mut samples, 4);
        fade_out(&mut samples, 4);
        assert_eq!(samples[0], 0.0);
        assert_eq!(samples[2], 0.5);
        assert_eq!(samples[5], 1.0);
        assert_eq!(samples[9], 0.25);

        let mut short = vec![1.0; 2];
        fade_in(&mut short, 100);
        assert_eq!(short, vec![0.0, 0.5]);
    }

    #[test]
    fn test_time_stretch_lengths() {
        let tone = sine(220.0, 0.5, 1.0, RATE);

        let slower = time_stretch(&tone, RATE, 0.9);
        assert_eq!(slower.len(), (tone.len() as f32 / 0.9).round() as usize);

        let faster = time_stretch(&tone, RATE, 1.15);
        assert_eq!(faster.len(), (tone.len() as f32 / 1.15).round() as usize);

        assert_eq!(time_stretch(&tone, RATE, 1.0), tone);
    }

    #[test]
    fn test_time_stretch_keeps_level() {
        let tone = sine(220.0, 0.5, 1.0, RATE);
        let stretched = time_stretch(&tone, RATE, 0.9);
        let middle = &stretched[RATE as usize / 4..RATE as usize * 3 / 4];
        assert!((rms(middle) - rms(&tone)).abs() < 0.05);
    }

    #[test]
    fn test_resample_length() {
        let tone = sine(440.0, 0.5, 0.5, 16_000);
        let resampled = resample(&tone, 16_000, 24_000).unwrap();
        assert_eq!(resampled.len(), 12_000);
        assert!((rms(&resampled[1_000..11_000]) - rms(&tone)).abs() < 0.05);

        assert_eq!(resample(&tone, 16_000, 16_000).unwrap(), tone);
    }

    #[test]
    fn test_energy_above() {
        let low = sine(300.0, 0.5, 0.5, RATE);
        let high = sine(9_000.0, 0.5, 0.5, RATE);
        assert!(energy_above(&low, RATE, 6_600.0) < energy_above(&high, RATE, 6_600.0) * 0.1);
    }
}
