//! Concatenation of per-segment artifacts.

use crate::audio::{AudioArtifact, AudioBuffer};
use crate::config::SampleRatePolicy;
use crate::dsp;
use crate::error::{NarrateError, NarrateResult};
use tracing::{debug, warn};

/// Joins artifacts in order into one buffer
#[derive(Debug, Clone, Copy, Default)]
pub struct Assembler {
    policy: SampleRatePolicy,
}

impl Assembler {
    /// Assembler applying `policy` to mismatched sample rates
    #[must_use]
    pub const fn new(policy: SampleRatePolicy) -> Self {
        Self { policy }
    }

    /// Decode and concatenate `artifacts` in order. The output takes the
    /// sample rate of the first artifact.
    ///
    /// # Errors
    ///
    /// Returns an error if the list is empty, an artifact cannot be decoded,
    /// or rates differ under [`SampleRatePolicy::Reject`].
    pub fn assemble(&self, artifacts: &[AudioArtifact]) -> NarrateResult<AudioBuffer> {
        let buffers = artifacts
            .iter()
            .map(AudioArtifact::load)
            .collect::<NarrateResult<Vec<_>>>()?;
        self.concatenate(buffers)
    }

    /// Concatenate already decoded buffers
    ///
    /// # Errors
    ///
    /// Same as [`Self::assemble`], minus decoding.
    pub fn concatenate(&self, buffers: Vec<AudioBuffer>) -> NarrateResult<AudioBuffer> {
        let rate = buffers
            .first()
            .map(|b| b.sample_rate)
            .ok_or_else(|| NarrateError::audio_processing("Nothing to assemble"))?;

        let total: usize = buffers.iter().map(AudioBuffer::len).sum();
        let mut samples = Vec::with_capacity(total);
        for (index, buffer) in buffers.into_iter().enumerate() {
            if buffer.sample_rate == rate {
                samples.extend(buffer.samples);
                continue;
            }

            warn!(
                "Segment {index} is {} Hz, expected {rate} Hz",
                buffer.sample_rate
            );
            match self.policy {
                SampleRatePolicy::Reject => {
                    return Err(NarrateError::sample_rate_mismatch(rate, buffer.sample_rate));
                }
                SampleRatePolicy::Resample => {
                    samples.extend(dsp::resample(&buffer.samples, buffer.sample_rate, rate)?);
                }
            }
        }

        debug!("Assembled {} samples at {rate} Hz", samples.len());
        Ok(AudioBuffer::new(samples, rate))
    }
}
