//! Audio buffers, artifacts and file I/O.
//!
//! Everything is decoded to mono `f32` PCM in `[-1.0, 1.0]`. WAV goes through
//! `hound`; compressed input is decoded with `symphonia`. Compressed output is
//! handed to the external encoder in [`crate::tools`].

use crate::error::{NarrateError, NarrateResult};
use crate::tools;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, info, warn};

/// Supported audio container formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    /// WAV format (uncompressed 16-bit PCM)
    Wav,
    /// MP3 format (lossy compression)
    Mp3,
}

impl AudioFormat {
    /// Get file extension for the format
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Wav => "wav",
            Self::Mp3 => "mp3",
        }
    }

    /// Get MIME type for the format
    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
        }
    }

    /// Check if the format is lossy
    #[must_use]
    pub const fn is_lossy(self) -> bool {
        matches!(self, Self::Mp3)
    }

    /// Detect format from file extension
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is not supported
    pub fn from_extension(extension: &str) -> NarrateResult<Self> {
        match extension.to_lowercase().as_str() {
            "wav" => Ok(Self::Wav),
            "mp3" => Ok(Self::Mp3),
            _ => Err(NarrateError::invalid_input(format!(
                "Unsupported audio format: {extension}"
            ))),
        }
    }

    /// Detect format from file path
    ///
    /// # Errors
    ///
    /// Returns an error if the file has no extension or unsupported extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> NarrateResult<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .ok_or_else(|| {
                NarrateError::invalid_input(format!(
                    "No file extension found in path: {}",
                    path.display()
                ))
            })?;

        Self::from_extension(extension)
    }
}

impl std::fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension().to_uppercase())
    }
}

/// Decoded mono PCM
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Samples in `[-1.0, 1.0]`
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    /// Wrap decoded samples
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Digital silence of the given length
    #[must_use]
    pub fn silent(duration: Duration, sample_rate: u32) -> Self {
        let frames = (duration.as_secs_f64() * f64::from(sample_rate)).round() as usize;
        Self::new(vec![0.0; frames], sample_rate)
    }

    /// Playback length
    #[must_use]
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / f64::from(self.sample_rate))
    }

    /// Number of samples
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the buffer holds no samples
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value
    #[must_use]
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0_f32, |peak, s| peak.max(s.abs()))
    }

    /// Whether every sample is (near) zero
    #[must_use]
    pub fn is_silent(&self) -> bool {
        self.peak() < 1e-4
    }
}

/// An audio file produced by one pipeline stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioArtifact {
    /// Location on disk
    pub path: PathBuf,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Playback length
    pub duration: Duration,
    /// Container format
    pub format: AudioFormat,
}

impl AudioArtifact {
    /// Decode a file on disk and describe it
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, empty or cannot be decoded.
    pub fn probe<P: AsRef<Path>>(path: P) -> NarrateResult<Self> {
        let path = path.as_ref();
        let buffer = decode_file(path)?;
        Ok(Self::describe(path, &buffer))
    }

    /// Unknown extensions are described as WAV
    fn describe(path: &Path, buffer: &AudioBuffer) -> Self {
        Self {
            path: path.to_path_buf(),
            sample_rate: buffer.sample_rate,
            duration: buffer.duration(),
            format: AudioFormat::from_path(path).unwrap_or(AudioFormat::Wav),
        }
    }

    /// Decode the artifact's samples
    ///
    /// # Errors
    ///
    /// Returns an error if the file can no longer be decoded.
    pub fn load(&self) -> NarrateResult<AudioBuffer> {
        decode_file(&self.path)
    }
}

/// Decode any supported file to mono PCM
///
/// # Errors
///
/// Returns an error if the file is missing, empty or undecodable.
pub fn decode_file<P: AsRef<Path>>(path: P) -> NarrateResult<AudioBuffer> {
    let path = path.as_ref();
    let size = std::fs::metadata(path)
        .map_err(|e| NarrateError::file(format!("Cannot read {}: {e}", path.display())))?
        .len();
    if size == 0 {
        return Err(NarrateError::audio_processing(format!(
            "Audio file is empty: {}",
            path.display()
        )));
    }

    let buffer = match AudioFormat::from_path(path) {
        Ok(AudioFormat::Wav) => decode_wav(path)?,
        _ => decode_compressed(path)?,
    };
    debug!(
        "Decoded {} samples at {} Hz from {}",
        buffer.len(),
        buffer.sample_rate,
        path.display()
    );
    Ok(buffer)
}

fn decode_wav(path: &Path) -> NarrateResult<AudioBuffer> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<_, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<_, _>>()?
        }
    };

    Ok(AudioBuffer::new(
        downmix(&interleaved, usize::from(spec.channels)),
        spec.sample_rate,
    ))
}

fn decode_compressed(path: &Path) -> NarrateResult<AudioBuffer> {
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe().format(
        &hint,
        stream,
        &FormatOptions::default(),
        &MetadataOptions::default(),
    )?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| NarrateError::audio_processing("No audio track found"))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut decoder =
        symphonia::default::get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(e.into()),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                samples.extend(downmix(buffer.samples(), spec.channels.count()));
            }
            Err(SymphoniaError::DecodeError(message)) => {
                warn!("Skipping undecodable packet: {}", message);
            }
            Err(e) => return Err(e.into()),
        }
    }

    if sample_rate == 0 {
        return Err(NarrateError::audio_processing(format!(
            "Could not determine sample rate of {}",
            path.display()
        )));
    }
    Ok(AudioBuffer::new(samples, sample_rate))
}

fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Writes buffers to disk, choosing the container from the file extension
#[derive(Debug, Clone)]
pub struct AudioWriter {
    bitrate_kbps: u32,
}

impl AudioWriter {
    /// Create a writer using `bitrate_kbps` for compressed output
    #[must_use]
    pub const fn new(bitrate_kbps: u32) -> Self {
        Self { bitrate_kbps }
    }

    /// Bitrate used for compressed output
    #[must_use]
    pub const fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    /// Write `buffer` to `path`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The buffer is empty or holds non-finite samples
    /// - The extension is not a supported format
    /// - The file cannot be created or the encoder fails
    pub fn write<P: AsRef<Path>>(&self, buffer: &AudioBuffer, path: P) -> NarrateResult<AudioArtifact> {
        let path = path.as_ref();
        Self::validate(buffer)?;
        let format = AudioFormat::from_path(path)?;

        info!(
            "Writing {} samples to {} in {} format",
            buffer.len(),
            path.display(),
            format
        );

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                NarrateError::file(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        match format {
            AudioFormat::Wav => write_wav(buffer, path)?,
            AudioFormat::Mp3 => self.write_mp3(buffer, path)?,
        }

        Ok(AudioArtifact {
            path: path.to_path_buf(),
            sample_rate: buffer.sample_rate,
            duration: buffer.duration(),
            format,
        })
    }

    fn validate(buffer: &AudioBuffer) -> NarrateResult<()> {
        if buffer.is_empty() {
            return Err(NarrateError::audio_processing("Audio data cannot be empty"));
        }
        if buffer.sample_rate == 0 {
            return Err(NarrateError::audio_processing("Sample rate cannot be zero"));
        }
        if let Some(index) = buffer.samples.iter().position(|s| !s.is_finite()) {
            return Err(NarrateError::audio_processing(format!(
                "Invalid audio sample at index {index}"
            )));
        }
        Ok(())
    }

    /// Encode through a temporary WAV file
    fn write_mp3(&self, buffer: &AudioBuffer, path: &Path) -> NarrateResult<()> {
        let staging = tempfile::Builder::new()
            .prefix("narrate_encode_")
            .suffix(".wav")
            .tempfile()?;
        write_wav(buffer, staging.path())?;
        tools::encode_mp3(staging.path(), path, self.bitrate_kbps)
    }
}

impl Default for AudioWriter {
    fn default() -> Self {
        Self::new(crate::OUTPUT_BITRATE_KBPS)
    }
}

fn write_wav(buffer: &AudioBuffer, path: &Path) -> NarrateResult<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: buffer.sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &sample in &buffer.samples {
        writer.write_sample((sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}
