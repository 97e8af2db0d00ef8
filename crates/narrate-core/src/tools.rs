//! External executables the pipeline depends on.

use crate::error::{NarrateError, NarrateResult};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// Name of the encoder executable
pub const FFMPEG: &str = "ffmpeg";

static FFMPEG_PATH: OnceCell<PathBuf> = OnceCell::new();

/// Locate ffmpeg on `PATH`. The lookup result is cached after the first
/// success.
///
/// # Errors
///
/// Returns [`NarrateError::DependencyMissing`] when ffmpeg is not installed.
pub fn require_ffmpeg() -> NarrateResult<&'static Path> {
    FFMPEG_PATH
        .get_or_try_init(|| {
            let path = which::which(FFMPEG).map_err(|e| {
                NarrateError::dependency_missing(
                    FFMPEG,
                    format!("{e}; install ffmpeg to produce MP3 output"),
                )
            })?;
            info!("Using ffmpeg at {}", path.display());
            Ok(path)
        })
        .map(PathBuf::as_path)
}

/// Encode a WAV file to MP3 at `bitrate_kbps`
///
/// # Errors
///
/// Returns an error if ffmpeg is missing, fails to start, or exits unsuccessfully.
pub fn encode_mp3(input: &Path, output: &Path, bitrate_kbps: u32) -> NarrateResult<()> {
    let ffmpeg = require_ffmpeg()?;
    let bitrate = format!("{bitrate_kbps}k");
    debug!(
        "Encoding {} -> {} at {}",
        input.display(),
        output.display(),
        bitrate
    );

    let result = Command::new(ffmpeg)
        .args(["-y", "-hide_banner", "-loglevel", "error", "-i"])
        .arg(input)
        .args(["-codec:a", "libmp3lame", "-b:a", &bitrate])
        .arg(output)
        .output()
        .map_err(|e| NarrateError::audio_processing(format!("Failed to run ffmpeg: {e}")))?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(NarrateError::audio_processing(format!(
            "ffmpeg exited with {}: {}",
            result.status,
            stderr.trim()
        )));
    }
    Ok(())
}
