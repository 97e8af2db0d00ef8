//! Error types for the Narrate rendering pipeline.

/// Result type alias for Narrate operations
pub type NarrateResult<T> = Result<T, NarrateError>;

/// Main error type for Narrate operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum NarrateError {
    /// The external voice engine failed or returned no audio
    #[error("TTS synthesis failed: {message}")]
    SynthesisError {
        /// Error message describing the failure
        message: String,
    },

    /// A single segment of a segmented request failed
    #[error("Segment {index} failed: {message}")]
    SegmentError {
        /// Zero-based position of the segment in the request
        index: usize,
        /// Error message describing the failure
        message: String,
    },

    /// Audio decoding, filtering or encoding error
    #[error("Audio processing error: {message}")]
    AudioProcessingError {
        /// Error message describing the processing issue
        message: String,
    },

    /// Artifacts with different sample rates were handed to the assembler
    #[error("Sample rate mismatch: expected {expected} Hz, found {found} Hz")]
    SampleRateMismatch {
        /// Rate of the first artifact
        expected: u32,
        /// Rate of the offending artifact
        found: u32,
    },

    /// File I/O error
    #[error("File I/O error: {message}")]
    FileError {
        /// Error message describing the file operation failure
        message: String,
    },

    /// Voice not found error
    #[error("Voice '{voice_id}' not found")]
    VoiceNotFound {
        /// The voice ID that was not found
        voice_id: String,
    },

    /// Invalid input error
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Error message describing the invalid input
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Network error talking to the voice engine
    #[error("Network error: {message}")]
    NetworkError {
        /// Error message describing the network issue
        message: String,
    },

    /// A required external tool is not installed
    #[error("Required tool '{tool}' is not available: {message}")]
    DependencyMissing {
        /// Name of the missing executable
        tool: String,
        /// Details from the lookup
        message: String,
    },

    /// Job lookup or transition error
    #[error("Job '{job_id}' not found")]
    JobNotFound {
        /// The job ID that was not found
        job_id: String,
    },
}

impl NarrateError {
    /// Create a new synthesis error
    #[must_use]
    pub fn synthesis<S: Into<String>>(message: S) -> Self {
        Self::SynthesisError {
            message: message.into(),
        }
    }

    /// Create a new segment error
    #[must_use]
    pub fn segment<S: Into<String>>(index: usize, message: S) -> Self {
        Self::SegmentError {
            index,
            message: message.into(),
        }
    }

    /// Create a new audio processing error
    #[must_use]
    pub fn audio_processing<S: Into<String>>(message: S) -> Self {
        Self::AudioProcessingError {
            message: message.into(),
        }
    }

    /// Create a new sample rate mismatch error
    #[must_use]
    pub const fn sample_rate_mismatch(expected: u32, found: u32) -> Self {
        Self::SampleRateMismatch { expected, found }
    }

    /// Create a new file error
    #[must_use]
    pub fn file<S: Into<String>>(message: S) -> Self {
        Self::FileError {
            message: message.into(),
        }
    }

    /// Create a new voice not found error
    #[must_use]
    pub fn voice_not_found<S: Into<String>>(voice_id: S) -> Self {
        Self::VoiceNotFound {
            voice_id: voice_id.into(),
        }
    }

    /// Create a new invalid input error
    #[must_use]
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    #[must_use]
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::ConfigurationError {
            message: message.into(),
        }
    }

    /// Create a new network error
    #[must_use]
    pub fn network<S: Into<String>>(message: S) -> Self {
        Self::NetworkError {
            message: message.into(),
        }
    }

    /// Create a new missing dependency error
    #[must_use]
    pub fn dependency_missing<T: Into<String>, S: Into<String>>(tool: T, message: S) -> Self {
        Self::DependencyMissing {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a new job not found error
    #[must_use]
    pub fn job_not_found<S: Into<String>>(job_id: S) -> Self {
        Self::JobNotFound {
            job_id: job_id.into(),
        }
    }

    /// Check if this error is retriable
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::NetworkError { .. })
    }

    /// Check if this error is due to invalid user input
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidInput { .. }
                | Self::VoiceNotFound { .. }
                | Self::ConfigurationError { .. }
        )
    }

    /// Get the error category for logging
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::SynthesisError { .. } => "synthesis",
            Self::SegmentError { .. } => "segment",
            Self::AudioProcessingError { .. } => "audio_processing",
            Self::SampleRateMismatch { .. } => "sample_rate",
            Self::FileError { .. } => "file",
            Self::VoiceNotFound { .. } => "voice",
            Self::InvalidInput { .. } => "input",
            Self::ConfigurationError { .. } => "configuration",
            Self::NetworkError { .. } => "network",
            Self::DependencyMissing { .. } => "dependency",
            Self::JobNotFound { .. } => "job",
        }
    }
}

// Convert from common error types
impl From<std::io::Error> for NarrateError {
    fn from(err: std::io::Error) -> Self {
        Self::file(err.to_string())
    }
}

impl From<reqwest::Error> for NarrateError {
    fn from(err: reqwest::Error) -> Self {
        Self::network(err.to_string())
    }
}

impl From<hound::Error> for NarrateError {
    fn from(err: hound::Error) -> Self {
        Self::audio_processing(format!("WAV error: {err}"))
    }
}

impl From<symphonia::core::errors::Error> for NarrateError {
    fn from(err: symphonia::core::errors::Error) -> Self {
        Self::audio_processing(format!("Decoder error: {err}"))
    }
}

impl From<rubato::ResampleError> for NarrateError {
    fn from(err: rubato::ResampleError) -> Self {
        Self::audio_processing(format!("Resampling failed: {err}"))
    }
}

impl From<rubato::ResamplerConstructionError> for NarrateError {
    fn from(err: rubato::ResamplerConstructionError) -> Self {
        Self::audio_processing(format!("Resampler setup failed: {err}"))
    }
}

impl From<serde_json::Error> for NarrateError {
    fn from(err: serde_json::Error) -> Self {
        Self::file(format!("JSON serialization error: {err}"))
    }
}

impl From<toml::de::Error> for NarrateError {
    fn from(err: toml::de::Error) -> Self {
        Self::configuration(format!("Invalid TOML: {err}"))
    }
}
