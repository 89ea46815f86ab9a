// Error handling for the playback engine

use thiserror::Error;

/// Audio engine error types
#[derive(Debug, Clone, Error)]
pub enum AudioError {
    /// Failed to initialize a component
    #[error("Initialization error: {0}")]
    InitializationError(String),

    /// Failed to open or probe the media source
    #[error("Load error: {0}")]
    LoadError(String),

    /// The source opened but carries no audio track
    #[error("No audio track found")]
    NoAudioTrack,

    /// Operation not allowed in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Audio format not supported
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Output device error
    #[error("Device error: {0}")]
    DeviceError(String),

    /// No sink buffer could be allocated at any supported size
    #[error("Resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Decoding error
    #[error("Decoding error: {0}")]
    DecodingError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Network error (download/streaming)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The decode worker panicked
    #[error("Decode worker panicked: {0}")]
    WorkerPanic(String),

    /// Generic error
    #[error("Error: {0}")]
    Other(String),
}

/// Coarse error classes reported to the error listener as its `extra` code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Unreadable or unsupported source, missing audio track, no device
    Source,
    /// Operation invoked from a state that does not permit it
    StateViolation,
    /// Failure inside the decode loop or during reconfiguration
    Runtime,
    /// No sink buffer at any multiple of the minimum size
    ResourceExhausted,
}

impl ErrorCategory {
    pub fn extra_code(self) -> i32 {
        match self {
            ErrorCategory::Source => -1004,
            ErrorCategory::StateViolation => -38,
            ErrorCategory::Runtime => -1010,
            ErrorCategory::ResourceExhausted => -12,
        }
    }
}

impl AudioError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            AudioError::LoadError(_)
            | AudioError::NoAudioTrack
            | AudioError::UnsupportedFormat(_)
            | AudioError::DeviceError(_)
            | AudioError::IoError(_)
            | AudioError::NetworkError(_) => ErrorCategory::Source,
            AudioError::InvalidState(_) => ErrorCategory::StateViolation,
            AudioError::ResourceExhausted(_) => ErrorCategory::ResourceExhausted,
            AudioError::InitializationError(_)
            | AudioError::DecodingError(_)
            | AudioError::WorkerPanic(_)
            | AudioError::Other(_) => ErrorCategory::Runtime,
        }
    }

    /// Code handed to the error listener as `extra`.
    pub fn extra_code(&self) -> i32 {
        self.category().extra_code()
    }
}

/// Result type alias for audio operations
pub type Result<T> = std::result::Result<T, AudioError>;

impl From<std::io::Error> for AudioError {
    fn from(err: std::io::Error) -> Self {
        AudioError::IoError(err.to_string())
    }
}
