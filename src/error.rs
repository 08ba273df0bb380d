//! Error types for vocore.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VocoreError {
    // Configuration errors
    #[error("Failed to parse configuration: {message}")]
    ConfigParse { message: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Codec errors
    #[error("Failed to open codec: {message}")]
    CodecOpen { message: String },

    #[error("Codec call failed with status {code}")]
    CodecStatus { code: i32 },

    // Resampler errors
    #[error("Resampler is not configured")]
    ResamplerNotConfigured,

    #[error("Output buffer too small: need {needed} samples, got {available}")]
    OutputBufferTooSmall { needed: usize, available: usize },

    // Audio device errors
    #[error("Audio device error: {message}")]
    AudioDevice { message: String },

    // Wake word errors
    #[error("Wake word initialization failed: {message}")]
    WakeWordInit { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VocoreError>;
