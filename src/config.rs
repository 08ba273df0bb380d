use crate::defaults;
use crate::error::{Result, VocoreError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub encoder: EncoderConfig,
    pub scheduler: SchedulerConfig,
    pub frontend: FrontendConfig,
    pub wake_word: WakeWordConfig,
}

/// Device and pipeline framing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Speaker rate for devices that do not fix one themselves (the WAV
    /// device); capture rate and channels always come from the device.
    pub output_sample_rate: u32,
    /// At most `defaults::MAX_FRAME_DURATION_MS`.
    pub frame_duration_ms: u32,
    pub device_aec: bool,
    pub fetch_timeout_ms: u64,
}

/// Uplink encoder knobs
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EncoderConfig {
    pub complexity: u8,
    pub dtx: bool,
}

/// Background scheduler pressure thresholds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    pub max_active_tasks: usize,
    pub min_free_memory_bytes: u64,
}

/// Built-in front-end processor configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FrontendConfig {
    pub feed_chunk_samples: usize,
    pub vad_threshold: f32,
}

/// Wake word configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WakeWordConfig {
    pub enabled: bool,
    pub words: Vec<String>,
    /// RMS level the energy spotter treats as speech.
    pub threshold: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            output_sample_rate: defaults::SAMPLE_RATE,
            frame_duration_ms: defaults::FRAME_DURATION_MS,
            device_aec: false,
            fetch_timeout_ms: defaults::FETCH_TIMEOUT_MS,
        }
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            complexity: defaults::ENCODER_COMPLEXITY,
            dtx: false,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_active_tasks: defaults::MAX_ACTIVE_TASKS,
            min_free_memory_bytes: defaults::MIN_FREE_MEMORY_BYTES,
        }
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            feed_chunk_samples: defaults::FEED_CHUNK_SAMPLES,
            vad_threshold: defaults::VAD_THRESHOLD,
        }
    }
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            words: vec!["hi vocore".to_string()],
            threshold: 0.05,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        match Self::load(path) {
            Ok(config) => Ok(config),
            Err(e)
                if e.downcast_ref::<std::io::Error>()
                    .is_some_and(|io_err| io_err.kind() == std::io::ErrorKind::NotFound) =>
            {
                tracing::debug!(path = %path.display(), "config file missing, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.context(format!("Failed to load config from {}", path.display()))),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - VOCORE_FRAME_DURATION_MS → audio.frame_duration_ms
    /// - VOCORE_DEVICE_AEC → audio.device_aec ("1"/"true" enable)
    /// - VOCORE_WAKE_WORD → wake_word.enabled ("1"/"true" enable)
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(ms) = std::env::var("VOCORE_FRAME_DURATION_MS")
            && let Ok(ms) = ms.trim().parse::<u32>()
        {
            self.audio.frame_duration_ms = ms;
        }

        if let Ok(value) = std::env::var("VOCORE_DEVICE_AEC")
            && !value.is_empty()
        {
            self.audio.device_aec = parse_flag(&value);
        }

        if let Ok(value) = std::env::var("VOCORE_WAKE_WORD")
            && !value.is_empty()
        {
            self.wake_word.enabled = parse_flag(&value);
        }

        self
    }

    /// Reject values the audio components cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.audio.output_sample_rate == 0 {
            return Err(invalid("audio.output_sample_rate", "must be positive"));
        }
        if self.audio.frame_duration_ms == 0 {
            return Err(invalid("audio.frame_duration_ms", "must be positive"));
        }
        if self.audio.frame_duration_ms > defaults::MAX_FRAME_DURATION_MS {
            return Err(invalid(
                "audio.frame_duration_ms",
                &format!("must be at most {}", defaults::MAX_FRAME_DURATION_MS),
            ));
        }
        if self.encoder.complexity > defaults::MAX_ENCODER_COMPLEXITY {
            return Err(invalid(
                "encoder.complexity",
                &format!("must be at most {}", defaults::MAX_ENCODER_COMPLEXITY),
            ));
        }
        if self.frontend.feed_chunk_samples == 0 {
            return Err(invalid("frontend.feed_chunk_samples", "must be positive"));
        }
        Ok(())
    }

    /// Serialize the effective configuration back to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| VocoreError::ConfigParse {
            message: e.to_string(),
        })
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/vocore/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join("vocore")
            .join("config.toml")
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn invalid(key: &str, message: &str) -> VocoreError {
    VocoreError::ConfigInvalidValue {
        key: key.to_string(),
        message: message.to_string(),
    }
}
