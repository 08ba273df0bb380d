//! vocore - audio core for voice-assistant devices
//!
//! A background task scheduler plus the streaming audio path: capture,
//! front-end processing, frame cutting, encoding and the downlink back to
//! the speaker.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
#[cfg(feature = "cli")]
pub mod cli;
pub mod codec;
pub mod config;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod scheduler;
pub mod service;
pub mod wake_word;

// Core seams (device → front end → codec)
pub use audio::device::AudioDevice;
pub use audio::frontend::FrontEndProcessor;
pub use codec::{DecoderBackend, EncoderBackend};
pub use wake_word::WakeWord;

// Pipeline and service
pub use audio::pipeline::AudioPipeline;
pub use scheduler::BackgroundScheduler;
pub use service::{AudioBackends, AudioService, AudioStreamPacket, ServiceStats};

// Error handling
pub use error::{Result, VocoreError};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_string_starts_with_cargo_version() {
        let ver = version_string();
        assert!(
            ver.starts_with(env!("CARGO_PKG_VERSION")),
            "version_string should start with CARGO_PKG_VERSION, got: {}",
            ver
        );
    }

    #[test]
    fn version_string_hash_suffix_matches_build_env() {
        let ver = version_string();
        match option_env!("GIT_HASH") {
            Some(hash) if !hash.is_empty() => {
                assert_eq!(ver, format!("{}+{}", env!("CARGO_PKG_VERSION"), hash));
            }
            _ => assert_eq!(ver, env!("CARGO_PKG_VERSION")),
        }
    }
}
