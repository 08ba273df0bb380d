//! Wake-word detection strategies.
//!
//! The audio service always talks to a [`WakeWord`]; whether detection is
//! really happening is decided once, at configuration time, by
//! [`from_config`].

pub mod detector;
pub mod null;

pub use detector::{ActiveWakeWord, EnergyKeywordSpotter, KeywordSpotter};
pub use null::NullWakeWord;

use crate::codec::FrameEncoder;
use crate::config::WakeWordConfig;
use crate::error::Result;

/// Callback receiving the detected wake word.
pub type DetectionCallback = Box<dyn Fn(&str) + Send + Sync>;

/// Feed-and-detect interface shared by every wake-word variant.
pub trait WakeWord: Send {
    /// Prepares the detector. Must succeed before `feed` has any effect.
    fn initialize(&mut self) -> Result<()>;

    /// Hands 16 kHz mono microphone samples to the detector.
    ///
    /// The detection callback, if any, runs synchronously inside this call.
    fn feed(&mut self, pcm: &[i16]);

    fn on_wake_word_detected(&mut self, callback: DetectionCallback);

    fn start_detection(&mut self);

    fn stop_detection(&mut self);

    fn is_detection_running(&self) -> bool;

    /// Samples per `feed` the detector prefers; 0 when it takes nothing.
    fn feed_size(&self) -> usize;

    fn last_detected_wake_word(&self) -> Option<String>;

    /// Encodes the audio that led up to the last detection and forgets it.
    fn encode_wake_word_data(&mut self, encoder: &mut FrameEncoder) -> Vec<Vec<u8>>;
}

/// Picks the wake-word variant for `config`.
pub fn from_config(config: &WakeWordConfig) -> Box<dyn WakeWord> {
    if config.enabled {
        tracing::debug!(words = ?config.words, "wake word detection enabled");
        Box::new(ActiveWakeWord::new(EnergyKeywordSpotter::new(
            config.words.clone(),
            config.threshold,
        )))
    } else {
        Box::new(NullWakeWord)
    }
}
