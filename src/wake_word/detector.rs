//! Wake-word detection on the microphone stream.
//!
//! [`ActiveWakeWord`] owns chunking, run state and the pre-detection audio
//! history; the actual keyword decision is delegated to a [`KeywordSpotter`].

use crate::audio::vad::calculate_rms;
use crate::codec::FrameEncoder;
use crate::defaults;
use crate::error::{Result, VocoreError};
use crate::wake_word::{DetectionCallback, WakeWord};
use std::collections::VecDeque;

/// Keyword decision engine behind [`ActiveWakeWord`].
pub trait KeywordSpotter: Send {
    /// Keywords this spotter can report, indexed by `detect`'s result.
    fn words(&self) -> &[String];

    /// Samples expected per `detect` call.
    fn chunk_size(&self) -> usize;

    /// Index into `words()` of the keyword that just ended, if any.
    fn detect(&mut self, chunk: &[i16]) -> Option<usize>;

    fn reset(&mut self);
}

/// Minimum voiced duration of a wake word (in samples at 16kHz)
const MIN_SPEECH_SAMPLES: usize = 4800; // 0.3 seconds

/// Longer bursts are sentences, not wake words
const MAX_SPEECH_SAMPLES: usize = 32000; // 2 seconds

/// Silence that closes a burst (in samples)
const SILENCE_SAMPLES: usize = 8000; // 0.5 seconds

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SpotterState {
    Idle,
    Listening,
    /// Burst ran too long; wait for silence before listening again.
    Rejecting,
}

/// Energy-gate spotter: a voiced burst of wake-word length followed by
/// silence counts as the first configured word.
#[derive(Debug, Clone)]
pub struct EnergyKeywordSpotter {
    words: Vec<String>,
    threshold: f32,
    state: SpotterState,
    speech_samples: usize,
    silence_samples: usize,
}

impl EnergyKeywordSpotter {
    pub fn new(words: Vec<String>, threshold: f32) -> Self {
        let words = words
            .into_iter()
            .map(|w| w.trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();
        Self {
            words,
            threshold,
            state: SpotterState::Idle,
            speech_samples: 0,
            silence_samples: 0,
        }
    }
}

impl KeywordSpotter for EnergyKeywordSpotter {
    fn words(&self) -> &[String] {
        &self.words
    }

    fn chunk_size(&self) -> usize {
        defaults::FEED_CHUNK_SAMPLES
    }

    fn detect(&mut self, chunk: &[i16]) -> Option<usize> {
        let energy = calculate_rms(chunk);
        let is_speech = energy > self.threshold;

        match self.state {
            SpotterState::Idle => {
                if is_speech {
                    self.state = SpotterState::Listening;
                    self.speech_samples = chunk.len();
                    self.silence_samples = 0;
                    tracing::trace!(energy, "speech burst started");
                }
                None
            }
            SpotterState::Listening => {
                if is_speech {
                    self.speech_samples += chunk.len();
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += chunk.len();
                }

                if self.speech_samples > MAX_SPEECH_SAMPLES {
                    tracing::trace!("burst too long for a wake word");
                    self.state = SpotterState::Rejecting;
                    self.silence_samples = 0;
                    return None;
                }

                if self.silence_samples > SILENCE_SAMPLES {
                    let matched = self.speech_samples >= MIN_SPEECH_SAMPLES;
                    self.reset();
                    if matched && !self.words.is_empty() {
                        return Some(0);
                    }
                }
                None
            }
            SpotterState::Rejecting => {
                if is_speech {
                    self.silence_samples = 0;
                } else {
                    self.silence_samples += chunk.len();
                    if self.silence_samples > SILENCE_SAMPLES {
                        self.reset();
                    }
                }
                None
            }
        }
    }

    fn reset(&mut self) {
        self.state = SpotterState::Idle;
        self.speech_samples = 0;
        self.silence_samples = 0;
    }
}

/// Wake-word variant that runs a [`KeywordSpotter`] over the fed audio.
///
/// Detection stops itself on a match; call `start_detection` again to re-arm.
pub struct ActiveWakeWord<S: KeywordSpotter> {
    spotter: S,
    initialized: bool,
    running: bool,
    input: VecDeque<i16>,
    history: VecDeque<i16>,
    history_capacity: usize,
    callback: Option<DetectionCallback>,
    last_word: Option<String>,
}

impl<S: KeywordSpotter> ActiveWakeWord<S> {
    pub fn new(spotter: S) -> Self {
        let history_capacity =
            (defaults::WAKE_WORD_HISTORY_MS * defaults::SAMPLE_RATE / 1000) as usize;
        Self {
            spotter,
            initialized: false,
            running: false,
            input: VecDeque::new(),
            history: VecDeque::with_capacity(history_capacity),
            history_capacity,
            callback: None,
            last_word: None,
        }
    }

    /// Samples of pre-detection audio currently kept.
    pub fn history_samples(&self) -> usize {
        self.history.len()
    }

    fn remember(history: &mut VecDeque<i16>, capacity: usize, chunk: &[i16]) {
        history.extend(chunk.iter().copied());
        if history.len() > capacity {
            let excess = history.len() - capacity;
            history.drain(..excess);
        }
    }

    fn detected(&mut self, index: usize) {
        let Some(word) = self.spotter.words().get(index).cloned() else {
            tracing::warn!(index, "spotter reported an unknown keyword");
            return;
        };

        self.stop_detection();
        tracing::info!(wake_word = %word, "wake word detected");
        self.last_word = Some(word.clone());
        if let Some(callback) = &self.callback {
            callback(&word);
        }
    }
}

impl<S: KeywordSpotter> WakeWord for ActiveWakeWord<S> {
    fn initialize(&mut self) -> Result<()> {
        if self.spotter.words().is_empty() {
            return Err(VocoreError::WakeWordInit {
                message: "no wake words configured".to_string(),
            });
        }
        if self.spotter.chunk_size() == 0 {
            return Err(VocoreError::WakeWordInit {
                message: "keyword spotter reports zero chunk size".to_string(),
            });
        }
        self.initialized = true;
        tracing::debug!(
            words = ?self.spotter.words(),
            chunk = self.spotter.chunk_size(),
            "wake word initialized"
        );
        Ok(())
    }

    fn feed(&mut self, pcm: &[i16]) {
        if !self.initialized || !self.running {
            return;
        }

        let chunk = self.spotter.chunk_size();
        self.input.extend(pcm.iter().copied());
        while self.running && self.input.len() >= chunk {
            let samples = &self.input.make_contiguous()[..chunk];
            Self::remember(&mut self.history, self.history_capacity, samples);
            let hit = self.spotter.detect(samples);
            self.input.drain(..chunk);
            if let Some(index) = hit {
                self.detected(index);
            }
        }
    }

    fn on_wake_word_detected(&mut self, callback: DetectionCallback) {
        self.callback = Some(callback);
    }

    fn start_detection(&mut self) {
        if !self.initialized {
            tracing::warn!("wake word started before initialize");
            return;
        }
        self.running = true;
    }

    fn stop_detection(&mut self) {
        self.running = false;
        self.input.clear();
        self.spotter.reset();
    }

    fn is_detection_running(&self) -> bool {
        self.running
    }

    fn feed_size(&self) -> usize {
        if self.initialized {
            self.spotter.chunk_size()
        } else {
            0
        }
    }

    fn last_detected_wake_word(&self) -> Option<String> {
        self.last_word.clone()
    }

    fn encode_wake_word_data(&mut self, encoder: &mut FrameEncoder) -> Vec<Vec<u8>> {
        if let Some(config) = encoder.config()
            && (config.sample_rate != defaults::SAMPLE_RATE || config.channels != 1)
        {
            tracing::warn!(
                sample_rate = config.sample_rate,
                channels = config.channels,
                "wake word audio needs a 16 kHz mono encoder"
            );
            return Vec::new();
        }

        let pcm: Vec<i16> = self.history.drain(..).collect();
        let mut packets = Vec::new();
        encoder.reset_state();
        encoder.encode(&pcm, |packet| packets.push(packet.to_vec()));
        // The partial tail frame must not leak into the live stream
        encoder.reset_state();
        tracing::debug!(
            samples = pcm.len(),
            packets = packets.len(),
            "wake word audio encoded"
        );
        packets
    }
}
