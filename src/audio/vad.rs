//! Energy-based voice activity classification.
//!
//! Used by the built-in front end. Vendor front ends report their own
//! per-chunk classification and never go through this module.

use crate::defaults;

/// Per-chunk voice activity classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VadState {
    #[default]
    Silence,
    Speech,
}

impl VadState {
    pub fn is_speech(self) -> bool {
        self == VadState::Speech
    }
}

/// Classifies chunks by RMS level with a short hangover, so a single quiet
/// chunk inside a word does not flip the state.
#[derive(Debug, Clone)]
pub struct EnergyVad {
    threshold: f32,
    hangover_chunks: u32,
    quiet_run: u32,
    state: VadState,
}

impl EnergyVad {
    pub fn new(threshold: f32, hangover_chunks: u32) -> Self {
        Self {
            threshold,
            hangover_chunks,
            quiet_run: 0,
            state: VadState::Silence,
        }
    }

    pub fn classify(&mut self, samples: &[i16]) -> VadState {
        if calculate_rms(samples) > self.threshold {
            self.quiet_run = 0;
            self.state = VadState::Speech;
        } else if self.state == VadState::Speech {
            self.quiet_run += 1;
            if self.quiet_run > self.hangover_chunks {
                self.state = VadState::Silence;
                self.quiet_run = 0;
            }
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.quiet_run = 0;
        self.state = VadState::Silence;
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new(defaults::VAD_THRESHOLD, 2)
    }
}

/// Root-mean-square level of `samples`, normalised to 0.0..=1.0.
pub fn calculate_rms(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f64 = samples
        .iter()
        .map(|&sample| {
            let normalized = sample as f64 / i16::MAX as f64;
            normalized * normalized
        })
        .sum();

    let mean_square = sum_squares / samples.len() as f64;
    mean_square.sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rms_of_silence_is_zero() {
        assert_eq!(calculate_rms(&[0; 160]), 0.0);
        assert_eq!(calculate_rms(&[]), 0.0);
    }

    #[test]
    fn test_rms_of_full_scale_is_one() {
        let rms = calculate_rms(&[i16::MAX; 160]);
        assert!((rms - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_loud_chunk_is_speech() {
        let mut vad = EnergyVad::default();
        assert_eq!(vad.classify(&[8000; 512]), VadState::Speech);
    }

    #[test]
    fn test_hangover_delays_silence() {
        let mut vad = EnergyVad::new(0.02, 2);
        vad.classify(&[8000; 512]);

        assert_eq!(vad.classify(&[0; 512]), VadState::Speech);
        assert_eq!(vad.classify(&[0; 512]), VadState::Speech);
        assert_eq!(vad.classify(&[0; 512]), VadState::Silence);
    }

    #[test]
    fn test_reset_returns_to_silence() {
        let mut vad = EnergyVad::new(0.02, 5);
        vad.classify(&[8000; 512]);
        vad.reset();
        assert_eq!(vad.classify(&[0; 512]), VadState::Silence);
    }
}
