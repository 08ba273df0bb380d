use crate::codec::FrameEncoder;
use crate::error::Result;
use crate::wake_word::{DetectionCallback, WakeWord};

/// Wake-word variant for builds without detection. Never detects anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullWakeWord;

impl WakeWord for NullWakeWord {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn feed(&mut self, _pcm: &[i16]) {}

    fn on_wake_word_detected(&mut self, _callback: DetectionCallback) {}

    fn start_detection(&mut self) {}

    fn stop_detection(&mut self) {}

    fn is_detection_running(&self) -> bool {
        false
    }

    fn feed_size(&self) -> usize {
        0
    }

    fn last_detected_wake_word(&self) -> Option<String> {
        None
    }

    fn encode_wake_word_data(&mut self, _encoder: &mut FrameEncoder) -> Vec<Vec<u8>> {
        Vec::new()
    }
}
