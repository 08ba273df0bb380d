//! Lossless little-endian PCM backend.
//!
//! Packs each frame as raw 16-bit samples. Lets the full uplink/downlink
//! path run without a compression library, and honours DTX by suppressing
//! frames of digital silence.

use crate::codec::{CodecConfig, CodecStatus, DecoderBackend, EncoderBackend, FrameInfo};
use crate::error::{Result, VocoreError};

const STATUS_NOT_OPEN: i32 = -1;
const STATUS_BAD_LENGTH: i32 = -2;
const STATUS_BUFFER_TOO_SMALL: i32 = -3;

/// Raw PCM16 codec usable as both encoder and decoder backend.
#[derive(Debug, Clone, Default)]
pub struct Pcm16Codec {
    config: Option<CodecConfig>,
    complexity: u8,
    dtx: bool,
}

impl Pcm16Codec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complexity(&self) -> u8 {
        self.complexity
    }

    pub fn dtx(&self) -> bool {
        self.dtx
    }

    fn open_session(&mut self, config: &CodecConfig) -> Result<FrameInfo> {
        let frame_samples = config.frame_size();
        if frame_samples == 0 {
            return Err(VocoreError::CodecOpen {
                message: format!(
                    "empty frame for {}Hz x{} over {}ms",
                    config.sample_rate, config.channels, config.duration_ms
                ),
            });
        }
        self.config = Some(*config);
        Ok(FrameInfo {
            frame_samples,
            max_packet_bytes: frame_samples * 2,
        })
    }
}

impl EncoderBackend for Pcm16Codec {
    fn open(&mut self, config: &CodecConfig) -> Result<FrameInfo> {
        self.open_session(config)
    }

    fn close(&mut self) {
        self.config = None;
    }

    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> std::result::Result<usize, CodecStatus> {
        if self.config.is_none() {
            return Err(CodecStatus(STATUS_NOT_OPEN));
        }
        if self.dtx && pcm.iter().all(|&s| s == 0) {
            return Ok(0);
        }
        let needed = pcm.len() * 2;
        if out.len() < needed {
            return Err(CodecStatus(STATUS_BUFFER_TOO_SMALL));
        }
        for (chunk, sample) in out.chunks_exact_mut(2).zip(pcm) {
            chunk.copy_from_slice(&sample.to_le_bytes());
        }
        Ok(needed)
    }

    fn reset(&mut self) {}

    fn set_complexity(&mut self, complexity: u8) {
        self.complexity = complexity;
    }

    fn set_dtx(&mut self, enabled: bool) {
        self.dtx = enabled;
    }
}

impl DecoderBackend for Pcm16Codec {
    fn open(&mut self, config: &CodecConfig) -> Result<FrameInfo> {
        self.open_session(config)
    }

    fn close(&mut self) {
        self.config = None;
    }

    fn decode(&mut self, packet: &[u8], pcm: &mut [i16]) -> std::result::Result<usize, CodecStatus> {
        if self.config.is_none() {
            return Err(CodecStatus(STATUS_NOT_OPEN));
        }
        if packet.len() % 2 != 0 {
            return Err(CodecStatus(STATUS_BAD_LENGTH));
        }
        let samples = packet.len() / 2;
        if pcm.len() < samples {
            return Err(CodecStatus(STATUS_BUFFER_TOO_SMALL));
        }
        for (sample, bytes) in pcm.iter_mut().zip(packet.chunks_exact(2)) {
            *sample = i16::from_le_bytes([bytes[0], bytes[1]]);
        }
        Ok(samples)
    }

    fn reset(&mut self) {}
}
