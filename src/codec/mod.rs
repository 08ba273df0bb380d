//! Codec transport boundary.
//!
//! The compressed-audio library (Opus on the device) sits behind
//! [`EncoderBackend`] / [`DecoderBackend`]. The adapters in this module turn
//! irregular PCM delivery into the fixed frames those backends require.

pub mod decoder;
pub mod encoder;
pub mod pcm16;

pub use decoder::FrameDecoder;
pub use encoder::FrameEncoder;
pub use pcm16::Pcm16Codec;

use crate::error::Result;
use thiserror::Error;

/// Parameters a backend session is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodecConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub duration_ms: u32,
}

impl CodecConfig {
    pub fn new(sample_rate: u32, channels: u16, duration_ms: u32) -> Self {
        Self {
            sample_rate,
            channels,
            duration_ms,
        }
    }

    /// Interleaved samples in one frame: `sample_rate / 1000 * duration_ms * channels`.
    pub fn frame_size(&self) -> usize {
        (u64::from(self.sample_rate) / 1000 * u64::from(self.duration_ms)) as usize
            * usize::from(self.channels)
    }
}

/// What an opened backend session reports about its framing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    /// Interleaved samples per frame.
    pub frame_samples: usize,
    /// Worst-case encoded size of one frame; 0 when the backend does not say.
    pub max_packet_bytes: usize,
}

/// Negative status returned by a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("codec returned status {0}")]
pub struct CodecStatus(pub i32);

/// Compressing side of the transport codec.
pub trait EncoderBackend: Send {
    /// Opens a session for `config`.
    fn open(&mut self, config: &CodecConfig) -> Result<FrameInfo>;

    /// Releases the session. Safe to call when nothing is open.
    fn close(&mut self);

    /// Encodes exactly one frame into `out`, returning the packet length.
    ///
    /// `Ok(0)` means the frame was suppressed (discontinuous transmission).
    fn encode(&mut self, pcm: &[i16], out: &mut [u8]) -> std::result::Result<usize, CodecStatus>;

    /// Clears inter-frame state without closing the session.
    fn reset(&mut self);

    fn set_complexity(&mut self, complexity: u8);

    fn set_dtx(&mut self, enabled: bool);
}

/// Decompressing side of the transport codec.
pub trait DecoderBackend: Send {
    fn open(&mut self, config: &CodecConfig) -> Result<FrameInfo>;

    fn close(&mut self);

    /// Decodes one packet into `pcm`, returning the number of samples written.
    fn decode(&mut self, packet: &[u8], pcm: &mut [i16]) -> std::result::Result<usize, CodecStatus>;

    fn reset(&mut self);
}
