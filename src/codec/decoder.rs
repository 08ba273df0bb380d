//! Packet decoder adapter.

use crate::codec::{CodecConfig, DecoderBackend};
use crate::error::Result;

/// Decoder adapter in front of a [`DecoderBackend`].
///
/// Each packet decodes to at most one frame. The decoder stays inert (every
/// `decode` returns `false`) if the backend could not be opened.
pub struct FrameDecoder {
    backend: Box<dyn DecoderBackend>,
    config: CodecConfig,
    frame_size: usize,
    open: bool,
}

impl FrameDecoder {
    pub fn new(
        backend: Box<dyn DecoderBackend>,
        sample_rate: u32,
        channels: u16,
        duration_ms: u32,
    ) -> Self {
        let mut decoder = Self {
            backend,
            config: CodecConfig::new(sample_rate, channels, duration_ms),
            frame_size: 0,
            open: false,
        };
        if decoder.configure(sample_rate, channels, duration_ms).is_err() {
            tracing::debug!("decoder left unconfigured");
        }
        decoder
    }

    /// Reopens the backend for a new stream format.
    ///
    /// On failure the decoder is left closed and still reports the last
    /// format it opened successfully.
    pub fn configure(&mut self, sample_rate: u32, channels: u16, duration_ms: u32) -> Result<()> {
        if self.open {
            self.backend.close();
            self.open = false;
        }
        let config = CodecConfig::new(sample_rate, channels, duration_ms);
        let info = self.backend.open(&config).inspect_err(|e| {
            tracing::error!(sample_rate, channels, duration_ms, "failed to open decoder: {e}");
        })?;
        self.frame_size = info.frame_samples.max(config.frame_size());
        self.config = config;
        self.open = true;
        Ok(())
    }

    /// Decodes `packet` into `pcm`, replacing its contents.
    ///
    /// Returns `false` (and logs) when the packet could not be decoded; the
    /// caller should treat that as a dropped frame.
    pub fn decode(&mut self, packet: &[u8], pcm: &mut Vec<i16>) -> bool {
        if !self.open {
            tracing::error!("decoder not configured, dropping packet");
            return false;
        }

        pcm.clear();
        pcm.resize(self.frame_size, 0);
        match self.backend.decode(packet, pcm) {
            Ok(samples) => {
                pcm.truncate(samples);
                true
            }
            Err(status) => {
                tracing::error!(code = status.0, bytes = packet.len(), "failed to decode audio");
                pcm.clear();
                false
            }
        }
    }

    /// Clears inter-packet state, e.g. before a new downlink stream.
    pub fn reset_state(&mut self) {
        if self.open {
            self.backend.reset();
        }
    }

    pub fn is_configured(&self) -> bool {
        self.open
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.config.channels
    }

    pub fn duration_ms(&self) -> u32 {
        self.config.duration_ms
    }
}

impl Drop for FrameDecoder {
    fn drop(&mut self) {
        if self.open {
            self.backend.close();
        }
    }
}
