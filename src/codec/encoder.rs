//! Frame-buffering encoder adapter.
//!
//! Accepts PCM in chunks of any size and emits one packet per complete
//! frame. The tail that does not fill a frame stays buffered for the next
//! call. Failures are logged and never interrupt the caller: an audio path
//! that stops on a bad frame is worse than one that skips it.

use crate::codec::{CodecConfig, EncoderBackend};
use crate::defaults;
use crate::error::{Result, VocoreError};
use std::collections::VecDeque;

/// Encoder adapter in front of an [`EncoderBackend`].
pub struct FrameEncoder {
    backend: Box<dyn EncoderBackend>,
    config: Option<CodecConfig>,
    frame_size: usize,
    pcm: VecDeque<i16>,
    out: Vec<u8>,
    complexity: u8,
    dtx: bool,
}

impl FrameEncoder {
    /// Creates an unconfigured encoder; `encode` is a logged no-op until
    /// [`configure`](Self::configure) succeeds.
    pub fn new(backend: Box<dyn EncoderBackend>) -> Self {
        Self {
            backend,
            config: None,
            frame_size: 0,
            pcm: VecDeque::new(),
            out: Vec::new(),
            complexity: defaults::ENCODER_COMPLEXITY,
            dtx: false,
        }
    }

    /// Creates and configures in one step. A failed configuration is logged
    /// and leaves the encoder inert.
    pub fn with_config(
        backend: Box<dyn EncoderBackend>,
        sample_rate: u32,
        channels: u16,
        duration_ms: u32,
    ) -> Self {
        let mut encoder = Self::new(backend);
        // configure() already logged the failure
        if encoder.configure(sample_rate, channels, duration_ms).is_err() {
            tracing::debug!("encoder left unconfigured");
        }
        encoder
    }

    /// (Re)opens the backend for a new frame geometry.
    ///
    /// Any previous session is closed and buffered samples are discarded, so
    /// leftovers from the old frame size can never misalign new frames.
    pub fn configure(&mut self, sample_rate: u32, channels: u16, duration_ms: u32) -> Result<()> {
        if self.config.take().is_some() {
            self.backend.close();
        }
        self.pcm.clear();
        self.frame_size = 0;

        let config = CodecConfig::new(sample_rate, channels, duration_ms);
        let frame_size = config.frame_size();
        if frame_size == 0 {
            let e = VocoreError::CodecOpen {
                message: format!(
                    "{} Hz x {} ch x {} ms gives an empty frame",
                    sample_rate, channels, duration_ms
                ),
            };
            tracing::error!("{e}");
            return Err(e);
        }

        let info = self.backend.open(&config).inspect_err(|e| {
            tracing::error!(sample_rate, channels, duration_ms, "failed to open encoder: {e}");
        })?;

        if info.frame_samples != frame_size {
            self.backend.close();
            let e = VocoreError::CodecOpen {
                message: format!(
                    "backend frame of {} samples does not match expected {}",
                    info.frame_samples, frame_size
                ),
            };
            tracing::error!("{e}");
            return Err(e);
        }

        let max_packet = if info.max_packet_bytes == 0 {
            defaults::MAX_OPUS_PACKET_BYTES
        } else {
            info.max_packet_bytes
        };
        self.out = vec![0u8; max_packet];
        self.pcm.reserve(frame_size * 2);
        self.frame_size = frame_size;
        self.config = Some(config);

        self.backend.set_complexity(self.complexity);
        self.backend.set_dtx(self.dtx);

        tracing::debug!(sample_rate, channels, duration_ms, frame_size, "encoder configured");
        Ok(())
    }

    /// Buffers `pcm` and encodes every complete frame.
    ///
    /// `handler` runs synchronously on the caller's thread once per packet
    /// and only borrows the bytes; copy them to keep them. A backend failure
    /// stops this call: the failed frame stays buffered and no further
    /// frames are attempted.
    pub fn encode<F>(&mut self, pcm: &[i16], mut handler: F)
    where
        F: FnMut(&[u8]),
    {
        if self.config.is_none() {
            tracing::error!(samples = pcm.len(), "encoder not configured, dropping audio");
            return;
        }

        self.pcm.extend(pcm.iter().copied());

        while self.pcm.len() >= self.frame_size {
            let frame = &self.pcm.make_contiguous()[..self.frame_size];
            match self.backend.encode(frame, &mut self.out) {
                Ok(0) => tracing::trace!("frame suppressed by dtx"),
                Ok(len) => handler(&self.out[..len]),
                Err(status) => {
                    tracing::error!(code = status.0, "failed to encode audio frame");
                    return;
                }
            }
            self.pcm.drain(..self.frame_size);
        }
    }

    /// Forgets buffered samples and inter-frame codec state, keeping the
    /// configuration. Use when the audio source changes.
    pub fn reset_state(&mut self) {
        self.pcm.clear();
        if self.config.is_some() {
            self.backend.reset();
        }
    }

    /// Trade CPU for quality without reconfiguring.
    pub fn set_complexity(&mut self, complexity: u8) {
        let complexity = complexity.min(defaults::MAX_ENCODER_COMPLEXITY);
        self.complexity = complexity;
        if self.config.is_some() {
            self.backend.set_complexity(complexity);
        }
    }

    /// Toggle discontinuous transmission without reconfiguring.
    pub fn set_dtx(&mut self, enabled: bool) {
        self.dtx = enabled;
        if self.config.is_some() {
            self.backend.set_dtx(enabled);
        }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Interleaved samples per frame, 0 while unconfigured.
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn buffered_samples(&self) -> usize {
        self.pcm.len()
    }

    pub fn config(&self) -> Option<CodecConfig> {
        self.config
    }

    pub fn complexity(&self) -> u8 {
        self.complexity
    }

    pub fn dtx(&self) -> bool {
        self.dtx
    }
}

impl Drop for FrameEncoder {
    fn drop(&mut self) {
        if self.config.is_some() {
            self.backend.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{CodecStatus, FrameInfo, Pcm16Codec};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Backend that records calls and can be told to fail.
    #[derive(Default)]
    struct RecordingBackend {
        fail_on_call: Option<usize>,
        fail_open: bool,
        calls: Arc<AtomicUsize>,
        resets: Arc<AtomicUsize>,
        closes: Arc<AtomicUsize>,
        settings: Arc<Mutex<(u8, bool)>>,
    }

    impl EncoderBackend for RecordingBackend {
        fn open(&mut self, config: &CodecConfig) -> Result<FrameInfo> {
            if self.fail_open {
                return Err(VocoreError::CodecOpen {
                    message: "no codec".to_string(),
                });
            }
            Ok(FrameInfo {
                frame_samples: config.frame_size(),
                max_packet_bytes: 0,
            })
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }

        fn encode(
            &mut self,
            pcm: &[i16],
            out: &mut [u8],
        ) -> std::result::Result<usize, CodecStatus> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on_call == Some(call) {
                return Err(CodecStatus(-1));
            }
            // First sample tags the packet so tests can check ordering
            out[..2].copy_from_slice(&pcm[0].to_le_bytes());
            Ok(2)
        }

        fn reset(&mut self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }

        fn set_complexity(&mut self, complexity: u8) {
            self.settings.lock().unwrap().0 = complexity;
        }

        fn set_dtx(&mut self, enabled: bool) {
            self.settings.lock().unwrap().1 = enabled;
        }
    }

    fn ramp(start: i16, len: usize) -> Vec<i16> {
        (0..len).map(|i| start + i as i16).collect()
    }

    #[test]
    fn test_unconfigured_encode_is_noop() {
        let mut encoder = FrameEncoder::new(Box::new(Pcm16Codec::new()));
        let mut packets = 0;
        encoder.encode(&[1; 2000], |_| packets += 1);

        assert_eq!(packets, 0);
        assert_eq!(encoder.buffered_samples(), 0);
        assert!(!encoder.is_configured());
    }

    #[test]
    fn test_frame_size_from_configuration() {
        let encoder = FrameEncoder::with_config(Box::new(Pcm16Codec::new()), 16000, 1, 60);
        assert_eq!(encoder.frame_size(), 960);
    }

    #[test]
    fn test_arbitrary_chunks_yield_whole_frames_and_keep_remainder() {
        // 10ms at 16kHz → F = 160; feed 3F + 37 in odd chunk sizes
        let mut encoder = FrameEncoder::with_config(Box::new(Pcm16Codec::new()), 16000, 1, 10);
        let total = 3 * 160 + 37;
        let input = ramp(0, total);
        let mut packets: Vec<Vec<u8>> = Vec::new();

        for chunk in input.chunks(71) {
            encoder.encode(chunk, |p| packets.push(p.to_vec()));
        }

        assert_eq!(packets.len(), 3);
        assert!(packets.iter().all(|p| p.len() == 320));
        assert_eq!(encoder.buffered_samples(), 37);

        // Packets carry the samples in arrival order
        let decoded: Vec<i16> = packets
            .iter()
            .flat_map(|p| p.chunks_exact(2).map(|b| i16::from_le_bytes([b[0], b[1]])))
            .collect();
        assert_eq!(decoded, input[..480].to_vec());
    }

    #[test]
    fn test_chunk_smaller_than_frame_emits_nothing() {
        let mut encoder = FrameEncoder::with_config(Box::new(Pcm16Codec::new()), 16000, 1, 10);
        let mut packets = 0;
        encoder.encode(&[5; 159], |_| packets += 1);
        assert_eq!(packets, 0);
        encoder.encode(&[5; 1], |_| packets += 1);
        assert_eq!(packets, 1);
        assert_eq!(encoder.buffered_samples(), 0);
    }

    #[test]
    fn test_backend_failure_aborts_current_call() {
        let backend = RecordingBackend {
            fail_on_call: Some(1),
            ..Default::default()
        };
        let calls = backend.calls.clone();
        let mut encoder = FrameEncoder::with_config(Box::new(backend), 16000, 1, 10);
        let mut tags = Vec::new();

        encoder.encode(&ramp(0, 480), |p| tags.push(i16::from_le_bytes([p[0], p[1]])));

        // First frame succeeded, second failed, third never attempted
        assert_eq!(tags, vec![0]);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(encoder.buffered_samples(), 320);

        // Next call retries the frame that failed
        encoder.encode(&[], |p| tags.push(i16::from_le_bytes([p[0], p[1]])));
        assert_eq!(tags, vec![0, 160, 320]);
        assert_eq!(encoder.buffered_samples(), 0);
    }

    #[test]
    fn test_failed_open_leaves_encoder_inert() {
        let backend = RecordingBackend {
            fail_open: true,
            ..Default::default()
        };
        let calls = backend.calls.clone();
        let mut encoder = FrameEncoder::new(Box::new(backend));

        assert!(encoder.configure(16000, 1, 60).is_err());
        encoder.encode(&[0; 2000], |_| panic!("no packets expected"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_frame_geometry_is_rejected() {
        let backend = RecordingBackend::default();
        let calls = backend.calls.clone();
        let closes = backend.closes.clone();
        let mut encoder = FrameEncoder::new(Box::new(backend));

        for (rate, ms) in [(16000, 0), (500, 60)] {
            assert!(matches!(
                encoder.configure(rate, 1, ms),
                Err(VocoreError::CodecOpen { .. })
            ));
            assert!(!encoder.is_configured());
            assert_eq!(encoder.frame_size(), 0);
        }

        // Must return instead of spinning on zero-length frames
        encoder.encode(&[1; 10], |_| panic!("no packets expected"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_empty_geometry_closes_previous_session() {
        let backend = RecordingBackend::default();
        let closes = backend.closes.clone();
        let mut encoder = FrameEncoder::with_config(Box::new(backend), 16000, 1, 60);

        assert!(encoder.configure(16000, 1, 0).is_err());
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(!encoder.is_configured());
        drop(encoder);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reconfigure_discards_old_buffer() {
        let backend = RecordingBackend::default();
        let closes = backend.closes.clone();
        let mut encoder = FrameEncoder::with_config(Box::new(backend), 16000, 1, 10);

        encoder.encode(&ramp(0, 100), |_| {});
        assert_eq!(encoder.buffered_samples(), 100);

        encoder.configure(8000, 1, 20).unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(encoder.buffered_samples(), 0);
        assert_eq!(encoder.frame_size(), 160);

        // New frames start at the first sample fed after reconfiguration
        let mut tags = Vec::new();
        encoder.encode(&ramp(1000, 320), |p| tags.push(i16::from_le_bytes([p[0], p[1]])));
        assert_eq!(tags, vec![1000, 1160]);
    }

    #[test]
    fn test_reset_state_clears_buffer_and_codec() {
        let backend = RecordingBackend::default();
        let resets = backend.resets.clone();
        let mut encoder = FrameEncoder::with_config(Box::new(backend), 16000, 1, 10);

        encoder.encode(&[1; 90], |_| {});
        encoder.reset_state();

        assert_eq!(encoder.buffered_samples(), 0);
        assert_eq!(resets.load(Ordering::SeqCst), 1);
        assert!(encoder.is_configured());
    }

    #[test]
    fn test_complexity_and_dtx_survive_reconfiguration() {
        let backend = RecordingBackend::default();
        let settings = backend.settings.clone();
        let mut encoder = FrameEncoder::new(Box::new(backend));

        encoder.set_complexity(42);
        encoder.set_dtx(true);
        assert_eq!(encoder.complexity(), 10);

        encoder.configure(16000, 1, 60).unwrap();
        assert_eq!(*settings.lock().unwrap(), (10, true));

        encoder.set_complexity(3);
        assert_eq!(*settings.lock().unwrap(), (3, true));
        assert_eq!(encoder.frame_size(), 960);
    }

    #[test]
    fn test_dtx_suppressed_frames_do_not_reach_handler() {
        let mut encoder = FrameEncoder::with_config(Box::new(Pcm16Codec::new()), 16000, 1, 10);
        encoder.set_dtx(true);
        let mut packets = 0;

        encoder.encode(&[0; 160], |_| packets += 1);
        encoder.encode(&[7; 160], |_| packets += 1);

        assert_eq!(packets, 1);
        assert_eq!(encoder.buffered_samples(), 0);
    }

    #[test]
    fn test_drop_closes_configured_backend() {
        let backend = RecordingBackend::default();
        let closes = backend.closes.clone();
        drop(FrameEncoder::with_config(Box::new(backend), 16000, 1, 60));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }
}
