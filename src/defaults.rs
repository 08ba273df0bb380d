//! Default configuration constants for vocore.
//!
//! Shared by the configuration types and the components that fall back to
//! them when constructed without a config file.

/// Sample rate of the processing domain in Hz.
///
/// The front-end processor, the wake-word detector and the uplink encoder
/// all work on 16kHz mono PCM regardless of what the device delivers.
pub const SAMPLE_RATE: u32 = 16000;

/// Default duration of one encoded frame in milliseconds.
pub const FRAME_DURATION_MS: u32 = 60;

/// Longest frame duration accepted in milliseconds (the Opus maximum).
pub const MAX_FRAME_DURATION_MS: u32 = 120;

/// Active task count above which the scheduler starts checking free memory.
pub const MAX_ACTIVE_TASKS: usize = 30;

/// Free memory (bytes) below which an over-threshold scheduler logs a warning.
pub const MIN_FREE_MEMORY_BYTES: u64 = 10_000;

/// Upper bound for a single front-end fetch before the worker re-checks its state.
pub const FETCH_TIMEOUT_MS: u64 = 100;

/// Default encoder complexity (0 = cheapest).
pub const ENCODER_COMPLEXITY: u8 = 0;

/// Highest complexity an encoder backend accepts.
pub const MAX_ENCODER_COMPLEXITY: u8 = 10;

/// Worst-case size of one compressed packet.
///
/// Matches the largest packet an Opus encoder can produce for a single frame.
pub const MAX_OPUS_PACKET_BYTES: usize = 4000;

/// Feed chunk size of the built-in passthrough front end (32ms at 16kHz).
pub const FEED_CHUNK_SAMPLES: usize = 512;

/// RMS threshold used by the built-in front end to classify speech.
pub const VAD_THRESHOLD: f32 = 0.02;

/// How much wake-word audio is kept for speaker identification.
pub const WAKE_WORD_HISTORY_MS: u32 = 2000;

/// Encoded packets buffered for the network layer before the oldest is dropped.
pub const MAX_SEND_PACKETS_IN_QUEUE: usize = 40;

/// Downlink packets accepted before `push_packet_to_decode_queue` refuses more.
pub const MAX_DECODE_PACKETS_IN_QUEUE: usize = 40;

/// Delay after enabling voice processing before the first capture is used.
pub const INPUT_WARMUP_MS: u64 = 120;

/// Longest mic recording kept by the audio test mode, in milliseconds.
pub const AUDIO_TESTING_MAX_DURATION_MS: u32 = 10_000;
