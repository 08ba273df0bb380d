//! Front-end processor boundary.
//!
//! The voice front end (echo cancellation, noise suppression, gain control,
//! VAD) is a black box fed fixed-size chunks on one thread and drained on
//! another. Implementations synchronise internally, hence `&self` methods.

use crate::audio::vad::{EnergyVad, VadState};
use crate::config::FrontendConfig;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, unbounded};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

/// Outcome code of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    Ok,
    Fail(i32),
}

/// One processed chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult {
    pub data: Vec<i16>,
    pub vad_state: VadState,
    pub status: FetchStatus,
}

impl FetchResult {
    pub fn ok(data: Vec<i16>, vad_state: VadState) -> Self {
        Self {
            data,
            vad_state,
            status: FetchStatus::Ok,
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            data: Vec::new(),
            vad_state: VadState::Silence,
            status: FetchStatus::Fail(code),
        }
    }
}

/// Call contract of a voice front-end processor.
pub trait FrontEndProcessor: Send + Sync {
    /// Hands exactly `feed_chunk_size()` interleaved samples to the processor.
    fn feed(&self, chunk: &[i16]);

    /// Waits up to `timeout` for the next processed chunk.
    ///
    /// `None` means nothing was ready in time.
    fn fetch(&self, timeout: Duration) -> Option<FetchResult>;

    fn feed_chunk_size(&self) -> usize;

    fn fetch_chunk_size(&self) -> usize;

    /// Whether the processor can run acoustic echo cancellation at all.
    fn supports_aec(&self) -> bool {
        false
    }

    fn enable_aec(&self);

    fn disable_aec(&self);

    fn enable_vad(&self);

    fn disable_vad(&self);

    /// Discards everything buffered inside the processor.
    fn reset_buffer(&self);
}

/// Built-in front end: splits off the microphone channel, classifies energy
/// and hands the audio back unchanged.
pub struct PassthroughProcessor {
    chunk_samples: usize,
    channels: usize,
    vad: Mutex<EnergyVad>,
    vad_enabled: AtomicBool,
    tx: Sender<FetchResult>,
    rx: Receiver<FetchResult>,
}

impl PassthroughProcessor {
    /// `channels` is the interleaved input layout: 1 = mic, 2 = mic + reference.
    pub fn new(config: &FrontendConfig, channels: u16) -> Self {
        let (tx, rx) = unbounded();
        Self {
            chunk_samples: config.feed_chunk_samples,
            channels: usize::from(channels.max(1)),
            vad: Mutex::new(EnergyVad::new(config.vad_threshold, 2)),
            vad_enabled: AtomicBool::new(true),
            tx,
            rx,
        }
    }

    /// Chunks fed but not yet fetched.
    pub fn queued(&self) -> usize {
        self.rx.len()
    }
}

impl FrontEndProcessor for PassthroughProcessor {
    fn feed(&self, chunk: &[i16]) {
        let mic: Vec<i16> = chunk.iter().step_by(self.channels).copied().collect();
        let vad_state = if self.vad_enabled.load(Ordering::SeqCst) {
            self.vad
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .classify(&mic)
        } else {
            VadState::Silence
        };
        // The receiver lives in self, so the channel cannot be disconnected
        if self.tx.send(FetchResult::ok(mic, vad_state)).is_err() {
            tracing::error!("passthrough front end channel closed");
        }
    }

    fn fetch(&self, timeout: Duration) -> Option<FetchResult> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(FetchResult::failed(-1)),
        }
    }

    fn feed_chunk_size(&self) -> usize {
        self.chunk_samples * self.channels
    }

    fn fetch_chunk_size(&self) -> usize {
        self.chunk_samples
    }

    fn enable_aec(&self) {
        tracing::warn!("passthrough front end has no echo canceller");
    }

    fn disable_aec(&self) {}

    fn enable_vad(&self) {
        self.vad_enabled.store(true, Ordering::SeqCst);
    }

    fn disable_vad(&self) {
        self.vad_enabled.store(false, Ordering::SeqCst);
        self.vad.lock().unwrap_or_else(PoisonError::into_inner).reset();
    }

    fn reset_buffer(&self) {
        let dropped = self.rx.try_iter().count();
        self.vad.lock().unwrap_or_else(PoisonError::into_inner).reset();
        tracing::trace!(dropped, "passthrough front end buffer reset");
    }
}

/// Front end that replays queued fetch results, for tests.
///
/// Fed chunks are recorded rather than processed; results are whatever the
/// test pushed with [`push_result`](Self::push_result).
#[derive(Default)]
pub struct ScriptedProcessor {
    feed_chunk: usize,
    aec_supported: bool,
    results: Mutex<VecDeque<FetchResult>>,
    ready: Condvar,
    fed: Mutex<Vec<Vec<i16>>>,
    resets: AtomicUsize,
    aec_enabled: AtomicBool,
    vad_enabled: AtomicBool,
}

impl ScriptedProcessor {
    pub fn new(feed_chunk: usize) -> Self {
        Self {
            feed_chunk,
            vad_enabled: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn with_aec_support(mut self) -> Self {
        self.aec_supported = true;
        self
    }

    pub fn push_result(&self, result: FetchResult) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(result);
        self.ready.notify_all();
    }

    /// Chunks received through `feed`, in order.
    pub fn fed_chunks(&self) -> Vec<Vec<i16>> {
        self.fed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn pending_results(&self) -> usize {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn aec_enabled(&self) -> bool {
        self.aec_enabled.load(Ordering::SeqCst)
    }

    pub fn vad_enabled(&self) -> bool {
        self.vad_enabled.load(Ordering::SeqCst)
    }
}

impl FrontEndProcessor for ScriptedProcessor {
    fn feed(&self, chunk: &[i16]) {
        self.fed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(chunk.to_vec());
    }

    fn fetch(&self, timeout: Duration) -> Option<FetchResult> {
        let results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        let (mut results, _) = self
            .ready
            .wait_timeout_while(results, timeout, |queue| queue.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        results.pop_front()
    }

    fn feed_chunk_size(&self) -> usize {
        self.feed_chunk
    }

    fn fetch_chunk_size(&self) -> usize {
        self.feed_chunk
    }

    fn supports_aec(&self) -> bool {
        self.aec_supported
    }

    fn enable_aec(&self) {
        self.aec_enabled.store(true, Ordering::SeqCst);
    }

    fn disable_aec(&self) {
        self.aec_enabled.store(false, Ordering::SeqCst);
    }

    fn enable_vad(&self) {
        self.vad_enabled.store(true, Ordering::SeqCst);
    }

    fn disable_vad(&self) {
        self.vad_enabled.store(false, Ordering::SeqCst);
    }

    fn reset_buffer(&self) {
        self.results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.resets.fetch_add(1, Ordering::SeqCst);
    }
}
