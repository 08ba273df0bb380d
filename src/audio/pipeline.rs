//! Streaming bridge between the microphone and a front-end processor.
//!
//! Producers hand arbitrary-length PCM to [`AudioPipeline::feed`]; the pipeline
//! re-chunks it to the processor's feed size. A dedicated worker thread drains
//! processed chunks, reports speech/silence edges and re-frames the cleaned
//! audio into fixed encoder frames.

use crate::audio::frontend::{FetchStatus, FrontEndProcessor};
use crate::defaults;
use crate::error::{Result, VocoreError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type OutputCallback = Arc<dyn Fn(Vec<i16>) + Send + Sync>;
type VadCallback = Arc<dyn Fn(bool) + Send + Sync>;

#[derive(Debug, Default)]
struct RunState {
    running: bool,
    shutdown: bool,
    /// Bumped on every stop; the worker drops output assembled in older epochs.
    epoch: u64,
}

struct Shared {
    processor: Arc<dyn FrontEndProcessor>,
    frame_samples: usize,
    fetch_timeout: Duration,
    run: Mutex<RunState>,
    cond: Condvar,
    speaking: AtomicBool,
    output_cb: Mutex<Option<OutputCallback>>,
    vad_cb: Mutex<Option<VadCallback>>,
}

impl Shared {
    fn run_state(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn output_callback(&self) -> Option<OutputCallback> {
        self.output_cb
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn vad_callback(&self) -> Option<VadCallback> {
        self.vad_cb
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Feeds a [`FrontEndProcessor`] and emits fixed-size cleaned frames.
///
/// Callbacks run on the pipeline's worker thread.
pub struct AudioPipeline {
    shared: Arc<Shared>,
    input: Mutex<VecDeque<i16>>,
    device_aec: AtomicBool,
    worker: Option<JoinHandle<()>>,
}

impl AudioPipeline {
    /// Creates a stopped pipeline emitting frames of `frame_duration_ms` at 16 kHz.
    pub fn new(processor: Box<dyn FrontEndProcessor>, frame_duration_ms: u32) -> Self {
        Self::with_fetch_timeout(
            processor,
            frame_duration_ms,
            Duration::from_millis(defaults::FETCH_TIMEOUT_MS),
        )
    }

    /// Like [`new`](Self::new) with an explicit bound on each blocking fetch.
    pub fn with_fetch_timeout(
        processor: Box<dyn FrontEndProcessor>,
        frame_duration_ms: u32,
        fetch_timeout: Duration,
    ) -> Self {
        let frame_samples =
            (u64::from(frame_duration_ms) * u64::from(defaults::SAMPLE_RATE) / 1000) as usize;
        Self {
            shared: Arc::new(Shared {
                processor: Arc::from(processor),
                frame_samples,
                fetch_timeout,
                run: Mutex::new(RunState::default()),
                cond: Condvar::new(),
                speaking: AtomicBool::new(false),
                output_cb: Mutex::new(None),
                vad_cb: Mutex::new(None),
            }),
            input: Mutex::new(VecDeque::new()),
            device_aec: AtomicBool::new(false),
            worker: None,
        }
    }

    /// Registers the consumer of cleaned frames, replacing any previous one.
    pub fn on_output<F>(&self, callback: F)
    where
        F: Fn(Vec<i16>) + Send + Sync + 'static,
    {
        *self
            .shared
            .output_cb
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Registers the speech/silence edge callback (`true` = speech started).
    pub fn on_vad_state_change<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        *self
            .shared
            .vad_cb
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(callback));
    }

    /// Spawns the worker thread. Calling it again is a no-op.
    pub fn initialize(&mut self) -> Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }
        if self.shared.frame_samples == 0 {
            return Err(VocoreError::ConfigInvalidValue {
                key: "audio.frame_duration_ms".to_string(),
                message: "frame must hold at least one sample".to_string(),
            });
        }

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("vocore-audio-pipeline".to_string())
            .spawn(move || run_worker(&shared))?;
        self.worker = Some(handle);
        tracing::debug!(
            frame_samples = self.shared.frame_samples,
            feed_size = self.feed_size(),
            "audio pipeline initialized"
        );
        Ok(())
    }

    /// Accepts microphone PCM of any length and forwards it in feed-size chunks.
    pub fn feed(&self, pcm: &[i16]) {
        let chunk = self.feed_size();
        if chunk == 0 {
            tracing::warn!("front end reports zero feed size, dropping input");
            return;
        }

        let mut input = self.input.lock().unwrap_or_else(PoisonError::into_inner);
        input.extend(pcm);
        while input.len() >= chunk {
            self.shared
                .processor
                .feed(&input.make_contiguous()[..chunk]);
            input.drain(..chunk);
        }
    }

    pub fn start(&self) {
        let mut run = self.shared.run_state();
        if !run.running {
            run.running = true;
            self.shared.cond.notify_all();
            tracing::debug!("audio pipeline started");
        }
    }

    /// Pauses processing and discards all partially assembled audio.
    pub fn stop(&self) {
        {
            let mut run = self.shared.run_state();
            run.running = false;
            run.epoch = run.epoch.wrapping_add(1);
        }
        self.shared.processor.reset_buffer();
        self.input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.shared.speaking.store(false, Ordering::SeqCst);
        tracing::debug!("audio pipeline stopped");
    }

    pub fn is_running(&self) -> bool {
        self.shared.run_state().running
    }

    /// Last VAD classification seen by the worker.
    pub fn is_speaking(&self) -> bool {
        self.shared.speaking.load(Ordering::SeqCst)
    }

    /// Interleaved samples the front end consumes per feed.
    pub fn feed_size(&self) -> usize {
        self.shared.processor.feed_chunk_size()
    }

    pub fn frame_samples(&self) -> usize {
        self.shared.frame_samples
    }

    /// Switches the front end between device echo cancellation and VAD.
    ///
    /// The two are mutually exclusive on the processor: enabling AEC turns VAD
    /// off first, disabling it turns VAD back on afterwards.
    pub fn enable_device_aec(&self, enable: bool) {
        let processor = &self.shared.processor;
        if enable {
            if !processor.supports_aec() {
                tracing::error!("device AEC is not supported by this front end");
                return;
            }
            processor.disable_vad();
            processor.enable_aec();
        } else {
            processor.disable_aec();
            processor.enable_vad();
        }
        self.device_aec.store(enable, Ordering::SeqCst);
        tracing::info!(enabled = enable, "device AEC");
    }

    pub fn is_device_aec_enabled(&self) -> bool {
        self.device_aec.load(Ordering::SeqCst)
    }
}

impl Drop for AudioPipeline {
    fn drop(&mut self) {
        {
            let mut run = self.shared.run_state();
            run.shutdown = true;
            run.running = false;
        }
        self.shared.cond.notify_all();

        if let Some(handle) = self.worker.take()
            && let Err(panic_info) = handle.join()
        {
            let msg = panic_info
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| panic_info.downcast_ref::<String>().map(|s| s.as_str()))
                .unwrap_or("unknown panic");
            tracing::error!("audio pipeline worker panicked: {msg}");
        }
    }
}

fn run_worker(shared: &Shared) {
    let mut output: VecDeque<i16> = VecDeque::with_capacity(shared.frame_samples);
    let mut seen_epoch = 0u64;

    loop {
        {
            let mut run = shared.run_state();
            while !run.running && !run.shutdown {
                run = shared
                    .cond
                    .wait(run)
                    .unwrap_or_else(PoisonError::into_inner);
            }
            if run.shutdown {
                break;
            }
        }

        let Some(result) = shared.processor.fetch(shared.fetch_timeout) else {
            continue;
        };

        // A stop may have raced the fetch
        {
            let run = shared.run_state();
            if !run.running {
                continue;
            }
            if run.epoch != seen_epoch {
                output.clear();
                seen_epoch = run.epoch;
            }
        }

        if let FetchStatus::Fail(code) = result.status {
            tracing::warn!(code, "front-end fetch failed");
            continue;
        }

        let speaking = result.vad_state.is_speech();
        if shared.speaking.swap(speaking, Ordering::SeqCst) != speaking
            && let Some(callback) = shared.vad_callback()
        {
            callback(speaking);
        }

        let Some(callback) = shared.output_callback() else {
            continue;
        };
        output.extend(result.data);
        let frame = shared.frame_samples;
        while output.len() >= frame {
            let pcm: Vec<i16> = if output.len() == frame {
                std::mem::replace(&mut output, VecDeque::with_capacity(frame)).into()
            } else {
                output.drain(..frame).collect()
            };
            callback(pcm);
        }
    }

    tracing::debug!("audio pipeline worker exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::frontend::{FetchResult, ScriptedProcessor};
    use crate::audio::vad::VadState;
    use crossbeam_channel::{Receiver, unbounded};
    use std::time::Instant;

    const TICK: Duration = Duration::from_millis(5);

    /// Pipeline sharing its scripted processor with the test.
    fn scripted(feed_chunk: usize, frame_ms: u32) -> (AudioPipeline, Arc<ScriptedProcessor>) {
        let processor = Arc::new(ScriptedProcessor::new(feed_chunk).with_aec_support());
        let pipeline = AudioPipeline::with_fetch_timeout(
            Box::new(SharedProcessor(Arc::clone(&processor))),
            frame_ms,
            TICK,
        );
        (pipeline, processor)
    }

    struct SharedProcessor(Arc<ScriptedProcessor>);

    impl FrontEndProcessor for SharedProcessor {
        fn feed(&self, chunk: &[i16]) {
            self.0.feed(chunk)
        }
        fn fetch(&self, timeout: Duration) -> Option<FetchResult> {
            self.0.fetch(timeout)
        }
        fn feed_chunk_size(&self) -> usize {
            self.0.feed_chunk_size()
        }
        fn fetch_chunk_size(&self) -> usize {
            self.0.fetch_chunk_size()
        }
        fn supports_aec(&self) -> bool {
            self.0.supports_aec()
        }
        fn enable_aec(&self) {
            self.0.enable_aec()
        }
        fn disable_aec(&self) {
            self.0.disable_aec()
        }
        fn enable_vad(&self) {
            self.0.enable_vad()
        }
        fn disable_vad(&self) {
            self.0.disable_vad()
        }
        fn reset_buffer(&self) {
            self.0.reset_buffer()
        }
    }

    fn collect_frames(pipeline: &AudioPipeline) -> Receiver<Vec<i16>> {
        let (tx, rx) = unbounded();
        pipeline.on_output(move |frame| {
            tx.send(frame).unwrap();
        });
        rx
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn test_frame_samples_from_duration() {
        let (pipeline, _) = scripted(512, 30);
        assert_eq!(pipeline.frame_samples(), 480);
        assert_eq!(pipeline.feed_size(), 512);
        assert!(!pipeline.is_running());
    }

    #[test]
    fn test_feed_rechunks_to_feed_size() {
        let (pipeline, processor) = scripted(4, 30);
        pipeline.feed(&[1, 2, 3]);
        assert!(processor.fed_chunks().is_empty());

        pipeline.feed(&[4, 5, 6, 7, 8, 9]);
        assert_eq!(
            processor.fed_chunks(),
            vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8]]
        );
    }

    #[test]
    fn test_output_is_cut_into_frames_in_order() {
        let (mut pipeline, processor) = scripted(512, 30);
        let frames = collect_frames(&pipeline);
        pipeline.initialize().unwrap();
        pipeline.start();

        let audio: Vec<i16> = (0..1440).map(|i| i as i16).collect();
        for chunk in [&audio[..512], &audio[512..1024], &audio[1024..]] {
            processor.push_result(FetchResult::ok(chunk.to_vec(), VadState::Silence));
        }

        let mut received = Vec::new();
        for _ in 0..3 {
            received.push(frames.recv_timeout(Duration::from_secs(2)).unwrap());
        }
        assert!(received.iter().all(|f| f.len() == 480));
        assert_eq!(received.concat(), audio);
        assert!(frames.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_vad_callback_fires_on_edges_only() {
        let (mut pipeline, processor) = scripted(512, 30);
        let (tx, edges) = unbounded();
        pipeline.on_vad_state_change(move |speaking| {
            tx.send(speaking).unwrap();
        });
        pipeline.initialize().unwrap();
        pipeline.start();

        for state in [
            VadState::Silence,
            VadState::Silence,
            VadState::Speech,
            VadState::Speech,
            VadState::Silence,
        ] {
            processor.push_result(FetchResult::ok(vec![0; 512], state));
        }

        assert!(edges.recv_timeout(Duration::from_secs(2)).unwrap());
        assert!(!edges.recv_timeout(Duration::from_secs(2)).unwrap());
        assert!(edges.recv_timeout(Duration::from_millis(50)).is_err());
        assert!(!pipeline.is_speaking());
    }

    #[test]
    fn test_failed_fetch_is_skipped() {
        let (mut pipeline, processor) = scripted(512, 10);
        let frames = collect_frames(&pipeline);
        pipeline.initialize().unwrap();
        pipeline.start();

        processor.push_result(FetchResult::failed(-3));
        processor.push_result(FetchResult::ok(vec![7; 160], VadState::Silence));

        assert_eq!(
            frames.recv_timeout(Duration::from_secs(2)).unwrap(),
            vec![7; 160]
        );
    }

    #[test]
    fn test_stop_discards_partial_state() {
        let (mut pipeline, processor) = scripted(4, 30);
        let frames = collect_frames(&pipeline);
        pipeline.initialize().unwrap();
        pipeline.start();

        pipeline.feed(&[1, 2]);
        processor.push_result(FetchResult::ok(vec![1; 300], VadState::Silence));
        assert!(wait_until(|| processor.pending_results() == 0));

        pipeline.stop();
        assert!(!pipeline.is_running());
        assert_eq!(processor.reset_count(), 1);

        // Input partial chunk is gone: two more samples do not complete a feed
        pipeline.feed(&[3, 4]);
        assert!(processor.fed_chunks().is_empty());

        pipeline.start();
        processor.push_result(FetchResult::ok(vec![2; 480], VadState::Silence));
        let frame = frames.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(frame, vec![2; 480]);
    }

    #[test]
    fn test_no_fetch_while_stopped() {
        let (mut pipeline, processor) = scripted(512, 10);
        let frames = collect_frames(&pipeline);
        pipeline.initialize().unwrap();

        processor.push_result(FetchResult::ok(vec![1; 160], VadState::Silence));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(processor.pending_results(), 1);
        assert!(frames.try_recv().is_err());
    }

    #[test]
    fn test_device_aec_toggles_vad() {
        let (pipeline, processor) = scripted(512, 60);
        pipeline.enable_device_aec(true);
        assert!(processor.aec_enabled());
        assert!(!processor.vad_enabled());
        assert!(pipeline.is_device_aec_enabled());

        pipeline.enable_device_aec(false);
        assert!(!processor.aec_enabled());
        assert!(processor.vad_enabled());
    }

    #[test]
    fn test_device_aec_unsupported_changes_nothing() {
        let processor = Arc::new(ScriptedProcessor::new(512));
        let pipeline =
            AudioPipeline::new(Box::new(SharedProcessor(Arc::clone(&processor))), 60);

        pipeline.enable_device_aec(true);
        assert!(!processor.aec_enabled());
        assert!(processor.vad_enabled());
        assert!(!pipeline.is_device_aec_enabled());
    }

    #[test]
    fn test_zero_frame_duration_rejected() {
        let (mut pipeline, _) = scripted(512, 0);
        assert!(pipeline.initialize().is_err());
    }

    #[test]
    fn test_long_frame_duration_does_not_overflow() {
        // 300 s of 16 kHz audio does not fit the u32 product
        let (pipeline, _) = scripted(512, 300_000);
        assert_eq!(pipeline.frame_samples(), 4_800_000);
    }

    #[test]
    fn test_drop_joins_running_worker() {
        let (mut pipeline, _) = scripted(512, 60);
        pipeline.initialize().unwrap();
        pipeline.start();
        let started = Instant::now();
        drop(pipeline);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
