//! Audio service: wires the device, front end, wake word and codecs together.
//!
//! Uplink: device → input resampling → wake word or pipeline → background
//! encode → send queue. Downlink: decode queue → background decode → output
//! resampling → device. All codec work runs on the [`BackgroundScheduler`]
//! so neither the input thread nor the pipeline worker ever blocks on it.

use crate::audio::device::AudioDevice;
use crate::audio::frontend::{FrontEndProcessor, PassthroughProcessor};
use crate::audio::pipeline::AudioPipeline;
use crate::audio::resampler::Resampler;
use crate::codec::{DecoderBackend, EncoderBackend, FrameDecoder, FrameEncoder, Pcm16Codec};
use crate::config::Config;
use crate::defaults;
use crate::error::Result;
use crate::scheduler::BackgroundScheduler;
use crate::wake_word::{self, WakeWord};
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the input thread sleeps when nothing wants audio.
const INPUT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// One encoded audio frame on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioStreamPacket {
    pub sample_rate: u32,
    pub frame_duration: u32,
    pub timestamp: u32,
    pub payload: Vec<u8>,
}

impl AudioStreamPacket {
    pub fn new(sample_rate: u32, frame_duration: u32, payload: Vec<u8>) -> Self {
        Self {
            sample_rate,
            frame_duration,
            timestamp: 0,
            payload,
        }
    }
}

/// Counters for diagnostics.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServiceStats {
    pub input_reads: u64,
    pub encoded_packets: u64,
    pub dropped_send_packets: u64,
    pub decoded_packets: u64,
    pub rejected_decode_packets: u64,
}

#[derive(Debug, Default)]
struct Counters {
    input_reads: AtomicU64,
    encoded_packets: AtomicU64,
    dropped_send_packets: AtomicU64,
    decoded_packets: AtomicU64,
    rejected_decode_packets: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> ServiceStats {
        ServiceStats {
            input_reads: self.input_reads.load(Ordering::Relaxed),
            encoded_packets: self.encoded_packets.load(Ordering::Relaxed),
            dropped_send_packets: self.dropped_send_packets.load(Ordering::Relaxed),
            decoded_packets: self.decoded_packets.load(Ordering::Relaxed),
            rejected_decode_packets: self.rejected_decode_packets.load(Ordering::Relaxed),
        }
    }
}

type VadChangeCallback = Arc<dyn Fn(bool) + Send + Sync>;
type WakeWordCallback = Arc<dyn Fn(&str) + Send + Sync>;
type QueueCallback = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    vad_change: Option<VadChangeCallback>,
    wake_word_detected: Option<WakeWordCallback>,
    send_queue_available: Option<QueueCallback>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Pluggable parts of the service.
pub struct AudioBackends {
    pub processor: Box<dyn FrontEndProcessor>,
    pub encoder: Box<dyn EncoderBackend>,
    pub decoder: Box<dyn DecoderBackend>,
    pub wake_word: Box<dyn WakeWord>,
}

impl AudioBackends {
    /// Passthrough front end, PCM16 transport and the configured wake word.
    pub fn pcm16(config: &Config, input_channels: u16) -> Self {
        Self {
            processor: Box::new(PassthroughProcessor::new(&config.frontend, input_channels)),
            encoder: Box::new(Pcm16Codec::new()),
            decoder: Box::new(Pcm16Codec::new()),
            wake_word: wake_word::from_config(&config.wake_word),
        }
    }
}

/// Microphone-side state shared between the encode tasks and the service.
struct Uplink {
    encoder: Mutex<FrameEncoder>,
    send_queue: Mutex<VecDeque<AudioStreamPacket>>,
    testing_queue: Mutex<VecDeque<AudioStreamPacket>>,
    frame_duration_ms: u32,
    callbacks: Arc<Mutex<Callbacks>>,
    counters: Arc<Counters>,
}

impl Uplink {
    fn encode_packets(&self, pcm: &[i16]) -> Vec<AudioStreamPacket> {
        let mut packets = Vec::new();
        lock(&self.encoder).encode(pcm, |payload| {
            packets.push(AudioStreamPacket::new(
                defaults::SAMPLE_RATE,
                self.frame_duration_ms,
                payload.to_vec(),
            ));
        });
        packets
    }

    /// Recorded for local playback instead of being sent.
    fn encode_to_testing(&self, pcm: Vec<i16>) {
        let packets = self.encode_packets(&pcm);
        lock(&self.testing_queue).extend(packets);
    }

    fn encode(&self, pcm: Vec<i16>) {
        let packets = self.encode_packets(&pcm);
        if packets.is_empty() {
            return;
        }

        {
            let mut queue = lock(&self.send_queue);
            for packet in packets {
                if queue.len() >= defaults::MAX_SEND_PACKETS_IN_QUEUE {
                    queue.pop_front();
                    Counters::bump(&self.counters.dropped_send_packets);
                    tracing::warn!("send queue full, dropping oldest packet");
                }
                queue.push_back(packet);
                Counters::bump(&self.counters.encoded_packets);
            }
        }

        let callback = lock(&self.callbacks).send_queue_available.clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

struct DecodeState {
    decoder: FrameDecoder,
    resampler: Resampler,
    pcm: Vec<i16>,
}

/// Speaker-side state shared between the decode tasks and the service.
struct Downlink {
    state: Mutex<DecodeState>,
    device: Arc<Mutex<Box<dyn AudioDevice>>>,
    output_rate: u32,
    pending: AtomicUsize,
    counters: Arc<Counters>,
}

impl Downlink {
    fn set_decode_sample_rate(&self, state: &mut DecodeState, sample_rate: u32, duration_ms: u32) {
        if state.decoder.is_configured()
            && state.decoder.sample_rate() == sample_rate
            && state.decoder.duration_ms() == duration_ms
        {
            return;
        }

        // configure() logs its own failure; the decoder then drops packets
        if state.decoder.configure(sample_rate, 1, duration_ms).is_err() {
            return;
        }
        if sample_rate != self.output_rate {
            tracing::info!(
                from = sample_rate,
                to = self.output_rate,
                "resampling decoded audio"
            );
            if state.resampler.configure(sample_rate, self.output_rate).is_err() {
                tracing::warn!("output resampler left unconfigured");
            }
        }
    }

    fn decode(&self, packet: AudioStreamPacket) {
        let mut state = lock(&self.state);
        self.set_decode_sample_rate(&mut state, packet.sample_rate, packet.frame_duration);

        let DecodeState {
            decoder,
            resampler,
            pcm,
        } = &mut *state;
        if !decoder.decode(&packet.payload, pcm) {
            return;
        }
        Counters::bump(&self.counters.decoded_packets);

        let output = if decoder.sample_rate() != self.output_rate {
            match resampler.process_to_vec(pcm) {
                Ok(resampled) => resampled,
                // process() already logged why
                Err(_) => return,
            }
        } else {
            std::mem::take(pcm)
        };

        let mut device = lock(&self.device);
        if !device.output_enabled() {
            device.enable_output(true);
        }
        if let Err(e) = device.write(&output) {
            tracing::error!("failed to play decoded audio: {e}");
        }
    }
}

struct InputState {
    mic: Resampler,
    reference: Resampler,
    device_rate: u32,
    channels: u16,
}

struct WakeWordSlot {
    detector: Box<dyn WakeWord>,
    initialized: bool,
}

struct Inner {
    device: Arc<Mutex<Box<dyn AudioDevice>>>,
    input: Mutex<InputState>,
    wake_word: Mutex<WakeWordSlot>,
    detections: Receiver<String>,
    pipeline: AudioPipeline,
    uplink: Arc<Uplink>,
    downlink: Arc<Downlink>,
    scheduler: Arc<BackgroundScheduler>,
    callbacks: Arc<Mutex<Callbacks>>,
    counters: Arc<Counters>,
    voice_detected: Arc<AtomicBool>,
    processing: AtomicBool,
    testing: AtomicBool,
    testing_frames: AtomicUsize,
    frame_duration_ms: u32,
    warmup: AtomicBool,
    stopped: AtomicBool,
}

impl Inner {
    fn read_audio_data(&self, samples: usize) -> Result<Vec<i16>> {
        let mut input = lock(&self.input);
        let raw = {
            let mut device = lock(&self.device);
            if !device.input_enabled() {
                device.enable_input(true);
            }
            let wanted = if input.device_rate == defaults::SAMPLE_RATE {
                samples
            } else {
                (samples as u64 * u64::from(input.device_rate) / u64::from(defaults::SAMPLE_RATE))
                    as usize
            };
            let mut raw = vec![0i16; wanted];
            let read = device.read(&mut raw)?;
            raw.truncate(read);
            raw
        };

        if raw.is_empty() {
            return Ok(raw);
        }
        Counters::bump(&self.counters.input_reads);

        if input.device_rate == defaults::SAMPLE_RATE {
            return Ok(raw);
        }

        if input.channels == 2 {
            let mic: Vec<i16> = raw.iter().step_by(2).copied().collect();
            let reference: Vec<i16> = raw.iter().skip(1).step_by(2).copied().collect();
            let mic = input.mic.process_to_vec(&mic)?;
            let reference = input.reference.process_to_vec(&reference)?;
            Ok(mic
                .iter()
                .zip(reference.iter())
                .flat_map(|(&m, &r)| [m, r])
                .collect())
        } else {
            input.mic.process_to_vec(&raw)
        }
    }

    fn channels(&self) -> usize {
        usize::from(lock(&self.input).channels.max(1))
    }

    fn pump_input(&self) -> Result<bool> {
        if self.stopped.load(Ordering::SeqCst) {
            return Ok(false);
        }
        if self.warmup.swap(false, Ordering::SeqCst) {
            thread::sleep(Duration::from_millis(defaults::INPUT_WARMUP_MS));
            return Ok(true);
        }

        if self.testing.load(Ordering::SeqCst) {
            return self.record_test_frame();
        }

        let wake_feed_size = {
            let slot = lock(&self.wake_word);
            if slot.detector.is_detection_running() {
                slot.detector.feed_size()
            } else {
                0
            }
        };
        if wake_feed_size > 0 {
            let channels = self.channels();
            let data = self.read_audio_data(wake_feed_size * channels)?;
            if data.is_empty() {
                return Ok(false);
            }
            let mic: Vec<i16> = data.iter().step_by(channels).copied().collect();
            lock(&self.wake_word).detector.feed(&mic);
            self.dispatch_detections();
            return Ok(true);
        }

        if self.processing.load(Ordering::SeqCst) {
            let feed_size = self.pipeline.feed_size();
            if feed_size > 0 {
                let data = self.read_audio_data(feed_size)?;
                if data.is_empty() {
                    return Ok(false);
                }
                self.pipeline.feed(&data);
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Captures one mic frame for audio testing, ending the test once the
    /// recording reaches its maximum duration.
    fn record_test_frame(&self) -> Result<bool> {
        let max_frames = (defaults::AUDIO_TESTING_MAX_DURATION_MS / self.frame_duration_ms) as usize;
        if self.testing_frames.load(Ordering::SeqCst) >= max_frames {
            tracing::warn!("audio testing queue is full, stopping audio testing");
            self.set_audio_testing(false);
            return Ok(true);
        }

        let channels = self.channels();
        let frame = (u64::from(self.frame_duration_ms) * u64::from(defaults::SAMPLE_RATE) / 1000)
            as usize;
        let data = self.read_audio_data(frame * channels)?;
        if data.is_empty() {
            return Ok(false);
        }
        let mic: Vec<i16> = data.iter().step_by(channels).copied().collect();
        self.testing_frames.fetch_add(1, Ordering::SeqCst);
        let uplink = Arc::clone(&self.uplink);
        self.scheduler.schedule(move || uplink.encode_to_testing(mic));
        Ok(true)
    }

    fn set_audio_testing(&self, enable: bool) {
        tracing::info!(enable, "audio testing");
        if enable {
            lock(&self.uplink.testing_queue).clear();
            lock(&self.uplink.encoder).reset_state();
            self.testing_frames.store(0, Ordering::SeqCst);
            self.testing.store(true, Ordering::SeqCst);
            return;
        }
        if !self.testing.swap(false, Ordering::SeqCst) {
            return;
        }

        // Queued behind the pending test encodes on the FIFO worker, so the
        // whole recording is played back in order.
        let uplink = Arc::clone(&self.uplink);
        let downlink = Arc::clone(&self.downlink);
        self.scheduler.schedule(move || {
            let recording: Vec<AudioStreamPacket> =
                lock(&uplink.testing_queue).drain(..).collect();
            tracing::debug!(packets = recording.len(), "playing back audio test");
            for packet in recording {
                downlink.decode(packet);
            }
        });
    }

    /// Runs the user's wake-word callback outside the wake-word lock.
    fn dispatch_detections(&self) {
        for word in self.detections.try_iter() {
            let callback = lock(&self.callbacks).wake_word_detected.clone();
            if let Some(callback) = callback {
                callback(&word);
            }
        }
    }

    fn reset_decoder(&self) {
        lock(&self.downlink.state).decoder.reset_state();
    }
}

/// Owner of the whole audio path of the device.
pub struct AudioService {
    inner: Arc<Inner>,
    input_thread: Option<JoinHandle<()>>,
}

impl AudioService {
    pub fn new(
        config: &Config,
        device: Box<dyn AudioDevice>,
        backends: AudioBackends,
    ) -> Result<Self> {
        config.validate()?;
        let frame_ms = config.audio.frame_duration_ms;
        let counters = Arc::new(Counters::default());
        let callbacks = Arc::new(Mutex::new(Callbacks::default()));

        let device_rate = device.input_sample_rate();
        let channels = device.input_channels();
        let output_rate = device.output_sample_rate();
        let mut input = InputState {
            mic: Resampler::new(),
            reference: Resampler::new(),
            device_rate,
            channels,
        };
        if device_rate != defaults::SAMPLE_RATE {
            tracing::info!(from = device_rate, to = defaults::SAMPLE_RATE, "resampling input");
            input.mic.configure(device_rate, defaults::SAMPLE_RATE)?;
            if channels == 2 {
                input.reference.configure(device_rate, defaults::SAMPLE_RATE)?;
            }
        }
        let device = Arc::new(Mutex::new(device));

        let mut encoder =
            FrameEncoder::with_config(backends.encoder, defaults::SAMPLE_RATE, 1, frame_ms);
        encoder.set_complexity(config.encoder.complexity);
        encoder.set_dtx(config.encoder.dtx);
        let uplink = Arc::new(Uplink {
            encoder: Mutex::new(encoder),
            send_queue: Mutex::new(VecDeque::new()),
            testing_queue: Mutex::new(VecDeque::new()),
            frame_duration_ms: frame_ms,
            callbacks: Arc::clone(&callbacks),
            counters: Arc::clone(&counters),
        });

        let downlink = Arc::new(Downlink {
            state: Mutex::new(DecodeState {
                decoder: FrameDecoder::new(backends.decoder, output_rate, 1, frame_ms),
                resampler: Resampler::new(),
                pcm: Vec::new(),
            }),
            device: Arc::clone(&device),
            output_rate,
            pending: AtomicUsize::new(0),
            counters: Arc::clone(&counters),
        });

        let scheduler = Arc::new(BackgroundScheduler::new(config.scheduler.clone())?);

        let mut pipeline = AudioPipeline::with_fetch_timeout(
            backends.processor,
            frame_ms,
            Duration::from_millis(config.audio.fetch_timeout_ms),
        );
        {
            let scheduler = Arc::clone(&scheduler);
            let uplink = Arc::clone(&uplink);
            pipeline.on_output(move |frame| {
                let uplink = Arc::clone(&uplink);
                scheduler.schedule(move || uplink.encode(frame));
            });
        }
        let voice_detected = Arc::new(AtomicBool::new(false));
        {
            let voice_detected = Arc::clone(&voice_detected);
            let callbacks = Arc::clone(&callbacks);
            pipeline.on_vad_state_change(move |speaking| {
                voice_detected.store(speaking, Ordering::SeqCst);
                let callback = lock(&callbacks).vad_change.clone();
                if let Some(callback) = callback {
                    callback(speaking);
                }
            });
        }
        pipeline.initialize()?;
        if config.audio.device_aec {
            pipeline.enable_device_aec(true);
        }

        let (detection_tx, detections): (Sender<String>, Receiver<String>) = unbounded();
        let mut detector = backends.wake_word;
        detector.on_wake_word_detected(Box::new(move |word| {
            if detection_tx.send(word.to_string()).is_err() {
                tracing::debug!("wake word detection dropped, service gone");
            }
        }));

        tracing::debug!(
            device_rate,
            output_rate,
            channels,
            frame_ms,
            "audio service created"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                device,
                input: Mutex::new(input),
                wake_word: Mutex::new(WakeWordSlot {
                    detector,
                    initialized: false,
                }),
                detections,
                pipeline,
                uplink,
                downlink,
                scheduler,
                callbacks,
                counters,
                voice_detected,
                processing: AtomicBool::new(false),
                testing: AtomicBool::new(false),
                testing_frames: AtomicUsize::new(0),
                frame_duration_ms: frame_ms,
                warmup: AtomicBool::new(false),
                stopped: AtomicBool::new(false),
            }),
            input_thread: None,
        })
    }

    /// Shorthand for [`new`](Self::new) with [`AudioBackends::pcm16`].
    pub fn with_pcm16(config: &Config, device: Box<dyn AudioDevice>) -> Result<Self> {
        let backends = AudioBackends::pcm16(config, device.input_channels());
        Self::new(config, device, backends)
    }

    /// Spawns the input thread that keeps feeding the active consumer.
    pub fn start(&mut self) -> Result<()> {
        if self.input_thread.is_some() {
            return Ok(());
        }
        self.inner.stopped.store(false, Ordering::SeqCst);

        let inner = Arc::clone(&self.inner);
        let handle = thread::Builder::new()
            .name("vocore-audio-input".to_string())
            .spawn(move || {
                while !inner.stopped.load(Ordering::SeqCst) {
                    match inner.pump_input() {
                        Ok(true) => {}
                        Ok(false) => thread::sleep(INPUT_POLL_INTERVAL),
                        Err(e) => {
                            tracing::warn!("audio input failed: {e}");
                            thread::sleep(INPUT_POLL_INTERVAL);
                        }
                    }
                }
                tracing::debug!("audio input thread exited");
            })?;
        self.input_thread = Some(handle);
        Ok(())
    }

    /// Stops the input thread, the pipeline and wake-word detection, and
    /// drops unsent packets.
    pub fn stop(&mut self) {
        self.inner.stopped.store(true, Ordering::SeqCst);
        if let Some(handle) = self.input_thread.take()
            && handle.join().is_err()
        {
            tracing::error!("audio input thread panicked");
        }

        self.inner.pipeline.stop();
        self.inner.processing.store(false, Ordering::SeqCst);
        self.inner.testing.store(false, Ordering::SeqCst);
        lock(&self.inner.wake_word).detector.stop_detection();
        lock(&self.inner.uplink.send_queue).clear();
        lock(&self.inner.uplink.testing_queue).clear();
        tracing::debug!("audio service stopped");
    }

    /// One iteration of the input loop; `false` when no audio was consumed.
    ///
    /// Lets callers drive input without the input thread.
    pub fn pump_input(&self) -> Result<bool> {
        self.inner.pump_input()
    }

    /// Reads `samples` interleaved 16 kHz samples' worth of device input.
    pub fn read_audio_data(&self, samples: usize) -> Result<Vec<i16>> {
        self.inner.read_audio_data(samples)
    }

    pub fn enable_wake_word_detection(&self, enable: bool) {
        let mut slot = lock(&self.inner.wake_word);
        tracing::debug!(enable, "wake word detection");
        if enable {
            if !slot.initialized {
                if let Err(e) = slot.detector.initialize() {
                    tracing::error!("failed to initialize wake word: {e}");
                    return;
                }
                slot.initialized = true;
            }
            slot.detector.start_detection();
        } else {
            slot.detector.stop_detection();
        }
    }

    pub fn enable_voice_processing(&self, enable: bool) {
        tracing::debug!(enable, "voice processing");
        if enable {
            // No stale downlink audio may be playing while we listen
            self.inner.reset_decoder();
            lock(&self.inner.uplink.encoder).reset_state();
            self.inner.warmup.store(true, Ordering::SeqCst);
            self.inner.pipeline.start();
            self.inner.processing.store(true, Ordering::SeqCst);
        } else {
            self.inner.processing.store(false, Ordering::SeqCst);
            self.inner.pipeline.stop();
            self.inner.voice_detected.store(false, Ordering::SeqCst);
        }
    }

    /// Records mic audio locally and plays it back through the speaker
    /// path when disabled (or once the maximum duration is reached).
    ///
    /// Takes priority over wake word and voice processing while enabled.
    pub fn enable_audio_testing(&self, enable: bool) {
        self.inner.set_audio_testing(enable);
    }

    pub fn is_audio_testing(&self) -> bool {
        self.inner.testing.load(Ordering::SeqCst)
    }

    pub fn enable_device_aec(&self, enable: bool) {
        self.inner.pipeline.enable_device_aec(enable);
    }

    /// Queues a downlink packet for decoding; `false` when the queue is full.
    pub fn push_packet_to_decode_queue(&self, packet: AudioStreamPacket) -> bool {
        let downlink = &self.inner.downlink;
        if downlink.pending.load(Ordering::SeqCst) >= defaults::MAX_DECODE_PACKETS_IN_QUEUE {
            Counters::bump(&self.inner.counters.rejected_decode_packets);
            tracing::warn!("decode queue full, rejecting packet");
            return false;
        }

        downlink.pending.fetch_add(1, Ordering::SeqCst);
        let downlink = Arc::clone(downlink);
        self.inner.scheduler.schedule(move || {
            downlink.decode(packet);
            downlink.pending.fetch_sub(1, Ordering::SeqCst);
        });
        true
    }

    pub fn pop_packet_from_send_queue(&self) -> Option<AudioStreamPacket> {
        lock(&self.inner.uplink.send_queue).pop_front()
    }

    /// Reopens the decoder (and output resampler) for a new downlink format.
    pub fn set_decode_sample_rate(&self, sample_rate: u32, frame_duration: u32) {
        let downlink = &self.inner.downlink;
        let mut state = lock(&downlink.state);
        downlink.set_decode_sample_rate(&mut state, sample_rate, frame_duration);
    }

    /// Encodes the audio that led up to the last wake word.
    ///
    /// Shares the uplink encoder, so call it before voice processing starts.
    pub fn encode_wake_word(&self) -> Vec<AudioStreamPacket> {
        let mut slot = lock(&self.inner.wake_word);
        let mut encoder = lock(&self.inner.uplink.encoder);
        slot.detector
            .encode_wake_word_data(&mut encoder)
            .into_iter()
            .map(|payload| {
                AudioStreamPacket::new(
                    defaults::SAMPLE_RATE,
                    self.inner.uplink.frame_duration_ms,
                    payload,
                )
            })
            .collect()
    }

    pub fn last_wake_word(&self) -> Option<String> {
        lock(&self.inner.wake_word).detector.last_detected_wake_word()
    }

    pub fn is_wake_word_running(&self) -> bool {
        lock(&self.inner.wake_word).detector.is_detection_running()
    }

    pub fn is_voice_processing(&self) -> bool {
        self.inner.processing.load(Ordering::SeqCst)
    }

    pub fn is_voice_detected(&self) -> bool {
        self.inner.voice_detected.load(Ordering::SeqCst)
    }

    /// Blocks until every queued encode and decode task has run.
    pub fn wait_until_idle(&self) {
        self.inner.scheduler.wait_for_completion();
    }

    pub fn is_idle(&self) -> bool {
        self.inner.scheduler.active_tasks() == 0
    }

    pub fn stats(&self) -> ServiceStats {
        self.inner.counters.snapshot()
    }

    pub fn on_vad_change<F>(&self, callback: F)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        lock(&self.inner.callbacks).vad_change = Some(Arc::new(callback));
    }

    pub fn on_wake_word_detected<F>(&self, callback: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        lock(&self.inner.callbacks).wake_word_detected = Some(Arc::new(callback));
    }

    /// Called on the background thread after packets land in the send queue.
    pub fn on_send_queue_available<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        lock(&self.inner.callbacks).send_queue_available = Some(Arc::new(callback));
    }
}

impl Drop for AudioService {
    fn drop(&mut self) {
        self.stop();
    }
}
