//! Codec hardware boundary: the microphone and speaker as seen by the service.

use crate::error::{Result, VocoreError};
use std::collections::VecDeque;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Trait for audio codec devices.
///
/// This trait allows swapping implementations (board codec, WAV files, mock).
/// Input samples are interleaved when `input_channels() == 2`: microphone
/// first, playback reference second.
pub trait AudioDevice: Send {
    fn input_sample_rate(&self) -> u32;

    fn output_sample_rate(&self) -> u32;

    fn input_channels(&self) -> u16;

    /// Fills `buf` with captured samples.
    ///
    /// # Returns
    /// Number of samples written; 0 means no input is available right now
    fn read(&mut self, buf: &mut [i16]) -> Result<usize>;

    /// Plays `samples` at `output_sample_rate()`.
    ///
    /// # Returns
    /// Number of samples accepted
    fn write(&mut self, samples: &[i16]) -> Result<usize>;

    fn enable_input(&mut self, enable: bool);

    fn enable_output(&mut self, enable: bool);

    fn input_enabled(&self) -> bool;

    fn output_enabled(&self) -> bool;

    /// Output volume in percent, clamped to 0..=100.
    fn set_output_volume(&mut self, volume: u8);
}

/// Lets the owner keep a handle on a device after handing it to the service.
impl<D: AudioDevice> AudioDevice for Arc<Mutex<D>> {
    fn input_sample_rate(&self) -> u32 {
        lock(self).input_sample_rate()
    }

    fn output_sample_rate(&self) -> u32 {
        lock(self).output_sample_rate()
    }

    fn input_channels(&self) -> u16 {
        lock(self).input_channels()
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
        lock(self).read(buf)
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize> {
        lock(self).write(samples)
    }

    fn enable_input(&mut self, enable: bool) {
        lock(self).enable_input(enable)
    }

    fn enable_output(&mut self, enable: bool) {
        lock(self).enable_output(enable)
    }

    fn input_enabled(&self) -> bool {
        lock(self).input_enabled()
    }

    fn output_enabled(&self) -> bool {
        lock(self).output_enabled()
    }

    fn set_output_volume(&mut self, volume: u8) {
        lock(self).set_output_volume(volume)
    }
}

fn lock<D>(device: &Mutex<D>) -> MutexGuard<'_, D> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Device that plays a WAV file into the microphone and records the speaker.
pub struct WavAudioDevice {
    input: Vec<i16>,
    position: usize,
    input_rate: u32,
    input_channels: u16,
    output: Vec<i16>,
    output_rate: u32,
    output_path: Option<PathBuf>,
    input_enabled: bool,
    output_enabled: bool,
    volume: u8,
}

impl WavAudioDevice {
    /// Opens `input` as the microphone; speaker output is kept at `output_rate`
    /// and written to `output` by [`finish`](Self::finish).
    pub fn open(input: &Path, output: Option<&Path>, output_rate: u32) -> Result<Self> {
        let file = std::fs::File::open(input).map_err(|e| VocoreError::AudioDevice {
            message: format!("failed to open {}: {}", input.display(), e),
        })?;
        let mut device = Self::from_reader(Box::new(std::io::BufReader::new(file)), output_rate)?;
        device.output_path = output.map(Path::to_path_buf);
        Ok(device)
    }

    /// Create from any reader (for testing/flexibility).
    pub fn from_reader(reader: Box<dyn Read + Send>, output_rate: u32) -> Result<Self> {
        let mut wav_reader = hound::WavReader::new(reader).map_err(|e| VocoreError::AudioDevice {
            message: format!("failed to parse WAV file: {}", e),
        })?;

        let spec = wav_reader.spec();
        if spec.channels == 0 || spec.channels > 2 {
            return Err(VocoreError::AudioDevice {
                message: format!("unsupported channel count {}", spec.channels),
            });
        }

        let input: Vec<i16> = wav_reader
            .samples::<i16>()
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| VocoreError::AudioDevice {
                message: format!("failed to read WAV samples: {}", e),
            })?;

        tracing::debug!(
            sample_rate = spec.sample_rate,
            channels = spec.channels,
            samples = input.len(),
            "WAV input loaded"
        );

        Ok(Self {
            input,
            position: 0,
            input_rate: spec.sample_rate,
            input_channels: spec.channels,
            output: Vec::new(),
            output_rate,
            output_path: None,
            input_enabled: false,
            output_enabled: false,
            volume: 100,
        })
    }

    /// Whether every input sample has been read.
    pub fn is_exhausted(&self) -> bool {
        self.position >= self.input.len()
    }

    /// Speaker samples written so far, volume applied.
    pub fn recorded(&self) -> &[i16] {
        &self.output
    }

    /// Writes the recorded speaker output, if an output path was given.
    ///
    /// # Returns
    /// Number of samples saved
    pub fn finish(&self) -> Result<usize> {
        let Some(path) = &self.output_path else {
            return Ok(0);
        };
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: self.output_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let to_device_error = |e: hound::Error| VocoreError::AudioDevice {
            message: format!("failed to write {}: {}", path.display(), e),
        };
        let mut writer = hound::WavWriter::create(path, spec).map_err(to_device_error)?;
        for &sample in &self.output {
            writer.write_sample(sample).map_err(to_device_error)?;
        }
        writer.finalize().map_err(to_device_error)?;
        Ok(self.output.len())
    }
}

impl AudioDevice for WavAudioDevice {
    fn input_sample_rate(&self) -> u32 {
        self.input_rate
    }

    fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn input_channels(&self) -> u16 {
        self.input_channels
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
        if !self.input_enabled || self.is_exhausted() {
            return Ok(0);
        }
        // Never split an interleaved frame
        let channels = usize::from(self.input_channels);
        let wanted = buf.len() - buf.len() % channels;
        let end = (self.position + wanted).min(self.input.len());
        let count = end - self.position;
        buf[..count].copy_from_slice(&self.input[self.position..end]);
        self.position = end;
        Ok(count)
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize> {
        if !self.output_enabled {
            return Ok(0);
        }
        let volume = i32::from(self.volume);
        self.output
            .extend(samples.iter().map(|&s| (i32::from(s) * volume / 100) as i16));
        Ok(samples.len())
    }

    fn enable_input(&mut self, enable: bool) {
        self.input_enabled = enable;
    }

    fn enable_output(&mut self, enable: bool) {
        self.output_enabled = enable;
    }

    fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    fn set_output_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }
}

/// Mock audio device for testing
#[derive(Debug, Clone)]
pub struct MockAudioDevice {
    input_rate: u32,
    output_rate: u32,
    channels: u16,
    input: VecDeque<i16>,
    written: Vec<i16>,
    input_enabled: bool,
    output_enabled: bool,
    volume: u8,
    should_fail_read: bool,
}

impl MockAudioDevice {
    /// Mono 16 kHz in, 24 kHz out, no queued input.
    pub fn new() -> Self {
        Self {
            input_rate: 16000,
            output_rate: 24000,
            channels: 1,
            input: VecDeque::new(),
            written: Vec::new(),
            input_enabled: false,
            output_enabled: false,
            volume: 100,
            should_fail_read: false,
        }
    }

    pub fn with_rates(mut self, input_rate: u32, output_rate: u32) -> Self {
        self.input_rate = input_rate;
        self.output_rate = output_rate;
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels;
        self
    }

    /// Configure the mock to return specific samples
    pub fn with_input(mut self, samples: Vec<i16>) -> Self {
        self.input = samples.into();
        self
    }

    /// Configure the mock to fail on read
    pub fn with_read_failure(mut self) -> Self {
        self.should_fail_read = true;
        self
    }

    pub fn push_input(&mut self, samples: &[i16]) {
        self.input.extend(samples);
    }

    pub fn written(&self) -> &[i16] {
        &self.written
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }
}

impl Default for MockAudioDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioDevice for MockAudioDevice {
    fn input_sample_rate(&self) -> u32 {
        self.input_rate
    }

    fn output_sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn input_channels(&self) -> u16 {
        self.channels
    }

    fn read(&mut self, buf: &mut [i16]) -> Result<usize> {
        if self.should_fail_read {
            return Err(VocoreError::AudioDevice {
                message: "mock read failure".to_string(),
            });
        }
        let count = buf.len().min(self.input.len());
        for (slot, sample) in buf.iter_mut().zip(self.input.drain(..count)) {
            *slot = sample;
        }
        Ok(count)
    }

    fn write(&mut self, samples: &[i16]) -> Result<usize> {
        self.written.extend_from_slice(samples);
        Ok(samples.len())
    }

    fn enable_input(&mut self, enable: bool) {
        self.input_enabled = enable;
    }

    fn enable_output(&mut self, enable: bool) {
        self.output_enabled = enable;
    }

    fn input_enabled(&self) -> bool {
        self.input_enabled
    }

    fn output_enabled(&self) -> bool {
        self.output_enabled
    }

    fn set_output_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }
}
