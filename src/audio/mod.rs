//! Microphone-side audio: device boundary, rate conversion, front end and
//! the streaming pipeline that ties them together.

pub mod device;
pub mod frontend;
pub mod pipeline;
pub mod resampler;
pub mod vad;

pub use device::{AudioDevice, MockAudioDevice, WavAudioDevice};
pub use frontend::{
    FetchResult, FetchStatus, FrontEndProcessor, PassthroughProcessor, ScriptedProcessor,
};
pub use pipeline::AudioPipeline;
pub use resampler::{Direction, Resampler};
pub use vad::{EnergyVad, VadState, calculate_rms};
