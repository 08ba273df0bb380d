//! Loopback run: WAV in → full uplink → packets → full downlink → WAV out.

use crate::audio::device::WavAudioDevice;
use crate::config::Config;
use crate::error::Result;
use crate::service::{AudioService, AudioStreamPacket};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

/// What a loopback run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoopbackReport {
    pub packets_sent: u64,
    pub packets_decoded: u64,
    pub packets_dropped: u64,
    pub output_samples: usize,
}

/// Plays `input` through the service as the microphone, feeds every encoded
/// packet straight back into the decoder and records the result to `output`.
pub fn run_loopback(config: &Config, input: &Path, output: &Path) -> Result<LoopbackReport> {
    let device = Arc::new(Mutex::new(WavAudioDevice::open(
        input,
        Some(output),
        config.audio.output_sample_rate,
    )?));
    let service = AudioService::with_pcm16(config, Box::new(Arc::clone(&device)))?;
    let mut report = LoopbackReport::default();

    service.enable_voice_processing(true);
    loop {
        let consumed = service.pump_input()?;
        forward_packets(&service, &mut report);
        if !consumed
            && device
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .is_exhausted()
        {
            break;
        }
    }

    // Let the pipeline worker drain what the front end still holds
    let settle = Duration::from_millis(config.audio.fetch_timeout_ms.max(1) * 2);
    loop {
        thread::sleep(settle);
        service.wait_until_idle();
        if forward_packets(&service, &mut report) == 0 {
            break;
        }
    }
    service.enable_voice_processing(false);
    service.wait_until_idle();

    let stats = service.stats();
    report.packets_decoded = stats.decoded_packets;
    report.packets_dropped = stats.dropped_send_packets;
    report.output_samples = device
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .finish()?;
    tracing::info!(
        sent = report.packets_sent,
        decoded = report.packets_decoded,
        samples = report.output_samples,
        "loopback finished"
    );
    Ok(report)
}

/// Moves everything in the send queue to the decode queue.
fn forward_packets(service: &AudioService, report: &mut LoopbackReport) -> usize {
    let mut forwarded = 0;
    while let Some(packet) = service.pop_packet_from_send_queue() {
        push_blocking(service, packet);
        forwarded += 1;
    }
    report.packets_sent += forwarded as u64;
    forwarded
}

fn push_blocking(service: &AudioService, packet: AudioStreamPacket) {
    while !service.push_packet_to_decode_queue(packet.clone()) {
        service.wait_until_idle();
    }
}
