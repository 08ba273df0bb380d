//! Fixed-ratio PCM rate conversion.
//!
//! Upsampling interpolates linearly between neighbouring input samples,
//! carrying the last sample of each call into the next so chunk boundaries
//! do not click. Downsampling averages the input window that maps onto each
//! output sample (a box FIR), which keeps aliasing down for speech-band
//! audio without a filter design step.

use crate::error::{Result, VocoreError};

/// Which way the converter moves the rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// rate_in < rate_out (decode orientation: network → speaker).
    Upsample,
    /// rate_in > rate_out (encode orientation: microphone → processing).
    Downsample,
    /// Equal rates, samples are copied through.
    Passthrough,
}

impl Direction {
    fn from_rates(rate_in: u32, rate_out: u32) -> Self {
        match rate_in.cmp(&rate_out) {
            std::cmp::Ordering::Greater => Direction::Downsample,
            std::cmp::Ordering::Less => Direction::Upsample,
            std::cmp::Ordering::Equal => Direction::Passthrough,
        }
    }
}

/// Streaming resampler between two fixed rates.
#[derive(Debug, Clone, Default)]
pub struct Resampler {
    rates: Option<(u32, u32)>,
    direction: Option<Direction>,
    /// Last input sample of the previous call, used as the left neighbour of
    /// the first interpolated output.
    history: Option<i16>,
}

impl Resampler {
    /// Creates an unconfigured resampler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a resampler configured for `rate_in → rate_out`.
    pub fn with_rates(rate_in: u32, rate_out: u32) -> Result<Self> {
        let mut resampler = Self::new();
        resampler.configure(rate_in, rate_out)?;
        Ok(resampler)
    }

    /// Sets up conversion state for the `(rate_in, rate_out)` pair,
    /// discarding any state from a previous configuration.
    pub fn configure(&mut self, rate_in: u32, rate_out: u32) -> Result<()> {
        self.history = None;
        if rate_in == 0 || rate_out == 0 {
            self.rates = None;
            self.direction = None;
            tracing::error!(rate_in, rate_out, "invalid resampler rates");
            return Err(VocoreError::ConfigInvalidValue {
                key: "resampler.rate".to_string(),
                message: format!("{} -> {} Hz", rate_in, rate_out),
            });
        }

        self.rates = Some((rate_in, rate_out));
        self.direction = Some(Direction::from_rates(rate_in, rate_out));
        tracing::debug!(rate_in, rate_out, "resampler configured");
        Ok(())
    }

    pub fn is_configured(&self) -> bool {
        self.rates.is_some()
    }

    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    pub fn input_sample_rate(&self) -> Option<u32> {
        self.rates.map(|(rate_in, _)| rate_in)
    }

    pub fn output_sample_rate(&self) -> Option<u32> {
        self.rates.map(|(_, rate_out)| rate_out)
    }

    /// Output samples produced for `count` input samples:
    /// `count * rate_out / rate_in`, truncated. Size the output buffer with it.
    pub fn output_samples(&self, count: usize) -> usize {
        match self.rates {
            Some((rate_in, rate_out)) => {
                (count as u64 * u64::from(rate_out) / u64::from(rate_in)) as usize
            }
            None => 0,
        }
    }

    /// Converts all of `input`, writing `output_samples(input.len())` samples
    /// to the front of `output`.
    ///
    /// On error the contents of `output` are unspecified; treat the call as
    /// a dropped frame.
    pub fn process(&mut self, input: &[i16], output: &mut [i16]) -> Result<usize> {
        let (Some((rate_in, rate_out)), Some(direction)) = (self.rates, self.direction) else {
            tracing::error!("resampler used before configure");
            return Err(VocoreError::ResamplerNotConfigured);
        };

        let needed = self.output_samples(input.len());
        if output.len() < needed {
            tracing::error!(needed, available = output.len(), "resampler output too small");
            return Err(VocoreError::OutputBufferTooSmall {
                needed,
                available: output.len(),
            });
        }
        if input.is_empty() {
            return Ok(0);
        }

        let (rate_in, rate_out) = (u64::from(rate_in), u64::from(rate_out));
        match direction {
            Direction::Passthrough => output[..needed].copy_from_slice(&input[..needed]),
            Direction::Upsample => {
                let previous = self.history.unwrap_or(input[0]);
                let at = |k: usize| if k == 0 { previous } else { input[k - 1] };
                for (j, out) in output[..needed].iter_mut().enumerate() {
                    // Source position j * rate_in / rate_out, one sample behind
                    // so the right neighbour is always available.
                    let scaled = j as u64 * rate_in;
                    let k = (scaled / rate_out) as usize;
                    let frac = (scaled % rate_out) as i64;
                    let left = i64::from(at(k));
                    let right = i64::from(at(k + 1));
                    *out = (left + (right - left) * frac / rate_out as i64) as i16;
                }
            }
            Direction::Downsample => {
                for (j, out) in output[..needed].iter_mut().enumerate() {
                    let start = (j as u64 * rate_in / rate_out) as usize;
                    let end = (((j + 1) as u64 * rate_in / rate_out) as usize).min(input.len());
                    let window = &input[start..end.max(start + 1)];
                    let sum: i64 = window.iter().map(|&s| i64::from(s)).sum();
                    *out = (sum / window.len() as i64) as i16;
                }
            }
        }

        self.history = input.last().copied();
        Ok(needed)
    }

    /// Convenience wrapper that allocates the output.
    pub fn process_to_vec(&mut self, input: &[i16]) -> Result<Vec<i16>> {
        let mut output = vec![0i16; self.output_samples(input.len())];
        let written = self.process(input, &mut output)?;
        output.truncate(written);
        Ok(output)
    }
}
