//! Synthetic room impulse responses for the convolution reverb.
//!
//! The kernel is exponentially decaying white noise: 0.5 s long, ~100 ms time
//! constant, peak amplitude 0.5. Each call draws fresh noise, so two kernels
//! built with the same settings sound alike but are not bit-identical.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Kernel length in seconds.
pub const IMPULSE_SECONDS: f32 = 0.5;
/// Decay time constant in seconds.
pub const DECAY_SECONDS: f32 = 0.1;
/// Noise amplitude before decay.
pub const IMPULSE_AMPLITUDE: f32 = 0.5;

/// Multichannel impulse response. Immutable once built.
#[derive(Clone, Debug)]
pub struct ImpulseResponse {
    channels: Vec<Vec<f32>>,
    sample_rate: f32,
}

impl ImpulseResponse {
    /// Wrap an existing kernel (e.g. a measured room) given as planar channels.
    pub fn from_channels(channels: Vec<Vec<f32>>, sample_rate: f32) -> Self {
        Self { channels, sample_rate: sample_rate.max(1.0) }
    }

    #[inline] pub fn channel_count(&self) -> usize { self.channels.len() }
    #[inline] pub fn len(&self) -> usize { self.channels.first().map_or(0, Vec::len) }
    #[inline] pub fn is_empty(&self) -> bool { self.len() == 0 }
    #[inline] pub fn sample_rate(&self) -> f32 { self.sample_rate }
    /// Samples of one channel; `None` past the last channel.
    #[inline] pub fn channel(&self, index: usize) -> Option<&[f32]> { self.channels.get(index).map(Vec::as_slice) }
}

/// Produces decaying-noise kernels from an entropy-seeded generator.
pub struct ImpulseSynthesizer {
    rng: StdRng,
    produced: u64,
}

impl Default for ImpulseSynthesizer {
    fn default() -> Self { Self::new() }
}

impl ImpulseSynthesizer {
    pub fn new() -> Self {
        Self { rng: StdRng::from_entropy(), produced: 0 }
    }

    /// Number of kernels synthesized so far.
    #[inline] pub fn produced(&self) -> u64 { self.produced }

    /// `length = round(sr * 0.5)`; sample `i` of every channel is
    /// `U(-1,1) * exp(-i / (sr * 0.1)) * 0.5`, channels drawn independently.
    pub fn synthesize(&mut self, sample_rate: f32, channel_count: usize) -> ImpulseResponse {
        let sr = sample_rate.max(1.0);
        let len = (sr * IMPULSE_SECONDS).round() as usize;
        let tau = sr * DECAY_SECONDS;
        let channels = (0..channel_count)
            .map(|_| {
                (0..len)
                    .map(|i| {
                        let noise: f32 = self.rng.gen_range(-1.0..=1.0);
                        noise * (-(i as f32) / tau).exp() * IMPULSE_AMPLITUDE
                    })
                    .collect()
            })
            .collect();
        self.produced += 1;
        ImpulseResponse { channels, sample_rate: sr }
    }
}
