//! Decoded, immutable audio buffer the engine plays from.

use crate::error::{EngineError, Result};

/// A decoded track held as planar `f32` channels.
///
/// Created once per load and shared read-only (behind an `Arc`) between the
/// control side and every source node built from it.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioAsset {
    channels: Vec<Vec<f32>>,
    sample_rate: f32,
}

impl AudioAsset {
    /// Build from planar channels. All channels must have the same length.
    pub fn from_planar(channels: Vec<Vec<f32>>, sample_rate: f32) -> Result<Self> {
        if channels.is_empty() {
            return Err(EngineError::DecodeOrFetch("audio has no channels".into()));
        }
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(EngineError::DecodeOrFetch(format!("invalid sample rate {sample_rate}")));
        }
        let frames = channels[0].len();
        if channels.iter().any(|c| c.len() != frames) {
            return Err(EngineError::DecodeOrFetch("channels differ in length".into()));
        }
        Ok(Self { channels, sample_rate })
    }

    /// Build from an interleaved buffer of `channel_count` channels. A trailing
    /// partial frame is dropped.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: f32) -> Result<Self> {
        if channel_count == 0 {
            return Err(EngineError::DecodeOrFetch("audio has no channels".into()));
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (ch, &s) in channels.iter_mut().zip(frame) {
                ch.push(s);
            }
        }
        Self::from_planar(channels, sample_rate)
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sample_rate }
    #[inline] pub fn channel_count(&self) -> usize { self.channels.len() }
    #[inline] pub fn frames(&self) -> usize { self.channels[0].len() }
    #[inline] pub fn channel(&self, index: usize) -> &[f32] { &self.channels[index] }

    /// Length in seconds.
    #[inline]
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    /// Stereo view of frame `index`: mono is duplicated, extra channels are
    /// ignored. Out-of-range frames read as silence.
    #[inline]
    pub(crate) fn stereo_frame(&self, index: usize) -> (f32, f32) {
        if index >= self.frames() {
            return (0.0, 0.0);
        }
        let l = self.channels[0][index];
        let r = if self.channels.len() > 1 { self.channels[1][index] } else { l };
        (l, r)
    }
}
