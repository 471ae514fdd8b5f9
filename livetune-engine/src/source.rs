//! Single-use buffer source.
//!
//! A `SourceNode` plays one `AudioAsset` once: it can be started a single time
//! and, after it stops or runs off the end of the buffer, it is finished for
//! good. Playing again means building a new node.
//!
//! The read head advances `rate * asset_sr / output_sr` asset frames per output
//! frame with linear interpolation, so both the speed/pitch rate and any
//! sample-rate mismatch between the asset and the output are handled here.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;

use crate::asset::AudioAsset;
use crate::error::{EngineError, Result};
use crate::nodes::StereoBlock;

/// Lifecycle of a source node.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SourceState {
    Unstarted,
    Playing,
    Finished,
}

/// Control-side view of a live source: the rate knob and the ended flag.
#[derive(Debug)]
pub struct SourceControls {
    rate: AtomicF32,
    ended: AtomicBool,
}

impl SourceControls {
    fn new(rate: f32) -> Self {
        Self { rate: AtomicF32::new(rate), ended: AtomicBool::new(false) }
    }

    /// Picked up by the render side at the next quantum.
    #[inline] pub fn set_rate(&self, rate: f32) { self.rate.store(rate, Ordering::Relaxed); }
    #[inline] pub fn rate(&self) -> f32 { self.rate.load(Ordering::Relaxed) }

    /// True once the read head has passed the end of the buffer.
    #[inline] pub fn has_ended(&self) -> bool { self.ended.load(Ordering::Acquire) }
}

/// One-shot player of an `AudioAsset`.
pub struct SourceNode {
    asset: Arc<AudioAsset>,
    controls: Arc<SourceControls>,
    state: SourceState,
    head: f64,
    rate_scale: f64,
}

impl core::fmt::Debug for SourceNode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SourceNode")
            .field("state", &self.state)
            .field("position", &self.position())
            .finish_non_exhaustive()
    }
}

impl SourceNode {
    pub fn new(asset: Arc<AudioAsset>, output_sr: f32, rate: f32) -> Self {
        let rate_scale = f64::from(asset.sample_rate()) / f64::from(output_sr.max(1.0));
        Self {
            asset,
            controls: Arc::new(SourceControls::new(rate)),
            state: SourceState::Unstarted,
            head: 0.0,
            rate_scale,
        }
    }

    #[inline] pub fn controls(&self) -> Arc<SourceControls> { Arc::clone(&self.controls) }
    #[inline] pub fn state(&self) -> SourceState { self.state }

    /// Track-relative read position in seconds.
    #[inline]
    pub fn position(&self) -> f64 {
        self.head / f64::from(self.asset.sample_rate())
    }

    /// Begin playback `offset_seconds` into the track. Fails if this node was
    /// started before.
    pub fn start(&mut self, offset_seconds: f64) -> Result<()> {
        if self.state != SourceState::Unstarted {
            return Err(EngineError::SourceAlreadyStarted);
        }
        self.head = offset_seconds.max(0.0) * f64::from(self.asset.sample_rate());
        self.state = SourceState::Playing;
        Ok(())
    }

    /// Stop for good; a stopped node never plays again.
    pub fn stop(&mut self) {
        self.state = SourceState::Finished;
    }

    /// Fill `block` with the next quantum. Silence unless playing; reaching the
    /// end of the buffer finishes the node and raises the ended flag.
    pub fn render(&mut self, block: &mut StereoBlock) {
        block.clear();
        if self.state != SourceState::Playing {
            return;
        }
        let step = f64::from(self.controls.rate()) * self.rate_scale;
        let frames = self.asset.frames();
        for (l, r) in block.left.iter_mut().zip(block.right.iter_mut()) {
            let idx = self.head.floor();
            let i = idx as usize;
            if idx < 0.0 || i >= frames {
                self.finish();
                return;
            }
            let t = (self.head - idx) as f32;
            let (l0, r0) = self.asset.stereo_frame(i);
            let (l1, r1) = self.asset.stereo_frame(i + 1);
            *l = l0 + (l1 - l0) * t;
            *r = r0 + (r1 - r0) * t;
            self.head += step;
        }
        if self.head >= frames as f64 {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.state = SourceState::Finished;
        self.controls.ended.store(true, Ordering::Release);
    }
}
