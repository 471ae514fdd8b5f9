//! Playback signal graph and the real-time render pull.
//!
//! Topology (fixed, stereo):
//!
//! ```text
//! source ─ gain ─ low-shelf 320 Hz ─ peaking 1 kHz ─ high-shelf 3.2 kHz ─┬─ dry (1 - mix) ──┐
//!                                                                          └─ delay 100 ms ─ convolver ─ wet (mix) ─┴─ out
//! ```
//!
//! A `SignalGraph` is built fresh for every play and thrown away afterwards.
//! The control side keeps a `SignalGraphHandle`; parameter writes go through
//! atomics and are read once per render quantum, so setters never block the
//! render thread.
//!
//! The render side owns the graph inside a `RenderPath` parked in a shared
//! `RenderSlot`. The `Renderer` only ever `try_lock`s the slot: if the control
//! side holds it (install or removal in progress) the quantum is silent.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use atomic_float::AtomicF32;
use livetune_core::filters::BiquadKind;
use parking_lot::Mutex;
use tracing::debug;

use crate::clock::EngineClock;
use crate::impulse::ImpulseSynthesizer;
use crate::nodes::{EqBand, GainStage, Mix2, StereoBlock, StereoDelay, RENDER_QUANTUM};
use crate::params::{dry_wet, EngineParameters};
use crate::reverb::Convolver;
use crate::source::SourceNode;

pub const LOW_SHELF_HZ: f32 = 320.0;
pub const PEAKING_HZ: f32 = 1_000.0;
pub const PEAKING_Q: f32 = 1.0;
pub const HIGH_SHELF_HZ: f32 = 3_200.0;
/// Longest pre-delay the wet path can hold.
pub const DELAY_CAPACITY_SECONDS: f32 = 2.0;
/// Pre-delay ahead of the convolver.
pub const PRE_DELAY_SECONDS: f32 = 0.1;

// Shelves ignore Q; the value is only carried for the peaking band.
const SHELF_Q: f32 = 1.0;

/// Values shared between a graph and its handle.
#[derive(Debug)]
pub struct GraphControls {
    volume: AtomicF32,
    eq_low_db: AtomicF32,
    eq_mid_db: AtomicF32,
    eq_high_db: AtomicF32,
    dry: AtomicF32,
    wet: AtomicF32,
    released: AtomicBool,
    quanta: AtomicU64,
}

impl GraphControls {
    fn from_params(p: &EngineParameters) -> Self {
        let (dry, wet) = p.dry_wet();
        Self {
            volume: AtomicF32::new(p.volume()),
            eq_low_db: AtomicF32::new(p.eq_low_db()),
            eq_mid_db: AtomicF32::new(p.eq_mid_db()),
            eq_high_db: AtomicF32::new(p.eq_high_db()),
            dry: AtomicF32::new(dry),
            wet: AtomicF32::new(wet),
            released: AtomicBool::new(false),
            quanta: AtomicU64::new(0),
        }
    }
}

/// Control-side handle to the live graph.
#[derive(Clone, Debug)]
pub struct SignalGraphHandle {
    controls: Arc<GraphControls>,
}

impl SignalGraphHandle {
    pub fn set_volume(&self, v: f32) { self.controls.volume.store(v, Ordering::Relaxed); }
    pub fn set_eq_low_db(&self, db: f32) { self.controls.eq_low_db.store(db, Ordering::Relaxed); }
    pub fn set_eq_mid_db(&self, db: f32) { self.controls.eq_mid_db.store(db, Ordering::Relaxed); }
    pub fn set_eq_high_db(&self, db: f32) { self.controls.eq_high_db.store(db, Ordering::Relaxed); }

    /// Linear law: wet = mix, dry = 1 - mix.
    pub fn set_reverb_mix(&self, mix: f32) {
        let (dry, wet) = dry_wet(mix);
        self.controls.dry.store(dry, Ordering::Relaxed);
        self.controls.wet.store(wet, Ordering::Relaxed);
    }

    #[inline] pub fn volume(&self) -> f32 { self.controls.volume.load(Ordering::Relaxed) }
    #[inline] pub fn eq_db(&self) -> (f32, f32, f32) {
        (
            self.controls.eq_low_db.load(Ordering::Relaxed),
            self.controls.eq_mid_db.load(Ordering::Relaxed),
            self.controls.eq_high_db.load(Ordering::Relaxed),
        )
    }
    #[inline] pub fn dry_wet(&self) -> (f32, f32) {
        (self.controls.dry.load(Ordering::Relaxed), self.controls.wet.load(Ordering::Relaxed))
    }

    /// Disconnect the graph: from now on it renders nothing.
    pub fn release(&self) {
        if !self.controls.released.swap(true, Ordering::AcqRel) {
            debug!(quanta = self.quanta_rendered(), "signal graph released");
        }
    }

    #[inline] pub fn is_released(&self) -> bool { self.controls.released.load(Ordering::Acquire) }

    /// Render quanta this graph has processed.
    #[inline] pub fn quanta_rendered(&self) -> u64 { self.controls.quanta.load(Ordering::Acquire) }
}

/// The live processing chain. Owned by the render side.
pub struct SignalGraph {
    controls: Arc<GraphControls>,
    gain: GainStage,
    low: EqBand,
    mid: EqBand,
    high: EqBand,
    pre_delay: StereoDelay,
    convolver: Convolver,
    mix: Mix2,
    wet: StereoBlock,
}

impl core::fmt::Debug for SignalGraph {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SignalGraph")
            .field("controls", &self.controls)
            .field("convolver", &self.convolver)
            .finish_non_exhaustive()
    }
}

impl SignalGraph {
    /// Build a graph with initial values taken from `params`. Synthesizes a
    /// fresh stereo impulse response for the reverb.
    pub fn build(
        params: &EngineParameters,
        impulses: &mut ImpulseSynthesizer,
        sample_rate: f32,
        smoothing_ms: f32,
    ) -> (SignalGraph, SignalGraphHandle) {
        let sr = sample_rate.max(1.0);
        let controls = Arc::new(GraphControls::from_params(params));
        let ir = impulses.synthesize(sr, 2);
        let (dry, wet) = params.dry_wet();

        let graph = SignalGraph {
            controls: Arc::clone(&controls),
            gain: GainStage::new(params.volume(), smoothing_ms, sr),
            low: EqBand::new(BiquadKind::LowShelf, LOW_SHELF_HZ, SHELF_Q, params.eq_low_db(), sr),
            mid: EqBand::new(BiquadKind::Peaking, PEAKING_HZ, PEAKING_Q, params.eq_mid_db(), sr),
            high: EqBand::new(BiquadKind::HighShelf, HIGH_SHELF_HZ, SHELF_Q, params.eq_high_db(), sr),
            pre_delay: StereoDelay::new(DELAY_CAPACITY_SECONDS, PRE_DELAY_SECONDS, sr),
            convolver: Convolver::new(&ir, true),
            mix: Mix2::new(dry, wet, smoothing_ms, sr),
            wet: StereoBlock::silent(),
        };
        debug!(
            sample_rate = sr,
            ir_frames = ir.len(),
            partitions = graph.convolver.partitions(),
            "signal graph built"
        );
        (graph, SignalGraphHandle { controls })
    }

    /// Process one quantum in place. A released graph outputs silence and is
    /// not counted.
    pub fn process(&mut self, block: &mut StereoBlock) {
        let c = &*self.controls;
        if c.released.load(Ordering::Acquire) {
            block.clear();
            return;
        }

        self.gain.set_target(c.volume.load(Ordering::Relaxed));
        self.low.set_gain_db(c.eq_low_db.load(Ordering::Relaxed));
        self.mid.set_gain_db(c.eq_mid_db.load(Ordering::Relaxed));
        self.high.set_gain_db(c.eq_high_db.load(Ordering::Relaxed));
        self.mix.set(c.dry.load(Ordering::Relaxed), c.wet.load(Ordering::Relaxed));

        self.gain.process(block);
        self.low.process(block);
        self.mid.process(block);
        self.high.process(block);

        self.wet.left.copy_from_slice(&block.left);
        self.wet.right.copy_from_slice(&block.right);
        self.pre_delay.process(&mut self.wet);
        self.convolver.process(&mut self.wet);

        self.mix.run(block, &mut self.wet);
        c.quanta.fetch_add(1, Ordering::AcqRel);
    }
}

/// Source plus graph: everything the render thread needs for one session.
#[derive(Debug)]
pub struct RenderPath {
    pub(crate) source: SourceNode,
    pub(crate) graph: SignalGraph,
}

impl RenderPath {
    pub fn new(source: SourceNode, graph: SignalGraph) -> Self {
        Self { source, graph }
    }

    #[inline]
    pub fn process(&mut self, block: &mut StereoBlock) {
        self.source.render(block);
        self.graph.process(block);
    }
}

/// Where the control side parks the live render path.
#[derive(Debug, Default)]
pub struct RenderSlot {
    path: Mutex<Option<Box<RenderPath>>>,
}

impl RenderSlot {
    pub fn new() -> Self { Self::default() }

    /// Put `path` in the slot, handing back whatever was there.
    pub fn install(&self, path: Box<RenderPath>) -> Option<Box<RenderPath>> {
        self.path.lock().replace(path)
    }

    /// Empty the slot. The caller drops the returned path off the render thread.
    pub fn take(&self) -> Option<Box<RenderPath>> {
        self.path.lock().take()
    }

    /// Empty the slot and stop the source of the path that was in it.
    pub fn retire(&self) -> Option<Box<RenderPath>> {
        let mut path = self.take()?;
        path.source.stop();
        Some(path)
    }

    pub fn is_occupied(&self) -> bool {
        self.path.lock().is_some()
    }
}

/// Real-time side of the engine: pulled by the output callback.
///
/// Renders whole quanta internally and hands them out in whatever callback
/// size and channel layout the host asks for. Never blocks and never
/// allocates.
pub struct Renderer {
    slot: Arc<RenderSlot>,
    clock: Arc<EngineClock>,
    block: StereoBlock,
    cursor: usize,
}

impl Renderer {
    pub(crate) fn new(slot: Arc<RenderSlot>, clock: Arc<EngineClock>) -> Self {
        Self { slot, clock, block: StereoBlock::silent(), cursor: RENDER_QUANTUM }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.clock.sample_rate() }

    /// Fill an interleaved buffer of `channels` channels. Mono output gets the
    /// average of left and right; channels beyond two are silent.
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for frame in out.chunks_mut(channels) {
            if self.cursor >= RENDER_QUANTUM {
                self.pull();
            }
            let l = self.block.left[self.cursor];
            let r = self.block.right[self.cursor];
            self.cursor += 1;
            match frame {
                [m] => *m = 0.5 * (l + r),
                [a, b, rest @ ..] => {
                    *a = l;
                    *b = r;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }

    /// Fill separate left/right buffers (shorter of the two wins).
    pub fn render_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.cursor >= RENDER_QUANTUM {
                self.pull();
            }
            *l = self.block.left[self.cursor];
            *r = self.block.right[self.cursor];
            self.cursor += 1;
        }
    }

    fn pull(&mut self) {
        self.cursor = 0;
        self.block.clear();
        if !self.clock.is_running() {
            return;
        }
        if let Some(mut guard) = self.slot.path.try_lock() {
            if let Some(path) = guard.as_mut() {
                path.process(&mut self.block);
            }
        }
        self.clock.advance(RENDER_QUANTUM as u64);
    }
}
