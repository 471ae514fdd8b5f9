//! Building blocks (nodes) for the playback signal graph.
//!
//! These are per-quantum components designed for realtime use: all buffers
//! are sized at construction, nothing allocates or locks while processing.
//!
//! Contents:
//! - `StereoBlock`     : one render quantum of left/right samples
//! - `OnePoleSmoother` : parameter smoothing for gains
//! - `GainStage`       : smoothed stereo gain (volume, dry and wet levels)
//! - `EqBand`          : one biquad section applied to both channels
//! - `DelayLine`       : heap-backed ring buffer with a fixed capacity
//! - `StereoDelay`     : fixed delay on both channels (reverb pre-delay)
//! - `Mix2`            : dry/wet summing into the output block

use livetune_core::dsp::{kill_denormals, one_pole_coeff_ms};
use livetune_core::filters::{Biquad, BiquadCoeffs, BiquadKind};

/// Frames processed per render callback step.
pub const RENDER_QUANTUM: usize = 128;

/// One render quantum of stereo audio.
#[derive(Clone, Debug)]
pub struct StereoBlock {
    pub left: [f32; RENDER_QUANTUM],
    pub right: [f32; RENDER_QUANTUM],
}

impl Default for StereoBlock {
    fn default() -> Self { Self::silent() }
}

impl StereoBlock {
    #[inline]
    pub fn silent() -> Self {
        Self { left: [0.0; RENDER_QUANTUM], right: [0.0; RENDER_QUANTUM] }
    }

    #[inline]
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Peak absolute sample over both channels.
    pub fn peak(&self) -> f32 {
        self.left.iter().chain(self.right.iter()).fold(0.0_f32, |m, s| m.max(s.abs()))
    }
}

/// One-pole parameter smoother: y += (x - y) * (1 - a), with `a = exp(-1/(tau*sr))`.
#[derive(Copy, Clone, Debug)]
pub struct OnePoleSmoother {
    a: f32, // alpha (closer to 1 → slower)
    y: f32,
}
impl OnePoleSmoother {
    #[inline] pub fn new_ms(t_ms: f32, sr: f32) -> Self { Self { a: one_pole_coeff_ms(t_ms, sr), y: 0.0 } }
    #[inline] pub fn reset(&mut self, y0: f32) { self.y = y0; }
    #[inline] pub fn process(&mut self, x: f32) -> f32 { self.y = kill_denormals(self.y + (x - self.y) * (1.0 - self.a)); self.y }
    #[inline] pub fn value(&self) -> f32 { self.y }
}

/// Smoothed gain applied in place to a stereo block.
#[derive(Copy, Clone, Debug)]
pub struct GainStage {
    target: f32,
    sm: OnePoleSmoother,
}

impl GainStage {
    /// Starts settled at `gain`, so the first quantum is not faded in.
    pub fn new(gain: f32, smoothing_ms: f32, sr: f32) -> Self {
        let mut sm = OnePoleSmoother::new_ms(smoothing_ms, sr);
        sm.reset(gain);
        Self { target: gain, sm }
    }

    #[inline] pub fn set_target(&mut self, gain: f32) { self.target = gain; }
    #[inline] pub fn target(&self) -> f32 { self.target }
    #[inline] pub fn current(&self) -> f32 { self.sm.value() }

    #[inline]
    pub fn process(&mut self, block: &mut StereoBlock) {
        for (l, r) in block.left.iter_mut().zip(block.right.iter_mut()) {
            let g = self.sm.process(self.target);
            *l *= g;
            *r *= g;
        }
    }
}

/// A biquad section with independent state per channel.
#[derive(Copy, Clone, Debug)]
pub struct EqBand {
    kind: BiquadKind,
    freq_hz: f32,
    q: f32,
    gain_db: f32,
    sr: f32,
    l: Biquad,
    r: Biquad,
}

impl EqBand {
    pub fn new(kind: BiquadKind, freq_hz: f32, q: f32, gain_db: f32, sr: f32) -> Self {
        let c = BiquadCoeffs::design(kind, freq_hz, q, gain_db, sr);
        Self { kind, freq_hz, q, gain_db, sr, l: Biquad::new(c), r: Biquad::new(c) }
    }

    #[inline] pub fn kind(&self) -> BiquadKind { self.kind }
    #[inline] pub fn frequency_hz(&self) -> f32 { self.freq_hz }
    #[inline] pub fn gain_db(&self) -> f32 { self.gain_db }

    /// Redesign only when the gain actually moved.
    pub fn set_gain_db(&mut self, gain_db: f32) {
        if gain_db == self.gain_db {
            return;
        }
        self.gain_db = gain_db;
        let c = BiquadCoeffs::design(self.kind, self.freq_hz, self.q, gain_db, self.sr);
        self.l.set_coeffs(c);
        self.r.set_coeffs(c);
    }

    #[inline]
    pub fn process(&mut self, block: &mut StereoBlock) {
        for s in &mut block.left { *s = self.l.process(*s); }
        for s in &mut block.right { *s = self.r.process(*s); }
    }
}

/// Ring buffer delay with a capacity fixed at construction.
#[derive(Clone, Debug)]
pub struct DelayLine {
    buf: Vec<f32>,
    i: usize,
    len: usize,
}
impl DelayLine {
    /// `capacity` is the longest delay in samples this line can hold.
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.max(1);
        Self { buf: vec![0.0; cap], i: 0, len: cap }
    }
    #[inline] pub fn capacity(&self) -> usize { self.buf.len() }
    #[inline] pub fn delay(&self) -> usize { self.len }
    #[inline] pub fn set_delay(&mut self, len: usize) { self.len = len.clamp(1, self.buf.len()); if self.i >= self.len { self.i = 0; } }
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.buf[self.i];
        self.buf[self.i] = x;
        self.i += 1;
        if self.i >= self.len { self.i = 0; }
        y
    }
}

/// Fixed stereo delay, expressed in seconds.
#[derive(Clone, Debug)]
pub struct StereoDelay {
    l: DelayLine,
    r: DelayLine,
    seconds: f32,
}

impl StereoDelay {
    pub fn new(max_seconds: f32, seconds: f32, sr: f32) -> Self {
        let cap = (max_seconds * sr).ceil() as usize;
        let mut s = Self { l: DelayLine::new(cap), r: DelayLine::new(cap), seconds: 0.0 };
        s.set_seconds(seconds, sr);
        s
    }

    pub fn set_seconds(&mut self, seconds: f32, sr: f32) {
        let n = (seconds.max(0.0) * sr).round() as usize;
        self.l.set_delay(n);
        self.r.set_delay(n);
        self.seconds = self.l.delay() as f32 / sr;
    }

    #[inline] pub fn seconds(&self) -> f32 { self.seconds }
    #[inline] pub fn samples(&self) -> usize { self.l.delay() }

    #[inline]
    pub fn process(&mut self, block: &mut StereoBlock) {
        for s in &mut block.left { *s = self.l.process(*s); }
        for s in &mut block.right { *s = self.r.process(*s); }
    }
}

/// Two-input mix utility: `out = a * g1 + b * g2` with smoothed gains.
#[derive(Copy, Clone, Debug)]
pub struct Mix2 {
    g1: GainStage,
    g2: GainStage,
}
impl Mix2 {
    pub fn new(g1: f32, g2: f32, smoothing_ms: f32, sr: f32) -> Self {
        Self { g1: GainStage::new(g1, smoothing_ms, sr), g2: GainStage::new(g2, smoothing_ms, sr) }
    }
    #[inline] pub fn set(&mut self, g1: f32, g2: f32) { self.g1.set_target(g1); self.g2.set_target(g2); }
    #[inline] pub fn targets(&self) -> (f32, f32) { (self.g1.target(), self.g2.target()) }

    /// Scale both inputs in place and sum them into `a`.
    #[inline]
    pub fn run(&mut self, a: &mut StereoBlock, b: &mut StereoBlock) {
        self.g1.process(a);
        self.g2.process(b);
        for (x, y) in a.left.iter_mut().zip(b.left.iter()) { *x += *y; }
        for (x, y) in a.right.iter_mut().zip(b.right.iter()) { *x += *y; }
    }
}
