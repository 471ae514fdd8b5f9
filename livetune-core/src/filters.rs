//! Filters: second-order (biquad) shelving and peaking sections.
//!
//! Goals
//! - `no_std`-friendly, allocation free
//! - Coefficients identical to the WebAudio `BiquadFilterNode` for the
//!   `lowshelf`, `peaking` and `highshelf` types, so tone settings carry over
//!   from browser-based players unchanged
//! - Clear APIs and predictable parameterization
//!
//! Contents
//! - `BiquadKind`   : which response to design
//! - `BiquadCoeffs` : normalized `b0 b1 b2 a1 a2` (a0 folded in)
//! - `Biquad`       : one channel of Direct Form II Transposed state
//!
//! Notes
//! - Gain uses `A = 10^(dB/40)`; shelves use slope `S = 1` and ignore `Q`,
//!   matching the WebAudio definition.

use crate::dsp::{fast_cos, fast_sin, kill_denormals, m_exp, m_sqrt, TAU};
use core::fmt::Debug;

/// Biquad response type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BiquadKind {
    /// Boost/cut below the corner frequency.
    LowShelf,
    /// Bell boost/cut around the center frequency.
    Peaking,
    /// Boost/cut above the corner frequency.
    HighShelf,
}

/// Normalized biquad coefficients (`a0 == 1`).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BiquadCoeffs {
    pub b0: f32,
    pub b1: f32,
    pub b2: f32,
    pub a1: f32,
    pub a2: f32,
}

impl BiquadCoeffs {
    /// Pass-through section.
    pub const IDENTITY: Self = Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };

    /// Design coefficients for `kind` at `freq_hz` with quality `q` and gain
    /// `gain_db`, for sample rate `sr`. The frequency is limited to just below
    /// Nyquist.
    pub fn design(kind: BiquadKind, freq_hz: f32, q: f32, gain_db: f32, sr: f32) -> Self {
        let sr = sr.max(1.0);
        let f0 = freq_hz.max(0.0).min(0.499 * sr);
        let a = m_exp(0.057564627324851145_f32 * gain_db); // 10^(dB/40) = exp(dB * ln10/40)
        let w0 = TAU * f0 / sr;
        let cos_w0 = fast_cos(w0);
        let sin_w0 = fast_sin(w0);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            BiquadKind::LowShelf => {
                // S = 1: alpha = sin(w0)/2 * sqrt(2)
                let alpha = 0.5 * sin_w0 * core::f32::consts::SQRT_2;
                let k = 2.0 * m_sqrt(a) * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos_w0),
                    a * ((a + 1.0) - (a - 1.0) * cos_w0 - k),
                    (a + 1.0) + (a - 1.0) * cos_w0 + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos_w0),
                    (a + 1.0) + (a - 1.0) * cos_w0 - k,
                )
            }
            BiquadKind::HighShelf => {
                let alpha = 0.5 * sin_w0 * core::f32::consts::SQRT_2;
                let k = 2.0 * m_sqrt(a) * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos_w0),
                    a * ((a + 1.0) + (a - 1.0) * cos_w0 - k),
                    (a + 1.0) - (a - 1.0) * cos_w0 + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos_w0),
                    (a + 1.0) - (a - 1.0) * cos_w0 - k,
                )
            }
            BiquadKind::Peaking => {
                let alpha = sin_w0 / (2.0 * q.max(1e-4));
                (
                    1.0 + alpha * a,
                    -2.0 * cos_w0,
                    1.0 - alpha * a,
                    1.0 + alpha / a,
                    -2.0 * cos_w0,
                    1.0 - alpha / a,
                )
            }
        };

        let inv_a0 = 1.0 / a0;
        Self {
            b0: b0 * inv_a0,
            b1: b1 * inv_a0,
            b2: b2 * inv_a0,
            a1: a1 * inv_a0,
            a2: a2 * inv_a0,
        }
    }

    /// Magnitude response |H(e^jw)| at `freq_hz`.
    pub fn magnitude_at(&self, freq_hz: f32, sr: f32) -> f32 {
        let w = TAU * freq_hz / sr.max(1.0);
        let (c1, s1) = (fast_cos(w), fast_sin(w));
        let (c2, s2) = (fast_cos(2.0 * w), fast_sin(2.0 * w));
        // numerator/denominator evaluated at z^-1 = e^-jw
        let nr = self.b0 + self.b1 * c1 + self.b2 * c2;
        let ni = -(self.b1 * s1 + self.b2 * s2);
        let dr = 1.0 + self.a1 * c1 + self.a2 * c2;
        let di = -(self.a1 * s1 + self.a2 * s2);
        m_sqrt((nr * nr + ni * ni) / (dr * dr + di * di))
    }
}

/// One channel of biquad state (Direct Form II Transposed).
#[derive(Copy, Clone, Debug)]
pub struct Biquad {
    c: BiquadCoeffs,
    z1: f32,
    z2: f32,
}

impl Default for Biquad {
    fn default() -> Self { Self::new(BiquadCoeffs::IDENTITY) }
}

impl Biquad {
    #[inline]
    pub fn new(c: BiquadCoeffs) -> Self { Self { c, z1: 0.0, z2: 0.0 } }

    /// Swap coefficients, keeping the state so the signal continues smoothly.
    #[inline] pub fn set_coeffs(&mut self, c: BiquadCoeffs) { self.c = c; }
    #[inline] pub fn coeffs(&self) -> BiquadCoeffs { self.c }
    #[inline] pub fn reset(&mut self) { self.z1 = 0.0; self.z2 = 0.0; }

    /// Process one sample.
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let y = self.c.b0 * x + self.z1;
        self.z1 = kill_denormals(self.c.b1 * x - self.c.a1 * y + self.z2);
        self.z2 = kill_denormals(self.c.b2 * x - self.c.a2 * y);
        y
    }
}

// ------------------------------------ Tests --------------------------------------
