//! Convolution reverb (uniformly partitioned, realtime-safe).
//!
//! Design
//! - The kernel is cut into partitions of one render quantum `B`; each
//!   partition is zero-padded to `2B` and transformed once at construction.
//! - Per quantum the last `2B` input samples are transformed, pushed into a
//!   frequency-domain delay line, multiplied against every partition spectrum
//!   and accumulated; the inverse transform's second half is the output
//!   (overlap-save). No latency is added beyond the kernel itself.
//! - All FFT plans, spectra and scratch are allocated up front; `process`
//!   neither allocates nor locks.
//! - The kernel is normalised the way a default WebAudio `ConvolverNode` does
//!   it, so a synthetic kernel plays back at a comparable loudness.
//!
//! Stereo: left is convolved with kernel channel 0, right with channel 1 (a
//! mono kernel is used for both).

use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::impulse::ImpulseResponse;
use crate::nodes::{StereoBlock, RENDER_QUANTUM};

/// Loudness calibration applied on top of RMS normalisation (-58 dB).
const GAIN_CALIBRATION: f32 = 0.001_25;
/// Sample rate the calibration was measured at.
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44_100.0;
/// RMS floor so a near-silent kernel is not blown up.
const MIN_POWER: f32 = 0.000_125;

/// Scale a kernel is multiplied by when normalisation is on.
pub fn normalization_scale(ir: &ImpulseResponse) -> f32 {
    let n = ir.len() * ir.channel_count();
    if n == 0 {
        return 1.0;
    }
    let sum_sq: f32 = (0..ir.channel_count())
        .filter_map(|c| ir.channel(c))
        .map(|ch| ch.iter().map(|v| v * v).sum::<f32>())
        .sum();
    let power = (sum_sq / n as f32).sqrt().max(MIN_POWER);
    let mut scale = GAIN_CALIBRATION / power;
    scale *= GAIN_CALIBRATION_SAMPLE_RATE / ir.sample_rate();
    if ir.channel_count() == 4 {
        scale *= 0.5;
    }
    scale
}

/// One channel's running state.
struct Lane {
    /// Partition spectra of this lane's kernel channel.
    kernel: Arc<Vec<Vec<Complex32>>>,
    /// Frequency-domain delay line: spectra of past input windows.
    fdl: Vec<Vec<Complex32>>,
    /// Previous quantum of input (first half of the next window).
    prev: Vec<f32>,
}

/// Partitioned FFT convolver for one stereo stream.
pub struct Convolver {
    fft: Arc<dyn Fft<f32>>,
    ifft: Arc<dyn Fft<f32>>,
    lanes: [Lane; 2],
    fdl_pos: usize,
    partitions: usize,
    work: Vec<Complex32>,
    acc: Vec<Complex32>,
    scratch: Vec<Complex32>,
    scale: f32,
}

impl core::fmt::Debug for Convolver {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Convolver")
            .field("partitions", &self.partitions)
            .field("scale", &self.scale)
            .finish()
    }
}

impl Convolver {
    /// Prepare a convolver for `ir`. With `normalize` the kernel is scaled by
    /// [`normalization_scale`].
    pub fn new(ir: &ImpulseResponse, normalize: bool) -> Self {
        let b = RENDER_QUANTUM;
        let n = 2 * b;
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n);
        let ifft = planner.plan_fft_inverse(n);
        let scratch_len = fft.get_inplace_scratch_len().max(ifft.get_inplace_scratch_len());
        let mut scratch = vec![Complex32::default(); scratch_len];

        let gain = if normalize { normalization_scale(ir) } else { 1.0 };
        let partitions = ir.len().div_ceil(b).max(1);

        let mut spectra_for = |data: &[f32]| -> Vec<Vec<Complex32>> {
            (0..partitions)
                .map(|p| {
                    let mut buf = vec![Complex32::default(); n];
                    let start = p * b;
                    let end = (start + b).min(data.len());
                    if start < end {
                        for (dst, &src) in buf.iter_mut().zip(&data[start..end]) {
                            dst.re = src * gain;
                        }
                    }
                    fft.process_with_scratch(&mut buf, &mut scratch);
                    buf
                })
                .collect()
        };

        let left = Arc::new(spectra_for(ir.channel(0).unwrap_or(&[])));
        let right = match ir.channel(1) {
            Some(ch) => Arc::new(spectra_for(ch)),
            None => Arc::clone(&left),
        };

        let lane = |kernel: Arc<Vec<Vec<Complex32>>>| Lane {
            kernel,
            fdl: vec![vec![Complex32::default(); n]; partitions],
            prev: vec![0.0; b],
        };

        Self {
            fft,
            ifft,
            lanes: [lane(left), lane(right)],
            fdl_pos: 0,
            partitions,
            work: vec![Complex32::default(); n],
            acc: vec![Complex32::default(); n],
            scratch,
            scale: gain,
        }
    }

    #[inline] pub fn partitions(&self) -> usize { self.partitions }
    #[inline] pub fn normalization(&self) -> f32 { self.scale }

    /// Convolve one quantum in place.
    pub fn process(&mut self, block: &mut StereoBlock) {
        let b = RENDER_QUANTUM;
        let n = 2 * b;
        let inv_n = 1.0 / n as f32;
        let pos = self.fdl_pos;

        for (lane, io) in self.lanes.iter_mut().zip([&mut block.left, &mut block.right]) {
            // window = [previous quantum, current quantum]
            for (w, &x) in self.work[..b].iter_mut().zip(&lane.prev) {
                *w = Complex32::new(x, 0.0);
            }
            for (w, &x) in self.work[b..].iter_mut().zip(io.iter()) {
                *w = Complex32::new(x, 0.0);
            }
            lane.prev.copy_from_slice(&io[..]);

            self.fft.process_with_scratch(&mut self.work, &mut self.scratch);
            lane.fdl[pos].copy_from_slice(&self.work);

            self.acc.fill(Complex32::default());
            for (k, h) in lane.kernel.iter().enumerate() {
                let x = &lane.fdl[(pos + self.partitions - k) % self.partitions];
                for ((a, xv), hv) in self.acc.iter_mut().zip(x.iter()).zip(h.iter()) {
                    *a += xv * hv;
                }
            }

            self.ifft.process_with_scratch(&mut self.acc, &mut self.scratch);
            for (y, a) in io.iter_mut().zip(&self.acc[b..n]) {
                *y = a.re * inv_n;
            }
        }

        self.fdl_pos = (pos + 1) % self.partitions;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::impulse::ImpulseSynthesizer;
    use approx::assert_relative_eq;

    fn kernel(channels: Vec<Vec<f32>>, sr: f32) -> ImpulseResponse {
        ImpulseResponse::from_channels(channels, sr)
    }

    /// Time-domain reference for one channel.
    fn direct(x: &[f32], h: &[f32]) -> Vec<f32> {
        (0..x.len())
            .map(|n| (0..h.len()).filter(|&k| k <= n).map(|k| h[k] * x[n - k]).sum())
            .collect()
    }

    fn run(conv: &mut Convolver, input: &[f32]) -> (Vec<f32>, Vec<f32>) {
        let mut l = Vec::new();
        let mut r = Vec::new();
        for chunk in input.chunks(RENDER_QUANTUM) {
            let mut block = StereoBlock::default();
            block.left[..chunk.len()].copy_from_slice(chunk);
            block.right[..chunk.len()].copy_from_slice(chunk);
            conv.process(&mut block);
            l.extend_from_slice(&block.left[..chunk.len()]);
            r.extend_from_slice(&block.right[..chunk.len()]);
        }
        (l, r)
    }

    #[test]
    fn unit_impulse_kernel_passes_signal_through() {
        let mut k = vec![0.0; 300];
        k[0] = 1.0;
        let mut conv = Convolver::new(&kernel(vec![k], 48_000.0), false);
        let input: Vec<f32> = (0..512).map(|i| ((i * 7) % 13) as f32 / 13.0 - 0.5).collect();
        let (l, r) = run(&mut conv, &input);
        for i in 0..input.len() {
            assert_relative_eq!(l[i], input[i], epsilon = 1e-5);
            assert_relative_eq!(r[i], input[i], epsilon = 1e-5);
        }
    }

    #[test]
    fn matches_direct_convolution_across_partitions() {
        let h0: Vec<f32> = (0..400).map(|i| ((i * 31) % 17) as f32 / 17.0 - 0.5).collect();
        let h1: Vec<f32> = (0..400).map(|i| if i % 50 == 0 { 0.25 } else { 0.0 }).collect();
        let mut conv = Convolver::new(&kernel(vec![h0.clone(), h1.clone()], 48_000.0), false);
        assert_eq!(conv.partitions(), 4);
        let input: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.05).sin()).collect();
        let (l, r) = run(&mut conv, &input);
        let el = direct(&input, &h0);
        let er = direct(&input, &h1);
        for i in 0..input.len() {
            assert!((l[i] - el[i]).abs() < 1e-3, "left[{i}] {} vs {}", l[i], el[i]);
            assert!((r[i] - er[i]).abs() < 1e-3, "right[{i}] {} vs {}", r[i], er[i]);
        }
    }

    #[test]
    fn normalization_follows_rms_and_rate() {
        // constant kernel: rms == value
        let ir = kernel(vec![vec![0.5; 100], vec![0.5; 100]], 44_100.0);
        assert_relative_eq!(normalization_scale(&ir), GAIN_CALIBRATION / 0.5, epsilon = 1e-9);
        let ir = kernel(vec![vec![0.5; 100]], 88_200.0);
        assert_relative_eq!(normalization_scale(&ir), GAIN_CALIBRATION / 0.5 * 0.5, epsilon = 1e-9);
        let silent = kernel(vec![vec![0.0; 100]], 44_100.0);
        assert_relative_eq!(normalization_scale(&silent), GAIN_CALIBRATION / MIN_POWER, epsilon = 1e-6);
    }

    #[test]
    fn synthesized_room_stays_finite_and_bounded() {
        let ir = ImpulseSynthesizer::new().synthesize(48_000.0, 2);
        let mut conv = Convolver::new(&ir, true);
        let mut block = StereoBlock::default();
        let mut peak = 0.0_f32;
        for q in 0..400 {
            block.clear();
            if q == 0 {
                block.left[0] = 1.0;
                block.right[0] = 1.0;
            }
            conv.process(&mut block);
            assert!(block.left.iter().all(|v| v.is_finite()));
            peak = peak.max(block.peak());
        }
        assert!(peak > 0.0 && peak < 1.0, "peak={peak}");
    }
}
