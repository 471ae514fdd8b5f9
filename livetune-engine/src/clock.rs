//! Output clock and the host seam that starts it.
//!
//! The clock is the number of frames the renderer has produced divided by the
//! output sample rate. It only advances while running; the first successful
//! `OutputHost::resume()` starts it and it keeps running after that, whether or
//! not anything is playing.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::HostError;

/// Shared render clock. Written by the render side, read by the control side.
#[derive(Debug)]
pub struct EngineClock {
    frames: AtomicU64,
    sample_rate: f32,
    running: AtomicBool,
}

impl EngineClock {
    pub fn new(sample_rate: f32) -> Self {
        Self {
            frames: AtomicU64::new(0),
            sample_rate: sample_rate.max(1.0),
            running: AtomicBool::new(false),
        }
    }

    #[inline] pub fn sample_rate(&self) -> f32 { self.sample_rate }
    #[inline] pub fn frames(&self) -> u64 { self.frames.load(Ordering::Acquire) }
    #[inline] pub fn is_running(&self) -> bool { self.running.load(Ordering::Acquire) }

    /// Current clock time in seconds.
    #[inline]
    pub fn now(&self) -> f64 {
        self.frames() as f64 / f64::from(self.sample_rate)
    }

    #[inline]
    pub(crate) fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::Release);
    }

    /// Count `frames` rendered. Ignored while suspended.
    #[inline]
    pub(crate) fn advance(&self, frames: u64) {
        if self.is_running() {
            self.frames.fetch_add(frames, Ordering::AcqRel);
        }
    }
}

/// Whatever owns the real-time callback that pulls the `Renderer`.
///
/// `resume` is called before every play while the clock is still suspended;
/// it may fail (device missing, user permission not granted yet), in which
/// case the engine stays where it was and the caller may retry later.
pub trait OutputHost {
    fn resume(&mut self) -> Result<(), HostError>;
}

/// Host for embedders that drive the renderer themselves: always ready.
#[derive(Copy, Clone, Debug, Default)]
pub struct ImmediateHost;

impl OutputHost for ImmediateHost {
    fn resume(&mut self) -> Result<(), HostError> { Ok(()) }
}

/// Host whose output needs a permission grant first (e.g. a user gesture).
/// `resume` fails with `PermissionDenied` until the shared gate is opened.
#[derive(Clone, Debug, Default)]
pub struct GatedHost {
    permitted: Arc<AtomicBool>,
    attempts: Arc<AtomicU64>,
}

impl GatedHost {
    pub fn new() -> Self { Self::default() }

    /// Open (or close) the gate. Shared between clones.
    pub fn permit(&self, permitted: bool) {
        self.permitted.store(permitted, Ordering::Release);
    }

    /// Number of `resume` calls seen so far, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }
}

impl OutputHost for GatedHost {
    fn resume(&mut self) -> Result<(), HostError> {
        self.attempts.fetch_add(1, Ordering::AcqRel);
        if self.permitted.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(HostError::PermissionDenied)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_only_advances_while_running() {
        let clock = EngineClock::new(1_000.0);
        clock.advance(500);
        assert_eq!(clock.frames(), 0);
        clock.set_running(true);
        clock.advance(500);
        clock.advance(250);
        assert_eq!(clock.now(), 0.75);
    }

    #[test]
    fn gated_host_refuses_until_permitted() {
        let gate = GatedHost::new();
        let mut host = gate.clone();
        assert_eq!(host.resume(), Err(HostError::PermissionDenied));
        gate.permit(true);
        assert_eq!(host.resume(), Ok(()));
        assert_eq!(gate.attempts(), 2);
    }
}
