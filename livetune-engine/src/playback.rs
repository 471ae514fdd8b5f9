//! Transport: source lifecycle, play/pause/stop/seek and position tracking.
//!
//! Every play builds a brand-new `SignalGraph` and `SourceNode`, wraps them in
//! a `PlaybackSession` and parks the render path in the shared slot. Leaving
//! Playing (pause, stop, end of track, reload) drops the session, which
//! releases the graph and pulls the path out of the slot. At most one session
//! exists at a time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::asset::AudioAsset;
use crate::clock::{EngineClock, OutputHost};
use crate::error::{HostError, Result};
use crate::graph::{RenderPath, RenderSlot, SignalGraph, SignalGraphHandle};
use crate::impulse::ImpulseSynthesizer;
use crate::params::EngineParameters;
use crate::source::{SourceControls, SourceNode};

/// Seeks at or past the end land this far before it.
pub const SEEK_END_EPSILON: f64 = 1e-3;

/// Clamp a requested seek target into `[0, duration)`.
pub fn clamp_seek(offset: f64, duration: f64) -> f64 {
    if !(offset > 0.0) {
        return 0.0;
    }
    if offset >= duration {
        return (duration - SEEK_END_EPSILON).max(0.0);
    }
    offset
}

/// Outcome of one position-tracking tick.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Tick {
    /// Still playing; current position in seconds.
    Position(f64),
    /// The source ran off the end of the track.
    Ended,
    /// Tracking was cancelled by a transition out of Playing.
    Cancelled,
}

/// Issues tracking tokens; cancelling bumps the epoch so every outstanding
/// token goes stale.
#[derive(Debug, Default)]
pub struct PositionTracker {
    epoch: Arc<AtomicU64>,
}

impl PositionTracker {
    pub fn new() -> Self { Self::default() }

    /// New token for a fresh play. Cancels any earlier token.
    pub fn issue(&self) -> TrackerToken {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        TrackerToken { epoch, shared: Arc::clone(&self.epoch) }
    }

    pub fn cancel(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

/// Handle held by a polling loop. Cheap to clone and to check from any thread.
#[derive(Clone, Debug)]
pub struct TrackerToken {
    epoch: u64,
    shared: Arc<AtomicU64>,
}

impl TrackerToken {
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.shared.load(Ordering::Acquire) != self.epoch
    }
}

/// One play-through: the live source and graph, plus where it started.
///
/// Dropping the session releases the graph and empties the render slot.
pub struct PlaybackSession {
    asset: Arc<AudioAsset>,
    start_clock_time: f64,
    source: Arc<SourceControls>,
    graph: SignalGraphHandle,
    slot: Arc<RenderSlot>,
    token: TrackerToken,
}

impl PlaybackSession {
    #[inline] pub fn start_clock_time(&self) -> f64 { self.start_clock_time }
    #[inline] pub fn graph(&self) -> &SignalGraphHandle { &self.graph }
    #[inline] pub fn token(&self) -> &TrackerToken { &self.token }
    #[inline] pub fn has_ended(&self) -> bool { self.source.has_ended() }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        self.graph.release();
        // dropped here, on the control thread
        let path = self.slot.retire();
        debug!(had_path = path.is_some(), "playback session closed");
    }
}

/// Owns the transport. Driven by the engine state machine.
pub struct PlaybackController {
    clock: Arc<EngineClock>,
    slot: Arc<RenderSlot>,
    host: Option<Box<dyn OutputHost>>,
    impulses: ImpulseSynthesizer,
    smoothing_ms: f32,
    tracker: PositionTracker,
    session: Option<PlaybackSession>,
    pause_offset: f64,
}

impl PlaybackController {
    pub fn new(clock: Arc<EngineClock>, slot: Arc<RenderSlot>, smoothing_ms: f32) -> Self {
        Self {
            clock,
            slot,
            host: None,
            impulses: ImpulseSynthesizer::new(),
            smoothing_ms,
            tracker: PositionTracker::new(),
            session: None,
            pause_offset: 0.0,
        }
    }

    pub fn set_host(&mut self, host: Box<dyn OutputHost>) {
        self.host = Some(host);
    }

    #[inline] pub fn is_playing(&self) -> bool { self.session.is_some() }
    #[inline] pub fn session(&self) -> Option<&PlaybackSession> { self.session.as_ref() }
    #[inline] pub fn graph(&self) -> Option<&SignalGraphHandle> { self.session.as_ref().map(|s| &s.graph) }
    #[inline] pub fn pause_offset(&self) -> f64 { self.pause_offset }
    #[inline] pub fn impulses_synthesized(&self) -> u64 { self.impulses.produced() }

    /// Resume the output if the clock is still suspended.
    fn ensure_output(&mut self) -> Result<()> {
        if self.clock.is_running() {
            return Ok(());
        }
        let host = self.host.as_mut().ok_or(HostError::NoDevice)?;
        if let Err(e) = host.resume() {
            warn!(error = %e, "output could not be resumed");
            return Err(e.into());
        }
        self.clock.set_running(true);
        Ok(())
    }

    /// Start a fresh session at `from_offset` seconds. Replaces any live one.
    pub fn play(&mut self, asset: &Arc<AudioAsset>, params: &EngineParameters, from_offset: f64) -> Result<()> {
        self.ensure_output()?;
        self.session = None;

        let sr = self.clock.sample_rate();
        let (graph, handle) = SignalGraph::build(params, &mut self.impulses, sr, self.smoothing_ms);
        let mut source = SourceNode::new(Arc::clone(asset), sr, params.effective_rate());
        source.start(from_offset)?;
        let controls = source.controls();

        let start_clock_time = self.clock.now() - from_offset;
        if self.slot.install(Box::new(RenderPath::new(source, graph))).is_some() {
            warn!("render slot was still occupied; stale path dropped");
        }
        debug!(offset = from_offset, rate = params.effective_rate(), "source started");

        self.session = Some(PlaybackSession {
            asset: Arc::clone(asset),
            start_clock_time,
            source: controls,
            graph: handle,
            slot: Arc::clone(&self.slot),
            token: self.tracker.issue(),
        });
        Ok(())
    }

    /// Stop at the current position and remember it. No-op when idle.
    pub fn pause(&mut self) {
        if self.session.is_some() {
            self.pause_offset = self.current_position();
            self.end_session();
        }
    }

    /// Stop and rewind to the start.
    pub fn stop(&mut self) {
        self.end_session();
        self.pause_offset = 0.0;
    }

    fn end_session(&mut self) {
        self.tracker.cancel();
        self.session = None;
    }

    /// Move to `offset` (clamped to the asset). While playing this restarts the
    /// session there; otherwise the offset is stored for the next play.
    /// Returns the clamped offset.
    pub fn seek(&mut self, asset: &Arc<AudioAsset>, params: &EngineParameters, offset: f64) -> Result<f64> {
        let target = clamp_seek(offset, asset.duration());
        if self.session.is_some() {
            self.stop();
            self.pause_offset = target;
            self.play(asset, params, target)?;
        } else {
            self.pause_offset = target;
        }
        Ok(target)
    }

    /// Push the current speed/pitch to the live source. No rebuild.
    pub fn update_rate(&self, params: &EngineParameters) {
        if let Some(s) = &self.session {
            s.source.set_rate(params.effective_rate());
        }
    }

    /// Track-relative position in seconds.
    pub fn current_position(&self) -> f64 {
        match &self.session {
            Some(s) => (self.clock.now() - s.start_clock_time).min(s.asset.duration()),
            None => self.pause_offset,
        }
    }

    pub fn token(&self) -> Option<TrackerToken> {
        self.session.as_ref().map(|s| s.token.clone())
    }

    /// One polling step for `token`.
    pub fn tick(&self, token: &TrackerToken) -> Tick {
        if token.is_cancelled() {
            return Tick::Cancelled;
        }
        match &self.session {
            Some(s) if s.has_ended() => Tick::Ended,
            Some(_) => Tick::Position(self.current_position()),
            None => Tick::Cancelled,
        }
    }

    /// Natural end of track: close the session and rewind.
    pub fn finish_track(&mut self) {
        self.stop();
    }
}
