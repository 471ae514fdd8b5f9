//! Top-level engine: the state machine that sequences loading, transport and
//! live parameter changes.
//!
//! ```text
//! Uninitialized ─load─▶ Loading ─decoded─▶ Ready ◀─────────── track end ──┐
//!                          │                 │ toggle                      │
//!                          └─error─▶ LoadFailed   ▼                        │
//!                                           Playing ◀─toggle─▶ Paused      │
//!                                              └───────────────────────────┘
//! ```
//!
//! All commands are synchronous and run on the control thread. The render
//! thread only ever sees the `Renderer` returned by [`Engine::new`].

use std::fmt;
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use tracing::{debug, info, warn};

use crate::asset::AudioAsset;
use crate::clock::{EngineClock, OutputHost};
use crate::config::EngineConfig;
use crate::error::{EngineError, Result};
use crate::graph::{RenderSlot, Renderer, SignalGraphHandle};
use crate::params::EngineParameters;
use crate::playback::{PlaybackController, Tick, TrackerToken};

/// Where the engine is in its lifecycle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Loading,
    Ready,
    Playing,
    Paused,
    /// Terminal until the next `load()`; carries the reason.
    LoadFailed(String),
}

impl EngineState {
    /// Small integer code for foreign hosts.
    pub fn code(&self) -> i32 {
        match self {
            EngineState::Uninitialized => 0,
            EngineState::Loading => 1,
            EngineState::Ready => 2,
            EngineState::Playing => 3,
            EngineState::Paused => 4,
            EngineState::LoadFailed(_) => 5,
        }
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Uninitialized => f.write_str("uninitialized"),
            EngineState::Loading => f.write_str("loading"),
            EngineState::Ready => f.write_str("ready"),
            EngineState::Playing => f.write_str("playing"),
            EngineState::Paused => f.write_str("paused"),
            EngineState::LoadFailed(reason) => write!(f, "load failed ({reason})"),
        }
    }
}

/// Events buffered per subscriber before new ones are dropped for it.
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Notifications published by the engine.
#[derive(Clone, Debug, PartialEq)]
pub enum EngineEvent {
    StateChanged(EngineState),
    TrackEnded,
    LoadError(String),
}

/// The playback engine.
pub struct Engine {
    state: EngineState,
    params: EngineParameters,
    asset: Option<Arc<AudioAsset>>,
    transport: PlaybackController,
    clock: Arc<EngineClock>,
    subscribers: Vec<Sender<EngineEvent>>,
}

impl Engine {
    /// Build the engine and its render-side counterpart. Playback needs an
    /// output host, see [`Engine::set_output_host`].
    pub fn new(config: EngineConfig) -> (Engine, Renderer) {
        let clock = Arc::new(EngineClock::new(config.sample_rate));
        let slot = Arc::new(RenderSlot::new());
        let renderer = Renderer::new(Arc::clone(&slot), Arc::clone(&clock));
        let transport = PlaybackController::new(Arc::clone(&clock), slot, config.gain_smoothing_ms);
        let engine = Engine {
            state: EngineState::Uninitialized,
            params: config.parameters,
            asset: None,
            transport,
            clock,
            subscribers: Vec::new(),
        };
        (engine, renderer)
    }

    /// Install whatever drives the renderer. Until one is set, play reports
    /// `PlaybackUnavailable`.
    pub fn set_output_host(&mut self, host: Box<dyn OutputHost>) {
        self.transport.set_host(host);
    }

    // ----- queries ---------------------------------------------------------

    #[inline] pub fn state(&self) -> &EngineState { &self.state }
    #[inline] pub fn parameters(&self) -> &EngineParameters { &self.params }
    #[inline] pub fn asset(&self) -> Option<&Arc<AudioAsset>> { self.asset.as_ref() }
    #[inline] pub fn clock(&self) -> &EngineClock { &self.clock }

    /// Track length in seconds (0 with nothing loaded).
    pub fn duration(&self) -> f64 {
        self.asset.as_ref().map_or(0.0, |a| a.duration())
    }

    pub fn current_position(&self) -> f64 {
        if self.asset.is_none() {
            return 0.0;
        }
        self.transport.current_position()
    }

    /// Position as a fraction of the track, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let d = self.duration();
        if d > 0.0 { (self.current_position() / d).clamp(0.0, 1.0) } else { 0.0 }
    }

    /// Subscribe to engine events. Every subscriber sees every event published
    /// after it subscribed; a subscriber that falls `EVENT_QUEUE_CAPACITY`
    /// events behind misses the newer ones until it drains.
    pub fn events(&mut self) -> Receiver<EngineEvent> {
        let (tx, rx) = bounded(EVENT_QUEUE_CAPACITY);
        self.subscribers.push(tx);
        rx
    }

    /// Live graph, if playing.
    pub fn graph(&self) -> Option<&SignalGraphHandle> {
        self.transport.graph()
    }

    /// Reverb kernels synthesized so far (one per play).
    pub fn impulses_synthesized(&self) -> u64 {
        self.transport.impulses_synthesized()
    }

    // ----- loading ---------------------------------------------------------

    /// Begin loading a track. Tears down any live session and forgets the
    /// previous asset.
    pub fn load(&mut self) -> Result<()> {
        if self.state == EngineState::Loading {
            return Err(self.not_ready());
        }
        self.transport.stop();
        self.asset = None;
        self.transition(EngineState::Loading);
        Ok(())
    }

    /// The decoder delivered the track.
    pub fn asset_decoded(&mut self, asset: AudioAsset) -> Result<()> {
        if self.state != EngineState::Loading {
            return Err(self.not_ready());
        }
        info!(
            duration = asset.duration(),
            channels = asset.channel_count(),
            sample_rate = asset.sample_rate(),
            "track loaded"
        );
        self.asset = Some(Arc::new(asset));
        self.transition(EngineState::Ready);
        Ok(())
    }

    /// The fetch or decode failed.
    pub fn load_failed(&mut self, reason: impl Into<String>) -> Result<()> {
        if self.state != EngineState::Loading {
            return Err(self.not_ready());
        }
        let reason = reason.into();
        warn!(%reason, "track failed to load");
        self.transition(EngineState::LoadFailed(reason.clone()));
        self.publish(EngineEvent::LoadError(reason));
        Ok(())
    }

    /// `load()`, run `decode`, then land in Ready or LoadFailed. A decode
    /// failure is returned as `DecodeOrFetch`.
    pub fn load_with<F>(&mut self, decode: F) -> Result<()>
    where
        F: FnOnce() -> Result<AudioAsset>,
    {
        self.load()?;
        match decode() {
            Ok(asset) => self.asset_decoded(asset),
            Err(e) => {
                let reason = match e {
                    EngineError::DecodeOrFetch(reason) => reason,
                    other => other.to_string(),
                };
                self.load_failed(reason.clone())?;
                Err(EngineError::DecodeOrFetch(reason))
            }
        }
    }

    // ----- transport -------------------------------------------------------

    /// Ready/Paused → Playing, Playing → Paused.
    pub fn toggle_playback(&mut self) -> Result<()> {
        match self.state {
            EngineState::Playing => {
                self.transport.pause();
                self.transition(EngineState::Paused);
                Ok(())
            }
            EngineState::Ready | EngineState::Paused => {
                let asset = self.loaded_asset()?;
                let from = self.transport.pause_offset();
                self.transport.play(&asset, &self.params, from)?;
                self.transition(EngineState::Playing);
                Ok(())
            }
            _ => Err(self.not_ready()),
        }
    }

    /// Playing/Paused → Ready, rewound to the start. A no-op in Ready.
    pub fn stop(&mut self) -> Result<()> {
        match self.state {
            EngineState::Ready | EngineState::Playing | EngineState::Paused => {
                self.transport.stop();
                self.transition(EngineState::Ready);
                Ok(())
            }
            _ => Err(self.not_ready()),
        }
    }

    /// Jump to `seconds`, clamped to `[0, duration)`. Accepted in Ready,
    /// Playing and Paused.
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        match self.state {
            EngineState::Ready | EngineState::Paused | EngineState::Playing => {
                let asset = self.loaded_asset()?;
                match self.transport.seek(&asset, &self.params, seconds) {
                    Ok(_) => Ok(()),
                    Err(e) => {
                        // restart failed: the session is gone, keep the target
                        if self.state == EngineState::Playing {
                            self.transition(EngineState::Paused);
                        }
                        Err(e)
                    }
                }
            }
            _ => Err(self.not_ready()),
        }
    }

    /// Current position-tracking token, while playing.
    pub fn position_token(&self) -> Option<TrackerToken> {
        self.transport.token()
    }

    /// One polling step. On `Ended` the engine has already rewound to 0, moved
    /// to Ready and published `TrackEnded`.
    pub fn tick(&mut self, token: &TrackerToken) -> Tick {
        let tick = self.transport.tick(token);
        if tick == Tick::Ended {
            self.track_ended();
        }
        tick
    }

    /// `tick` with the current token; `Cancelled` when not playing.
    pub fn poll(&mut self) -> Tick {
        match self.position_token() {
            Some(token) => self.tick(&token),
            None => Tick::Cancelled,
        }
    }

    fn track_ended(&mut self) {
        self.transport.finish_track();
        info!("track ended");
        self.transition(EngineState::Ready);
        self.publish(EngineEvent::TrackEnded);
    }

    // ----- parameters ------------------------------------------------------

    pub fn set_volume(&mut self, v: f32) -> Result<()> {
        self.accept_parameters()?;
        self.params.set_volume(v);
        if let Some(g) = self.transport.graph() {
            g.set_volume(self.params.volume());
        }
        Ok(())
    }

    pub fn set_speed(&mut self, rate: f32) -> Result<()> {
        self.accept_parameters()?;
        self.params.set_speed(rate);
        self.transport.update_rate(&self.params);
        Ok(())
    }

    pub fn set_pitch(&mut self, semitones: f32) -> Result<()> {
        self.accept_parameters()?;
        self.params.set_pitch_semitones(semitones);
        self.transport.update_rate(&self.params);
        Ok(())
    }

    pub fn set_reverb_mix(&mut self, mix: f32) -> Result<()> {
        self.accept_parameters()?;
        self.params.set_reverb_mix(mix);
        if let Some(g) = self.transport.graph() {
            g.set_reverb_mix(self.params.reverb_mix());
        }
        Ok(())
    }

    pub fn set_eq_low(&mut self, db: f32) -> Result<()> {
        self.accept_parameters()?;
        self.params.set_eq_low_db(db);
        if let Some(g) = self.transport.graph() {
            g.set_eq_low_db(self.params.eq_low_db());
        }
        Ok(())
    }

    pub fn set_eq_mid(&mut self, db: f32) -> Result<()> {
        self.accept_parameters()?;
        self.params.set_eq_mid_db(db);
        if let Some(g) = self.transport.graph() {
            g.set_eq_mid_db(self.params.eq_mid_db());
        }
        Ok(())
    }

    pub fn set_eq_high(&mut self, db: f32) -> Result<()> {
        self.accept_parameters()?;
        self.params.set_eq_high_db(db);
        if let Some(g) = self.transport.graph() {
            g.set_eq_high_db(self.params.eq_high_db());
        }
        Ok(())
    }

    // ----- helpers ---------------------------------------------------------

    fn accept_parameters(&self) -> Result<()> {
        match self.state {
            EngineState::Loading | EngineState::LoadFailed(_) => Err(self.not_ready()),
            _ => Ok(()),
        }
    }

    fn loaded_asset(&self) -> Result<Arc<AudioAsset>> {
        self.asset.clone().ok_or_else(|| self.not_ready())
    }

    fn not_ready(&self) -> EngineError {
        EngineError::NotReady { state: self.state.clone() }
    }

    fn transition(&mut self, next: EngineState) {
        if self.state == next {
            return;
        }
        info!(from = %self.state, to = %next, "engine state");
        self.state = next.clone();
        self.publish(EngineEvent::StateChanged(next));
    }

    fn publish(&mut self, event: EngineEvent) {
        self.subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(?event, "subscriber queue full; event dropped");
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{GatedHost, ImmediateHost};
    use crate::nodes::RENDER_QUANTUM;
    use approx::assert_relative_eq;

    const SR: f32 = 8_000.0;

    fn tone(seconds: f32) -> AudioAsset {
        let frames = (SR * seconds) as usize;
        let data: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        AudioAsset::from_planar(vec![data.clone(), data], SR).unwrap()
    }

    fn engine_with(params: EngineParameters) -> (Engine, Renderer) {
        let (mut engine, renderer) = Engine::new(EngineConfig::default().with_sample_rate(SR).with_parameters(params));
        engine.set_output_host(Box::new(ImmediateHost));
        (engine, renderer)
    }

    fn loaded(seconds: f32) -> (Engine, Renderer) {
        let (mut engine, renderer) = engine_with(EngineParameters::flat());
        engine.load_with(|| Ok(tone(seconds))).unwrap();
        (engine, renderer)
    }

    fn pull(renderer: &mut Renderer, quanta: usize) -> Vec<f32> {
        let mut buf = vec![0.0; 2 * RENDER_QUANTUM * quanta];
        renderer.render_interleaved(&mut buf, 2);
        buf
    }

    #[test]
    fn load_sequence_publishes_transitions() {
        let (mut engine, _r) = engine_with(EngineParameters::default());
        let events = engine.events();
        assert_eq!(*engine.state(), EngineState::Uninitialized);
        engine.load().unwrap();
        assert_eq!(engine.load(), Err(EngineError::NotReady { state: EngineState::Loading }));
        engine.asset_decoded(tone(1.0)).unwrap();
        assert_eq!(*engine.state(), EngineState::Ready);
        assert_relative_eq!(engine.duration(), 1.0);
        let seen: Vec<_> = events.try_iter().collect();
        assert_eq!(
            seen,
            vec![
                EngineEvent::StateChanged(EngineState::Loading),
                EngineEvent::StateChanged(EngineState::Ready),
            ]
        );
    }

    #[test]
    fn failed_load_is_terminal_until_reload() {
        let (mut engine, _r) = engine_with(EngineParameters::default());
        let events = engine.events();
        let err = engine
            .load_with(|| Err(EngineError::DecodeOrFetch("not audio".into())))
            .unwrap_err();
        assert_eq!(err, EngineError::DecodeOrFetch("not audio".into()));
        assert_eq!(*engine.state(), EngineState::LoadFailed("not audio".into()));
        assert!(events.try_iter().any(|e| e == EngineEvent::LoadError("not audio".into())));

        assert!(matches!(engine.toggle_playback(), Err(EngineError::NotReady { .. })));
        assert!(matches!(engine.seek(1.0), Err(EngineError::NotReady { .. })));
        assert!(matches!(engine.set_volume(0.1), Err(EngineError::NotReady { .. })));

        engine.load_with(|| Ok(tone(1.0))).unwrap();
        assert_eq!(*engine.state(), EngineState::Ready);
    }

    #[test]
    fn toggle_needs_a_loaded_track() {
        let (mut engine, _r) = engine_with(EngineParameters::default());
        assert_eq!(
            engine.toggle_playback(),
            Err(EngineError::NotReady { state: EngineState::Uninitialized })
        );
    }

    #[test]
    fn play_pause_play_resumes_within_a_quantum() {
        let (mut engine, mut r) = loaded(2.0);
        engine.toggle_playback().unwrap();
        assert_eq!(*engine.state(), EngineState::Playing);
        pull(&mut r, 20);
        engine.toggle_playback().unwrap();
        assert_eq!(*engine.state(), EngineState::Paused);
        let paused = engine.current_position();
        pull(&mut r, 7);
        engine.toggle_playback().unwrap();
        pull(&mut r, 1);
        let quantum = RENDER_QUANTUM as f64 / f64::from(SR);
        assert!((engine.current_position() - paused - quantum).abs() <= quantum);
    }

    #[test]
    fn permission_failure_keeps_state_and_can_be_retried() {
        let (mut engine, _r) = Engine::new(EngineConfig::default().with_sample_rate(SR));
        let gate = GatedHost::new();
        engine.set_output_host(Box::new(gate.clone()));
        engine.load_with(|| Ok(tone(1.0))).unwrap();
        assert!(matches!(engine.toggle_playback(), Err(EngineError::PlaybackUnavailable(_))));
        assert_eq!(*engine.state(), EngineState::Ready);
        assert_eq!(engine.impulses_synthesized(), 0);
        gate.permit(true);
        engine.toggle_playback().unwrap();
        assert_eq!(*engine.state(), EngineState::Playing);
    }

    #[test]
    fn no_host_means_playback_unavailable() {
        let (mut engine, _r) = Engine::new(EngineConfig::default().with_sample_rate(SR));
        engine.load_with(|| Ok(tone(1.0))).unwrap();
        assert!(matches!(engine.toggle_playback(), Err(EngineError::PlaybackUnavailable(_))));
    }

    #[test]
    fn seek_clamps_in_every_transport_state() {
        let (mut engine, mut r) = loaded(2.0);
        engine.seek(10.0).unwrap();
        assert_relative_eq!(engine.current_position(), 2.0 - crate::playback::SEEK_END_EPSILON);
        engine.seek(-1.0).unwrap();
        assert_eq!(engine.current_position(), 0.0);

        engine.seek(0.5).unwrap();
        engine.toggle_playback().unwrap();
        pull(&mut r, 2);
        engine.seek(1.25).unwrap();
        assert_eq!(*engine.state(), EngineState::Playing);
        assert_relative_eq!(engine.current_position(), 1.25, epsilon = 1e-9);

        engine.toggle_playback().unwrap();
        engine.seek(0.75).unwrap();
        assert_eq!(*engine.state(), EngineState::Paused);
        assert_eq!(engine.current_position(), 0.75);
    }

    #[test]
    fn natural_end_rewinds_to_ready() {
        let (mut engine, mut r) = loaded(0.1);
        let events = engine.events();
        engine.toggle_playback().unwrap();
        let token = engine.position_token().unwrap();
        assert!(matches!(engine.tick(&token), Tick::Position(_)));
        pull(&mut r, 8); // 1024 frames > 800
        assert_eq!(engine.tick(&token), Tick::Ended);
        assert_eq!(*engine.state(), EngineState::Ready);
        assert_eq!(engine.current_position(), 0.0);
        assert_eq!(engine.tick(&token), Tick::Cancelled);
        assert!(events.try_iter().any(|e| e == EngineEvent::TrackEnded));
    }

    #[test]
    fn stop_by_reload_resets_position() {
        let (mut engine, mut r) = loaded(2.0);
        engine.toggle_playback().unwrap();
        pull(&mut r, 4);
        let graph = engine.graph().cloned().unwrap();
        engine.load().unwrap();
        assert!(graph.is_released());
        engine.asset_decoded(tone(2.0)).unwrap();
        assert_eq!(engine.current_position(), 0.0);
        assert_eq!(*engine.state(), EngineState::Ready);
    }

    #[test]
    fn explicit_stop_rewinds_to_ready() {
        let (mut engine, mut r) = loaded(2.0);
        engine.toggle_playback().unwrap();
        pull(&mut r, 4);
        let token = engine.position_token().unwrap();
        let graph = engine.graph().cloned().unwrap();
        engine.stop().unwrap();
        assert_eq!(*engine.state(), EngineState::Ready);
        assert_eq!(engine.current_position(), 0.0);
        assert!(graph.is_released());
        assert!(token.is_cancelled());

        engine.seek(1.0).unwrap();
        engine.toggle_playback().unwrap();
        engine.toggle_playback().unwrap();
        engine.stop().unwrap();
        assert_eq!(*engine.state(), EngineState::Ready);
        assert_eq!(engine.current_position(), 0.0);

        let (mut idle, _r2) = engine_with(EngineParameters::default());
        assert!(matches!(idle.stop(), Err(EngineError::NotReady { .. })));
    }

    #[test]
    fn every_subscriber_sees_every_event() {
        let (mut engine, mut r) = engine_with(EngineParameters::flat());
        let ui = engine.events();
        let logger = engine.events();
        engine.load_with(|| Ok(tone(0.1))).unwrap();
        engine.toggle_playback().unwrap();
        pull(&mut r, 8);
        assert_eq!(engine.poll(), Tick::Ended);

        let expected = vec![
            EngineEvent::StateChanged(EngineState::Loading),
            EngineEvent::StateChanged(EngineState::Ready),
            EngineEvent::StateChanged(EngineState::Playing),
            EngineEvent::StateChanged(EngineState::Ready),
            EngineEvent::TrackEnded,
        ];
        assert_eq!(ui.try_iter().collect::<Vec<_>>(), expected);
        assert_eq!(logger.try_iter().collect::<Vec<_>>(), expected);
    }

    #[test]
    fn unread_queues_stay_bounded_and_dropped_subscribers_are_pruned() {
        let (mut engine, _r) = loaded(2.0);
        let idle = engine.events();
        let gone = engine.events();
        drop(gone);
        for _ in 0..200 {
            engine.toggle_playback().unwrap();
        }
        assert_eq!(idle.len(), EVENT_QUEUE_CAPACITY);
        assert_eq!(engine.subscribers.len(), 1);

        // draining makes room again
        idle.try_iter().count();
        engine.toggle_playback().unwrap();
        assert_eq!(idle.try_recv(), Ok(EngineEvent::StateChanged(EngineState::Playing)));
    }

    #[test]
    fn pause_cancels_tracking() {
        let (mut engine, _r) = loaded(2.0);
        engine.toggle_playback().unwrap();
        let token = engine.position_token().unwrap();
        engine.toggle_playback().unwrap();
        assert!(token.is_cancelled());
        assert_eq!(engine.poll(), Tick::Cancelled);
    }

    #[test]
    fn setters_while_stopped_apply_at_next_build() {
        let (mut engine, _r) = loaded(2.0);
        engine.set_volume(5.0).unwrap();
        engine.set_reverb_mix(0.3).unwrap();
        engine.set_eq_low(-20.0).unwrap();
        engine.set_eq_mid(1.5).unwrap();
        engine.set_eq_high(4.0).unwrap();
        engine.set_speed(0.1).unwrap();
        engine.set_pitch(3.4).unwrap();
        assert!(engine.graph().is_none());

        engine.toggle_playback().unwrap();
        let g = engine.graph().unwrap();
        assert_eq!(g.volume(), 1.0);
        assert_eq!(g.eq_db(), (-12.0, 1.5, 4.0));
        let (dry, wet) = g.dry_wet();
        assert_relative_eq!(dry, 0.7);
        assert_relative_eq!(wet, 0.3);
        assert_eq!(engine.parameters().speed(), 0.5);
        assert_eq!(engine.parameters().pitch_semitones(), 3);
    }

    #[test]
    fn live_setters_reach_the_playing_graph() {
        let (mut engine, _r) = loaded(2.0);
        engine.toggle_playback().unwrap();
        engine.set_volume(0.25).unwrap();
        engine.set_eq_mid(-6.0).unwrap();
        engine.set_reverb_mix(0.9).unwrap();
        let g = engine.graph().unwrap();
        assert_eq!(g.volume(), 0.25);
        assert_eq!(g.eq_db().1, -6.0);
        let (dry, wet) = g.dry_wet();
        assert_eq!(dry + wet, 1.0);
        assert_relative_eq!(wet, 0.9);
    }

    #[test]
    fn one_kernel_per_play_and_old_graph_goes_quiet() {
        let (mut engine, mut r) = loaded(4.0);
        for round in 1..=3u64 {
            engine.toggle_playback().unwrap();
            assert_eq!(engine.impulses_synthesized(), round);
            pull(&mut r, 2);
            let g = engine.graph().cloned().unwrap();
            engine.toggle_playback().unwrap();
            let frozen = g.quanta_rendered();
            pull(&mut r, 2);
            assert!(g.is_released());
            assert_eq!(g.quanta_rendered(), frozen);
        }
    }

    #[test]
    fn progress_follows_position() {
        let (mut engine, _r) = loaded(2.0);
        assert_eq!(engine.progress(), 0.0);
        engine.seek(0.5).unwrap();
        assert_relative_eq!(engine.progress(), 0.25);
        let (fresh, _r2) = engine_with(EngineParameters::default());
        assert_eq!(fresh.progress(), 0.0);
        assert_eq!(fresh.current_position(), 0.0);
    }

    #[test]
    fn default_tuning_plays_audible_output() {
        let (mut engine, mut r) = engine_with(EngineParameters::default());
        engine.load_with(|| Ok(tone(1.0))).unwrap();
        engine.toggle_playback().unwrap();
        let out = pull(&mut r, 10);
        assert!(out.iter().all(|s| s.is_finite()));
        assert!(out.iter().any(|s| s.abs() > 1e-3));
        assert_relative_eq!(engine.parameters().effective_rate(), 0.899, epsilon = 1e-3);
    }
}
