//! Livetune engine: live-tuning playback of a single decoded track.
//!
//! Crate layout:
//! - [`asset`]    : decoded, immutable track buffer
//! - [`params`]   : clamped tuning parameters and the rate / dry-wet laws
//! - [`impulse`]  : synthetic decaying-noise impulse responses
//! - [`nodes`]    : per-quantum building blocks (gain, EQ band, delay, mixer)
//! - [`reverb`]   : partitioned FFT convolution reverb
//! - [`source`]   : single-use resampling buffer source
//! - [`graph`]    : the fixed signal graph, render slot and `Renderer`
//! - [`clock`]    : render clock and the `OutputHost` seam
//! - [`playback`] : transport (play/pause/stop/seek) and position tracking
//! - [`state`]    : the `Engine` state machine and its events
//! - [`output`]   : CPAL output host (feature `realtime`)
//!
//! The render thread touches only the [`Renderer`]; it never allocates, never
//! blocks and never logs. Everything else runs on the control thread.

pub mod asset;
pub mod clock;
pub mod config;
pub mod error;
pub mod graph;
pub mod impulse;
pub mod nodes;
pub mod params;
pub mod playback;
pub mod reverb;
pub mod source;
pub mod state;

#[cfg(feature = "realtime")]
pub mod output;

// Re-export the items most hosts need.
pub use asset::AudioAsset;
pub use clock::{EngineClock, GatedHost, ImmediateHost, OutputHost};
pub use config::EngineConfig;
pub use error::{EngineError, HostError, Result};
pub use graph::{Renderer, SignalGraph, SignalGraphHandle};
pub use impulse::{ImpulseResponse, ImpulseSynthesizer};
pub use params::EngineParameters;
pub use playback::{PlaybackController, Tick, TrackerToken};
pub use state::{Engine, EngineEvent, EngineState};
