//! Error types for the playback engine.

use thiserror::Error;

use crate::state::EngineState;

/// Failures reported synchronously to the caller of an engine command.
///
/// Out-of-range parameter values are not errors: they are clamped.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// The asset could not be obtained or decoded. Terminal for the session
    /// until the next `load()`.
    #[error("failed to load audio: {0}")]
    DecodeOrFetch(String),

    /// The output clock could not be resumed (no device, no permission yet).
    /// Retry on the next user gesture.
    #[error("playback unavailable: {0}")]
    PlaybackUnavailable(String),

    /// The command is not accepted in the current state.
    #[error("command not accepted while {state}")]
    NotReady { state: EngineState },

    /// A single-use source was started a second time.
    #[error("source node already started")]
    SourceAlreadyStarted,
}

/// Failures of the output host that owns the render callback.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HostError {
    /// The host refuses to start until the user grants permission.
    #[error("output not permitted yet")]
    PermissionDenied,

    /// No usable output device.
    #[error("no output device available")]
    NoDevice,

    /// Backend-specific stream failure.
    #[error("audio stream error: {0}")]
    Stream(String),
}

impl From<HostError> for EngineError {
    fn from(e: HostError) -> Self {
        EngineError::PlaybackUnavailable(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
