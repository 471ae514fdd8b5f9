//! Engine construction settings.

use serde::{Deserialize, Serialize};

use crate::params::EngineParameters;

/// Settings fixed for the lifetime of an `Engine`.
///
/// Loadable from TOML; every field is optional:
///
/// ```toml
/// sample_rate = 44100.0
/// gain_smoothing_ms = 10.0
///
/// [parameters]
/// volume = 0.8
/// pitch_semitones = -3
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate the renderer produces.
    pub sample_rate: f32,
    /// Tuning the session starts with.
    pub parameters: EngineParameters,
    /// Time constant of the volume and dry/wet smoothers.
    pub gain_smoothing_ms: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            parameters: EngineParameters::default(),
            gain_smoothing_ms: 10.0,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_parameters(mut self, parameters: EngineParameters) -> Self {
        self.parameters = parameters;
        self
    }
}
