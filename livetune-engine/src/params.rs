//! User-controlled tuning parameters.
//!
//! Every field is kept inside its declared range at all times: setters clamp,
//! they never reject. Non-finite input leaves the field unchanged.

use livetune_core::dsp::{clamp, semitones_to_ratio};
use serde::{Deserialize, Serialize};

/// Inclusive range of a continuous control.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Range {
    pub min: f32,
    pub max: f32,
}

impl Range {
    const fn new(min: f32, max: f32) -> Self { Self { min, max } }

    #[inline]
    pub fn clamp(&self, v: f32) -> f32 { clamp(v, self.min, self.max) }
}

pub const VOLUME: Range = Range::new(0.0, 1.0);
pub const SPEED: Range = Range::new(0.5, 2.0);
pub const PITCH_SEMITONES: Range = Range::new(-12.0, 12.0);
pub const REVERB_MIX: Range = Range::new(0.0, 1.0);
pub const EQ_DB: Range = Range::new(-12.0, 12.0);

/// Live-tunable parameter set. Lives for the whole session; read at every
/// graph build and on every live update.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "ParameterFile")]
pub struct EngineParameters {
    volume: f32,
    speed: f32,
    pitch_semitones: i32,
    reverb_mix: f32,
    eq_low_db: f32,
    eq_mid_db: f32,
    eq_high_db: f32,
}

impl Default for EngineParameters {
    /// The tuning the player starts with: a slightly fast, lowered, warm mix.
    fn default() -> Self {
        Self {
            volume: 0.65,
            speed: 1.2,
            pitch_semitones: -5,
            reverb_mix: 0.4,
            eq_low_db: 6.0,
            eq_mid_db: 2.0,
            eq_high_db: -3.0,
        }
    }
}

impl EngineParameters {
    /// Neutral settings: unity volume and rate, no reverb, flat EQ.
    pub fn flat() -> Self {
        Self {
            volume: 1.0,
            speed: 1.0,
            pitch_semitones: 0,
            reverb_mix: 0.0,
            eq_low_db: 0.0,
            eq_mid_db: 0.0,
            eq_high_db: 0.0,
        }
    }

    #[inline] pub fn volume(&self) -> f32 { self.volume }
    #[inline] pub fn speed(&self) -> f32 { self.speed }
    #[inline] pub fn pitch_semitones(&self) -> i32 { self.pitch_semitones }
    #[inline] pub fn reverb_mix(&self) -> f32 { self.reverb_mix }
    #[inline] pub fn eq_low_db(&self) -> f32 { self.eq_low_db }
    #[inline] pub fn eq_mid_db(&self) -> f32 { self.eq_mid_db }
    #[inline] pub fn eq_high_db(&self) -> f32 { self.eq_high_db }

    pub fn set_volume(&mut self, v: f32) { self.volume = apply(VOLUME, self.volume, v); }
    pub fn set_speed(&mut self, r: f32) { self.speed = apply(SPEED, self.speed, r); }
    pub fn set_reverb_mix(&mut self, m: f32) { self.reverb_mix = apply(REVERB_MIX, self.reverb_mix, m); }
    pub fn set_eq_low_db(&mut self, db: f32) { self.eq_low_db = apply(EQ_DB, self.eq_low_db, db); }
    pub fn set_eq_mid_db(&mut self, db: f32) { self.eq_mid_db = apply(EQ_DB, self.eq_mid_db, db); }
    pub fn set_eq_high_db(&mut self, db: f32) { self.eq_high_db = apply(EQ_DB, self.eq_high_db, db); }

    /// Pitch moves in whole semitones; fractional input is rounded first.
    pub fn set_pitch_semitones(&mut self, semitones: f32) {
        if semitones.is_finite() {
            self.pitch_semitones = PITCH_SEMITONES.clamp(semitones.round()) as i32;
        }
    }

    /// Rate applied to the source: `speed * 2^(pitch/12)`. Pitch and tempo
    /// move together.
    #[inline]
    pub fn effective_rate(&self) -> f32 {
        self.speed * semitones_to_ratio(self.pitch_semitones as f32)
    }

    /// Linear crossfade: `(dry, wet) = (1 - mix, mix)`.
    #[inline]
    pub fn dry_wet(&self) -> (f32, f32) {
        dry_wet(self.reverb_mix)
    }
}

/// Linear dry/wet law shared by parameter snapshots and the live graph.
#[inline]
pub(crate) fn dry_wet(mix: f32) -> (f32, f32) {
    (1.0 - mix, mix)
}

#[inline]
fn apply(range: Range, current: f32, v: f32) -> f32 {
    if v.is_finite() { range.clamp(v) } else { current }
}

/// On-disk shape: every field optional, values clamped on the way in.
#[derive(Deserialize)]
#[serde(default)]
struct ParameterFile {
    volume: f32,
    speed: f32,
    pitch_semitones: f32,
    reverb_mix: f32,
    eq_low_db: f32,
    eq_mid_db: f32,
    eq_high_db: f32,
}

impl Default for ParameterFile {
    fn default() -> Self {
        let p = EngineParameters::default();
        Self {
            volume: p.volume,
            speed: p.speed,
            pitch_semitones: p.pitch_semitones as f32,
            reverb_mix: p.reverb_mix,
            eq_low_db: p.eq_low_db,
            eq_mid_db: p.eq_mid_db,
            eq_high_db: p.eq_high_db,
        }
    }
}

impl From<ParameterFile> for EngineParameters {
    fn from(f: ParameterFile) -> Self {
        let mut p = EngineParameters::default();
        p.set_volume(f.volume);
        p.set_speed(f.speed);
        p.set_pitch_semitones(f.pitch_semitones);
        p.set_reverb_mix(f.reverb_mix);
        p.set_eq_low_db(f.eq_low_db);
        p.set_eq_mid_db(f.eq_mid_db);
        p.set_eq_high_db(f.eq_high_db);
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut p = EngineParameters::default();
        p.set_volume(3.0);
        p.set_speed(0.1);
        p.set_pitch_semitones(40.0);
        p.set_reverb_mix(-1.0);
        p.set_eq_low_db(-30.0);
        p.set_eq_mid_db(13.0);
        p.set_eq_high_db(100.0);
        assert_eq!(p.volume(), 1.0);
        assert_eq!(p.speed(), 0.5);
        assert_eq!(p.pitch_semitones(), 12);
        assert_eq!(p.reverb_mix(), 0.0);
        assert_eq!(p.eq_low_db(), -12.0);
        assert_eq!(p.eq_mid_db(), 12.0);
        assert_eq!(p.eq_high_db(), 12.0);
    }

    #[test]
    fn non_finite_input_keeps_current_value() {
        let mut p = EngineParameters::default();
        p.set_volume(f32::NAN);
        p.set_speed(f32::INFINITY);
        p.set_pitch_semitones(f32::NAN);
        assert_eq!(p, EngineParameters::default());
    }

    #[test]
    fn pitch_rounds_to_whole_semitones() {
        let mut p = EngineParameters::flat();
        p.set_pitch_semitones(2.6);
        assert_eq!(p.pitch_semitones(), 3);
        p.set_pitch_semitones(-4.4);
        assert_eq!(p.pitch_semitones(), -4);
    }

    #[test]
    fn default_rate_matches_speed_and_pitch() {
        // speed 1.2, pitch -5
        let p = EngineParameters::default();
        assert_relative_eq!(p.effective_rate(), 0.8990, epsilon = 1e-4);
    }

    #[test]
    fn neutral_tuning_scenario() {
        let mut p = EngineParameters::flat();
        p.set_volume(0.65);
        p.set_reverb_mix(0.4);
        let (dry, wet) = p.dry_wet();
        assert_relative_eq!(dry, 0.6, epsilon = 1e-6);
        assert_relative_eq!(wet, 0.4);
        assert_eq!(p.effective_rate(), 1.0);
    }

    #[test]
    fn partial_file_fills_defaults_and_clamps() {
        let p: EngineParameters = toml::from_str("volume = 5.0\npitch_semitones = -7.2").unwrap();
        assert_eq!(p.volume(), 1.0);
        assert_eq!(p.pitch_semitones(), -7);
        assert_eq!(p.speed(), EngineParameters::default().speed());
    }

    #[test]
    fn serialized_parameters_load_back() {
        let mut p = EngineParameters::flat();
        p.set_eq_mid_db(-4.0);
        p.set_pitch_semitones(7.0);
        let text = toml::to_string(&p).unwrap();
        let back: EngineParameters = toml::from_str(&text).unwrap();
        assert_eq!(back, p);
    }

    proptest! {
        #[test]
        fn effective_rate_law(speed in 0.5f32..=2.0, pitch in -12i32..=12) {
            let mut p = EngineParameters::flat();
            p.set_speed(speed);
            p.set_pitch_semitones(pitch as f32);
            let expected = speed * 2f32.powf(pitch as f32 / 12.0);
            prop_assert!((p.effective_rate() - expected).abs() <= 1e-5 * expected);
        }

        #[test]
        fn dry_and_wet_sum_to_one(mix in 0.0f32..=1.0) {
            let mut p = EngineParameters::flat();
            p.set_reverb_mix(mix);
            let (dry, wet) = p.dry_wet();
            prop_assert_eq!(dry + wet, 1.0);
        }

        #[test]
        fn any_input_stays_in_range(v in proptest::num::f32::ANY) {
            let mut p = EngineParameters::default();
            p.set_volume(v);
            p.set_speed(v);
            p.set_pitch_semitones(v);
            p.set_reverb_mix(v);
            p.set_eq_low_db(v);
            prop_assert!((0.0..=1.0).contains(&p.volume()));
            prop_assert!((0.5..=2.0).contains(&p.speed()));
            prop_assert!((-12..=12).contains(&p.pitch_semitones()));
            prop_assert!((0.0..=1.0).contains(&p.reverb_mix()));
            prop_assert!((-12.0..=12.0).contains(&p.eq_low_db()));
        }
    }
}
