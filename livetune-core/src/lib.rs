#![cfg_attr(not(feature = "std"), no_std)]
//! livetune core: no_std-ready DSP primitives for the live-tuning player.
//!
//! Features
//! - `std`      : (default) use the Rust standard library
//! - `no-std`   : build with `#![no_std]` and use `libm` as math backend
//! - `fast-math`: polynomial sine/cosine for filter coefficient math
//!
//! Modules
//! - [`dsp`]     : math backend, utils (db/lin, semitone ratios, smoothing)
//! - [`filters`] : WebAudio-compatible biquad shelves and peaking sections
//!
//! Design
//! - No heap allocations; pure sample-by-sample primitives
//! - Friendly to real-time render callbacks

pub mod dsp;
pub mod filters;

/// Commonly used types/functions for convenience:
pub mod prelude {
    pub use crate::dsp::{
        clamp, db_to_lin, kill_denormals, lerp, lin_to_db, one_pole_coeff_ms,
        semitones_to_ratio, TAU,
    };
    pub use crate::filters::{Biquad, BiquadCoeffs, BiquadKind};
}

#[cfg(test)]
mod smoke {

    #[test]
    fn prelude_exists() {
        use crate::prelude::*;
        let _ = db_to_lin(-6.0);
        let _ = semitones_to_ratio(3.0);
        let mut eq = Biquad::new(BiquadCoeffs::design(BiquadKind::Peaking, 1000.0, 1.0, 2.0, 48000.0));
        let _ = eq.process(0.1);
    }
}
