//! C ABI wrapper for the livetune engine.
//!
//! Exposes the engine's command/query surface plus a render entry point for
//! hosts that own their own audio callback.
//!
//! ABI notes
//! - All functions are `extern "C"` and `#[no_mangle]`.
//! - Opaque handle types: `LivetuneEngine`, `LivetuneRenderer` (heap-allocated;
//!   you own/delete them).
//! - Commands return a status code (`LIVETUNE_OK` or a negative error).
//! - Null handles are ignored: commands return `LIVETUNE_ERR_NULL`, queries 0.
//!
//! Threading
//! - An engine handle is NOT thread-safe; call its functions from one control
//!   thread. To render on a separate audio thread, move the renderer out with
//!   `livetune_renderer_take` and call `livetune_renderer_render_f32` there.

use std::ffi::{c_char, CStr};

use livetune_engine::{
    AudioAsset, Engine, EngineConfig, EngineError, ImmediateHost, Renderer, Tick,
};
use tracing::warn;

pub const LIVETUNE_OK: i32 = 0;
pub const LIVETUNE_ERR_NULL: i32 = -1;
pub const LIVETUNE_ERR_DECODE: i32 = -2;
pub const LIVETUNE_ERR_PLAYBACK_UNAVAILABLE: i32 = -3;
pub const LIVETUNE_ERR_NOT_READY: i32 = -4;
pub const LIVETUNE_ERR_SOURCE_STARTED: i32 = -5;

pub const LIVETUNE_TICK_POSITION: i32 = 0;
pub const LIVETUNE_TICK_ENDED: i32 = 1;
pub const LIVETUNE_TICK_CANCELLED: i32 = 2;

/// Opaque engine handed to C.
pub struct LivetuneEngine {
    engine: Engine,
    renderer: Option<Renderer>,
}

/// Opaque render handle, usable from another thread than its engine.
pub struct LivetuneRenderer {
    inner: Renderer,
}

fn status(result: livetune_engine::Result<()>) -> i32 {
    match result {
        Ok(()) => LIVETUNE_OK,
        Err(e) => {
            warn!(error = %e, "ffi command failed");
            match e {
                EngineError::DecodeOrFetch(_) => LIVETUNE_ERR_DECODE,
                EngineError::PlaybackUnavailable(_) => LIVETUNE_ERR_PLAYBACK_UNAVAILABLE,
                EngineError::NotReady { .. } => LIVETUNE_ERR_NOT_READY,
                EngineError::SourceAlreadyStarted => LIVETUNE_ERR_SOURCE_STARTED,
            }
        }
    }
}

/// Run `f` on the engine behind `engine`, or report a null handle.
fn with_engine(engine: *mut LivetuneEngine, f: impl FnOnce(&mut Engine) -> livetune_engine::Result<()>) -> i32 {
    if engine.is_null() {
        return LIVETUNE_ERR_NULL;
    }
    let e = unsafe { &mut *engine };
    status(f(&mut e.engine))
}

/// Read a query off the engine, or 0.0 for a null handle.
fn query(engine: *const LivetuneEngine, f: impl FnOnce(&Engine) -> f64) -> f64 {
    if engine.is_null() {
        return 0.0;
    }
    let e = unsafe { &*engine };
    f(&e.engine)
}

// --- Creation / destruction -------------------------------------------------------

/// Create an engine rendering at `sample_rate` with the default tuning.
/// The embedded renderer is always ready to run (the caller owns the callback).
#[no_mangle]
pub extern "C" fn livetune_create(sample_rate: f32) -> *mut LivetuneEngine {
    let sr = if sample_rate.is_finite() { sample_rate.max(1.0) } else { 48_000.0 };
    let (mut engine, renderer) = Engine::new(EngineConfig::default().with_sample_rate(sr));
    engine.set_output_host(Box::new(ImmediateHost));
    Box::into_raw(Box::new(LivetuneEngine { engine, renderer: Some(renderer) }))
}

/// Destroy an engine previously returned by `livetune_create`.
#[no_mangle]
pub extern "C" fn livetune_destroy(engine: *mut LivetuneEngine) {
    if !engine.is_null() {
        unsafe { drop(Box::from_raw(engine)); }
    }
}

// --- Loading ----------------------------------------------------------------------

/// Load a decoded track given as interleaved f32 samples
/// (`frames * channels` values).
#[no_mangle]
pub extern "C" fn livetune_load_interleaved_f32(
    engine: *mut LivetuneEngine,
    samples: *const f32,
    frames: u32,
    channels: u32,
    sample_rate: f32,
) -> i32 {
    with_engine(engine, |e| {
        e.load_with(|| {
            if samples.is_null() {
                return Err(EngineError::DecodeOrFetch("null sample buffer".into()));
            }
            let len = frames as usize * channels as usize;
            let data = unsafe { std::slice::from_raw_parts(samples, len) };
            AudioAsset::from_interleaved(data, channels as usize, sample_rate)
        })
    })
}

/// Report that fetching or decoding failed on the host side. `reason` is a
/// NUL-terminated UTF-8 string (may be null).
#[no_mangle]
pub extern "C" fn livetune_load_failed(engine: *mut LivetuneEngine, reason: *const c_char) -> i32 {
    let reason = if reason.is_null() {
        String::from("unknown error")
    } else {
        unsafe { CStr::from_ptr(reason) }.to_string_lossy().into_owned()
    };
    with_engine(engine, |e| {
        e.load()?;
        e.load_failed(reason)
    })
}

// --- Transport --------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn livetune_toggle_playback(engine: *mut LivetuneEngine) -> i32 {
    with_engine(engine, Engine::toggle_playback)
}

/// Rewind to the start and return to Ready.
#[no_mangle]
pub extern "C" fn livetune_stop(engine: *mut LivetuneEngine) -> i32 {
    with_engine(engine, Engine::stop)
}

#[no_mangle]
pub extern "C" fn livetune_seek(engine: *mut LivetuneEngine, seconds: f64) -> i32 {
    with_engine(engine, |e| e.seek(seconds))
}

/// One position-tracking step: `LIVETUNE_TICK_*`. Call periodically while
/// playing; `LIVETUNE_TICK_ENDED` means the engine has rewound to Ready.
#[no_mangle]
pub extern "C" fn livetune_poll(engine: *mut LivetuneEngine) -> i32 {
    if engine.is_null() {
        return LIVETUNE_ERR_NULL;
    }
    let e = unsafe { &mut *engine };
    match e.engine.poll() {
        Tick::Position(_) => LIVETUNE_TICK_POSITION,
        Tick::Ended => LIVETUNE_TICK_ENDED,
        Tick::Cancelled => LIVETUNE_TICK_CANCELLED,
    }
}

// --- Parameters -------------------------------------------------------------------

#[no_mangle]
pub extern "C" fn livetune_set_volume(engine: *mut LivetuneEngine, volume: f32) -> i32 {
    with_engine(engine, |e| e.set_volume(volume))
}

#[no_mangle]
pub extern "C" fn livetune_set_speed(engine: *mut LivetuneEngine, speed: f32) -> i32 {
    with_engine(engine, |e| e.set_speed(speed))
}

#[no_mangle]
pub extern "C" fn livetune_set_pitch(engine: *mut LivetuneEngine, semitones: f32) -> i32 {
    with_engine(engine, |e| e.set_pitch(semitones))
}

#[no_mangle]
pub extern "C" fn livetune_set_reverb_mix(engine: *mut LivetuneEngine, mix: f32) -> i32 {
    with_engine(engine, |e| e.set_reverb_mix(mix))
}

#[no_mangle]
pub extern "C" fn livetune_set_eq_low(engine: *mut LivetuneEngine, db: f32) -> i32 {
    with_engine(engine, |e| e.set_eq_low(db))
}

#[no_mangle]
pub extern "C" fn livetune_set_eq_mid(engine: *mut LivetuneEngine, db: f32) -> i32 {
    with_engine(engine, |e| e.set_eq_mid(db))
}

#[no_mangle]
pub extern "C" fn livetune_set_eq_high(engine: *mut LivetuneEngine, db: f32) -> i32 {
    with_engine(engine, |e| e.set_eq_high(db))
}

// --- Queries ----------------------------------------------------------------------

/// Playback position in seconds.
#[no_mangle]
pub extern "C" fn livetune_position(engine: *const LivetuneEngine) -> f64 {
    query(engine, Engine::current_position)
}

/// Track length in seconds (0 when nothing is loaded).
#[no_mangle]
pub extern "C" fn livetune_duration(engine: *const LivetuneEngine) -> f64 {
    query(engine, Engine::duration)
}

/// Position as a fraction of the track, 0..1.
#[no_mangle]
pub extern "C" fn livetune_progress(engine: *const LivetuneEngine) -> f64 {
    query(engine, Engine::progress)
}

/// 0 uninitialized, 1 loading, 2 ready, 3 playing, 4 paused, 5 load failed;
/// `LIVETUNE_ERR_NULL` for a null handle.
#[no_mangle]
pub extern "C" fn livetune_state(engine: *const LivetuneEngine) -> i32 {
    if engine.is_null() {
        return LIVETUNE_ERR_NULL;
    }
    let e = unsafe { &*engine };
    e.engine.state().code()
}

// --- Rendering --------------------------------------------------------------------

/// Render `frames` of audio into an interleaved f32 buffer with `channels`
/// channels, using the engine's embedded renderer.
///
/// Returns the number of frames rendered (0 on error or once the renderer has
/// been taken).
#[no_mangle]
pub extern "C" fn livetune_render_interleaved_f32(
    engine: *mut LivetuneEngine,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if engine.is_null() {
        return 0;
    }
    let e = unsafe { &mut *engine };
    match e.renderer.as_mut() {
        Some(r) => render(r, out_interleaved, frames, channels),
        None => 0,
    }
}

/// Move the renderer out of `engine` so it can be driven from an audio thread.
/// Returns null if it was already taken.
#[no_mangle]
pub extern "C" fn livetune_renderer_take(engine: *mut LivetuneEngine) -> *mut LivetuneRenderer {
    if engine.is_null() {
        return std::ptr::null_mut();
    }
    let e = unsafe { &mut *engine };
    match e.renderer.take() {
        Some(inner) => Box::into_raw(Box::new(LivetuneRenderer { inner })),
        None => std::ptr::null_mut(),
    }
}

/// Same as `livetune_render_interleaved_f32`, on a taken renderer.
#[no_mangle]
pub extern "C" fn livetune_renderer_render_f32(
    renderer: *mut LivetuneRenderer,
    out_interleaved: *mut f32,
    frames: u32,
    channels: u32,
) -> u32 {
    if renderer.is_null() {
        return 0;
    }
    let r = unsafe { &mut *renderer };
    render(&mut r.inner, out_interleaved, frames, channels)
}

#[no_mangle]
pub extern "C" fn livetune_renderer_destroy(renderer: *mut LivetuneRenderer) {
    if !renderer.is_null() {
        unsafe { drop(Box::from_raw(renderer)); }
    }
}

fn render(r: &mut Renderer, out_interleaved: *mut f32, frames: u32, channels: u32) -> u32 {
    if out_interleaved.is_null() || frames == 0 || channels == 0 {
        return 0;
    }
    let out = unsafe { std::slice::from_raw_parts_mut(out_interleaved, (frames as usize) * (channels as usize)) };
    r.render_interleaved(out, channels as usize);
    frames
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    fn tone(frames: usize, channels: usize) -> Vec<f32> {
        (0..frames * channels).map(|i| ((i / channels) as f32 * 0.03).sin() * 0.5).collect()
    }

    #[test]
    fn null_handles_are_ignored() {
        let null = std::ptr::null_mut();
        assert_eq!(livetune_toggle_playback(null), LIVETUNE_ERR_NULL);
        assert_eq!(livetune_set_volume(null, 0.5), LIVETUNE_ERR_NULL);
        assert_eq!(livetune_state(null), LIVETUNE_ERR_NULL);
        assert_eq!(livetune_position(null), 0.0);
        assert_eq!(livetune_poll(null), LIVETUNE_ERR_NULL);
        assert!(livetune_renderer_take(null).is_null());
        let mut buf = [0.0_f32; 8];
        assert_eq!(livetune_render_interleaved_f32(null, buf.as_mut_ptr(), 4, 2), 0);
        livetune_destroy(null);
        livetune_renderer_destroy(std::ptr::null_mut());
    }

    #[test]
    fn load_play_render_and_query() {
        let e = livetune_create(8_000.0);
        assert_eq!(livetune_state(e), 0);
        let data = tone(16_000, 2);
        assert_eq!(livetune_load_interleaved_f32(e, data.as_ptr(), 16_000, 2, 8_000.0), LIVETUNE_OK);
        assert_eq!(livetune_state(e), 2);
        assert_eq!(livetune_duration(e), 2.0);

        assert_eq!(livetune_toggle_playback(e), LIVETUNE_OK);
        assert_eq!(livetune_state(e), 3);
        let mut buf = vec![0.0_f32; 2 * 1_024];
        assert_eq!(livetune_render_interleaved_f32(e, buf.as_mut_ptr(), 1_024, 2), 1_024);
        assert!(buf.iter().any(|s| s.abs() > 1e-3));
        assert!(livetune_position(e) > 0.1);
        assert_eq!(livetune_poll(e), LIVETUNE_TICK_POSITION);

        assert_eq!(livetune_set_reverb_mix(e, 2.0), LIVETUNE_OK);
        assert_eq!(livetune_seek(e, 1.0), LIVETUNE_OK);
        assert!((livetune_progress(e) - 0.5).abs() < 1e-9);

        assert_eq!(livetune_toggle_playback(e), LIVETUNE_OK);
        assert_eq!(livetune_state(e), 4);
        assert_eq!(livetune_poll(e), LIVETUNE_TICK_CANCELLED);

        assert_eq!(livetune_stop(e), LIVETUNE_OK);
        assert_eq!(livetune_state(e), 2);
        assert_eq!(livetune_position(e), 0.0);
        livetune_destroy(e);
    }

    #[test]
    fn host_side_load_failure_blocks_playback() {
        let e = livetune_create(8_000.0);
        let reason = CString::new("404").unwrap();
        assert_eq!(livetune_load_failed(e, reason.as_ptr()), LIVETUNE_OK);
        assert_eq!(livetune_state(e), 5);
        assert_eq!(livetune_toggle_playback(e), LIVETUNE_ERR_NOT_READY);
        assert_eq!(livetune_set_volume(e, 0.2), LIVETUNE_ERR_NOT_READY);
        assert_eq!(
            livetune_load_interleaved_f32(e, std::ptr::null(), 10, 2, 8_000.0),
            LIVETUNE_ERR_DECODE
        );
        livetune_destroy(e);
    }

    #[test]
    fn taken_renderer_drives_playback() {
        let e = livetune_create(8_000.0);
        let data = tone(8_000, 1);
        livetune_load_interleaved_f32(e, data.as_ptr(), 8_000, 1, 8_000.0);
        let r = livetune_renderer_take(e);
        assert!(!r.is_null());
        assert!(livetune_renderer_take(e).is_null());
        livetune_toggle_playback(e);

        let mut buf = vec![0.0_f32; 512];
        assert_eq!(livetune_render_interleaved_f32(e, buf.as_mut_ptr(), 512, 1), 0);
        assert_eq!(livetune_renderer_render_f32(r, buf.as_mut_ptr(), 512, 1), 512);
        assert!(livetune_position(e) > 0.0);
        livetune_renderer_destroy(r);
        livetune_destroy(e);
    }
}
