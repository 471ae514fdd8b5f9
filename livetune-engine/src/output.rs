//! Audio output through CPAL (enabled with the `realtime` feature).
//!
//! The stream is built paused with the engine's `Renderer` moved into the
//! callback; the engine's first play calls `resume()`, which starts it.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{debug, warn};

use crate::clock::OutputHost;
use crate::error::HostError;
use crate::graph::Renderer;

/// Frames converted per pass for integer sample formats.
const CONVERT_FRAMES: usize = 512;

/// Names of the output devices on the default host.
pub fn output_device_names() -> Result<Vec<String>, HostError> {
    let host = cpal::default_host();
    let devices = host.output_devices().map_err(|e| HostError::Stream(e.to_string()))?;
    Ok(devices.filter_map(|d| d.name().ok()).collect())
}

/// The named output device, or the default one.
pub fn pick_device(name: Option<&str>) -> Result<cpal::Device, HostError> {
    let host = cpal::default_host();
    if let Some(name) = name {
        let devices = host.output_devices().map_err(|e| HostError::Stream(e.to_string()))?;
        for d in devices {
            if d.name().map(|n| n == name).unwrap_or(false) {
                return Ok(d);
            }
        }
        return Err(HostError::NoDevice);
    }
    host.default_output_device().ok_or(HostError::NoDevice)
}

/// The device's preferred output configuration.
pub fn default_config(device: &cpal::Device) -> Result<cpal::SupportedStreamConfig, HostError> {
    device.default_output_config().map_err(|e| HostError::Stream(e.to_string()))
}

/// An output stream pulling a `Renderer`.
pub struct CpalHost {
    stream: cpal::Stream,
    started: bool,
}

impl CpalHost {
    /// Build the stream for `config`. The renderer's sample rate should match
    /// `config.sample_rate()`.
    pub fn open(
        device: &cpal::Device,
        config: &cpal::SupportedStreamConfig,
        renderer: Renderer,
    ) -> Result<Self, HostError> {
        let stream_cfg = config.config();
        if (renderer.sample_rate() - stream_cfg.sample_rate.0 as f32).abs() > f32::EPSILON {
            warn!(
                engine = renderer.sample_rate(),
                device = stream_cfg.sample_rate.0,
                "engine and device sample rates differ"
            );
        }
        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => build_f32(device, &stream_cfg, renderer)?,
            cpal::SampleFormat::I16 => build_converted::<i16>(device, &stream_cfg, renderer)?,
            cpal::SampleFormat::U16 => build_converted::<u16>(device, &stream_cfg, renderer)?,
            other => return Err(HostError::Stream(format!("unsupported sample format {other:?}"))),
        };
        // some backends start streams on creation
        stream.pause().map_err(|e| HostError::Stream(e.to_string()))?;
        debug!(config = ?stream_cfg, "output stream ready");
        Ok(Self { stream, started: false })
    }
}

impl OutputHost for CpalHost {
    fn resume(&mut self) -> Result<(), HostError> {
        if !self.started {
            self.stream.play().map_err(|e| HostError::Stream(e.to_string()))?;
            self.started = true;
        }
        Ok(())
    }
}

fn on_stream_error(e: cpal::StreamError) {
    warn!(error = %e, "output stream error");
}

fn build_f32(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut renderer: Renderer,
) -> Result<cpal::Stream, HostError> {
    let channels = usize::from(cfg.channels);
    device
        .build_output_stream(
            cfg,
            move |out: &mut [f32], _| {
                renderer.render_interleaved(out, channels);
                for s in out.iter_mut() {
                    *s = s.clamp(-1.0, 1.0);
                }
            },
            on_stream_error,
            None,
        )
        .map_err(|e| HostError::Stream(e.to_string()))
}

fn build_converted<T>(
    device: &cpal::Device,
    cfg: &cpal::StreamConfig,
    mut renderer: Renderer,
) -> Result<cpal::Stream, HostError>
where
    T: cpal::SizedSample + cpal::FromSample<f32> + Send + 'static,
{
    let channels = usize::from(cfg.channels).max(1);
    let mut scratch = vec![0.0_f32; CONVERT_FRAMES * channels];
    device
        .build_output_stream(
            cfg,
            move |out: &mut [T], _| {
                for chunk in out.chunks_mut(scratch.len()) {
                    let tmp = &mut scratch[..chunk.len()];
                    renderer.render_interleaved(tmp, channels);
                    for (dst, &s) in chunk.iter_mut().zip(tmp.iter()) {
                        *dst = T::from_sample(s.clamp(-1.0, 1.0));
                    }
                }
            },
            on_stream_error,
            None,
        )
        .map_err(|e| HostError::Stream(e.to_string()))
}
