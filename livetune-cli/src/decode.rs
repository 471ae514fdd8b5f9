//! WAV decoding into an engine asset.

use std::path::Path;

use hound::{SampleFormat, WavReader};
use livetune_engine::{AudioAsset, EngineError};

/// Decode a WAV file. Any failure (missing file, bad header, truncated data)
/// becomes `DecodeOrFetch`.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<AudioAsset, EngineError> {
    let path = path.as_ref();
    let fail = |e: hound::Error| EngineError::DecodeOrFetch(format!("{}: {e}", path.display()));

    let reader = WavReader::open(path).map_err(fail)?;
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<Vec<_>, _>>()
            .map_err(fail)?,
        SampleFormat::Int => {
            let max_val = (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<Result<Vec<_>, _>>()
                .map_err(fail)?
        }
    };
    AudioAsset::from_interleaved(&samples, usize::from(spec.channels), spec.sample_rate as f32)
}
