//! Multichannel WAV files as interleaved `f32` frames.
//!
//! Every channel is kept; the chain decides what to do with the channel
//! count. Integer PCM is scaled to `[-1, 1)` on the way in and clamped to
//! full scale on the way out. 32-bit files are written as IEEE float.

use std::path::Path;

use hound::{SampleFormat, WavReader, WavWriter};

use crate::{Error, Result};

/// Channel count, rate and sample width of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavSpec {
    /// Number of audio channels.
    pub channels: u16,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bit depth per sample (16, 24 or 32).
    pub bits_per_sample: u16,
}

impl WavSpec {
    /// Check that the spec can be written.
    pub fn validate(&self) -> Result<()> {
        if self.channels == 0 || self.sample_rate == 0 {
            return Err(Error::UnsupportedFormat(format!(
                "{} channels at {} Hz",
                self.channels, self.sample_rate
            )));
        }
        if !matches!(self.bits_per_sample, 16 | 24 | 32) {
            return Err(Error::UnsupportedFormat(format!(
                "bit depth {} (use 16, 24 or 32)",
                self.bits_per_sample
            )));
        }
        Ok(())
    }

    fn to_hound(self) -> hound::WavSpec {
        hound::WavSpec {
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
            sample_format: if self.bits_per_sample == 32 {
                SampleFormat::Float
            } else {
                SampleFormat::Int
            },
        }
    }
}

/// Integer full scale for `bits`.
fn full_scale(bits: u16) -> f32 {
    (1i64 << (bits.clamp(1, 32) - 1)) as f32
}

/// A decoded file.
#[derive(Debug, Clone, PartialEq)]
pub struct Recording {
    /// Interleaved samples, `frame0ch0, frame0ch1, ...`.
    pub samples: Vec<f32>,
    /// Format of the file the samples came from.
    pub spec: WavSpec,
}

impl Recording {
    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.spec.channels.max(1))
    }

    /// Length in seconds.
    pub fn seconds(&self) -> f64 {
        self.frames() as f64 / f64::from(self.spec.sample_rate.max(1))
    }
}

/// Decode a WAV file.
pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Recording> {
    let reader = WavReader::open(path)?;
    let format = reader.spec();
    let spec = WavSpec {
        channels: format.channels,
        sample_rate: format.sample_rate,
        bits_per_sample: format.bits_per_sample,
    };

    let samples = match format.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()?,
        SampleFormat::Int => {
            let scale = full_scale(format.bits_per_sample).recip();
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<_, _>>()?
        }
    };

    Ok(Recording { samples, spec })
}

/// Encode interleaved samples as a WAV file.
pub fn write_wav<P: AsRef<Path>>(path: P, samples: &[f32], spec: WavSpec) -> Result<()> {
    spec.validate()?;
    let mut writer = WavWriter::create(path, spec.to_hound())?;

    if spec.bits_per_sample == 32 {
        samples.iter().try_for_each(|&s| writer.write_sample(s))?;
    } else {
        let scale = full_scale(spec.bits_per_sample);
        samples
            .iter()
            .map(|&s| (s * scale).clamp(-scale, scale - 1.0) as i32)
            .try_for_each(|s| writer.write_sample(s))?;
    }

    writer.finalize()?;
    Ok(())
}
