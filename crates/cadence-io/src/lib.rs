//! Audio file I/O for cadence hosts.
//!
//! This crate provides:
//!
//! - **WAV file I/O**: [`read_wav`] and [`write_wav`] for multichannel files
//! - **Framing**: [`FragmentSource`] and [`FragmentSink`] between interleaved
//!   buffers and chain fragments
//! - **Offline rendering**: [`render`] runs a prepared chain over a recording
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use cadence_io::{read_wav, render, write_wav};
//!
//! let recording = read_wav("input.wav")?;
//! let processed = render(&mut chain, recording.samples, true)?;
//! write_wav("output.wav", &processed, recording.spec)?;
//! ```

mod framing;
mod wav;

pub use framing::{FragmentSink, FragmentSource, render};
pub use wav::{Recording, WavSpec, read_wav, write_wav};

use cadence_core::ProcessError;

/// Error types for audio I/O operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WAV file read/write error.
    #[error("WAV file error: {0}")]
    Wav(#[from] hound::Error),

    /// The requested file format cannot be written.
    #[error("unsupported WAV format: {0}")]
    UnsupportedFormat(String),

    /// The chain failed while rendering.
    #[error("processing failed: {0}")]
    Process(#[from] ProcessError),

    /// Rendering needs a prepared chain.
    #[error("chain is not prepared")]
    NotPrepared,

    /// The chain ends in the spectrum domain and cannot be written as audio.
    #[error("chain output is a spectrum, not a waveform")]
    SpectrumOutput,

    /// An output fragment has an unexpected channel count.
    #[error("expected {expected} channels, got {actual}")]
    ChannelMismatch {
        /// Channels the sink was created for.
        expected: usize,
        /// Channels in the fragment.
        actual: usize,
    },
}

/// Convenience result type for audio I/O operations.
pub type Result<T> = std::result::Result<T, Error>;
