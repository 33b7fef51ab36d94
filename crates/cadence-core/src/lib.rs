//! Cadence Core - chain-based real-time signal processing
//!
//! This crate provides the engine: a processing chain that negotiates signal
//! descriptors between stages, inserts short-time Fourier converters where
//! domains change, hands each stage a lock-free configuration snapshot and
//! lets stages exchange named variables through a per-chain AC space.
//!
//! # Core Abstractions
//!
//! ## Chain
//!
//! - [`ProcessingChain`] - Ordered stages with prepare/process/release lifecycle
//! - [`Stage`] - Object-safe trait the chain drives
//! - [`StageContract`] - Domains and channel counts a stage accepts
//! - [`SignalDescriptor`] - Shape of the signal at a stage boundary
//! - [`Fragment`] - One block of waveform or spectrum data
//!
//! ## Configuration
//!
//! - [`ConfigSlot`] - Single-writer publish, wait-free read, deferred reclamation
//! - [`Plugin`] / [`PluginInstance`] - Stage authoring with runtime configurations
//! - [`ParamSpec`], [`ParamSet`], [`ParamValue`] - Declared and validated parameters
//! - [`StageControl`] - Control-thread handle for changing parameters live
//!
//! ## Domain Conversion
//!
//! - [`AnalysisConverter`] / [`SynthesisConverter`] - Windowed STFT and overlap-add
//! - [`StftSettings`] - Window kind, position and exponent
//! - [`SpectralTransform`] - Replaceable FFT primitive, `rustfft` by default
//!
//! ## AC Space
//!
//! - [`AcSpace`] - Named, typed, per-chain variables with single ownership
//!
//! # Threads
//!
//! `prepare`, `release` and parameter changes run on the control thread;
//! `process` runs on the audio thread and does not lock, allocate or free.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{Fragment, ProcessingChain, SignalDescriptor};
//!
//! let input = SignalDescriptor::waveform(2, 64, 48000.0).with_transform(128, 128);
//! let mut chain = ProcessingChain::new();
//! chain.prepare(input).unwrap();
//!
//! let mut fragment = Fragment::for_descriptor(&input);
//! let output = chain.process(&mut fragment).unwrap();
//! assert_eq!(output.channels(), 2);
//!
//! chain.release();
//! ```
//!
//! # Features
//!
//! - `tracing` - debug logs for negotiation, release and configuration swaps

pub mod ac;
pub mod chain;
pub mod converter;
pub mod descriptor;
pub mod error;
pub mod fragment;
pub mod param;
pub mod plugin;
pub mod slot;
pub mod stage;
pub mod transform;
pub mod window;

// Re-export main types at crate root
pub use ac::{AcInfo, AcSpace, AcType, AcValue, AcView, MatrixView, Persistence};
pub use chain::{ChainState, ProcessingChain, StageLayout, StageProfile};
pub use converter::{
    AnalysisConverter, COLA_TOLERANCE, StftLayout, StftSettings, SynthesisConverter,
};
pub use descriptor::{DescriptorField, Domain, SignalDescriptor};
pub use error::{AcError, ChainError, ConfigError, NegotiationError, ProcessError, StageError};
pub use fragment::{Complex32, Fragment, FragmentShape, Spectrum, Waveform};
pub use param::{ParamKind, ParamSet, ParamSpec, ParamUnit, ParamValue};
pub use plugin::{Plugin, PluginControl, PluginInstance, PreparedIo, StageControl};
pub use slot::{ConfigSlot, Snapshot, is_reclaimable};
pub use stage::{ChannelPolicy, DomainSet, OutputDomain, Stage, StageContract};
pub use transform::{RustFftTransform, SpectralTransform, TransformFactory, rustfft_factory};
pub use window::{WindowKind, cola_gain, overlap_add_sum};
