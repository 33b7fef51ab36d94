//! Cadence Stages - built-in processing stages
//!
//! Each stage is a [`Plugin`](cadence_core::Plugin); wrap it in a
//! [`PluginInstance`](cadence_core::PluginInstance) to put it in a chain:
//!
//! - [`Identity`] - Pass-through, optionally restricted to one domain
//! - [`Gain`] - Static gain in dB, either domain
//! - [`Delay`] - Feedback delay line on waveforms
//! - [`LevelMeter`] - Per-channel RMS published as an AC vector
//! - [`AutoGain`] - Gain driven by a level read from the AC space
//! - [`Downmix`] - Any channel count to mono, into a stage-owned buffer
//! - [`SpectralGate`] - Per-bin gate, spectrum only
//!
//! ## Example
//!
//! ```rust
//! use cadence_core::{Fragment, PluginInstance, ProcessingChain, SignalDescriptor};
//! use cadence_stages::{AutoGain, LevelMeter};
//!
//! let mut chain = ProcessingChain::new()
//!     .with_stage(Box::new(PluginInstance::new("meter", LevelMeter::new("meter.level"))))
//!     .unwrap()
//!     .with_stage(Box::new(PluginInstance::new("agc", AutoGain)))
//!     .unwrap();
//!
//! let input = SignalDescriptor::waveform(2, 64, 48000.0);
//! chain.prepare(input).unwrap();
//! let mut fragment = Fragment::for_descriptor(&input);
//! chain.process(&mut fragment).unwrap();
//! ```

pub mod agc;
pub mod delay;
pub mod downmix;
pub mod gain;
pub mod identity;
pub mod math;
pub mod meter;
pub mod spectral_gate;

// Re-export main types at crate root
pub use agc::{AutoGain, AutoGainConfig};
pub use delay::{Delay, DelayConfig, MAX_DELAY_MS};
pub use downmix::{Downmix, DownmixConfig};
pub use gain::{Gain, GainConfig};
pub use identity::Identity;
pub use math::{db_to_linear, flush_denormal, linear_to_db};
pub use meter::{LevelMeter, MeterConfig};
pub use spectral_gate::{SpectralGate, SpectralGateConfig};
