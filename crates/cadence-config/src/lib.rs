//! Chain files for cadence.
//!
//! This crate turns TOML descriptions into processing chains: it parses the
//! signal shape, converter window settings and stage list, validates stage
//! types and parameter values against a [`StageRegistry`], and builds a
//! [`cadence_core::ProcessingChain`] ready to prepare.
//!
//! # Features
//!
//! - **Chain Files**: Load and save chains as TOML
//! - **Validation**: Every unknown stage, duplicate name and bad value reported at once
//! - **Building**: Stages created through the registry with their parameters applied
//!
//! # Example
//!
//! ```rust
//! use cadence_config::{ChainFile, StageConfig, StageRegistry};
//!
//! let file = ChainFile::new(2, 128, 48000)
//!     .with_transform(256, 256)
//!     .with_stage(StageConfig::new("gain").with_param("gain_db", -3.0))
//!     .with_stage(StageConfig::new("spectral_gate"));
//!
//! let chain = file.prepare(&StageRegistry::new()).unwrap();
//! assert_eq!(chain.latency(), 128);
//! ```

mod chain_file;
mod error;

/// Stage and parameter validation.
pub mod validation;

pub use chain_file::{ChainFile, StageConfig, StftSection};
pub use error::ConfigFileError;
pub use validation::{ValidationError, ValidationResult, param_value, validate_chain_file};

/// Re-export commonly used types from cadence-registry
pub use cadence_registry::{StageCategory, StageDescriptor, StageRegistry};
