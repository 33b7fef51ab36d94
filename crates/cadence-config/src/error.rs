//! Error types for chain file operations.

use std::path::PathBuf;
use thiserror::Error;

use cadence_core::ChainError;

use crate::validation::ValidationError;

/// Errors that can occur while loading, saving or building chain files.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// Failed to read a file
    #[error("failed to read file '{path}': {source}")]
    ReadFile {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file
    #[error("failed to write file '{path}': {source}")]
    WriteFile {
        /// Path of the file that could not be written.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// Failed to serialize TOML
    #[error("failed to serialize TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    /// A top-level field holds a value the chain cannot use.
    #[error("invalid value '{value}' for '{field}'")]
    InvalidField {
        /// Field name.
        field: &'static str,
        /// Offending value.
        value: String,
    },

    /// Stage or parameter validation failed.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The chain rejected the stages or the descriptor.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),
}

impl ConfigFileError {
    /// Create a read file error.
    pub fn read_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigFileError::ReadFile {
            path: path.into(),
            source,
        }
    }

    /// Create a write file error.
    pub fn write_file(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConfigFileError::WriteFile {
            path: path.into(),
            source,
        }
    }

    /// Create an invalid field error.
    pub fn invalid_field(field: &'static str, value: impl Into<String>) -> Self {
        ConfigFileError::InvalidField {
            field,
            value: value.into(),
        }
    }
}
