//! Stage and parameter validation.
//!
//! Chain files are checked against the declarations of a [`StageRegistry`]
//! before anything is built, and every problem is reported at once.
//!
//! # Example
//!
//! ```rust
//! use cadence_config::{ChainFile, StageConfig, StageRegistry, validate_chain_file};
//!
//! let file = ChainFile::new(2, 256, 48000)
//!     .with_stage(StageConfig::new("gain").with_param("gain_db", -6.0));
//! validate_chain_file(&file, &StageRegistry::new()).expect("valid chain");
//! ```

use std::collections::HashSet;

use cadence_core::{ConfigError, ParamValue};
use cadence_registry::StageRegistry;
use thiserror::Error;

use crate::chain_file::ChainFile;

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    /// Unknown stage type.
    #[error("unknown stage type '{stage_type}' at position {index}")]
    UnknownStage {
        /// Position in the `[[stages]]` list.
        index: usize,
        /// Requested type id.
        stage_type: String,
    },

    /// Two stages resolve to the same instance name.
    #[error("duplicate stage name '{0}'")]
    DuplicateName(String),

    /// A TOML value has no parameter representation.
    #[error("unsupported value for parameter '{param}' of stage '{stage}': {reason}")]
    UnsupportedValue {
        /// Stage instance name.
        stage: String,
        /// Parameter name.
        param: String,
        /// What is wrong with the value.
        reason: String,
    },

    /// The stage rejected a parameter value.
    #[error(transparent)]
    Param(#[from] ConfigError),

    /// Multiple validation errors.
    #[error("multiple validation errors: {}", .0.iter().map(|e| e.to_string()).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<ValidationError>),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

impl ValidationError {
    /// Collapse a list of errors; `Ok` when empty.
    pub fn collect(mut errors: Vec<ValidationError>) -> ValidationResult<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ValidationError::Multiple(errors)),
        }
    }
}

/// Convert a TOML value to a parameter value.
///
/// Integers stay integers (float parameters accept them), arrays become
/// vectors of reals, strings become text.
pub fn param_value(stage: &str, param: &str, value: &toml::Value) -> ValidationResult<ParamValue> {
    let unsupported = |reason: &str| ValidationError::UnsupportedValue {
        stage: stage.to_string(),
        param: param.to_string(),
        reason: reason.to_string(),
    };
    match value {
        toml::Value::Boolean(b) => Ok(ParamValue::Bool(*b)),
        toml::Value::Integer(i) => Ok(ParamValue::Int(*i)),
        toml::Value::Float(f) => Ok(ParamValue::Float(*f as f32)),
        toml::Value::String(s) => Ok(ParamValue::Text(s.clone())),
        toml::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                toml::Value::Integer(i) => Ok(*i as f32),
                toml::Value::Float(f) => Ok(*f as f32),
                _ => Err(unsupported("arrays must contain numbers only")),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(ParamValue::Vector),
        toml::Value::Table(_) => Err(unsupported("tables are not parameter values")),
        toml::Value::Datetime(_) => Err(unsupported("dates are not parameter values")),
    }
}

/// Validate stage types, instance names and parameter values of `file`.
pub fn validate_chain_file(file: &ChainFile, registry: &StageRegistry) -> ValidationResult<()> {
    let mut errors = Vec::new();
    let names = file.instance_names();

    let mut seen = HashSet::new();
    for name in &names {
        if !seen.insert(name.as_str()) {
            errors.push(ValidationError::DuplicateName(name.clone()));
        }
    }

    for (index, (stage, name)) in file.stages.iter().zip(&names).enumerate() {
        let Some(specs) = registry.params(&stage.stage_type) else {
            errors.push(ValidationError::UnknownStage {
                index,
                stage_type: stage.stage_type.clone(),
            });
            continue;
        };
        for (param, raw) in &stage.params {
            let Some(spec) = specs.iter().find(|s| s.name == param) else {
                errors.push(
                    ConfigError::UnknownParam {
                        stage: name.clone(),
                        param: param.clone(),
                    }
                    .into(),
                );
                continue;
            };
            let checked = param_value(name, param, raw)
                .and_then(|value| spec.validate(name, value).map_err(Into::into));
            if let Err(err) = checked {
                errors.push(err);
            }
        }
    }

    ValidationError::collect(errors)
}
