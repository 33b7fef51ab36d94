//! Declared stage parameters and their validated values.
//!
//! Every stage declares its parameters as a list of [`ParamSpec`]s. Raw values
//! arriving from a configuration front end are checked against the spec
//! ([`ParamSpec::validate`]) before a runtime configuration is derived from
//! them, so a rejected value never reaches a configuration slot.
//!
//! # Example
//!
//! ```rust
//! use cadence_core::{ParamSet, ParamSpec, ParamValue};
//!
//! let specs = vec![ParamSpec::gain_db("gain_db", -60.0, 24.0, 0.0)];
//! let mut params = ParamSet::from_specs("gain", specs);
//!
//! params.set("gain_db", ParamValue::Int(6)).unwrap();
//! assert_eq!(params.float("gain_db").unwrap(), 6.0);
//!
//! assert!(params.set("gain_db", ParamValue::Float(100.0)).is_err());
//! assert_eq!(params.float("gain_db").unwrap(), 6.0);
//! ```

use core::fmt;

use crate::error::ConfigError;

/// Unit used when displaying a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamUnit {
    /// Decibels.
    Decibels,
    /// Milliseconds.
    Milliseconds,
    /// Sample frames.
    Frames,
    /// Seconds.
    Seconds,
    /// Dimensionless.
    None,
}

impl ParamUnit {
    /// Suffix appended to displayed values.
    pub const fn suffix(&self) -> &'static str {
        match self {
            ParamUnit::Decibels => " dB",
            ParamUnit::Milliseconds => " ms",
            ParamUnit::Frames => " frames",
            ParamUnit::Seconds => " s",
            ParamUnit::None => "",
        }
    }
}

/// Type and valid range of a parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// `true` / `false`.
    Bool,
    /// Integer in `[min, max]`.
    Int {
        /// Lower bound.
        min: i64,
        /// Upper bound.
        max: i64,
    },
    /// Real number in `[min, max]`.
    Float {
        /// Lower bound.
        min: f32,
        /// Upper bound.
        max: f32,
    },
    /// Vector of reals, each in `[min, max]`.
    Vector {
        /// Lower bound per element.
        min: f32,
        /// Upper bound per element.
        max: f32,
    },
    /// One of a fixed list of keywords.
    Choice(&'static [&'static str]),
    /// Free text.
    Text,
}

impl ParamKind {
    fn type_name(&self) -> &'static str {
        match self {
            ParamKind::Bool => "bool",
            ParamKind::Int { .. } => "int",
            ParamKind::Float { .. } => "float",
            ParamKind::Vector { .. } => "vector",
            ParamKind::Choice(_) => "keyword",
            ParamKind::Text => "text",
        }
    }
}

/// A parameter value supplied by the configuration front end.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Real number.
    Float(f32),
    /// Vector of reals.
    Vector(Vec<f32>),
    /// Keyword or text.
    Text(String),
}

impl ParamValue {
    /// Name of the value's type, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Float(_) => "float",
            ParamValue::Vector(_) => "vector",
            ParamValue::Text(_) => "text",
        }
    }

    /// Parse a command-line style value: `true`, `3`, `-6.5`, `[1 2 3]`, or text.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            let items: Result<Vec<f32>, _> = inner
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(str::parse::<f32>)
                .collect();
            if let Ok(items) = items {
                return ParamValue::Vector(items);
            }
        }
        match trimmed {
            "true" | "yes" => return ParamValue::Bool(true),
            "false" | "no" => return ParamValue::Bool(false),
            _ => {}
        }
        if let Ok(v) = trimmed.parse::<i64>() {
            return ParamValue::Int(v);
        }
        if let Ok(v) = trimmed.parse::<f32>() {
            return ParamValue::Float(v);
        }
        ParamValue::Text(trimmed.to_string())
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Vector(v) => {
                f.write_str("[")?;
                for (i, x) in v.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{x}")?;
                }
                f.write_str("]")
            }
            ParamValue::Text(v) => f.write_str(v),
        }
    }
}

/// Declaration of one stage parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    /// Parameter name, unique within the stage.
    pub name: &'static str,
    /// One-line help text.
    pub description: &'static str,
    /// Display unit.
    pub unit: ParamUnit,
    /// Type and range.
    pub kind: ParamKind,
    /// Value used until the parameter is set.
    pub default: ParamValue,
}

impl ParamSpec {
    /// Real-valued parameter.
    pub fn float(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self {
            name,
            description: "",
            unit: ParamUnit::None,
            kind: ParamKind::Float { min, max },
            default: ParamValue::Float(default),
        }
    }

    /// Gain in decibels.
    pub fn gain_db(name: &'static str, min: f32, max: f32, default: f32) -> Self {
        Self::float(name, min, max, default).with_unit(ParamUnit::Decibels)
    }

    /// Integer parameter.
    pub fn int(name: &'static str, min: i64, max: i64, default: i64) -> Self {
        Self {
            name,
            description: "",
            unit: ParamUnit::None,
            kind: ParamKind::Int { min, max },
            default: ParamValue::Int(default),
        }
    }

    /// Boolean switch.
    pub fn boolean(name: &'static str, default: bool) -> Self {
        Self {
            name,
            description: "",
            unit: ParamUnit::None,
            kind: ParamKind::Bool,
            default: ParamValue::Bool(default),
        }
    }

    /// Vector of reals.
    pub fn vector(name: &'static str, min: f32, max: f32, default: Vec<f32>) -> Self {
        Self {
            name,
            description: "",
            unit: ParamUnit::None,
            kind: ParamKind::Vector { min, max },
            default: ParamValue::Vector(default),
        }
    }

    /// Keyword from a fixed set.
    pub fn choice(
        name: &'static str,
        choices: &'static [&'static str],
        default: &'static str,
    ) -> Self {
        Self {
            name,
            description: "",
            unit: ParamUnit::None,
            kind: ParamKind::Choice(choices),
            default: ParamValue::Text(default.to_string()),
        }
    }

    /// Free text.
    pub fn text(name: &'static str, default: &str) -> Self {
        Self {
            name,
            description: "",
            unit: ParamUnit::None,
            kind: ParamKind::Text,
            default: ParamValue::Text(default.to_string()),
        }
    }

    /// Set the help text.
    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    /// Set the display unit.
    pub fn with_unit(mut self, unit: ParamUnit) -> Self {
        self.unit = unit;
        self
    }

    /// Check `value` against this declaration.
    ///
    /// Integers are accepted for float parameters and converted. Returns the
    /// value in its canonical type.
    pub fn validate(&self, stage: &str, value: ParamValue) -> Result<ParamValue, ConfigError> {
        let wrong_type = |value: &ParamValue| ConfigError::WrongType {
            stage: stage.to_string(),
            param: self.name.to_string(),
            expected: self.kind.type_name(),
            actual: value.type_name(),
        };
        let out_of_range = |min: f64, max: f64, value: f64| ConfigError::OutOfRange {
            stage: stage.to_string(),
            param: self.name.to_string(),
            min,
            max,
            value,
        };

        match (&self.kind, value) {
            (ParamKind::Bool, v @ ParamValue::Bool(_)) => Ok(v),
            (ParamKind::Int { min, max }, ParamValue::Int(v)) => {
                if v < *min || v > *max {
                    Err(out_of_range(*min as f64, *max as f64, v as f64))
                } else {
                    Ok(ParamValue::Int(v))
                }
            }
            (ParamKind::Float { min, max }, ParamValue::Int(i)) => {
                self.validate(stage, ParamValue::Float(i as f32)).map_err(|e| match e {
                    ConfigError::OutOfRange { .. } => {
                        out_of_range(f64::from(*min), f64::from(*max), i as f64)
                    }
                    other => other,
                })
            }
            (ParamKind::Float { min, max }, ParamValue::Float(v)) => {
                if !v.is_finite() || v < *min || v > *max {
                    Err(out_of_range(f64::from(*min), f64::from(*max), f64::from(v)))
                } else {
                    Ok(ParamValue::Float(v))
                }
            }
            (ParamKind::Vector { min, max }, ParamValue::Vector(items)) => {
                match items.iter().find(|x| !x.is_finite() || **x < *min || **x > *max) {
                    Some(bad) => Err(out_of_range(
                        f64::from(*min),
                        f64::from(*max),
                        f64::from(*bad),
                    )),
                    None => Ok(ParamValue::Vector(items)),
                }
            }
            (ParamKind::Choice(choices), ParamValue::Text(text)) => {
                if choices.contains(&text.as_str()) {
                    Ok(ParamValue::Text(text))
                } else {
                    Err(ConfigError::InvalidChoice {
                        stage: stage.to_string(),
                        param: self.name.to_string(),
                        value: text,
                        choices: choices.join(", "),
                    })
                }
            }
            (ParamKind::Text, v @ ParamValue::Text(_)) => Ok(v),
            (_, other) => Err(wrong_type(&other)),
        }
    }
}

/// Current values of one stage's parameters.
///
/// Always complete: every declared parameter has a value, starting from its
/// default. Updates are validated; a rejected update leaves the set unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSet {
    stage: String,
    specs: Vec<ParamSpec>,
    values: Vec<ParamValue>,
}

impl ParamSet {
    /// Defaults for `specs`, on behalf of stage `stage`.
    pub fn from_specs(stage: impl Into<String>, specs: Vec<ParamSpec>) -> Self {
        let values = specs.iter().map(|s| s.default.clone()).collect();
        Self {
            stage: stage.into(),
            specs,
            values,
        }
    }

    /// Stage instance name.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Declarations.
    pub fn specs(&self) -> &[ParamSpec] {
        &self.specs
    }

    /// `(name, value)` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParamValue)> {
        self.specs.iter().map(|s| s.name).zip(self.values.iter())
    }

    fn index(&self, name: &str) -> Result<usize, ConfigError> {
        self.specs
            .iter()
            .position(|s| s.name == name)
            .ok_or_else(|| ConfigError::UnknownParam {
                stage: self.stage.clone(),
                param: name.to_string(),
            })
    }

    /// Validate and store `value`. Returns the value it replaced.
    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<ParamValue, ConfigError> {
        let index = self.index(name)?;
        let value = self.specs[index].validate(&self.stage, value)?;
        Ok(std::mem::replace(&mut self.values[index], value))
    }

    /// Put back a value that [`set`](Self::set) returned, without validating
    /// it again. Unknown names are ignored.
    pub fn restore(&mut self, name: &str, value: ParamValue) {
        if let Some(i) = self.specs.iter().position(|s| s.name == name) {
            self.values[i] = value;
        }
    }

    /// Current value.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.index(name).ok().map(|i| &self.values[i])
    }

    fn typed<T>(
        &self,
        name: &str,
        expected: &'static str,
        extract: impl FnOnce(&ParamValue) -> Option<T>,
    ) -> Result<T, ConfigError> {
        let value = &self.values[self.index(name)?];
        extract(value).ok_or_else(|| ConfigError::WrongType {
            stage: self.stage.clone(),
            param: name.to_string(),
            expected,
            actual: value.type_name(),
        })
    }

    /// Float value.
    pub fn float(&self, name: &str) -> Result<f32, ConfigError> {
        self.typed(name, "float", |v| match v {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f32),
            _ => None,
        })
    }

    /// Integer value.
    pub fn int(&self, name: &str) -> Result<i64, ConfigError> {
        self.typed(name, "int", |v| match v {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        })
    }

    /// Boolean value.
    pub fn boolean(&self, name: &str) -> Result<bool, ConfigError> {
        self.typed(name, "bool", |v| match v {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        })
    }

    /// Vector value.
    pub fn vector(&self, name: &str) -> Result<&[f32], ConfigError> {
        let value = &self.values[self.index(name)?];
        match value {
            ParamValue::Vector(v) => Ok(v),
            other => Err(ConfigError::WrongType {
                stage: self.stage.clone(),
                param: name.to_string(),
                expected: "vector",
                actual: other.type_name(),
            }),
        }
    }

    /// Keyword or text value.
    pub fn text(&self, name: &str) -> Result<&str, ConfigError> {
        let value = &self.values[self.index(name)?];
        match value {
            ParamValue::Text(t) => Ok(t),
            other => Err(ConfigError::WrongType {
                stage: self.stage.clone(),
                param: name.to_string(),
                expected: "text",
                actual: other.type_name(),
            }),
        }
    }

    /// Build a rejection for a combination of values.
    pub fn invalid(&self, param: &str, reason: impl Into<String>) -> ConfigError {
        ConfigError::Invalid {
            stage: self.stage.clone(),
            param: param.to_string(),
            reason: reason.into(),
        }
    }
}
