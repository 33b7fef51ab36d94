//! Chain file format and chain building.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use cadence_core::{Domain, ProcessingChain, SignalDescriptor, StftSettings, WindowKind};
use cadence_registry::StageRegistry;
use serde::{Deserialize, Serialize};

use crate::error::ConfigFileError;
use crate::validation::{ValidationError, param_value, validate_chain_file};

/// Chain description stored as TOML.
///
/// # TOML Format
///
/// ```toml
/// name = "voice"
/// channels = 2
/// fragment_size = 256
/// sample_rate = 48000
/// window_length = 512
/// transform_length = 1024
///
/// [stft]
/// window = "hann"
/// position = 0.5
///
/// [[stages]]
/// type = "meter"
///
/// [[stages]]
/// type = "agc"
/// [stages.params]
/// target_db = -18.0
///
/// [[stages]]
/// type = "spectral_gate"
/// name = "denoise"
/// [stages.params]
/// threshold_db = -50.0
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChainFile {
    /// Name of the chain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Input channel count.
    pub channels: usize,

    /// Frames per fragment; also the STFT hop.
    pub fragment_size: usize,

    /// Sample rate in Hz (defaults to 48000).
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,

    /// Analysis window length; zero for chains without domain conversion.
    #[serde(default)]
    pub window_length: usize,

    /// Transform length; defaults to the window length.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_length: Option<usize>,

    /// Domain of the chain output, `waveform` unless set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_domain: Option<String>,

    /// Converter window settings.
    #[serde(default)]
    pub stft: StftSection,

    /// Stages in processing order.
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

fn default_sample_rate() -> u32 {
    48000
}

/// The `[stft]` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StftSection {
    /// Window name: `hann`, `hamming`, `blackman`, `bartlett` or `rect`.
    #[serde(default = "default_window")]
    pub window: String,

    /// Fraction of the zero padding placed before the window.
    #[serde(default = "default_position")]
    pub position: f32,

    /// Analysis window exponent.
    #[serde(default = "default_exponent")]
    pub exponent: f32,
}

fn default_window() -> String {
    WindowKind::Hann.name().to_string()
}

fn default_position() -> f32 {
    0.5
}

fn default_exponent() -> f32 {
    1.0
}

impl Default for StftSection {
    fn default() -> Self {
        Self {
            window: default_window(),
            position: default_position(),
            exponent: default_exponent(),
        }
    }
}

/// One `[[stages]]` entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageConfig {
    /// Registered stage type id.
    #[serde(rename = "type")]
    pub stage_type: String,

    /// Instance name; derived from the type when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Parameter values.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, toml::Value>,
}

impl StageConfig {
    /// Stage of type `stage_type` with default parameters.
    pub fn new(stage_type: impl Into<String>) -> Self {
        Self {
            stage_type: stage_type.into(),
            name: None,
            params: BTreeMap::new(),
        }
    }

    /// Set the instance name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a parameter value.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<toml::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

impl ChainFile {
    /// Empty chain for the given input shape.
    pub fn new(channels: usize, fragment_size: usize, sample_rate: u32) -> Self {
        Self {
            name: None,
            description: None,
            channels,
            fragment_size,
            sample_rate,
            window_length: 0,
            transform_length: None,
            output_domain: None,
            stft: StftSection::default(),
            stages: Vec::new(),
        }
    }

    /// Set the transform geometry.
    pub fn with_transform(mut self, window_length: usize, transform_length: usize) -> Self {
        self.window_length = window_length;
        self.transform_length = Some(transform_length);
        self
    }

    /// Append a stage.
    pub fn with_stage(mut self, stage: StageConfig) -> Self {
        self.stages.push(stage);
        self
    }

    /// Load a chain file from disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigFileError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::read_file(path, e))?;
        Self::from_toml(&content)
    }

    /// Parse a chain file from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigFileError> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Save the chain file to disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigFileError> {
        let path = path.as_ref();
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|e| ConfigFileError::write_file(path, e))
    }

    /// Render as a TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigFileError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Input descriptor described by the file.
    pub fn descriptor(&self) -> SignalDescriptor {
        SignalDescriptor::waveform(self.channels, self.fragment_size, self.sample_rate as f32)
            .with_transform(
                self.window_length,
                self.transform_length.unwrap_or(self.window_length),
            )
    }

    /// Converter settings from the `[stft]` table.
    pub fn stft_settings(&self) -> Result<StftSettings, ConfigFileError> {
        let window = WindowKind::from_name(&self.stft.window)
            .ok_or_else(|| ConfigFileError::invalid_field("stft.window", &self.stft.window))?;
        Ok(StftSettings {
            window,
            window_position: self.stft.position,
            window_exponent: self.stft.exponent,
        })
    }

    /// Requested output domain.
    pub fn output_domain(&self) -> Result<Domain, ConfigFileError> {
        match self.output_domain.as_deref() {
            None | Some("waveform") => Ok(Domain::Waveform),
            Some("spectrum") => Ok(Domain::Spectrum),
            Some(other) => Err(ConfigFileError::invalid_field("output_domain", other)),
        }
    }

    /// Instance name of every stage, in order.
    ///
    /// Unnamed stages take their type id; later unnamed stages of the same
    /// type get a `_2`, `_3`, ... suffix.
    pub fn instance_names(&self) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        self.stages
            .iter()
            .map(|stage| match &stage.name {
                Some(name) => name.clone(),
                None => {
                    let count = counts.entry(stage.stage_type.as_str()).or_insert(0);
                    *count += 1;
                    if *count == 1 {
                        stage.stage_type.clone()
                    } else {
                        format!("{}_{}", stage.stage_type, count)
                    }
                }
            })
            .collect()
    }

    /// Validate and build an unprepared chain.
    pub fn build(&self, registry: &StageRegistry) -> Result<ProcessingChain, ConfigFileError> {
        validate_chain_file(self, registry)?;

        let mut chain = ProcessingChain::new()
            .with_stft(self.stft_settings()?)
            .with_output_domain(self.output_domain()?);

        for (index, (config, name)) in self.stages.iter().zip(self.instance_names()).enumerate() {
            let stage = registry.create(&config.stage_type, &name).ok_or_else(|| {
                ValidationError::UnknownStage {
                    index,
                    stage_type: config.stage_type.clone(),
                }
            })?;
            if let Some(control) = stage.control() {
                for (param, raw) in &config.params {
                    let value = param_value(&name, param, raw)?;
                    control.set(param, value).map_err(ValidationError::from)?;
                }
            }
            chain.push(stage)?;
        }

        Ok(chain)
    }

    /// Build the chain and prepare it for the file's descriptor.
    pub fn prepare(&self, registry: &StageRegistry) -> Result<ProcessingChain, ConfigFileError> {
        let mut chain = self.build(registry)?;
        chain.prepare(self.descriptor())?;
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::ChainState;

    const VOICE: &str = r#"
name = "voice"
channels = 2
fragment_size = 256
window_length = 512
transform_length = 1024

[stft]
window = "hann"

[[stages]]
type = "meter"

[[stages]]
type = "agc"
[stages.params]
target_db = -18.0

[[stages]]
type = "spectral_gate"
name = "denoise"
[stages.params]
threshold_db = -50
"#;

    #[test]
    fn parses_full_file() {
        let file = ChainFile::from_toml(VOICE).unwrap();
        assert_eq!(file.name.as_deref(), Some("voice"));
        assert_eq!(file.sample_rate, 48000);
        assert_eq!(file.stages.len(), 3);
        assert_eq!(file.stages[2].name.as_deref(), Some("denoise"));
        assert_eq!(
            file.stages[1].params.get("target_db"),
            Some(&toml::Value::Float(-18.0))
        );

        let descriptor = file.descriptor();
        assert_eq!(descriptor.window_length, 512);
        assert_eq!(descriptor.transform_length, 1024);
        assert_eq!(file.stft_settings().unwrap().window, WindowKind::Hann);
    }

    #[test]
    fn minimal_file_uses_defaults() {
        let file = ChainFile::from_toml("channels = 1\nfragment_size = 64\n").unwrap();
        assert_eq!(file.sample_rate, 48000);
        assert_eq!(file.stft, StftSection::default());
        assert_eq!(file.descriptor().transform_length, 0);
        assert_eq!(file.output_domain().unwrap(), Domain::Waveform);
        assert!(file.stages.is_empty());
    }

    #[test]
    fn missing_required_field_fails() {
        let err = ChainFile::from_toml("channels = 2\n").unwrap_err();
        assert!(matches!(err, ConfigFileError::TomlParse(_)));
    }

    #[test]
    fn rejects_unknown_window_and_domain() {
        let mut file = ChainFile::new(1, 64, 48000);
        file.stft.window = "kaiser".to_string();
        assert!(matches!(
            file.stft_settings(),
            Err(ConfigFileError::InvalidField { field: "stft.window", .. })
        ));
        file.output_domain = Some("cepstrum".to_string());
        assert!(file.output_domain().is_err());
    }

    #[test]
    fn derives_instance_names() {
        let file = ChainFile::new(1, 64, 48000)
            .with_stage(StageConfig::new("gain"))
            .with_stage(StageConfig::new("gain"))
            .with_stage(StageConfig::new("gain").with_name("trim"))
            .with_stage(StageConfig::new("delay"));
        assert_eq!(file.instance_names(), ["gain", "gain_2", "trim", "delay"]);
    }

    #[test]
    fn prepares_and_applies_params() {
        let registry = StageRegistry::new();
        let file = ChainFile::from_toml(VOICE).unwrap();
        let chain = file.prepare(&registry).unwrap();
        assert_eq!(chain.state(), ChainState::Prepared);
        assert_eq!(
            chain.stage_names().collect::<Vec<_>>(),
            ["meter", "agc", "<analysis:2>", "denoise", "<synthesis:4>"]
        );
        let gate = chain.control("denoise").unwrap();
        assert_eq!(
            gate.get("threshold_db"),
            Some(cadence_core::ParamValue::Float(-50.0))
        );
        assert_eq!(chain.latency(), 512 - 256 + 256);
    }

    #[test]
    fn build_reports_validation_errors() {
        let registry = StageRegistry::new();
        let file = ChainFile::new(1, 64, 48000).with_stage(StageConfig::new("fuzz"));
        assert!(matches!(
            file.build(&registry),
            Err(ConfigFileError::Validation(ValidationError::UnknownStage { .. }))
        ));
    }

    #[test]
    fn prepare_reports_chain_errors() {
        let registry = StageRegistry::new();
        // Spectral stage without transform geometry.
        let file = ChainFile::new(1, 64, 48000).with_stage(StageConfig::new("spectral_gate"));
        assert!(matches!(
            file.prepare(&registry),
            Err(ConfigFileError::Chain(_))
        ));
    }

    #[test]
    fn serializes_back_to_toml() {
        let file = ChainFile::from_toml(VOICE).unwrap();
        let text = file.to_toml().unwrap();
        assert!(text.contains("[[stages]]"));
        assert_eq!(ChainFile::from_toml(&text).unwrap(), file);
    }
}
