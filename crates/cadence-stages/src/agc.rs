//! Gain driven by a level published earlier in the chain.

use cadence_core::{
    AcSpace, ChainError, ConfigError, Fragment, ParamSet, ParamSpec, Plugin, PreparedIo,
    SignalDescriptor, StageContract, StageError,
};

use crate::math::db_to_linear;

/// Brings each channel towards a target level.
///
/// Reads the per-channel level vector named by `source` from the AC space,
/// usually bound by a [`LevelMeter`](crate::LevelMeter) earlier in the chain,
/// and applies `target / level`, limited to `max_gain_db`. A shorter level
/// vector reuses its last entry for the remaining channels.
///
/// ## Parameters
///
/// | Name | Range | Default |
/// |------|-------|---------|
/// | `source` | AC variable name | `meter.level` |
/// | `target_db` | -60.0–0.0 dB | -20.0 |
/// | `max_gain_db` | 0.0–40.0 dB | 20.0 |
#[derive(Debug, Clone, Copy, Default)]
pub struct AutoGain;

/// Runtime configuration of [`AutoGain`].
#[derive(Debug, Clone, PartialEq)]
pub struct AutoGainConfig {
    /// AC variable holding the levels.
    pub source: String,
    /// Target level, linear.
    pub target: f32,
    /// Largest applied gain, linear.
    pub max_gain: f32,
}

impl AutoGainConfig {
    /// Gain that moves `level` to the target.
    pub fn gain_for(&self, level: f32) -> f32 {
        if level <= f32::EPSILON {
            return self.max_gain;
        }
        (self.target / level).min(self.max_gain)
    }
}

impl Plugin for AutoGain {
    type Config = AutoGainConfig;

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::text("source", "meter.level")
                .with_description("AC variable with per-channel levels"),
            ParamSpec::gain_db("target_db", -60.0, 0.0, -20.0).with_description("Target level"),
            ParamSpec::gain_db("max_gain_db", 0.0, 40.0, 20.0).with_description("Gain limit"),
        ]
    }

    fn contract(&self) -> StageContract {
        StageContract::polymorphic()
    }

    fn configure(params: &ParamSet, _io: &PreparedIo) -> Result<AutoGainConfig, ConfigError> {
        let source = params.text("source")?;
        if source.is_empty() || source.chars().any(char::is_whitespace) {
            return Err(params.invalid(
                "source",
                "AC variable names are non-empty without whitespace",
            ));
        }
        Ok(AutoGainConfig {
            source: source.to_string(),
            target: db_to_linear(params.float("target_db")?),
            max_gain: db_to_linear(params.float("max_gain_db")?),
        })
    }

    fn prepare(
        &mut self,
        input: &SignalDescriptor,
        _ac: &mut AcSpace,
    ) -> Result<SignalDescriptor, ChainError> {
        Ok(*input)
    }

    fn process<'a>(
        &'a mut self,
        config: &AutoGainConfig,
        signal: &'a mut Fragment,
        ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, StageError> {
        let levels = ac.get_vector(&config.source)?;
        let Some(&last) = levels.last() else {
            return Ok(signal);
        };
        let level = |ch: usize| levels.get(ch).copied().unwrap_or(last);

        match &mut *signal {
            Fragment::Waveform(w) => {
                for (ch, samples) in w.iter_channels_mut().enumerate() {
                    let g = config.gain_for(level(ch));
                    samples.iter_mut().for_each(|s| *s *= g);
                }
            }
            Fragment::Spectrum(s) => {
                for (ch, bins) in s.iter_channels_mut().enumerate() {
                    let g = config.gain_for(level(ch));
                    bins.iter_mut().for_each(|b| *b *= g);
                }
            }
        }
        Ok(signal)
    }
}
