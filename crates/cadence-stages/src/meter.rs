//! Level metering published through the AC space.

use cadence_core::{
    AcSpace, AcValue, ChainError, ConfigError, Fragment, ParamSet, ParamSpec, Persistence,
    Plugin, PreparedIo, SignalDescriptor, StageContract, StageError,
};

/// Measures per-channel RMS level and binds it to an AC vector.
///
/// The fragment passes through unchanged. In the spectrum domain the level is
/// the RMS of the bin magnitudes. With `smoothing` above zero the published
/// value is a one-pole average across cycles.
///
/// ## Parameters
///
/// | Name | Range | Default |
/// |------|-------|---------|
/// | `smoothing` | 0.0–0.999 | 0.0 |
#[derive(Debug)]
pub struct LevelMeter {
    variable: String,
    levels: Vec<f32>,
}

/// Runtime configuration of [`LevelMeter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeterConfig {
    /// Weight of the previous level.
    pub smoothing: f32,
}

impl LevelMeter {
    /// Meter publishing to the AC variable `variable`.
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            levels: Vec::new(),
        }
    }

    /// Name of the published AC variable.
    pub fn variable(&self) -> &str {
        &self.variable
    }
}

fn rms(values: impl ExactSizeIterator<Item = f32>) -> f32 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    (values.map(|v| v * v).sum::<f32>() / n as f32).sqrt()
}

impl Plugin for LevelMeter {
    type Config = MeterConfig;

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::float("smoothing", 0.0, 0.999, 0.0)
            .with_description("Averaging weight of the previous level")]
    }

    fn contract(&self) -> StageContract {
        StageContract::polymorphic()
    }

    fn configure(params: &ParamSet, _io: &PreparedIo) -> Result<MeterConfig, ConfigError> {
        Ok(MeterConfig {
            smoothing: params.float("smoothing")?,
        })
    }

    fn prepare(
        &mut self,
        input: &SignalDescriptor,
        ac: &mut AcSpace,
    ) -> Result<SignalDescriptor, ChainError> {
        ac.declare(
            &self.variable,
            AcValue::vector(input.channels),
            Persistence::Transient,
        )?;
        self.levels = vec![0.0; input.channels];
        Ok(*input)
    }

    fn process<'a>(
        &'a mut self,
        config: &MeterConfig,
        signal: &'a mut Fragment,
        ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, StageError> {
        let a = config.smoothing;
        for (ch, level) in self.levels.iter_mut().enumerate() {
            let current = match &*signal {
                Fragment::Waveform(w) => rms(w.channel(ch).iter().copied()),
                Fragment::Spectrum(s) => rms(s.channel(ch).iter().map(|b| b.norm())),
            };
            *level = a * *level + (1.0 - a) * current;
        }
        ac.bind_vector(&self.variable, &self.levels)?;
        Ok(signal)
    }

    fn release(&mut self, _ac: &mut AcSpace) {
        self.levels = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_rms_per_channel() {
        let d = SignalDescriptor::waveform(2, 4, 8000.0);
        let mut meter = LevelMeter::new("level");
        let mut ac = AcSpace::new();
        ac.register_stage(0, "meter");
        meter.prepare(&d, &mut ac).unwrap();

        let mut fragment = Fragment::for_descriptor(&d);
        let w = fragment.as_waveform_mut().unwrap();
        w.channel_mut(0).copy_from_slice(&[1.0, -1.0, 1.0, -1.0]);
        w.channel_mut(1).copy_from_slice(&[0.5, 0.5, 0.0, 0.0]);

        ac.begin_cycle();
        let config = MeterConfig { smoothing: 0.0 };
        meter.process(&config, &mut fragment, &mut ac).unwrap();
        let levels = ac.get_vector("level").unwrap();
        assert!((levels[0] - 1.0).abs() < 1e-6);
        assert!((levels[1] - 0.125f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn smoothing_averages_across_cycles() {
        let d = SignalDescriptor::waveform(1, 2, 8000.0);
        let mut meter = LevelMeter::new("level");
        let mut ac = AcSpace::new();
        meter.prepare(&d, &mut ac).unwrap();

        let mut fragment = Fragment::for_descriptor(&d);
        fragment.as_waveform_mut().unwrap().as_mut_slice().fill(1.0);
        let config = MeterConfig { smoothing: 0.5 };
        ac.begin_cycle();
        meter.process(&config, &mut fragment, &mut ac).unwrap();
        assert!((ac.get_vector("level").unwrap()[0] - 0.5).abs() < 1e-6);
        ac.begin_cycle();
        meter.process(&config, &mut fragment, &mut ac).unwrap();
        assert!((ac.get_vector("level").unwrap()[0] - 0.75).abs() < 1e-6);
    }
}
