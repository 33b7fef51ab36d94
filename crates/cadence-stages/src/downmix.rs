//! Mix all channels down to one.

use cadence_core::{
    AcSpace, ChainError, ConfigError, Fragment, ParamSet, ParamSpec, Plugin, PreparedIo,
    SignalDescriptor, StageContract, StageError,
};

/// Sums or averages every channel into a single output channel.
///
/// The mono result lives in a buffer owned by the stage, allocated at
/// prepare; the incoming fragment is left untouched.
///
/// ## Parameters
///
/// | Name | Values | Default |
/// |------|--------|---------|
/// | `mode` | `average`, `sum` | `average` |
#[derive(Debug, Default)]
pub struct Downmix {
    output: Option<Fragment>,
}

impl Downmix {
    /// Unprepared downmix.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Runtime configuration of [`Downmix`]: weight applied to every channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownmixConfig {
    /// Per-channel weight.
    pub weight: f32,
}

impl Plugin for Downmix {
    type Config = DownmixConfig;

    fn params(&self) -> Vec<ParamSpec> {
        vec![ParamSpec::choice("mode", &["average", "sum"], "average")
            .with_description("Average or plain sum of the channels")]
    }

    fn contract(&self) -> StageContract {
        StageContract::polymorphic()
    }

    fn configure(params: &ParamSet, io: &PreparedIo) -> Result<DownmixConfig, ConfigError> {
        let weight = match params.text("mode")? {
            "sum" => 1.0,
            _ => 1.0 / io.input.channels as f32,
        };
        Ok(DownmixConfig { weight })
    }

    fn prepare(
        &mut self,
        input: &SignalDescriptor,
        _ac: &mut AcSpace,
    ) -> Result<SignalDescriptor, ChainError> {
        let output = input.with_channels(1);
        self.output = Some(Fragment::for_descriptor(&output));
        Ok(output)
    }

    fn process<'a>(
        &'a mut self,
        config: &DownmixConfig,
        signal: &'a mut Fragment,
        _ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, StageError> {
        let output = self
            .output
            .as_mut()
            .ok_or_else(|| StageError::Failed("downmix is not prepared".into()))?;
        match (&*signal, &mut *output) {
            (Fragment::Waveform(input), Fragment::Waveform(mono)) => {
                let mono = mono.channel_mut(0);
                mono.fill(0.0);
                for channel in input.iter_channels() {
                    for (m, x) in mono.iter_mut().zip(channel) {
                        *m += *x * config.weight;
                    }
                }
            }
            (Fragment::Spectrum(input), Fragment::Spectrum(mono)) => {
                let mono = mono.channel_mut(0);
                mono.fill(Default::default());
                for ch in 0..input.channels() {
                    for (m, x) in mono.iter_mut().zip(input.channel(ch)) {
                        *m += *x * config.weight;
                    }
                }
            }
            (input, mono) => {
                return Err(StageError::Domain {
                    expected: mono.domain(),
                    actual: input.domain(),
                });
            }
        }
        Ok(output)
    }

    fn release(&mut self, _ac: &mut AcSpace) {
        self.output = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{ParamValue, PluginInstance, Stage};

    #[test]
    fn averages_into_own_buffer() {
        let d = SignalDescriptor::waveform(3, 2, 8000.0);
        let mut stage = PluginInstance::new("mix", Downmix::new());
        let mut ac = AcSpace::new();
        let out_desc = stage.prepare(&d, &mut ac).unwrap();
        assert_eq!(out_desc.channels, 1);

        let mut fragment = Fragment::for_descriptor(&d);
        let w = fragment.as_waveform_mut().unwrap();
        w.channel_mut(0).fill(3.0);
        w.channel_mut(1).fill(6.0);
        w.channel_mut(2).fill(0.0);
        let out = stage.process(&mut fragment, &mut ac).unwrap();
        assert_eq!(out.as_waveform().unwrap().channel(0), &[3.0, 3.0]);
        assert_eq!(out.channels(), 1);
    }

    #[test]
    fn sum_mode() {
        let d = SignalDescriptor::waveform(2, 2, 8000.0);
        let mut stage = PluginInstance::new("mix", Downmix::new())
            .with_param("mode", ParamValue::Text("sum".into()))
            .unwrap();
        let mut ac = AcSpace::new();
        stage.prepare(&d, &mut ac).unwrap();

        let mut fragment = Fragment::for_descriptor(&d);
        fragment.as_waveform_mut().unwrap().as_mut_slice().fill(0.25);
        let out = stage.process(&mut fragment, &mut ac).unwrap();
        assert_eq!(out.as_waveform().unwrap().channel(0), &[0.5, 0.5]);
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let result = PluginInstance::new("mix", Downmix::new())
            .with_param("mode", ParamValue::Text("median".into()));
        assert!(matches!(result, Err(ConfigError::InvalidChoice { .. })));
    }
}
