//! Static gain in decibels, in either domain.

use cadence_core::{
    AcSpace, ChainError, ConfigError, Fragment, ParamSet, ParamSpec, Plugin, PreparedIo,
    SignalDescriptor, StageContract, StageError,
};

use crate::math::db_to_linear;

/// Multiplies every sample (or bin) by a fixed gain.
///
/// ## Parameters
///
/// | Name | Range | Default |
/// |------|-------|---------|
/// | `gain_db` | -60.0–24.0 dB | 0.0 |
/// | `mute` | bool | false |
#[derive(Debug, Clone, Copy, Default)]
pub struct Gain;

/// Runtime configuration of [`Gain`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainConfig {
    /// Linear factor applied to the signal.
    pub linear: f32,
}

impl Plugin for Gain {
    type Config = GainConfig;

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::gain_db("gain_db", -60.0, 24.0, 0.0)
                .with_description("Gain applied to the signal"),
            ParamSpec::boolean("mute", false).with_description("Silence the output"),
        ]
    }

    fn contract(&self) -> StageContract {
        StageContract::polymorphic()
    }

    fn configure(params: &ParamSet, _io: &PreparedIo) -> Result<GainConfig, ConfigError> {
        let linear = if params.boolean("mute")? {
            0.0
        } else {
            db_to_linear(params.float("gain_db")?)
        };
        Ok(GainConfig { linear })
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
        config: &GainConfig,
        signal: &'a mut Fragment,
        _ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, StageError> {
        scale(signal, config.linear);
        Ok(signal)
    }
}

/// Multiply a fragment by `factor` in place.
pub(crate) fn scale(signal: &mut Fragment, factor: f32) {
    match signal {
        Fragment::Waveform(w) => w.as_mut_slice().iter_mut().for_each(|s| *s *= factor),
        Fragment::Spectrum(s) => s.as_mut_slice().iter_mut().for_each(|b| *b *= factor),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::{Domain, ParamValue, PluginInstance, Stage};

    fn descriptor() -> SignalDescriptor {
        SignalDescriptor::waveform(2, 4, 48000.0).with_transform(8, 8)
    }

    #[test]
    fn waveform_gain() {
        let mut stage = PluginInstance::new("gain", Gain)
            .with_param("gain_db", ParamValue::Float(-6.0206))
            .unwrap();
        let mut ac = AcSpace::new();
        stage.prepare(&descriptor(), &mut ac).unwrap();

        let mut fragment = Fragment::for_descriptor(&descriptor());
        fragment.as_waveform_mut().unwrap().as_mut_slice().fill(1.0);
        let out = stage.process(&mut fragment, &mut ac).unwrap();
        for s in out.as_waveform().unwrap().as_slice() {
            assert!((s - 0.5).abs() < 1e-4);
        }
    }

    #[test]
    fn spectrum_gain_and_mute() {
        let d = descriptor().with_domain(Domain::Spectrum);
        let mut stage = PluginInstance::new("gain", Gain);
        let control = stage.control().unwrap();
        let mut ac = AcSpace::new();
        stage.prepare(&d, &mut ac).unwrap();

        let mut fragment = Fragment::for_descriptor(&d);
        for b in fragment.as_spectrum_mut().unwrap().as_mut_slice() {
            *b = cadence_core::Complex32::new(1.0, -1.0);
        }
        let out = stage.process(&mut fragment, &mut ac).unwrap();
        assert_eq!(
            out.as_spectrum().unwrap().channel(1)[0],
            cadence_core::Complex32::new(1.0, -1.0)
        );

        control.set("mute", ParamValue::Bool(true)).unwrap();
        let out = stage.process(&mut fragment, &mut ac).unwrap();
        assert!(out.as_spectrum().unwrap().as_slice().iter().all(|b| b.norm() == 0.0));
    }
}
