//! Per-bin noise gate in the spectrum domain.

use cadence_core::{
    AcSpace, ChainError, ConfigError, Domain, Fragment, ParamSet, ParamSpec, Plugin, PreparedIo,
    SignalDescriptor, StageContract, StageError,
};

use crate::math::db_to_linear;

/// Attenuates every bin whose magnitude falls below a threshold.
///
/// Works on spectra only, so the chain inserts analysis and synthesis
/// converters around it. The threshold is relative to the magnitude a
/// full-scale sinusoid reaches under a window of the prepared length.
///
/// ## Parameters
///
/// | Name | Range | Default |
/// |------|-------|---------|
/// | `threshold_db` | -120.0–0.0 dB | -60.0 |
/// | `floor_db` | -120.0–0.0 dB | -120.0 |
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralGate;

/// Runtime configuration of [`SpectralGate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralGateConfig {
    /// Bin magnitude below which the floor gain applies.
    pub threshold: f32,
    /// Gain applied to gated bins.
    pub floor: f32,
}

impl Plugin for SpectralGate {
    type Config = SpectralGateConfig;

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::gain_db("threshold_db", -120.0, 0.0, -60.0)
                .with_description("Gate threshold relative to full scale"),
            ParamSpec::gain_db("floor_db", -120.0, 0.0, -120.0)
                .with_description("Attenuation of gated bins"),
        ]
    }

    fn contract(&self) -> StageContract {
        StageContract::in_domain(Domain::Spectrum)
    }

    fn configure(params: &ParamSet, io: &PreparedIo) -> Result<SpectralGateConfig, ConfigError> {
        let full_scale = io.input.window_length as f32 / 2.0;
        Ok(SpectralGateConfig {
            threshold: db_to_linear(params.float("threshold_db")?) * full_scale,
            floor: db_to_linear(params.float("floor_db")?),
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
        config: &SpectralGateConfig,
        signal: &'a mut Fragment,
        _ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, StageError> {
        let actual = signal.domain();
        let spectrum = signal.as_spectrum_mut().ok_or(StageError::Domain {
            expected: Domain::Spectrum,
            actual,
        })?;
        for bin in spectrum.as_mut_slice() {
            if bin.norm() < config.threshold {
                *bin *= config.floor;
            }
        }
        Ok(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadence_core::Complex32;

    #[test]
    fn quiet_bins_are_attenuated() {
        let d = SignalDescriptor::waveform(1, 4, 8000.0)
            .with_transform(8, 8)
            .with_domain(Domain::Spectrum);
        let io = PreparedIo { input: d, output: d };
        let params = ParamSet::from_specs("gate", SpectralGate.params());
        let config = SpectralGate::configure(&params, &io).unwrap();
        assert!((config.threshold - 0.004).abs() < 1e-6);

        let mut fragment = Fragment::for_descriptor(&d);
        let bins = fragment.as_spectrum_mut().unwrap().channel_mut(0);
        bins[0] = Complex32::new(1.0, 0.0);
        bins[1] = Complex32::new(0.001, 0.0);

        let mut ac = AcSpace::new();
        let mut gate = SpectralGate;
        let out = gate.process(&config, &mut fragment, &mut ac).unwrap();
        let bins = out.as_spectrum().unwrap().channel(0);
        assert_eq!(bins[0], Complex32::new(1.0, 0.0));
        assert!(bins[1].norm() < 1e-8);
    }
}
