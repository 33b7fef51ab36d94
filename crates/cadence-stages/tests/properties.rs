//! Property-based tests for the built-in stages.

use proptest::prelude::*;
use cadence_core::{AcSpace, Fragment, ParamValue, PluginInstance, SignalDescriptor, Stage};
use cadence_stages::{Delay, Downmix, Gain, db_to_linear};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Gain scales every sample by the configured factor, in place.
    #[test]
    fn gain_scales_samples(
        gain_db in -60.0f32..24.0,
        input in prop::collection::vec(-1.0f32..=1.0, 32),
    ) {
        let d = SignalDescriptor::waveform(2, 16, 48000.0);
        let mut stage = PluginInstance::new("gain", Gain)
            .with_param("gain_db", ParamValue::Float(gain_db))
            .unwrap();
        let mut ac = AcSpace::new();
        stage.prepare(&d, &mut ac).unwrap();

        let mut fragment = Fragment::for_descriptor(&d);
        fragment.as_waveform_mut().unwrap().as_mut_slice().copy_from_slice(&input);
        let factor = db_to_linear(gain_db);
        let out = stage.process(&mut fragment, &mut ac).unwrap();
        for (o, i) in out.as_waveform().unwrap().as_slice().iter().zip(&input) {
            prop_assert!((o - i * factor).abs() <= 1e-5 * factor.max(1.0));
        }
    }

    /// An impulse reappears exactly `delay` frames later, whatever the
    /// fragment size.
    #[test]
    fn delay_moves_impulse(delay_frames in 1usize..200, fragment_size in 1usize..64) {
        let sample_rate = 1000.0;
        let d = SignalDescriptor::waveform(1, fragment_size, sample_rate);
        let mut stage = PluginInstance::new("delay", Delay::new())
            .with_param("delay_ms", ParamValue::Float(delay_frames as f32))
            .unwrap()
            .with_param("mix", ParamValue::Float(1.0))
            .unwrap();
        let mut ac = AcSpace::new();
        stage.prepare(&d, &mut ac).unwrap();

        let mut produced = Vec::new();
        let mut fragment = Fragment::for_descriptor(&d);
        let cycles = (delay_frames + fragment_size) / fragment_size + 1;
        for cycle in 0..cycles {
            let w = fragment.as_waveform_mut().unwrap();
            w.as_mut_slice().fill(0.0);
            if cycle == 0 {
                w.channel_mut(0)[0] = 1.0;
            }
            let out = stage.process(&mut fragment, &mut ac).unwrap();
            produced.extend_from_slice(out.as_waveform().unwrap().channel(0));
        }
        for (t, &s) in produced.iter().enumerate() {
            let expected = if t == delay_frames { 1.0 } else { 0.0 };
            prop_assert_eq!(s, expected, "t={}", t);
        }
    }

    /// Averaging downmix of identical channels reproduces the channel.
    #[test]
    fn downmix_of_copies_is_identity(
        channels in 1usize..8,
        input in prop::collection::vec(-1.0f32..=1.0, 16),
    ) {
        let d = SignalDescriptor::waveform(channels, 16, 48000.0);
        let mut stage = PluginInstance::new("mix", Downmix::new());
        let mut ac = AcSpace::new();
        stage.prepare(&d, &mut ac).unwrap();

        let mut fragment = Fragment::for_descriptor(&d);
        for ch in fragment.as_waveform_mut().unwrap().iter_channels_mut() {
            ch.copy_from_slice(&input);
        }
        let out = stage.process(&mut fragment, &mut ac).unwrap();
        for (o, i) in out.as_waveform().unwrap().channel(0).iter().zip(&input) {
            prop_assert!((o - i).abs() <= 1e-5);
        }
    }
}
