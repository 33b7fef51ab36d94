//! Built-in stages running inside processing chains.

use cadence_core::{
    ChainError, ChannelPolicy, Domain, Fragment, NegotiationError, ParamValue, Plugin,
    PluginInstance, ProcessingChain, SignalDescriptor, Stage, StageContract,
};
use cadence_stages::{
    AutoGain, Delay, Downmix, Gain, Identity, LevelMeter, SpectralGate, db_to_linear,
};

fn stage<P: Plugin>(name: &str, plugin: P) -> Box<dyn Stage> {
    Box::new(PluginInstance::new(name, plugin))
}

fn sine(len: usize, freq: f32, sample_rate: f32, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate).sin() * amplitude)
        .collect()
}

fn run_mono(chain: &mut ProcessingChain, input: &SignalDescriptor, signal: &[f32]) -> Vec<f32> {
    let mut produced = Vec::with_capacity(signal.len());
    let mut fragment = Fragment::for_descriptor(input);
    for block in signal.chunks_exact(input.fragment_size) {
        fragment
            .as_waveform_mut()
            .unwrap()
            .channel_mut(0)
            .copy_from_slice(block);
        let out = chain.process(&mut fragment).unwrap();
        produced.extend_from_slice(out.as_waveform().unwrap().channel(0));
    }
    produced
}

#[test]
fn meter_drives_auto_gain() {
    let agc = PluginInstance::new("agc", AutoGain)
        .with_param("target_db", ParamValue::Float(-20.0))
        .unwrap();
    let mut chain = ProcessingChain::new()
        .with_stage(stage("meter", LevelMeter::new("meter.level")))
        .unwrap()
        .with_stage(Box::new(agc))
        .unwrap();
    let input = SignalDescriptor::waveform(1, 64, 48000.0);
    chain.prepare(input).unwrap();

    // A constant 0.5 has RMS 0.5; the target is 0.1.
    let output = run_mono(&mut chain, &input, &[0.5; 256]);
    for s in output {
        assert!((s - 0.1).abs() < 1e-4, "{s}");
    }
}

#[test]
fn auto_gain_before_meter_is_a_wiring_error() {
    let mut chain = ProcessingChain::new()
        .with_stage(stage("agc", AutoGain))
        .unwrap()
        .with_stage(stage("meter", LevelMeter::new("meter.level")))
        .unwrap();
    let input = SignalDescriptor::waveform(1, 16, 48000.0);
    chain.prepare(input).unwrap();
    let mut fragment = Fragment::for_descriptor(&input);
    assert!(chain.process(&mut fragment).is_err());
}

#[test]
fn spectral_identity_round_trip() {
    let mut chain = ProcessingChain::new()
        .with_stage(stage("spectral", Identity::in_domain(Domain::Spectrum)))
        .unwrap();
    let input = SignalDescriptor::waveform(1, 128, 16000.0).with_transform(256, 512);
    chain.prepare(input).unwrap();
    let delay = chain.latency();
    assert_eq!(delay, 256 - 128 + 128);

    let signal = sine(128 * 32, 440.0, 16000.0, 0.9);
    let output = run_mono(&mut chain, &input, &signal);
    for t in delay..output.len() {
        assert!((output[t] - signal[t - delay]).abs() < 1e-4);
    }
}

#[test]
fn spectral_gate_keeps_tone_and_removes_hiss() {
    let gate = PluginInstance::new("gate", SpectralGate)
        .with_param("threshold_db", ParamValue::Float(-30.0))
        .unwrap();
    let mut chain = ProcessingChain::new().with_stage(Box::new(gate)).unwrap();
    let input = SignalDescriptor::waveform(1, 64, 16000.0).with_transform(256, 256);
    chain.prepare(input).unwrap();
    assert_eq!(chain.len(), 3);

    // A tone centred on bin 16 survives; a -80 dB tone is gated away.
    let loud = sine(64 * 40, 1000.0, 16000.0, 0.5);
    let output = run_mono(&mut chain, &input, &loud);
    let delay = chain.latency();
    let tail = &output[delay + 256..];
    let reference = &loud[256..loud.len() - delay];
    for (a, b) in tail.iter().zip(reference) {
        assert!((a - b).abs() < 1e-3);
    }

    chain.release();
    chain.prepare(input).unwrap();
    let quiet = sine(64 * 40, 1000.0, 16000.0, db_to_linear(-80.0));
    let output = run_mono(&mut chain, &input, &quiet);
    assert!(output.iter().all(|s| s.abs() < 1e-6));
}

#[test]
fn downmix_feeds_mono_only_stage() {
    let mono_only = PluginInstance::new("mono", Identity::new());
    struct MonoOnly(PluginInstance<Identity>);
    // Wrap the identity so its contract demands one channel.
    impl Stage for MonoOnly {
        fn name(&self) -> &str {
            self.0.name()
        }
        fn contract(&self) -> StageContract {
            self.0.contract().with_channels(ChannelPolicy::Exactly(1))
        }
        fn prepare(
            &mut self,
            input: &SignalDescriptor,
            ac: &mut cadence_core::AcSpace,
        ) -> Result<SignalDescriptor, ChainError> {
            self.0.prepare(input, ac)
        }
        fn process<'a>(
            &'a mut self,
            signal: &'a mut Fragment,
            ac: &mut cadence_core::AcSpace,
        ) -> Result<&'a mut Fragment, cadence_core::ProcessError> {
            self.0.process(signal, ac)
        }
        fn release(&mut self, ac: &mut cadence_core::AcSpace) {
            self.0.release(ac);
        }
    }

    let stereo = SignalDescriptor::waveform(2, 32, 48000.0);
    let mut direct = ProcessingChain::new()
        .with_stage(Box::new(MonoOnly(PluginInstance::new("mono", Identity::new()))))
        .unwrap();
    assert!(matches!(
        direct.prepare(stereo),
        Err(ChainError::Negotiation(NegotiationError::ChannelMismatch { .. }))
    ));

    let mut chain = ProcessingChain::new()
        .with_stage(stage("downmix", Downmix::new()))
        .unwrap()
        .with_stage(Box::new(MonoOnly(mono_only)))
        .unwrap();
    let output = chain.prepare(stereo).unwrap();
    assert_eq!(output.channels, 1);

    let mut fragment = Fragment::for_descriptor(&stereo);
    let w = fragment.as_waveform_mut().unwrap();
    w.channel_mut(0).fill(0.2);
    w.channel_mut(1).fill(0.4);
    let out = chain.process(&mut fragment).unwrap();
    for s in out.as_waveform().unwrap().channel(0) {
        assert!((s - 0.3).abs() < 1e-6);
    }
}

#[test]
fn gain_runs_in_spectrum_between_converters() {
    let gain = PluginInstance::new("gain", Gain)
        .with_param("gain_db", ParamValue::Float(-6.0206))
        .unwrap();
    let mut chain = ProcessingChain::new()
        .with_output_domain(Domain::Spectrum)
        .with_stage(stage("spectral", Identity::in_domain(Domain::Spectrum)))
        .unwrap()
        .with_stage(Box::new(gain))
        .unwrap();
    let input = SignalDescriptor::waveform(1, 32, 16000.0).with_transform(64, 64);
    let output = chain.prepare(input).unwrap();
    assert_eq!(output.domain, Domain::Spectrum);
    // Gain accepts both domains, so no converter follows the identity.
    assert_eq!(chain.len(), 3);
    let layout = chain.layout();
    assert_eq!(layout[2].input.domain, Domain::Spectrum);
}

#[test]
fn live_delay_change_keeps_running() {
    let mut chain = ProcessingChain::new()
        .with_stage(stage("delay", Delay::new()))
        .unwrap();
    let input = SignalDescriptor::waveform(1, 8, 8000.0);
    chain.prepare(input).unwrap();
    let control = chain.control("delay").unwrap();
    control.set("mix", ParamValue::Float(1.0)).unwrap();
    control.set("delay_ms", ParamValue::Int(2)).unwrap();

    let mut impulse = vec![0.0; 64];
    impulse[0] = 1.0;
    let output = run_mono(&mut chain, &input, &impulse);
    assert_eq!(output[16], 1.0);
    assert_eq!(output.iter().filter(|&&s| s != 0.0).count(), 1);

    assert!(control.set("delay_ms", ParamValue::Float(5000.0)).is_err());
    assert_eq!(control.get("delay_ms"), Some(ParamValue::Float(2.0)));
}
