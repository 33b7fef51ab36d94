//! Feedback delay line on waveform fragments.

use cadence_core::{
    AcSpace, ChainError, ConfigError, Domain, Fragment, ParamSet, ParamSpec, ParamUnit, Plugin,
    PreparedIo, SignalDescriptor, StageContract, StageError,
};

use crate::math::flush_denormal;

/// Longest supported delay.
pub const MAX_DELAY_MS: f32 = 2000.0;

/// Per-channel feedback delay.
///
/// The ring buffers are sized for [`MAX_DELAY_MS`] at prepare time, so delay
/// changes never reallocate.
///
/// ## Parameters
///
/// | Name | Range | Default |
/// |------|-------|---------|
/// | `delay_ms` | 0.0–2000.0 ms | 300.0 |
/// | `feedback` | 0.0–0.95 | 0.0 |
/// | `mix` | 0.0–1.0 | 0.5 |
#[derive(Debug, Default)]
pub struct Delay {
    lines: Vec<f32>,
    capacity: usize,
    write: usize,
}

/// Runtime configuration of [`Delay`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DelayConfig {
    /// Delay in frames.
    pub frames: usize,
    /// Feedback gain.
    pub feedback: f32,
    /// Wet/dry mix.
    pub mix: f32,
}

impl Delay {
    /// Unprepared delay.
    pub fn new() -> Self {
        Self::default()
    }

    fn capacity_for(sample_rate: f32) -> usize {
        (MAX_DELAY_MS / 1000.0 * sample_rate).ceil() as usize + 1
    }
}

impl Plugin for Delay {
    type Config = DelayConfig;

    fn params(&self) -> Vec<ParamSpec> {
        vec![
            ParamSpec::float("delay_ms", 0.0, MAX_DELAY_MS, 300.0)
                .with_unit(ParamUnit::Milliseconds)
                .with_description("Delay time"),
            ParamSpec::float("feedback", 0.0, 0.95, 0.0).with_description("Feedback amount"),
            ParamSpec::float("mix", 0.0, 1.0, 0.5).with_description("Wet/dry mix"),
        ]
    }

    fn contract(&self) -> StageContract {
        StageContract::in_domain(Domain::Waveform)
    }

    fn configure(params: &ParamSet, io: &PreparedIo) -> Result<DelayConfig, ConfigError> {
        let delay_ms = params.float("delay_ms")?;
        let frames = (delay_ms / 1000.0 * io.input.sample_rate).round() as usize;
        Ok(DelayConfig {
            frames: frames.min(Self::capacity_for(io.input.sample_rate) - 1),
            feedback: params.float("feedback")?,
            mix: params.float("mix")?,
        })
    }

    fn prepare(
        &mut self,
        input: &SignalDescriptor,
        _ac: &mut AcSpace,
    ) -> Result<SignalDescriptor, ChainError> {
        self.capacity = Self::capacity_for(input.sample_rate);
        self.lines = vec![0.0; self.capacity * input.channels];
        self.write = 0;
        Ok(*input)
    }

    fn process<'a>(
        &'a mut self,
        config: &DelayConfig,
        signal: &'a mut Fragment,
        _ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, StageError> {
        let actual = signal.domain();
        let waveform = signal.as_waveform_mut().ok_or(StageError::Domain {
            expected: Domain::Waveform,
            actual,
        })?;

        let cap = self.capacity;
        let start = self.write;
        for (ch, samples) in waveform.iter_channels_mut().enumerate() {
            let line = &mut self.lines[ch * cap..(ch + 1) * cap];
            let mut pos = start;
            for x in samples.iter_mut() {
                let delayed = if config.frames == 0 {
                    *x
                } else {
                    line[(pos + cap - config.frames) % cap]
                };
                line[pos] = flush_denormal(*x + delayed * config.feedback);
                *x = *x * (1.0 - config.mix) + delayed * config.mix;
                pos = (pos + 1) % cap;
            }
        }
        self.write = (start + waveform.frames()) % cap;
        Ok(signal)
    }

    fn release(&mut self, _ac: &mut AcSpace) {
        self.lines = Vec::new();
        self.capacity = 0;
        self.write = 0;
    }
}
