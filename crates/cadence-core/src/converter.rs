//! Domain converters: short-time analysis and overlap-add synthesis.
//!
//! The chain inserts an [`AnalysisConverter`] wherever a waveform meets a
//! spectrum-only stage and a [`SynthesisConverter`] for the opposite case.
//!
//! Geometry, with hop `R` (the fragment size), window length `M` and
//! transform length `N`, `R <= M <= N`:
//!
//! ```text
//! analysis:   history[M] <- shift left by R, append fragment
//!             frame[N]    = [ 0; pad | history · w^e | 0; N - M - pad ]
//!             bins        = FFT(frame)[0 ..= N/2]
//! synthesis:  frame[N]    = IFFT(bins) · w^(1-e) / C
//!             overlap[N] <- shift left by R, zero tail, add frame
//!             fragment    = overlap[0..R]
//! ```
//!
//! `C` is the constant overlap-add sum of the combined window at hop `R`;
//! preparation fails when that sum is not constant. With unmodified bins the
//! pair reproduces its input delayed by `M - R + pad` frames.

use crate::ac::AcSpace;
use crate::descriptor::{Domain, SignalDescriptor};
use crate::error::{ChainError, NegotiationError, ProcessError, StageError};
use crate::fragment::{Fragment, FragmentShape};
use crate::stage::{ChannelPolicy, DomainSet, OutputDomain, Stage, StageContract};
use crate::transform::{SpectralTransform, TransformFactory, rustfft_factory};
use crate::window::{WindowKind, cola_gain};

/// Largest relative ripple of the overlap-add sum still accepted as constant.
pub const COLA_TOLERANCE: f32 = 1e-3;

/// Window settings shared by all converters of a chain.
///
/// Window and transform lengths come from the signal descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StftSettings {
    /// Window function.
    pub window: WindowKind,
    /// Fraction of the zero padding placed before the window, `0..=1`.
    pub window_position: f32,
    /// Analysis window exponent `e`; synthesis uses `1 - e`.
    pub window_exponent: f32,
}

impl Default for StftSettings {
    fn default() -> Self {
        Self {
            window: WindowKind::Hann,
            window_position: 0.5,
            window_exponent: 1.0,
        }
    }
}

impl StftSettings {
    /// Settings with the given window and default placement.
    pub fn with_window(window: WindowKind) -> Self {
        Self {
            window,
            ..Self::default()
        }
    }

    /// Derive the full geometry for `descriptor`.
    pub fn layout(&self, descriptor: &SignalDescriptor) -> Result<StftLayout, NegotiationError> {
        let hop = descriptor.fragment_size;
        let m = descriptor.window_length;
        let n = descriptor.transform_length;

        if m == 0 || n == 0 {
            return Err(NegotiationError::invalid_stft(
                "window length and transform length must be set for domain conversion",
            ));
        }
        if hop == 0 || hop > m || m > n {
            return Err(NegotiationError::invalid_stft(format!(
                "need fragment size <= window length <= transform length, got {hop}, {m}, {n}"
            )));
        }
        if !(0.0..=1.0).contains(&self.window_position) {
            return Err(NegotiationError::invalid_stft(format!(
                "window position {} outside [0, 1]",
                self.window_position
            )));
        }
        let e = self.window_exponent;
        if !e.is_finite() || e < 0.0 {
            return Err(NegotiationError::invalid_stft(format!(
                "window exponent {e} must be finite and non-negative"
            )));
        }
        if e != 1.0 && n != m {
            return Err(NegotiationError::invalid_stft(format!(
                "window exponent {e} requires transform length == window length (got {n} != {m})"
            )));
        }

        let pad_before = (self.window_position * (n - m) as f32).floor() as usize;
        let base = self.window.coefficients(m);
        let analysis: Vec<f32> = base.iter().map(|w| w.max(0.0).powf(e)).collect();
        let mut synthesis = if n == m {
            base.iter().map(|w| w.max(0.0).powf(1.0 - e)).collect()
        } else {
            vec![1.0; n]
        };

        let combined: Vec<f32> = analysis
            .iter()
            .enumerate()
            .map(|(j, a)| a * synthesis[pad_before + j])
            .collect();
        let (gain, ripple) = cola_gain(&combined, hop);
        if ripple.is_nan() || ripple > COLA_TOLERANCE {
            return Err(NegotiationError::ColaViolated {
                window: self.window.name(),
                window_length: m,
                hop,
                ripple,
            });
        }
        for s in &mut synthesis {
            *s /= gain;
        }

        Ok(StftLayout {
            hop,
            window_length: m,
            transform_length: n,
            pad_before,
            analysis,
            synthesis,
        })
    }
}

/// Fully derived converter geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct StftLayout {
    /// Hop size `R`.
    pub hop: usize,
    /// Window length `M`.
    pub window_length: usize,
    /// Transform length `N`.
    pub transform_length: usize,
    /// Zeros before the window inside the transform frame.
    pub pad_before: usize,
    /// Analysis window, length `M`.
    pub analysis: Vec<f32>,
    /// Normalised synthesis window, length `N`.
    pub synthesis: Vec<f32>,
}

impl StftLayout {
    /// Delay of an analysis/synthesis pair, in frames.
    pub fn latency(&self) -> usize {
        self.window_length - self.hop + self.pad_before
    }
}

fn domain_error(stage: &str, expected: Domain, actual: Domain) -> ProcessError {
    ProcessError::Stage {
        stage: stage.to_string(),
        source: StageError::Domain { expected, actual },
    }
}

fn check_shape(
    stage: &str,
    expected: FragmentShape,
    signal: &Fragment,
) -> Result<(), ProcessError> {
    let actual = signal.shape();
    if actual != expected {
        return Err(ProcessError::StageFragment {
            stage: stage.to_string(),
            expected,
            actual,
        });
    }
    Ok(())
}

struct AnalysisState {
    layout: StftLayout,
    input: FragmentShape,
    history: Vec<f32>,
    frame: Vec<f32>,
    transform: Box<dyn SpectralTransform>,
    output: Fragment,
}

/// Waveform to spectrum.
pub struct AnalysisConverter {
    name: String,
    settings: StftSettings,
    factory: TransformFactory,
    state: Option<AnalysisState>,
}

impl AnalysisConverter {
    /// Converter using the `rustfft` transform.
    pub fn new(name: impl Into<String>, settings: StftSettings) -> Self {
        Self::with_transform(name, settings, rustfft_factory)
    }

    /// Converter using a custom transform.
    pub fn with_transform(
        name: impl Into<String>,
        settings: StftSettings,
        factory: TransformFactory,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            factory,
            state: None,
        }
    }
}

impl Stage for AnalysisConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn contract(&self) -> StageContract {
        StageContract {
            input: DomainSet::Waveform,
            output: OutputDomain::Fixed(Domain::Spectrum),
            channels: ChannelPolicy::Transparent,
        }
    }

    fn prepare(
        &mut self,
        input: &SignalDescriptor,
        _ac: &mut AcSpace,
    ) -> Result<SignalDescriptor, ChainError> {
        let layout = self.settings.layout(input)?;
        let output = input.with_domain(Domain::Spectrum);
        self.state = Some(AnalysisState {
            input: FragmentShape::of(input),
            history: vec![0.0; input.channels * layout.window_length],
            frame: vec![0.0; layout.transform_length],
            transform: (self.factory)(layout.transform_length),
            output: Fragment::for_descriptor(&output),
            layout,
        });
        Ok(output)
    }

    fn process<'a>(
        &'a mut self,
        signal: &'a mut Fragment,
        _ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, ProcessError> {
        let state = self.state.as_mut().ok_or(ProcessError::NotPrepared)?;
        let Some(input) = signal.as_waveform() else {
            return Err(domain_error(&self.name, Domain::Waveform, signal.domain()));
        };
        check_shape(&self.name, state.input, signal)?;
        let Fragment::Spectrum(output) = &mut state.output else {
            return Err(ProcessError::NotPrepared);
        };

        let m = state.layout.window_length;
        let hop = state.layout.hop;
        let pad = state.layout.pad_before;
        for ch in 0..input.channels() {
            let history = &mut state.history[ch * m..(ch + 1) * m];
            history.copy_within(hop.., 0);
            history[m - hop..].copy_from_slice(input.channel(ch));

            state.frame.fill(0.0);
            for ((dst, x), w) in state.frame[pad..pad + m]
                .iter_mut()
                .zip(history.iter())
                .zip(&state.layout.analysis)
            {
                *dst = x * w;
            }
            state.transform.forward(&state.frame, output.channel_mut(ch));
        }
        Ok(&mut state.output)
    }

    fn release(&mut self, _ac: &mut AcSpace) {
        self.state = None;
    }
}

struct SynthesisState {
    layout: StftLayout,
    input: FragmentShape,
    overlap: Vec<f32>,
    frame: Vec<f32>,
    transform: Box<dyn SpectralTransform>,
    output: Fragment,
}

/// Spectrum to waveform, with overlap-add.
pub struct SynthesisConverter {
    name: String,
    settings: StftSettings,
    factory: TransformFactory,
    state: Option<SynthesisState>,
}

impl SynthesisConverter {
    /// Converter using the `rustfft` transform.
    pub fn new(name: impl Into<String>, settings: StftSettings) -> Self {
        Self::with_transform(name, settings, rustfft_factory)
    }

    /// Converter using a custom transform.
    pub fn with_transform(
        name: impl Into<String>,
        settings: StftSettings,
        factory: TransformFactory,
    ) -> Self {
        Self {
            name: name.into(),
            settings,
            factory,
            state: None,
        }
    }
}

impl Stage for SynthesisConverter {
    fn name(&self) -> &str {
        &self.name
    }

    fn contract(&self) -> StageContract {
        StageContract {
            input: DomainSet::Spectrum,
            output: OutputDomain::Fixed(Domain::Waveform),
            channels: ChannelPolicy::Transparent,
        }
    }

    fn prepare(
        &mut self,
        input: &SignalDescriptor,
        _ac: &mut AcSpace,
    ) -> Result<SignalDescriptor, ChainError> {
        let layout = self.settings.layout(input)?;
        let output = input.with_domain(Domain::Waveform);
        self.state = Some(SynthesisState {
            input: FragmentShape::of(input),
            overlap: vec![0.0; input.channels * layout.transform_length],
            frame: vec![0.0; layout.transform_length],
            transform: (self.factory)(layout.transform_length),
            output: Fragment::for_descriptor(&output),
            layout,
        });
        Ok(output)
    }

    fn process<'a>(
        &'a mut self,
        signal: &'a mut Fragment,
        _ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, ProcessError> {
        let state = self.state.as_mut().ok_or(ProcessError::NotPrepared)?;
        let Some(input) = signal.as_spectrum() else {
            return Err(domain_error(&self.name, Domain::Spectrum, signal.domain()));
        };
        check_shape(&self.name, state.input, signal)?;
        let Fragment::Waveform(output) = &mut state.output else {
            return Err(ProcessError::NotPrepared);
        };

        let n = state.layout.transform_length;
        let hop = state.layout.hop;
        for ch in 0..input.channels() {
            state.transform.inverse(input.channel(ch), &mut state.frame);

            let overlap = &mut state.overlap[ch * n..(ch + 1) * n];
            overlap.copy_within(hop.., 0);
            overlap[n - hop..].fill(0.0);
            for ((acc, x), w) in overlap
                .iter_mut()
                .zip(&state.frame)
                .zip(&state.layout.synthesis)
            {
                *acc += x * w;
            }
            output.channel_mut(ch).copy_from_slice(&overlap[..hop]);
        }
        Ok(&mut state.output)
    }

    fn release(&mut self, _ac: &mut AcSpace) {
        self.state = None;
    }

    fn latency(&self) -> usize {
        self.state.as_ref().map_or(0, |s| s.layout.latency())
    }
}
