//! Processing chain: negotiation at prepare time, dispatch at process time.
//!
//! [`ProcessingChain`] owns an ordered list of stages. `prepare` walks them in
//! order and negotiates the signal descriptor at every boundary, inserting
//! domain converters where a stage does not accept the incoming domain and
//! appending one at the end when the output domain differs from the
//! requested one. `process` then pushes one fragment through every stage,
//! synchronously and without allocating.
//!
//! # State machine
//!
//! ```text
//!             prepare               release
//! Unprepared ─────────▶ Prepared ─────────────▶ Released
//!     ▲                    │ process error         │
//!     │ prepare fails      ▼                       │ prepare
//!     └──────────────── Failed ── release ─▶ Released ◀┘
//! ```
//!
//! A failed `prepare` releases every stage it already prepared, removes the
//! converters it inserted and leaves the chain `Unprepared`. A processing
//! error moves the chain to `Failed`; it refuses to process until released.
//!
//! The chain is prepared on the control thread, moved to the audio thread for
//! processing and moved back to be released. Parameter changes travel
//! through the [`StageControl`] handles, collected with
//! [`controls`](ProcessingChain::controls) before the move.

use core::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::ac::AcSpace;
use crate::converter::{AnalysisConverter, StftSettings, SynthesisConverter};
use crate::descriptor::{Domain, SignalDescriptor};
use crate::error::{ChainError, NegotiationError, ProcessError};
use crate::fragment::{Fragment, FragmentShape};
use crate::plugin::StageControl;
use crate::stage::{ChannelPolicy, Stage};
use crate::transform::{TransformFactory, rustfft_factory};

/// Lifecycle state of a [`ProcessingChain`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainState {
    /// Not prepared yet, or the last prepare failed.
    Unprepared,
    /// Ready to process.
    Prepared,
    /// A processing error occurred; must be released.
    Failed,
    /// Released; may be prepared again.
    Released,
}

impl fmt::Display for ChainState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChainState::Unprepared => "unprepared",
            ChainState::Prepared => "prepared",
            ChainState::Failed => "failed",
            ChainState::Released => "released",
        };
        f.write_str(name)
    }
}

/// Timing of one stage, collected when profiling is enabled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StageProfile {
    /// Time spent in `prepare`.
    pub prepare: Duration,
    /// Accumulated time spent in `process`.
    pub process: Duration,
    /// Number of `process` calls measured.
    pub calls: u64,
}

impl StageProfile {
    /// Mean processing time relative to the real-time budget of one
    /// fragment, in percent.
    pub fn load_percent(&self, fragment_seconds: f64) -> f64 {
        if self.calls == 0 || fragment_seconds <= 0.0 {
            return 0.0;
        }
        let mean = self.process.as_secs_f64() / self.calls as f64;
        100.0 * mean / fragment_seconds
    }
}

/// One negotiated boundary of a prepared chain.
#[derive(Debug, Clone, PartialEq)]
pub struct StageLayout {
    /// Stage instance name.
    pub name: String,
    /// True for converters inserted by the chain.
    pub injected: bool,
    /// Descriptor the stage receives.
    pub input: SignalDescriptor,
    /// Descriptor the stage produces.
    pub output: SignalDescriptor,
    /// Algorithmic delay contributed by the stage.
    pub latency: usize,
    /// Timing, if profiling is enabled.
    pub profile: Option<StageProfile>,
}

struct ChainEntry {
    stage: Box<dyn Stage>,
    name: String,
    injected: bool,
    prepared: bool,
    io: Option<(SignalDescriptor, SignalDescriptor)>,
    /// Shape of the fragment the stage returns.
    shape: Option<FragmentShape>,
    profile: StageProfile,
}

impl ChainEntry {
    fn new(stage: Box<dyn Stage>, injected: bool) -> Self {
        Self {
            name: stage.name().to_string(),
            stage,
            injected,
            prepared: false,
            io: None,
            shape: None,
            profile: StageProfile::default(),
        }
    }
}

/// An ordered sequence of stages with negotiated descriptors.
///
/// ```rust
/// use cadence_core::{Domain, ProcessingChain, SignalDescriptor};
///
/// let mut chain = ProcessingChain::new();
/// let input = SignalDescriptor::waveform(2, 64, 48000.0);
/// let output = chain.prepare(input).unwrap();
/// assert_eq!(output, input);
/// assert_eq!(output.domain, Domain::Waveform);
/// ```
pub struct ProcessingChain {
    entries: Vec<ChainEntry>,
    state: ChainState,
    ac: AcSpace,
    stft: StftSettings,
    transform: TransformFactory,
    output_domain: Option<Domain>,
    profiling: bool,
    input: Option<SignalDescriptor>,
    output: Option<SignalDescriptor>,
}

impl ProcessingChain {
    /// Empty chain with default STFT settings and the `rustfft` transform.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            state: ChainState::Unprepared,
            ac: AcSpace::new(),
            stft: StftSettings::default(),
            transform: rustfft_factory,
            output_domain: None,
            profiling: false,
            input: None,
            output: None,
        }
    }

    /// Window settings for inserted converters.
    pub fn with_stft(mut self, settings: StftSettings) -> Self {
        self.stft = settings;
        self
    }

    /// Transform used by inserted converters.
    pub fn with_transform(mut self, factory: TransformFactory) -> Self {
        self.transform = factory;
        self
    }

    /// Domain of the chain output; defaults to the input domain.
    pub fn with_output_domain(mut self, domain: Domain) -> Self {
        self.output_domain = Some(domain);
        self
    }

    /// Collect per-stage timing.
    pub fn with_profiling(mut self, enabled: bool) -> Self {
        self.profiling = enabled;
        self
    }

    /// Append a stage, builder style.
    pub fn with_stage(mut self, stage: Box<dyn Stage>) -> Result<Self, ChainError> {
        self.push(stage)?;
        Ok(self)
    }

    /// Append a stage. Only legal while not prepared.
    pub fn push(&mut self, stage: Box<dyn Stage>) -> Result<(), ChainError> {
        if !self.can_prepare() {
            return Err(ChainError::InvalidState {
                operation: "add a stage to",
                state: self.state,
            });
        }
        if self.entries.iter().any(|e| e.stage.name() == stage.name()) {
            return Err(ChainError::DuplicateStage {
                name: stage.name().to_string(),
            });
        }
        self.entries.push(ChainEntry::new(stage, false));
        Ok(())
    }

    /// Current state.
    pub fn state(&self) -> ChainState {
        self.state
    }

    /// Number of stages, including inserted converters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stage names in processing order.
    pub fn stage_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.stage.name())
    }

    /// Prepared input descriptor.
    pub fn input_descriptor(&self) -> Option<SignalDescriptor> {
        self.input
    }

    /// Prepared output descriptor.
    pub fn output_descriptor(&self) -> Option<SignalDescriptor> {
        self.output
    }

    /// The chain's AC space.
    pub fn ac(&self) -> &AcSpace {
        &self.ac
    }

    fn can_prepare(&self) -> bool {
        matches!(self.state, ChainState::Unprepared | ChainState::Released)
    }

    fn converter(&self, from: Domain, position: usize) -> Box<dyn Stage> {
        match from {
            Domain::Waveform => Box::new(AnalysisConverter::with_transform(
                format!("<analysis:{position}>"),
                self.stft,
                self.transform,
            )),
            Domain::Spectrum => Box::new(SynthesisConverter::with_transform(
                format!("<synthesis:{position}>"),
                self.stft,
                self.transform,
            )),
        }
    }

    /// Negotiate descriptors and prepare every stage.
    ///
    /// Returns the chain's output descriptor.
    pub fn prepare(&mut self, input: SignalDescriptor) -> Result<SignalDescriptor, ChainError> {
        if !self.can_prepare() {
            return Err(ChainError::InvalidState {
                operation: "prepare",
                state: self.state,
            });
        }

        match self.negotiate(input) {
            Ok(output) => {
                self.input = Some(input);
                self.output = Some(output);
                self.state = ChainState::Prepared;

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    stages = self.entries.len(),
                    latency = self.latency(),
                    "chain_prepare: {input} -> {output}"
                );
                Ok(output)
            }
            Err(err) => {
                self.rollback();
                self.state = ChainState::Unprepared;

                #[cfg(feature = "tracing")]
                tracing::debug!(%err, "chain_prepare: failed");
                Err(err)
            }
        }
    }

    fn negotiate(&mut self, input: SignalDescriptor) -> Result<SignalDescriptor, ChainError> {
        input.validate()?;
        self.ac.clear();

        let mut current = input;
        let mut i = 0;
        while i < self.entries.len() {
            let contract = self.entries[i].stage.contract();
            if !contract.input.contains(current.domain) {
                let converted = current.domain.opposite();
                if self.entries[i].injected || !contract.input.contains(converted) {
                    return Err(NegotiationError::UnsupportedDomain {
                        stage: self.entries[i].stage.name().to_string(),
                        domain: current.domain,
                    }
                    .into());
                }

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    "chain_prepare: {} converter before '{}'",
                    current.domain,
                    self.entries[i].stage.name()
                );
                let converter = self.converter(current.domain, i);
                self.entries.insert(i, ChainEntry::new(converter, true));
                continue;
            }

            current = self.prepare_entry(i, current)?;
            i += 1;
        }

        let wanted = self.output_domain.unwrap_or(input.domain);
        if current.domain != wanted {
            let converter = self.converter(current.domain, i);
            self.entries.push(ChainEntry::new(converter, true));
            current = self.prepare_entry(i, current)?;
        }
        Ok(current)
    }

    fn prepare_entry(
        &mut self,
        i: usize,
        input: SignalDescriptor,
    ) -> Result<SignalDescriptor, ChainError> {
        let entry = &mut self.entries[i];
        let name = entry.stage.name();
        let contract = entry.stage.contract();

        if let ChannelPolicy::Exactly(expected) = contract.channels {
            if expected != input.channels {
                return Err(NegotiationError::ChannelMismatch {
                    stage: name.to_string(),
                    expected,
                    actual: input.channels,
                }
                .into());
            }
        }

        self.ac.register_stage(i, name);
        self.ac.enter(i);
        let started = Instant::now();
        let output = entry.stage.prepare(&input, &mut self.ac)?;
        entry.prepared = true;
        entry.profile = StageProfile {
            prepare: started.elapsed(),
            ..StageProfile::default()
        };

        let name = entry.stage.name();
        let declared = contract.output.resolve(input.domain);
        if output.domain != declared {
            return Err(NegotiationError::OutputDomain {
                stage: name.to_string(),
                declared,
                actual: output.domain,
            }
            .into());
        }
        let normalized = output
            .with_domain(input.domain)
            .with_channels(input.channels);
        if let Some((field, expected, actual)) = input.difference(&normalized) {
            return Err(NegotiationError::ShapeChanged {
                stage: name.to_string(),
                field,
                expected,
                actual,
            }
            .into());
        }
        output.validate()?;

        entry.io = Some((input, output));
        entry.shape = Some(FragmentShape::of(&output));
        Ok(output)
    }

    fn rollback(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            if entry.prepared {
                entry.stage.release(&mut self.ac);
                entry.prepared = false;
            }
            entry.io = None;
            entry.shape = None;
        }
        self.entries.retain(|e| !e.injected);
        self.ac.clear();
        self.input = None;
        self.output = None;
    }

    /// Push one fragment through every stage.
    ///
    /// `input` must match the prepared input descriptor. The returned
    /// fragment is either `input` or a buffer owned by one of the stages.
    pub fn process<'a>(
        &'a mut self,
        input: &'a mut Fragment,
    ) -> Result<&'a mut Fragment, ProcessError> {
        match self.state {
            ChainState::Prepared => {}
            ChainState::Failed => return Err(ProcessError::Failed),
            ChainState::Unprepared | ChainState::Released => return Err(ProcessError::NotPrepared),
        }
        let Some(expected) = self.input.as_ref().map(FragmentShape::of) else {
            return Err(ProcessError::NotPrepared);
        };
        let actual = input.shape();
        if actual != expected {
            self.state = ChainState::Failed;
            return Err(ProcessError::Fragment { expected, actual });
        }

        self.ac.begin_cycle();
        let mut signal = input;
        for (i, entry) in self.entries.iter_mut().enumerate() {
            self.ac.enter(i);
            let started = self.profiling.then(Instant::now);
            match entry.stage.process(signal, &mut self.ac) {
                Ok(next) => {
                    let actual = next.shape();
                    if entry.shape != Some(actual) {
                        self.state = ChainState::Failed;
                        return Err(ProcessError::StageFragment {
                            stage: entry.name.clone(),
                            expected: entry.shape.unwrap_or(actual),
                            actual,
                        });
                    }
                    signal = next;
                }
                Err(err) => {
                    self.state = ChainState::Failed;
                    return Err(err);
                }
            }
            if let Some(started) = started {
                entry.profile.process += started.elapsed();
                entry.profile.calls += 1;
            }
        }
        Ok(signal)
    }

    /// Release every stage in reverse order and drop inserted converters.
    ///
    /// The host must have stopped calling `process`. Releasing an unprepared
    /// or released chain does nothing.
    pub fn release(&mut self) {
        if !matches!(self.state, ChainState::Prepared | ChainState::Failed) {
            return;
        }
        self.rollback();
        self.state = ChainState::Released;

        #[cfg(feature = "tracing")]
        tracing::debug!(stages = self.entries.len(), "chain_release");
    }

    /// Total algorithmic delay of the prepared chain, in frames.
    pub fn latency(&self) -> usize {
        self.entries.iter().map(|e| e.stage.latency()).sum()
    }

    /// Negotiated layout of the prepared chain.
    pub fn layout(&self) -> Vec<StageLayout> {
        self.entries
            .iter()
            .filter_map(|e| {
                let (input, output) = e.io?;
                Some(StageLayout {
                    name: e.stage.name().to_string(),
                    injected: e.injected,
                    input,
                    output,
                    latency: e.stage.latency(),
                    profile: self.profiling.then_some(e.profile),
                })
            })
            .collect()
    }

    /// Control handles of every stage that has one.
    pub fn controls(&self) -> Vec<Arc<dyn StageControl>> {
        self.entries.iter().filter_map(|e| e.stage.control()).collect()
    }

    /// Control handle of the stage named `name`.
    pub fn control(&self, name: &str) -> Option<Arc<dyn StageControl>> {
        self.entries
            .iter()
            .find(|e| e.stage.name() == name)
            .and_then(|e| e.stage.control())
    }
}

impl Default for ProcessingChain {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessingChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessingChain")
            .field("stages", &self.stage_names().collect::<Vec<_>>())
            .field("state", &self.state)
            .field("input", &self.input)
            .field("output", &self.output)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StageError;
    use crate::stage::StageContract;

    /// Minimal stage with a configurable contract that counts lifecycle calls.
    struct Probe {
        name: &'static str,
        contract: StageContract,
        output_channels: Option<usize>,
        fail_prepare: bool,
        fail_process: bool,
        prepared: bool,
    }

    impl Probe {
        fn new(name: &'static str, contract: StageContract) -> Self {
            Self {
                name,
                contract,
                output_channels: None,
                fail_prepare: false,
                fail_process: false,
                prepared: false,
            }
        }
    }

    impl Stage for Probe {
        fn name(&self) -> &str {
            self.name
        }

        fn contract(&self) -> StageContract {
            self.contract
        }

        fn prepare(
            &mut self,
            input: &SignalDescriptor,
            _ac: &mut AcSpace,
        ) -> Result<SignalDescriptor, ChainError> {
            if self.fail_prepare {
                return Err(NegotiationError::rejected(self.name, input, "refused").into());
            }
            self.prepared = true;
            let channels = self.output_channels.unwrap_or(input.channels);
            Ok(input
                .with_domain(self.contract.output.resolve(input.domain))
                .with_channels(channels))
        }

        fn process<'a>(
            &'a mut self,
            signal: &'a mut Fragment,
            _ac: &mut AcSpace,
        ) -> Result<&'a mut Fragment, ProcessError> {
            if self.fail_process {
                return Err(ProcessError::Stage {
                    stage: self.name.to_string(),
                    source: StageError::Failed("boom".into()),
                });
            }
            Ok(signal)
        }

        fn release(&mut self, _ac: &mut AcSpace) {
            self.prepared = false;
        }
    }

    fn stereo() -> SignalDescriptor {
        SignalDescriptor::waveform(2, 32, 48000.0).with_transform(64, 64)
    }

    #[test]
    fn converters_are_inserted_around_spectral_stage() {
        let mut chain = ProcessingChain::new()
            .with_stage(Box::new(Probe::new(
                "spec",
                StageContract::in_domain(Domain::Spectrum),
            )))
            .unwrap();
        let out = chain.prepare(stereo()).unwrap();
        assert_eq!(out, stereo());
        assert_eq!(
            chain.stage_names().collect::<Vec<_>>(),
            ["<analysis:0>", "spec", "<synthesis:2>"]
        );
        assert_eq!(chain.latency(), 32);

        chain.release();
        assert_eq!(chain.stage_names().collect::<Vec<_>>(), ["spec"]);
        assert_eq!(chain.state(), ChainState::Released);
    }

    #[test]
    fn output_domain_can_be_spectrum() {
        let mut chain = ProcessingChain::new().with_output_domain(Domain::Spectrum);
        let out = chain.prepare(stereo()).unwrap();
        assert_eq!(out.domain, Domain::Spectrum);
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn channel_mismatch_aborts_prepare() {
        let mut widen = Probe::new("widen", StageContract::polymorphic());
        widen.output_channels = Some(2);
        let mono = Probe::new(
            "mono",
            StageContract::polymorphic().with_channels(ChannelPolicy::Exactly(1)),
        );
        let mut chain = ProcessingChain::new()
            .with_stage(Box::new(widen))
            .unwrap()
            .with_stage(Box::new(mono))
            .unwrap();

        let err = chain
            .prepare(SignalDescriptor::waveform(1, 32, 48000.0))
            .unwrap_err();
        assert_eq!(
            err,
            ChainError::Negotiation(NegotiationError::ChannelMismatch {
                stage: "mono".into(),
                expected: 1,
                actual: 2,
            })
        );
        assert_eq!(chain.state(), ChainState::Unprepared);
        let mut fragment = Fragment::for_descriptor(&SignalDescriptor::waveform(1, 32, 48000.0));
        assert_eq!(
            chain.process(&mut fragment).unwrap_err(),
            ProcessError::NotPrepared
        );
    }

    #[test]
    fn rejected_prepare_removes_converters() {
        let mut refuse = Probe::new("refuse", StageContract::polymorphic());
        refuse.fail_prepare = true;
        let mut chain = ProcessingChain::new()
            .with_stage(Box::new(Probe::new(
                "spec",
                StageContract::in_domain(Domain::Spectrum),
            )))
            .unwrap()
            .with_stage(Box::new(refuse))
            .unwrap();
        let err = chain.prepare(stereo()).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Negotiation(NegotiationError::Rejected { .. })
        ));
        assert_eq!(chain.stage_names().collect::<Vec<_>>(), ["spec", "refuse"]);
        assert!(chain.layout().is_empty());

        // The chain can be prepared again once the cause is gone.
        let mut chain = ProcessingChain::new()
            .with_stage(Box::new(Probe::new(
                "spec",
                StageContract::in_domain(Domain::Spectrum),
            )))
            .unwrap();
        assert!(chain.prepare(stereo()).is_ok());
    }

    #[test]
    fn spectral_stage_without_transform_geometry_fails() {
        let mut chain = ProcessingChain::new()
            .with_stage(Box::new(Probe::new(
                "spec",
                StageContract::in_domain(Domain::Spectrum),
            )))
            .unwrap();
        let err = chain
            .prepare(SignalDescriptor::waveform(1, 32, 48000.0))
            .unwrap_err();
        assert!(matches!(
            err,
            ChainError::Negotiation(NegotiationError::InvalidStft { .. })
        ));
    }

    #[test]
    fn processing_error_is_fatal_until_release() {
        let mut broken = Probe::new("broken", StageContract::polymorphic());
        broken.fail_process = true;
        let mut chain = ProcessingChain::new().with_stage(Box::new(broken)).unwrap();
        let d = SignalDescriptor::waveform(1, 8, 8000.0);
        chain.prepare(d).unwrap();

        let mut fragment = Fragment::for_descriptor(&d);
        assert!(matches!(
            chain.process(&mut fragment),
            Err(ProcessError::Stage { .. })
        ));
        assert_eq!(chain.state(), ChainState::Failed);
        assert_eq!(chain.process(&mut fragment).unwrap_err(), ProcessError::Failed);
        assert!(matches!(
            chain.prepare(d),
            Err(ChainError::InvalidState { .. })
        ));

        chain.release();
        assert_eq!(chain.state(), ChainState::Released);
    }

    #[test]
    fn wrong_fragment_shape_is_rejected() {
        let mut chain = ProcessingChain::new();
        chain.prepare(SignalDescriptor::waveform(2, 16, 8000.0)).unwrap();
        let mut fragment = Fragment::for_descriptor(&SignalDescriptor::waveform(1, 16, 8000.0));
        let err = chain.process(&mut fragment).unwrap_err();
        assert!(matches!(err, ProcessError::Fragment { .. }));
    }

    /// Declares its output unchanged but returns a buffer with one extra channel.
    struct Widening {
        buffer: Option<Fragment>,
    }

    impl Stage for Widening {
        fn name(&self) -> &str {
            "widening"
        }

        fn contract(&self) -> StageContract {
            StageContract::in_domain(Domain::Spectrum)
        }

        fn prepare(
            &mut self,
            input: &SignalDescriptor,
            _ac: &mut AcSpace,
        ) -> Result<SignalDescriptor, ChainError> {
            let wider = input.with_channels(input.channels + 1);
            self.buffer = Some(Fragment::for_descriptor(&wider));
            Ok(*input)
        }

        fn process<'a>(
            &'a mut self,
            signal: &'a mut Fragment,
            _ac: &mut AcSpace,
        ) -> Result<&'a mut Fragment, ProcessError> {
            Ok(self.buffer.as_mut().unwrap_or(signal))
        }

        fn release(&mut self, _ac: &mut AcSpace) {
            self.buffer = None;
        }
    }

    #[test]
    fn misreported_stage_output_fails_the_chain() {
        let mut chain = ProcessingChain::new()
            .with_stage(Box::new(Widening { buffer: None }))
            .unwrap();
        let d = SignalDescriptor::waveform(1, 32, 16000.0).with_transform(64, 64);
        chain.prepare(d).unwrap();

        let mut fragment = Fragment::for_descriptor(&d);
        let err = chain.process(&mut fragment).unwrap_err();
        assert_eq!(
            err,
            ProcessError::StageFragment {
                stage: "widening".into(),
                expected: FragmentShape {
                    domain: Domain::Spectrum,
                    channels: 1,
                    len: 33,
                },
                actual: FragmentShape {
                    domain: Domain::Spectrum,
                    channels: 2,
                    len: 33,
                },
            }
        );
        assert_eq!(chain.state(), ChainState::Failed);
        assert_eq!(chain.process(&mut fragment).unwrap_err(), ProcessError::Failed);

        chain.release();
        assert_eq!(chain.state(), ChainState::Released);
    }

    #[test]
    fn duplicate_names_and_late_pushes_are_rejected() {
        let mut chain = ProcessingChain::new();
        chain
            .push(Box::new(Probe::new("a", StageContract::polymorphic())))
            .unwrap();
        let err = chain
            .push(Box::new(Probe::new("a", StageContract::polymorphic())))
            .unwrap_err();
        assert_eq!(err, ChainError::DuplicateStage { name: "a".into() });

        chain.prepare(SignalDescriptor::waveform(1, 8, 8000.0)).unwrap();
        let err = chain
            .push(Box::new(Probe::new("b", StageContract::polymorphic())))
            .unwrap_err();
        assert!(matches!(err, ChainError::InvalidState { .. }));
    }

    #[test]
    fn profiling_counts_calls() {
        let mut chain = ProcessingChain::new()
            .with_profiling(true)
            .with_stage(Box::new(Probe::new("a", StageContract::polymorphic())))
            .unwrap();
        let d = SignalDescriptor::waveform(1, 8, 8000.0);
        chain.prepare(d).unwrap();
        let mut fragment = Fragment::for_descriptor(&d);
        for _ in 0..5 {
            chain.process(&mut fragment).unwrap();
        }
        let layout = chain.layout();
        assert_eq!(layout.len(), 1);
        assert_eq!(layout[0].profile.unwrap().calls, 5);
        assert!(layout[0].profile.unwrap().load_percent(d.fragment_seconds()) >= 0.0);
    }
}
