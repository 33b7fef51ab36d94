//! The object-safe stage contract driven by the processing chain.
//!
//! The chain only ever sees a stage through [`Stage`] and its declared
//! [`StageContract`]; it never inspects stage internals. Concrete stages are
//! usually written against [`Plugin`](crate::Plugin) and wrapped in a
//! [`PluginInstance`](crate::PluginInstance), which implements `Stage`.

use std::sync::Arc;

use crate::ac::AcSpace;
use crate::descriptor::{Domain, SignalDescriptor};
use crate::error::{ChainError, ProcessError};
use crate::fragment::Fragment;
use crate::plugin::StageControl;

/// Domains a stage accepts as input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomainSet {
    /// Waveform input only.
    Waveform,
    /// Spectrum input only.
    Spectrum,
    /// Either.
    Both,
}

impl DomainSet {
    /// True if `domain` is accepted.
    pub fn contains(self, domain: Domain) -> bool {
        matches!(
            (self, domain),
            (DomainSet::Both, _)
                | (DomainSet::Waveform, Domain::Waveform)
                | (DomainSet::Spectrum, Domain::Spectrum)
        )
    }
}

impl From<Domain> for DomainSet {
    fn from(domain: Domain) -> Self {
        match domain {
            Domain::Waveform => DomainSet::Waveform,
            Domain::Spectrum => DomainSet::Spectrum,
        }
    }
}

/// Domain a stage produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputDomain {
    /// Same as its input.
    SameAsInput,
    /// Always this domain.
    Fixed(Domain),
}

impl OutputDomain {
    /// Output domain for a given input domain.
    pub fn resolve(self, input: Domain) -> Domain {
        match self {
            OutputDomain::SameAsInput => input,
            OutputDomain::Fixed(domain) => domain,
        }
    }
}

/// Channel counts a stage accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelPolicy {
    /// Any channel count.
    Transparent,
    /// Exactly this many channels.
    Exactly(usize),
}

impl ChannelPolicy {
    /// True if `channels` is accepted.
    pub fn accepts(self, channels: usize) -> bool {
        match self {
            ChannelPolicy::Transparent => true,
            ChannelPolicy::Exactly(n) => n == channels,
        }
    }
}

/// What a stage accepts and produces, declared before negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageContract {
    /// Accepted input domains.
    pub input: DomainSet,
    /// Produced domain.
    pub output: OutputDomain,
    /// Accepted input channel counts.
    pub channels: ChannelPolicy,
}

impl StageContract {
    /// Accepts and produces either domain, any channel count.
    pub const fn polymorphic() -> Self {
        Self {
            input: DomainSet::Both,
            output: OutputDomain::SameAsInput,
            channels: ChannelPolicy::Transparent,
        }
    }

    /// Works in `domain` only, any channel count.
    pub const fn in_domain(domain: Domain) -> Self {
        Self {
            input: match domain {
                Domain::Waveform => DomainSet::Waveform,
                Domain::Spectrum => DomainSet::Spectrum,
            },
            output: OutputDomain::SameAsInput,
            channels: ChannelPolicy::Transparent,
        }
    }

    /// Restrict the accepted channel count.
    pub const fn with_channels(mut self, channels: ChannelPolicy) -> Self {
        self.channels = channels;
        self
    }
}

/// One unit of a processing chain.
///
/// `prepare` and `release` run on the control role; `process` runs on the
/// audio role and must not block, allocate or free in steady state.
pub trait Stage: Send {
    /// Instance name, unique within a chain.
    fn name(&self) -> &str;

    /// Declared input/output contract.
    fn contract(&self) -> StageContract;

    /// Allocate state for `input` and return the output descriptor.
    fn prepare(
        &mut self,
        input: &SignalDescriptor,
        ac: &mut AcSpace,
    ) -> Result<SignalDescriptor, ChainError>;

    /// Process one fragment.
    ///
    /// Returns either `signal` itself, modified in place, or a buffer owned by
    /// the stage.
    fn process<'a>(
        &'a mut self,
        signal: &'a mut Fragment,
        ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, ProcessError>;

    /// Free state allocated in `prepare`.
    fn release(&mut self, ac: &mut AcSpace);

    /// Algorithmic delay in frames introduced by this stage.
    fn latency(&self) -> usize {
        0
    }

    /// Handle for changing parameters from the control role.
    fn control(&self) -> Option<Arc<dyn StageControl>> {
        None
    }
}
