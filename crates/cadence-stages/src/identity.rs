//! Pass-through stage.

use cadence_core::{
    AcSpace, ChainError, ConfigError, Domain, DomainSet, Fragment, ParamSet, Plugin, PreparedIo,
    SignalDescriptor, StageContract, StageError,
};

/// Returns every fragment unchanged, in either domain.
///
/// With `domain` set it accepts only that domain, which forces the chain to
/// convert around it; a spectrum-only identity is the usual way to check an
/// analysis/synthesis round trip.
#[derive(Debug, Clone, Copy, Default)]
pub struct Identity {
    accepts: Option<DomainSet>,
}

impl Identity {
    /// Identity accepting both domains.
    pub fn new() -> Self {
        Self::default()
    }

    /// Identity accepting only `domain`.
    pub fn in_domain(domain: Domain) -> Self {
        Self {
            accepts: Some(domain.into()),
        }
    }
}

impl Plugin for Identity {
    type Config = ();

    fn contract(&self) -> StageContract {
        let mut contract = StageContract::polymorphic();
        if let Some(accepts) = self.accepts {
            contract.input = accepts;
        }
        contract
    }

    fn configure(_params: &ParamSet, _io: &PreparedIo) -> Result<(), ConfigError> {
        Ok(())
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
        _config: &(),
        signal: &'a mut Fragment,
        _ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, StageError> {
        Ok(signal)
    }
}
