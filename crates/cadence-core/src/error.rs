//! Error types for configuration, negotiation, wiring and processing.
//!
//! Control-path failures ([`ConfigError`], [`NegotiationError`], [`AcError`]
//! during prepare) are recoverable: the caller fixes the input and tries
//! again. A [`ProcessError`] is fatal to the prepared chain, which refuses to
//! process until it has been released and prepared again.

use thiserror::Error;

use crate::ac::AcType;
use crate::chain::ChainState;
use crate::descriptor::{DescriptorField, Domain};
use crate::fragment::FragmentShape;

/// A parameter value was rejected before a runtime configuration was built.
///
/// The previously published configuration stays current.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// The stage declares no parameter with this name.
    #[error("stage '{stage}' has no parameter '{param}'")]
    UnknownParam {
        /// Stage instance name.
        stage: String,
        /// Requested parameter.
        param: String,
    },

    /// The value has the wrong type for the parameter.
    #[error("parameter '{param}' of stage '{stage}' expects {expected}, got {actual}")]
    WrongType {
        /// Stage instance name.
        stage: String,
        /// Parameter name.
        param: String,
        /// Declared value type.
        expected: &'static str,
        /// Supplied value type.
        actual: &'static str,
    },

    /// The value lies outside the declared range.
    #[error("parameter '{param}' of stage '{stage}' must be within [{min}, {max}], got {value}")]
    OutOfRange {
        /// Stage instance name.
        stage: String,
        /// Parameter name.
        param: String,
        /// Lower bound.
        min: f64,
        /// Upper bound.
        max: f64,
        /// Supplied value.
        value: f64,
    },

    /// The value is not one of the declared choices.
    #[error("parameter '{param}' of stage '{stage}' must be one of [{choices}], got '{value}'")]
    InvalidChoice {
        /// Stage instance name.
        stage: String,
        /// Parameter name.
        param: String,
        /// Supplied value.
        value: String,
        /// Comma separated list of accepted values.
        choices: String,
    },

    /// The values are individually valid but cannot be combined.
    #[error("invalid parameter '{param}' for stage '{stage}': {reason}")]
    Invalid {
        /// Stage instance name.
        stage: String,
        /// Parameter name.
        param: String,
        /// Why the configuration was rejected.
        reason: String,
    },
}

impl ConfigError {
    /// Stage the error refers to.
    pub fn stage(&self) -> &str {
        match self {
            ConfigError::UnknownParam { stage, .. }
            | ConfigError::WrongType { stage, .. }
            | ConfigError::OutOfRange { stage, .. }
            | ConfigError::InvalidChoice { stage, .. }
            | ConfigError::Invalid { stage, .. } => stage,
        }
    }

    /// Parameter the error refers to.
    pub fn param(&self) -> &str {
        match self {
            ConfigError::UnknownParam { param, .. }
            | ConfigError::WrongType { param, .. }
            | ConfigError::OutOfRange { param, .. }
            | ConfigError::InvalidChoice { param, .. }
            | ConfigError::Invalid { param, .. } => param,
        }
    }
}

/// Descriptor negotiation failed during `prepare`.
///
/// The whole preparation is aborted; no partially prepared chain remains.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NegotiationError {
    /// The descriptor is internally inconsistent.
    #[error("invalid signal descriptor: {reason}")]
    InvalidDescriptor {
        /// What is wrong with it.
        reason: String,
    },

    /// The stage accepts neither the current domain nor the one a converter
    /// could produce.
    #[error("stage '{stage}' cannot accept {domain} input")]
    UnsupportedDomain {
        /// Stage instance name.
        stage: String,
        /// Domain arriving at the stage.
        domain: Domain,
    },

    /// The stage requires a fixed channel count.
    #[error("stage '{stage}' requires {expected} channel(s), got {actual}")]
    ChannelMismatch {
        /// Stage instance name.
        stage: String,
        /// Required channel count.
        expected: usize,
        /// Incoming channel count.
        actual: usize,
    },

    /// The stage altered a field that is fixed chain-wide.
    #[error("stage '{stage}' changed {field} from {expected} to {actual}")]
    ShapeChanged {
        /// Stage instance name.
        stage: String,
        /// Offending field.
        field: DescriptorField,
        /// Incoming value.
        expected: String,
        /// Value the stage produced.
        actual: String,
    },

    /// The stage produced a domain other than the one its contract declares.
    #[error("stage '{stage}' declared {declared} output but produced {actual}")]
    OutputDomain {
        /// Stage instance name.
        stage: String,
        /// Declared output domain.
        declared: Domain,
        /// Produced output domain.
        actual: Domain,
    },

    /// The short-time transform settings cannot be used.
    #[error("invalid STFT settings: {reason}")]
    InvalidStft {
        /// What is wrong with them.
        reason: String,
    },

    /// The window/hop combination does not add up to a constant.
    #[error(
        "{window} window of length {window_length} with hop {hop} is not constant overlap-add (ripple {ripple:.3e})"
    )]
    ColaViolated {
        /// Window function name.
        window: &'static str,
        /// Window length `M`.
        window_length: usize,
        /// Hop size `R`.
        hop: usize,
        /// Peak relative deviation of the overlap-add sum.
        ripple: f32,
    },

    /// The stage refused the descriptor.
    #[error("stage '{stage}' rejected {descriptor}: {reason}")]
    Rejected {
        /// Stage instance name.
        stage: String,
        /// The refused descriptor, rendered.
        descriptor: String,
        /// Why.
        reason: String,
    },

    /// Two descriptors that must agree differ.
    #[error("{field} mismatch: expected {expected}, got {actual}")]
    Mismatch {
        /// First differing field.
        field: DescriptorField,
        /// Expected value.
        expected: String,
        /// Actual value.
        actual: String,
    },
}

impl NegotiationError {
    /// Create an invalid descriptor error.
    pub fn invalid_descriptor(reason: impl Into<String>) -> Self {
        NegotiationError::InvalidDescriptor {
            reason: reason.into(),
        }
    }

    /// Create an invalid STFT settings error.
    pub fn invalid_stft(reason: impl Into<String>) -> Self {
        NegotiationError::InvalidStft {
            reason: reason.into(),
        }
    }

    /// Create a rejection on behalf of `stage`.
    pub fn rejected(
        stage: impl Into<String>,
        descriptor: &crate::SignalDescriptor,
        reason: impl Into<String>,
    ) -> Self {
        NegotiationError::Rejected {
            stage: stage.into(),
            descriptor: descriptor.to_string(),
            reason: reason.into(),
        }
    }
}

/// Misuse of the AC space: a producer/consumer wiring mistake.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AcError {
    /// Names must be non-empty and free of whitespace.
    #[error("invalid AC variable name '{name}'")]
    InvalidName {
        /// Rejected name.
        name: String,
    },

    /// No stage declared the variable.
    #[error("AC variable '{name}' is not declared")]
    NotDeclared {
        /// Requested name.
        name: String,
    },

    /// Declared or requested with a different type.
    #[error("AC variable '{name}' is {declared}, requested as {requested}")]
    TypeConflict {
        /// Variable name.
        name: String,
        /// Type it was declared with.
        declared: AcType,
        /// Type used by the caller.
        requested: AcType,
    },

    /// Another stage already owns the name.
    #[error("AC variable '{name}' is already declared by stage '{owner}'")]
    AlreadyDeclared {
        /// Variable name.
        name: String,
        /// Owning stage.
        owner: String,
    },

    /// Only the declaring stage may bind a variable.
    #[error("stage '{caller}' cannot bind AC variable '{name}' owned by '{owner}'")]
    NotOwner {
        /// Variable name.
        name: String,
        /// Owning stage.
        owner: String,
        /// Stage that tried to bind.
        caller: String,
    },

    /// The variable is declared by a later stage.
    #[error("stage '{reader}' reads AC variable '{name}' declared later by '{owner}'")]
    ReadAhead {
        /// Variable name.
        name: String,
        /// Owning (later) stage.
        owner: String,
        /// Reading stage.
        reader: String,
    },

    /// The bound value does not fit the declared buffer.
    #[error("AC variable '{name}' holds {expected} element(s), got {actual}")]
    ShapeMismatch {
        /// Variable name.
        name: String,
        /// Declared element count.
        expected: usize,
        /// Supplied element count.
        actual: usize,
    },

    /// A transient variable was not bound in the current cycle.
    #[error("AC variable '{name}' was not bound in this cycle")]
    Unbound {
        /// Variable name.
        name: String,
    },
}

/// Failure reported by a stage while processing a fragment.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageError {
    /// AC space misuse.
    #[error(transparent)]
    Wiring(#[from] AcError),

    /// The fragment arrived in an unexpected domain.
    #[error("expected {expected} fragment, got {actual}")]
    Domain {
        /// Expected domain.
        expected: Domain,
        /// Received domain.
        actual: Domain,
    },

    /// Any other unrecoverable condition.
    #[error("{0}")]
    Failed(String),
}

/// A processing cycle could not complete.
///
/// Fatal: the chain enters [`ChainState::Failed`] and must be released.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProcessError {
    /// `process` called outside the prepared state.
    #[error("chain is not prepared")]
    NotPrepared,

    /// An earlier cycle failed.
    #[error("chain stopped after a processing error; release and prepare it again")]
    Failed,

    /// The input fragment does not match the prepared input descriptor.
    #[error("input fragment is {actual}, chain expects {expected}")]
    Fragment {
        /// Prepared shape.
        expected: FragmentShape,
        /// Supplied shape.
        actual: FragmentShape,
    },

    /// A fragment inside the chain differs from the shape negotiated for
    /// it: a stage returned something else than it declared at prepare.
    #[error("fragment at stage '{stage}' is {actual}, negotiated {expected}")]
    StageFragment {
        /// Stage instance name.
        stage: String,
        /// Negotiated shape.
        expected: FragmentShape,
        /// Shape actually seen.
        actual: FragmentShape,
    },

    /// The stage has no published configuration yet.
    #[error("stage '{stage}' has no valid configuration")]
    NoConfiguration {
        /// Stage instance name.
        stage: String,
    },

    /// The stage failed.
    #[error("stage '{stage}' failed: {source}")]
    Stage {
        /// Stage instance name.
        stage: String,
        /// What happened.
        #[source]
        source: StageError,
    },
}

/// Errors on the control-path operations of a chain.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChainError {
    /// Parameter validation or derivation failed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Descriptor negotiation failed.
    #[error(transparent)]
    Negotiation(#[from] NegotiationError),

    /// AC wiring failed during prepare.
    #[error(transparent)]
    Wiring(#[from] AcError),

    /// Two stages share an instance name.
    #[error("duplicate stage name '{name}'")]
    DuplicateStage {
        /// Conflicting name.
        name: String,
    },

    /// The operation is not legal in the current state.
    #[error("cannot {operation} a chain that is {state}")]
    InvalidState {
        /// Attempted operation.
        operation: &'static str,
        /// Current state.
        state: ChainState,
    },
}
