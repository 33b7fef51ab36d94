//! Plugins, plugin instances and their control handles.
//!
//! A [`Plugin`] holds the audio-side state of one algorithm and declares how
//! its immutable runtime configuration is derived from parameter values.
//! [`PluginInstance`] composes a plugin with a [`ConfigSlot`] and implements
//! [`Stage`], so the chain can drive any plugin without knowing its type:
//!
//! - `prepare` prepares the plugin, derives the first configuration and
//!   publishes it;
//! - `process` reads the slot exactly once and hands the snapshot to the
//!   plugin;
//! - [`StageControl::set`] (control role) validates a value, derives a new
//!   configuration and publishes it while audio keeps running.
//!
//! ```rust
//! use cadence_core::{
//!     AcSpace, ChainError, ConfigError, Fragment, ParamSet, ParamSpec, ParamValue, Plugin,
//!     PluginInstance, PreparedIo, SignalDescriptor, Stage, StageContract, StageError,
//! };
//!
//! struct Scale;
//!
//! impl Plugin for Scale {
//!     type Config = f32;
//!
//!     fn params(&self) -> Vec<ParamSpec> {
//!         vec![ParamSpec::float("factor", 0.0, 4.0, 1.0)]
//!     }
//!
//!     fn contract(&self) -> StageContract {
//!         StageContract::polymorphic()
//!     }
//!
//!     fn configure(params: &ParamSet, _io: &PreparedIo) -> Result<f32, ConfigError> {
//!         params.float("factor")
//!     }
//!
//!     fn prepare(
//!         &mut self,
//!         input: &SignalDescriptor,
//!         _ac: &mut AcSpace,
//!     ) -> Result<SignalDescriptor, ChainError> {
//!         Ok(*input)
//!     }
//!
//!     fn process<'a>(
//!         &'a mut self,
//!         factor: &f32,
//!         signal: &'a mut Fragment,
//!         _ac: &mut AcSpace,
//!     ) -> Result<&'a mut Fragment, StageError> {
//!         if let Some(w) = signal.as_waveform_mut() {
//!             w.as_mut_slice().iter_mut().for_each(|s| *s *= factor);
//!         }
//!         Ok(signal)
//!     }
//! }
//!
//! let mut stage = PluginInstance::new("scale", Scale);
//! let control = stage.control().unwrap();
//! let mut ac = AcSpace::new();
//! stage.prepare(&SignalDescriptor::waveform(1, 4, 48000.0), &mut ac).unwrap();
//!
//! control.set("factor", ParamValue::Float(2.0)).unwrap();
//! let mut fragment = Fragment::for_descriptor(&SignalDescriptor::waveform(1, 4, 48000.0));
//! fragment.as_waveform_mut().unwrap().as_mut_slice().fill(1.0);
//! let out = stage.process(&mut fragment, &mut ac).unwrap();
//! assert_eq!(out.as_waveform().unwrap().channel(0), &[2.0; 4]);
//! ```

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::ac::AcSpace;
use crate::descriptor::SignalDescriptor;
use crate::error::{ChainError, ConfigError, ProcessError, StageError};
use crate::fragment::Fragment;
use crate::param::{ParamSet, ParamSpec, ParamValue};
use crate::slot::ConfigSlot;
use crate::stage::{Stage, StageContract};

/// Input and output descriptors of a prepared stage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreparedIo {
    /// Descriptor the stage was prepared with.
    pub input: SignalDescriptor,
    /// Descriptor the stage produces.
    pub output: SignalDescriptor,
}

/// An algorithm with a separately derived runtime configuration.
pub trait Plugin: Send + 'static {
    /// Immutable configuration derived on the control role.
    type Config: Send + Sync + 'static;

    /// Declared parameters.
    fn params(&self) -> Vec<ParamSpec> {
        Vec::new()
    }

    /// Declared input/output contract.
    fn contract(&self) -> StageContract;

    /// Derive a configuration from validated parameters.
    ///
    /// Runs on the control role; may allocate. An error keeps the previously
    /// published configuration current.
    fn configure(params: &ParamSet, io: &PreparedIo) -> Result<Self::Config, ConfigError>;

    /// Allocate audio-side state and return the output descriptor.
    fn prepare(
        &mut self,
        input: &SignalDescriptor,
        ac: &mut AcSpace,
    ) -> Result<SignalDescriptor, ChainError>;

    /// Process one fragment with the current configuration.
    fn process<'a>(
        &'a mut self,
        config: &Self::Config,
        signal: &'a mut Fragment,
        ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, StageError>;

    /// Free audio-side state.
    fn release(&mut self, _ac: &mut AcSpace) {}

    /// Algorithmic delay in frames.
    fn latency(&self) -> usize {
        0
    }
}

/// Type-erased control handle of one stage, used from the control role.
pub trait StageControl: Send + Sync {
    /// Stage instance name.
    fn stage(&self) -> &str;

    /// Declared parameters.
    fn params(&self) -> Vec<ParamSpec>;

    /// Current value of a parameter.
    fn get(&self, param: &str) -> Option<ParamValue>;

    /// Validate and apply a new value.
    ///
    /// When the stage is prepared a new configuration is derived and
    /// published; on error the previous value and configuration stay current.
    fn set(&self, param: &str, value: ParamValue) -> Result<(), ConfigError>;

    /// Number of configurations published so far.
    fn published(&self) -> u64;
}

struct ControlState {
    params: ParamSet,
    io: Option<PreparedIo>,
}

/// Control side of a [`PluginInstance`]: parameters plus the slot.
pub struct PluginControl<P: Plugin> {
    stage: String,
    slot: ConfigSlot<P::Config>,
    state: Mutex<ControlState>,
}

impl<P: Plugin> PluginControl<P> {
    fn new(stage: String, params: ParamSet) -> Self {
        Self {
            stage,
            slot: ConfigSlot::new(),
            state: Mutex::new(ControlState { params, io: None }),
        }
    }

    /// The configuration slot.
    pub fn slot(&self) -> &ConfigSlot<P::Config> {
        &self.slot
    }

    fn prepared(&self, io: PreparedIo) -> Result<(), ConfigError> {
        let mut state = self.state.lock();
        let config = P::configure(&state.params, &io)?;
        state.io = Some(io);
        self.slot.publish(config);
        Ok(())
    }

    fn released(&self) {
        self.state.lock().io = None;
        self.slot.clear();
    }
}

impl<P: Plugin> StageControl for PluginControl<P> {
    fn stage(&self) -> &str {
        &self.stage
    }

    fn params(&self) -> Vec<ParamSpec> {
        self.state.lock().params.specs().to_vec()
    }

    fn get(&self, param: &str) -> Option<ParamValue> {
        self.state.lock().params.get(param).cloned()
    }

    fn set(&self, param: &str, value: ParamValue) -> Result<(), ConfigError> {
        let mut state = self.state.lock();
        let previous = state.params.set(param, value)?;
        let Some(io) = state.io else {
            return Ok(());
        };
        match P::configure(&state.params, &io) {
            Ok(config) => {
                self.slot.publish(config);
                #[cfg(feature = "tracing")]
                tracing::debug!(stage = %self.stage, param, "plugin_control: published");
                Ok(())
            }
            Err(err) => {
                state.params.restore(param, previous);
                #[cfg(feature = "tracing")]
                tracing::debug!(stage = %self.stage, param, %err, "plugin_control: rejected");
                Err(err)
            }
        }
    }

    fn published(&self) -> u64 {
        self.slot.published()
    }
}

impl<P: Plugin> fmt::Debug for PluginControl<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginControl")
            .field("stage", &self.stage)
            .field("slot", &self.slot)
            .finish_non_exhaustive()
    }
}

/// A [`Plugin`] wired to its configuration slot; implements [`Stage`].
pub struct PluginInstance<P: Plugin> {
    plugin: P,
    control: Arc<PluginControl<P>>,
}

impl<P: Plugin> PluginInstance<P> {
    /// Wrap `plugin` under instance name `name`, with default parameters.
    pub fn new(name: impl Into<String>, plugin: P) -> Self {
        let name = name.into();
        let params = ParamSet::from_specs(name.clone(), plugin.params());
        Self {
            plugin,
            control: Arc::new(PluginControl::new(name, params)),
        }
    }

    /// Set a parameter before the chain is built.
    pub fn with_param(self, param: &str, value: ParamValue) -> Result<Self, ConfigError> {
        self.control.set(param, value)?;
        Ok(self)
    }

    /// The wrapped plugin.
    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    /// Typed control handle.
    pub fn plugin_control(&self) -> Arc<PluginControl<P>> {
        Arc::clone(&self.control)
    }
}

impl<P: Plugin> Stage for PluginInstance<P> {
    fn name(&self) -> &str {
        &self.control.stage
    }

    fn contract(&self) -> StageContract {
        self.plugin.contract()
    }

    fn prepare(
        &mut self,
        input: &SignalDescriptor,
        ac: &mut AcSpace,
    ) -> Result<SignalDescriptor, ChainError> {
        let output = self.plugin.prepare(input, ac)?;
        let io = PreparedIo {
            input: *input,
            output,
        };
        if let Err(err) = self.control.prepared(io) {
            self.plugin.release(ac);
            return Err(err.into());
        }
        Ok(output)
    }

    fn process<'a>(
        &'a mut self,
        signal: &'a mut Fragment,
        ac: &mut AcSpace,
    ) -> Result<&'a mut Fragment, ProcessError> {
        let snapshot = self.control.slot.read();
        let Some(config) = snapshot.get() else {
            return Err(ProcessError::NoConfiguration {
                stage: self.control.stage.clone(),
            });
        };
        self.plugin
            .process(config, signal, ac)
            .map_err(|source| ProcessError::Stage {
                stage: self.control.stage.clone(),
                source,
            })
    }

    fn release(&mut self, ac: &mut AcSpace) {
        self.plugin.release(ac);
        self.control.released();
    }

    fn latency(&self) -> usize {
        self.plugin.latency()
    }

    fn control(&self) -> Option<Arc<dyn StageControl>> {
        Some(Arc::clone(&self.control) as Arc<dyn StageControl>)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Domain;

    /// Adds a constant offset. With `positive` set, negative offsets are rejected.
    struct Offset {
        prepared: bool,
    }

    struct OffsetConfig {
        offset: f32,
    }

    impl Plugin for Offset {
        type Config = OffsetConfig;

        fn params(&self) -> Vec<ParamSpec> {
            vec![
                ParamSpec::float("offset", -1.0, 1.0, 0.0),
                ParamSpec::boolean("positive", false),
            ]
        }

        fn contract(&self) -> StageContract {
            StageContract::in_domain(Domain::Waveform)
        }

        fn configure(params: &ParamSet, _io: &PreparedIo) -> Result<OffsetConfig, ConfigError> {
            let offset = params.float("offset")?;
            if params.boolean("positive")? && offset < 0.0 {
                return Err(params.invalid("offset", "must be positive"));
            }
            Ok(OffsetConfig { offset })
        }

        fn prepare(
            &mut self,
            input: &SignalDescriptor,
            _ac: &mut AcSpace,
        ) -> Result<SignalDescriptor, ChainError> {
            self.prepared = true;
            Ok(*input)
        }

        fn process<'a>(
            &'a mut self,
            config: &OffsetConfig,
            signal: &'a mut Fragment,
            _ac: &mut AcSpace,
        ) -> Result<&'a mut Fragment, StageError> {
            let actual = signal.domain();
            let w = signal.as_waveform_mut().ok_or(StageError::Domain {
                expected: Domain::Waveform,
                actual,
            })?;
            w.as_mut_slice().iter_mut().for_each(|s| *s += config.offset);
            Ok(signal)
        }

        fn release(&mut self, _ac: &mut AcSpace) {
            self.prepared = false;
        }
    }

    fn descriptor() -> SignalDescriptor {
        SignalDescriptor::waveform(1, 2, 48000.0)
    }

    fn run(stage: &mut PluginInstance<Offset>, ac: &mut AcSpace) -> Vec<f32> {
        let mut fragment = Fragment::for_descriptor(&descriptor());
        let out = stage.process(&mut fragment, ac).unwrap();
        out.as_waveform().unwrap().channel(0).to_vec()
    }

    #[test]
    fn process_before_prepare_has_no_configuration() {
        let mut stage = PluginInstance::new("offset", Offset { prepared: false });
        let mut ac = AcSpace::new();
        let mut fragment = Fragment::for_descriptor(&descriptor());
        let err = stage.process(&mut fragment, &mut ac).unwrap_err();
        assert_eq!(
            err,
            ProcessError::NoConfiguration {
                stage: "offset".into()
            }
        );
    }

    #[test]
    fn prepare_publishes_first_configuration() {
        let mut stage = PluginInstance::new("offset", Offset { prepared: false })
            .with_param("offset", ParamValue::Float(0.5))
            .unwrap();
        let mut ac = AcSpace::new();
        stage.prepare(&descriptor(), &mut ac).unwrap();
        assert!(stage.plugin().prepared);
        assert_eq!(stage.control().unwrap().published(), 1);
        assert_eq!(run(&mut stage, &mut ac), [0.5, 0.5]);
    }

    #[test]
    fn set_while_prepared_publishes() {
        let mut stage = PluginInstance::new("offset", Offset { prepared: false });
        let control = stage.control().unwrap();
        let mut ac = AcSpace::new();
        stage.prepare(&descriptor(), &mut ac).unwrap();

        control.set("offset", ParamValue::Float(-0.25)).unwrap();
        assert_eq!(control.published(), 2);
        assert_eq!(run(&mut stage, &mut ac), [-0.25, -0.25]);
    }

    #[test]
    fn rejected_configuration_keeps_previous() {
        let mut stage = PluginInstance::new("offset", Offset { prepared: false });
        let control = stage.control().unwrap();
        let mut ac = AcSpace::new();
        control.set("offset", ParamValue::Float(-0.5)).unwrap();
        stage.prepare(&descriptor(), &mut ac).unwrap();

        let err = control.set("positive", ParamValue::Bool(true)).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
        assert_eq!(control.get("positive"), Some(ParamValue::Bool(false)));

        let err = control.set("offset", ParamValue::Float(3.0)).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { .. }));

        assert_eq!(control.published(), 1);
        assert_eq!(run(&mut stage, &mut ac), [-0.5, -0.5]);
    }

    #[test]
    fn configuration_error_in_prepare_releases_plugin() {
        let mut stage = PluginInstance::new("offset", Offset { prepared: false });
        stage.control().unwrap().set("offset", ParamValue::Float(-0.5)).unwrap();
        // Bypass validation of the combination by setting before prepare.
        stage.control().unwrap().set("positive", ParamValue::Bool(true)).unwrap();

        let mut ac = AcSpace::new();
        let err = stage.prepare(&descriptor(), &mut ac).unwrap_err();
        assert!(matches!(err, ChainError::Config(ConfigError::Invalid { .. })));
        assert!(!stage.plugin().prepared);
    }

    #[test]
    fn release_clears_configuration() {
        let mut stage = PluginInstance::new("offset", Offset { prepared: false });
        let mut ac = AcSpace::new();
        stage.prepare(&descriptor(), &mut ac).unwrap();
        stage.release(&mut ac);
        let mut fragment = Fragment::for_descriptor(&descriptor());
        assert!(matches!(
            stage.process(&mut fragment, &mut ac),
            Err(ProcessError::NoConfiguration { .. })
        ));
    }
}
