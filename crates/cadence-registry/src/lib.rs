//! Stage registry and factory for cadence chains.
//!
//! The registry maps stage type ids to factories. It is an ordinary value
//! handed to whoever builds chains, so hosts can add their own stage types
//! next to the built-in ones.
//!
//! # Features
//!
//! - **Stage Discovery**: List all registered stage types with metadata
//! - **Factory Pattern**: Create named stage instances by type id
//! - **Category System**: Stages organized by role
//! - **Parameter Info**: Access parameter declarations for validation and help
//!
//! # Example
//!
//! ```rust
//! use cadence_registry::{StageCategory, StageRegistry};
//!
//! let registry = StageRegistry::new();
//!
//! for stage in registry.all_stages() {
//!     println!("{}: {}", stage.id, stage.description);
//! }
//!
//! // Two instances of the same type under different names
//! let low = registry.create("gain", "low").unwrap();
//! let high = registry.create("gain", "high").unwrap();
//! assert_eq!(low.name(), "low");
//! assert_eq!(high.name(), "high");
//!
//! assert!(!registry.stages_in_category(StageCategory::Spectral).is_empty());
//! ```

use cadence_core::{Domain, DomainSet, ParamSpec, PluginInstance, Stage};
use cadence_stages::{
    AutoGain, Delay, Downmix, Gain, Identity, LevelMeter, SpectralGate,
};

/// Category of stage for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageCategory {
    /// Pass-through and channel handling.
    Utility,
    /// Level-dependent processing.
    Dynamics,
    /// Delays.
    TimeBased,
    /// Spectrum-domain processing.
    Spectral,
    /// Measurement published to the AC space.
    Analysis,
}

impl StageCategory {
    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            StageCategory::Utility => "Utility",
            StageCategory::Dynamics => "Dynamics",
            StageCategory::TimeBased => "Time-Based",
            StageCategory::Spectral => "Spectral",
            StageCategory::Analysis => "Analysis",
        }
    }
}

/// Describes a stage type in the registry.
#[derive(Debug, Clone)]
pub struct StageDescriptor {
    /// Unique type id (lowercase, no spaces).
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description.
    pub description: &'static str,
    /// Category for organization.
    pub category: StageCategory,
    /// Input domains the stage accepts.
    pub accepts: DomainSet,
}

/// Creates a stage instance under the given instance name.
pub type StageFactory = fn(&str) -> Box<dyn Stage>;

struct RegistryEntry {
    descriptor: StageDescriptor,
    factory: StageFactory,
}

/// Registry of available stage types.
pub struct StageRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for StageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StageRegistry {
    /// Create a registry with all built-in stages registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin_stages();
        registry
    }

    /// Create a registry without any stage types.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn register_builtin_stages(&mut self) {
        self.register(
            StageDescriptor {
                id: "identity",
                name: "Identity",
                description: "Pass-through in either domain",
                category: StageCategory::Utility,
                accepts: DomainSet::Both,
            },
            |name| Box::new(PluginInstance::new(name, Identity::new())),
        );

        self.register(
            StageDescriptor {
                id: "spectral_identity",
                name: "Spectral Identity",
                description: "Pass-through that forces an analysis/synthesis round trip",
                category: StageCategory::Spectral,
                accepts: DomainSet::Spectrum,
            },
            |name| Box::new(PluginInstance::new(name, Identity::in_domain(Domain::Spectrum))),
        );

        self.register(
            StageDescriptor {
                id: "gain",
                name: "Gain",
                description: "Static gain in dB",
                category: StageCategory::Utility,
                accepts: DomainSet::Both,
            },
            |name| Box::new(PluginInstance::new(name, Gain)),
        );

        self.register(
            StageDescriptor {
                id: "delay",
                name: "Delay",
                description: "Feedback delay line",
                category: StageCategory::TimeBased,
                accepts: DomainSet::Waveform,
            },
            |name| Box::new(PluginInstance::new(name, Delay::new())),
        );

        // The meter publishes "<instance>.level".
        self.register(
            StageDescriptor {
                id: "meter",
                name: "Level Meter",
                description: "Per-channel RMS level published to the AC space",
                category: StageCategory::Analysis,
                accepts: DomainSet::Both,
            },
            |name| Box::new(PluginInstance::new(name, LevelMeter::new(format!("{name}.level")))),
        );

        self.register(
            StageDescriptor {
                id: "agc",
                name: "Auto Gain",
                description: "Gain towards a target level read from the AC space",
                category: StageCategory::Dynamics,
                accepts: DomainSet::Both,
            },
            |name| Box::new(PluginInstance::new(name, AutoGain)),
        );

        self.register(
            StageDescriptor {
                id: "downmix",
                name: "Downmix",
                description: "Mix all channels to mono",
                category: StageCategory::Utility,
                accepts: DomainSet::Both,
            },
            |name| Box::new(PluginInstance::new(name, Downmix::new())),
        );

        self.register(
            StageDescriptor {
                id: "spectral_gate",
                name: "Spectral Gate",
                description: "Per-bin noise gate",
                category: StageCategory::Spectral,
                accepts: DomainSet::Spectrum,
            },
            |name| Box::new(PluginInstance::new(name, SpectralGate)),
        );
    }

    /// Register a stage type.
    ///
    /// Registering an id twice replaces the earlier entry.
    pub fn register(&mut self, descriptor: StageDescriptor, factory: StageFactory) {
        let entry = RegistryEntry {
            descriptor,
            factory,
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.id == entry.descriptor.id)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// Returns descriptors for all registered stage types.
    pub fn all_stages(&self) -> Vec<&StageDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Returns descriptors for stage types in a specific category.
    pub fn stages_in_category(&self, category: StageCategory) -> Vec<&StageDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Get a descriptor by type id.
    pub fn get(&self, id: &str) -> Option<&StageDescriptor> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| &e.descriptor)
    }

    /// Create a stage instance of type `id` named `name`.
    ///
    /// Returns `None` if the type id is not registered.
    pub fn create(&self, id: &str, name: &str) -> Option<Box<dyn Stage>> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == id)
            .map(|e| (e.factory)(name))
    }

    /// Parameter declarations of stage type `id`.
    ///
    /// Creates a temporary instance to read them. Stages without a control
    /// handle have no parameters.
    pub fn params(&self, id: &str) -> Option<Vec<ParamSpec>> {
        let stage = self.create(id, id)?;
        Some(stage.control().map(|c| c.params()).unwrap_or_default())
    }

    /// Returns the number of registered stage types.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no stage types are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
