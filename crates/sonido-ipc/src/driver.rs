//! Component drivers and the factory registry that builds them.
//!
//! A component's processing kernel is out of scope for the control plane; what
//! the registry needs from it is construction, DAI binding, and the hooks the
//! topology code calls (DAI configuration, cross-core sharing). Those hooks
//! form the [`ComponentDriver`] trait.
//!
//! [`DriverRegistry`] maps each [`ComponentType`] to a factory function. The
//! built-in drivers cover host and DAI endpoints plus the common processing
//! components; firmware images can register more before the context is built.
//!
//! ```rust
//! use sonido_ipc::{ComponentParams, ComponentSpec, ComponentType, DriverRegistry};
//! use sonido_platform::CoreId;
//!
//! let drivers = DriverRegistry::new();
//! let spec = ComponentSpec::new(10, CoreId::PRIMARY, 1, ComponentParams::Volume { channels: 2 });
//! let driver = drivers.create(&spec).unwrap();
//! assert_eq!(driver.comp_type(), ComponentType::Volume);
//! ```

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use core::fmt;

use thiserror::Error;

use crate::dai::{DaiBinding, DaiConfig, DaiType};
use crate::registry::ComponentSpec;

/// Largest channel count a processing component accepts.
pub const MAX_CHANNELS: u16 = 8;

/// Errors reported by component drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DriverError {
    /// The driver does not implement this request.
    #[error("operation not supported by driver")]
    Unsupported,
    /// The request carries parameters the driver cannot use.
    #[error("invalid parameters: {0}")]
    InvalidParams(&'static str),
    /// The driver could not allocate its private state.
    #[error("driver out of memory")]
    OutOfMemory,
}

/// Component kind, selecting which driver is instantiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    /// Host DMA endpoint.
    Host,
    /// Digital audio interface endpoint.
    Dai,
    /// Per-channel gain.
    Volume,
    /// N-to-1 mixer.
    Mixer,
    /// Sample-rate converter.
    Src,
    /// Tone generator.
    Tone,
}

impl ComponentType {
    /// Returns a lowercase name for logs and diagnostics.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Dai => "dai",
            Self::Volume => "volume",
            Self::Mixer => "mixer",
            Self::Src => "src",
            Self::Tone => "tone",
        }
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stream direction of an endpoint component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamDirection {
    /// Host to DAI.
    #[default]
    Playback,
    /// DAI to host.
    Capture,
}

/// Type-specific construction parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentParams {
    /// Host endpoint.
    Host {
        /// Stream direction.
        direction: StreamDirection,
        /// Host stream the endpoint is attached to.
        stream_tag: u32,
    },
    /// DAI endpoint.
    Dai {
        /// Stream direction.
        direction: StreamDirection,
        /// Interface family.
        dai_type: DaiType,
        /// Interface instance.
        dai_index: u32,
    },
    /// Volume control.
    Volume {
        /// Channel count.
        channels: u16,
    },
    /// Mixer.
    Mixer {
        /// Number of mixed inputs.
        inputs: u8,
    },
    /// Sample-rate converter.
    Src {
        /// Input rate in Hz.
        source_rate: u32,
        /// Output rate in Hz.
        sink_rate: u32,
    },
    /// Tone generator.
    Tone {
        /// Tone frequency in Hz.
        frequency: u32,
    },
}

impl ComponentParams {
    /// Returns the component type these parameters construct.
    pub const fn comp_type(&self) -> ComponentType {
        match self {
            Self::Host { .. } => ComponentType::Host,
            Self::Dai { .. } => ComponentType::Dai,
            Self::Volume { .. } => ComponentType::Volume,
            Self::Mixer { .. } => ComponentType::Mixer,
            Self::Src { .. } => ComponentType::Src,
            Self::Tone { .. } => ComponentType::Tone,
        }
    }
}

/// Control-plane interface of a component's driver.
pub trait ComponentDriver: Send {
    /// Returns the component type this driver implements.
    fn comp_type(&self) -> ComponentType;

    /// Returns the parameters the driver is running with.
    fn params(&self) -> ComponentParams;

    /// Returns the interface this component is bound to, for DAI endpoints.
    fn dai_binding(&self) -> Option<DaiBinding> {
        None
    }

    /// Applies an interface configuration.
    fn configure_dai(&mut self, _config: &DaiConfig) -> Result<(), DriverError> {
        Err(DriverError::Unsupported)
    }

    /// Returns the last applied interface configuration.
    fn dai_config(&self) -> Option<&DaiConfig> {
        None
    }

    /// Prepares the driver for use from more than one core.
    fn make_shared(&mut self) -> Result<(), DriverError> {
        Ok(())
    }

    /// Returns true once [`make_shared`](Self::make_shared) has run, for
    /// drivers that keep per-core state.
    fn is_shared(&self) -> bool {
        false
    }
}

/// Factory function type for creating drivers.
pub type DriverFactory = fn(&ComponentSpec) -> Result<Box<dyn ComponentDriver>, DriverError>;

struct DriverEntry {
    comp_type: ComponentType,
    factory: DriverFactory,
}

/// Registry of component driver factories.
pub struct DriverRegistry {
    entries: Vec<DriverEntry>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    /// Creates a registry with all built-in drivers registered.
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register_builtin_drivers();
        registry
    }

    /// Creates a registry with no drivers.
    pub fn empty() -> Self {
        Self {
            entries: Vec::with_capacity(6),
        }
    }

    fn register_builtin_drivers(&mut self) {
        self.register(ComponentType::Host, |spec| match spec.params {
            params @ ComponentParams::Host { .. } => Ok(Box::new(PlainDriver { params })),
            _ => Err(DriverError::InvalidParams("expected host parameters")),
        });

        self.register(ComponentType::Dai, |spec| match spec.params {
            params @ ComponentParams::Dai {
                dai_type,
                dai_index,
                ..
            } => Ok(Box::new(DaiDriver {
                params,
                binding: DaiBinding {
                    dai_type,
                    dai_index,
                },
                config: None,
                shared: false,
            })),
            _ => Err(DriverError::InvalidParams("expected DAI parameters")),
        });

        self.register(ComponentType::Volume, |spec| match spec.params {
            ComponentParams::Volume { channels } => {
                VolumeDriver::new(channels).map(|d| Box::new(d) as Box<dyn ComponentDriver>)
            }
            _ => Err(DriverError::InvalidParams("expected volume parameters")),
        });

        self.register(ComponentType::Mixer, |spec| match spec.params {
            params @ ComponentParams::Mixer { inputs } if (1..=8).contains(&inputs) => {
                Ok(Box::new(PlainDriver { params }))
            }
            ComponentParams::Mixer { .. } => Err(DriverError::InvalidParams("mixer inputs")),
            _ => Err(DriverError::InvalidParams("expected mixer parameters")),
        });

        self.register(ComponentType::Src, |spec| match spec.params {
            params @ ComponentParams::Src {
                source_rate,
                sink_rate,
            } if source_rate != 0 && sink_rate != 0 => Ok(Box::new(PlainDriver { params })),
            ComponentParams::Src { .. } => Err(DriverError::InvalidParams("zero sample rate")),
            _ => Err(DriverError::InvalidParams("expected src parameters")),
        });

        self.register(ComponentType::Tone, |spec| match spec.params {
            params @ ComponentParams::Tone { frequency } if frequency != 0 => {
                Ok(Box::new(PlainDriver { params }))
            }
            ComponentParams::Tone { .. } => Err(DriverError::InvalidParams("zero frequency")),
            _ => Err(DriverError::InvalidParams("expected tone parameters")),
        });
    }

    /// Registers a factory, replacing any previous one for the same type.
    pub fn register(&mut self, comp_type: ComponentType, factory: DriverFactory) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.comp_type == comp_type) {
            entry.factory = factory;
        } else {
            self.entries.push(DriverEntry { comp_type, factory });
        }
    }

    /// Returns true if a factory exists for `comp_type`.
    pub fn supports(&self, comp_type: ComponentType) -> bool {
        self.entries.iter().any(|e| e.comp_type == comp_type)
    }

    /// Returns the registered component types in registration order.
    pub fn component_types(&self) -> impl Iterator<Item = ComponentType> + '_ {
        self.entries.iter().map(|e| e.comp_type)
    }

    /// Builds a driver for `spec`.
    pub fn create(&self, spec: &ComponentSpec) -> Result<Box<dyn ComponentDriver>, DriverError> {
        let comp_type = spec.params.comp_type();
        let entry = self
            .entries
            .iter()
            .find(|e| e.comp_type == comp_type)
            .ok_or(DriverError::Unsupported)?;
        (entry.factory)(spec)
    }
}

/// Driver for components with no control-plane state beyond their parameters.
struct PlainDriver {
    params: ComponentParams,
}

impl ComponentDriver for PlainDriver {
    fn comp_type(&self) -> ComponentType {
        self.params.comp_type()
    }

    fn params(&self) -> ComponentParams {
        self.params
    }
}

struct DaiDriver {
    params: ComponentParams,
    binding: DaiBinding,
    config: Option<DaiConfig>,
    shared: bool,
}

impl ComponentDriver for DaiDriver {
    fn comp_type(&self) -> ComponentType {
        ComponentType::Dai
    }

    fn params(&self) -> ComponentParams {
        self.params
    }

    fn dai_binding(&self) -> Option<DaiBinding> {
        Some(self.binding)
    }

    fn configure_dai(&mut self, config: &DaiConfig) -> Result<(), DriverError> {
        if config.rate == 0 {
            return Err(DriverError::InvalidParams("zero frame rate"));
        }
        if config.channels == 0 || config.channels > MAX_CHANNELS {
            return Err(DriverError::InvalidParams("channel count"));
        }
        self.config = Some(*config);
        Ok(())
    }

    fn dai_config(&self) -> Option<&DaiConfig> {
        self.config.as_ref()
    }

    fn make_shared(&mut self) -> Result<(), DriverError> {
        self.shared = true;
        Ok(())
    }

    fn is_shared(&self) -> bool {
        self.shared
    }
}

struct VolumeDriver {
    /// Per-channel gain, Q8.24.
    gains: Vec<i32>,
}

impl VolumeDriver {
    const UNITY: i32 = 1 << 24;

    fn new(channels: u16) -> Result<Self, DriverError> {
        if channels == 0 || channels > MAX_CHANNELS {
            return Err(DriverError::InvalidParams("channel count"));
        }
        let mut gains = Vec::new();
        gains
            .try_reserve_exact(usize::from(channels))
            .map_err(|_| DriverError::OutOfMemory)?;
        gains.resize(usize::from(channels), Self::UNITY);
        Ok(Self { gains })
    }
}

impl ComponentDriver for VolumeDriver {
    fn comp_type(&self) -> ComponentType {
        ComponentType::Volume
    }

    #[allow(clippy::cast_possible_truncation)]
    fn params(&self) -> ComponentParams {
        ComponentParams::Volume {
            channels: self.gains.len() as u16,
        }
    }
}
