//! Component creation, state, and teardown.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, vec::Vec};

use core::fmt;

use sonido_platform::{CoreId, Platform};

use super::{Direction, Registry, RegistryEntry, RegistryObject};
use crate::dai::DaiConfig;
use crate::driver::{ComponentDriver, ComponentParams, ComponentType, DriverRegistry};
use crate::error::IpcError;

/// Host request to create a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Registry id.
    pub id: u32,
    /// Core that will run the component.
    pub core: CoreId,
    /// Pipeline id of the owning pipeline.
    pub pipeline_id: u32,
    /// Type-specific parameters; these select the driver.
    pub params: ComponentParams,
}

impl ComponentSpec {
    /// Creates a component request.
    pub fn new(id: u32, core: CoreId, pipeline_id: u32, params: ComponentParams) -> Self {
        Self {
            id,
            core,
            pipeline_id,
            params,
        }
    }

    /// Returns the component type selected by the parameters.
    pub fn comp_type(&self) -> ComponentType {
        self.params.comp_type()
    }
}

/// Lifecycle state of a component, driven by the pipeline scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ComponentState {
    /// Created, not streaming. The only state that permits teardown.
    #[default]
    Ready,
    /// Parameters applied, buffers sized.
    Prepared,
    /// Streaming.
    Active,
    /// Streaming suspended.
    Paused,
}

impl ComponentState {
    /// Returns true for every state other than [`Ready`](Self::Ready).
    pub const fn is_active(self) -> bool {
        !matches!(self, Self::Ready)
    }
}

impl fmt::Display for ComponentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ready => "ready",
            Self::Prepared => "prepared",
            Self::Active => "active",
            Self::Paused => "paused",
        })
    }
}

/// A live processing component.
pub(crate) struct ComponentDevice {
    pub(crate) pipeline_id: u32,
    pub(crate) state: ComponentState,
    /// Buffers feeding this component.
    pub(crate) upstream: Vec<u32>,
    /// Buffers this component feeds.
    pub(crate) downstream: Vec<u32>,
    pub(crate) is_shared: bool,
    pub(crate) driver: Box<dyn ComponentDriver>,
}

impl ComponentDevice {
    pub(crate) fn buffers(&self, direction: Direction) -> &[u32] {
        match direction {
            Direction::Upstream => &self.upstream,
            Direction::Downstream => &self.downstream,
        }
    }

    pub(crate) fn buffers_mut(&mut self, direction: Direction) -> &mut Vec<u32> {
        match direction {
            Direction::Upstream => &mut self.upstream,
            Direction::Downstream => &mut self.downstream,
        }
    }
}

impl Registry {
    /// Validates `spec`, builds its driver, and appends the component.
    pub(crate) fn create_component<P: Platform + ?Sized>(
        &mut self,
        spec: &ComponentSpec,
        drivers: &DriverRegistry,
        platform: &P,
    ) -> Result<(), IpcError> {
        if self.contains(spec.id) {
            return Err(IpcError::DuplicateId(spec.id));
        }
        if self.pipeline_entry(spec.pipeline_id).is_none() {
            return Err(IpcError::UnknownPipeline(spec.pipeline_id));
        }
        if !platform.is_core_enabled(spec.core) {
            return Err(IpcError::CoreDisabled(spec.core));
        }

        let driver = drivers.create(spec).map_err(|_err| {
            #[cfg(feature = "tracing")]
            tracing::error!("comp_new: {} driver for {} failed: {_err}", spec.comp_type(), spec.id);
            IpcError::AllocationFailure
        })?;

        self.insert(RegistryEntry {
            id: spec.id,
            core: spec.core,
            object: RegistryObject::Component(ComponentDevice {
                pipeline_id: spec.pipeline_id,
                state: ComponentState::Ready,
                upstream: Vec::new(),
                downstream: Vec::new(),
                is_shared: false,
                driver,
            }),
        })
    }

    /// Moves a component to `state`.
    pub(crate) fn set_component_state(
        &mut self,
        id: u32,
        state: ComponentState,
    ) -> Result<(), IpcError> {
        self.owner_of(id, super::EntryKind::Component)?;
        let comp = self.component_mut(id).ok_or(IpcError::UnknownId(id))?;
        comp.state = state;
        Ok(())
    }

    /// Frees a `Ready` component, detaching it from its buffers and pipeline.
    pub(crate) fn free_component(&mut self, id: u32) -> Result<(), IpcError> {
        let comp = self.component(id).ok_or(IpcError::UnknownId(id))?;
        if comp.state != ComponentState::Ready {
            return Err(IpcError::InvalidState {
                id,
                state: comp.state,
            });
        }
        let pipeline_id = comp.pipeline_id;

        let Some(entry) = self.remove(id) else {
            return Err(IpcError::UnknownId(id));
        };
        if let RegistryObject::Component(comp) = &entry.object {
            for &buf in &comp.upstream {
                if let Some(buffer) = self.buffer_mut(buf) {
                    buffer.sink = None;
                }
            }
            for &buf in &comp.downstream {
                if let Some(buffer) = self.buffer_mut(buf) {
                    buffer.source = None;
                }
            }
        }

        if let Some(pipeline) = self.pipeline_mut(pipeline_id) {
            pipeline.forget_component(id);
        }
        Ok(())
    }

    /// Applies `config` to every matching DAI owned by `current` and records
    /// which other cores own matching DAIs.
    ///
    /// Stops at the first driver error; DAIs configured before it keep the
    /// new configuration.
    pub(crate) fn configure_dai(
        &mut self,
        config: &DaiConfig,
        current: CoreId,
    ) -> Result<DaiMatches, IpcError> {
        let mut matches = DaiMatches::default();
        for entry in &mut self.entries {
            let RegistryObject::Component(comp) = &mut entry.object else {
                continue;
            };
            if !comp.driver.dai_binding().is_some_and(|b| b.matches(config)) {
                continue;
            }
            if entry.core != current {
                let bit = 1_u32
                    .checked_shl(u32::from(entry.core.index()))
                    .ok_or(IpcError::CoreDisabled(entry.core))?;
                matches.remote |= bit;
                continue;
            }
            comp.driver.configure_dai(config).map_err(|err| {
                #[cfg(feature = "tracing")]
                tracing::error!("dai_config: component {} rejected config: {err}", entry.id);
                IpcError::DriverFailure(err)
            })?;
            matches.configured += 1;
        }
        Ok(matches)
    }
}

/// Result of matching a DAI configuration against the registry.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DaiMatches {
    /// DAIs configured on the calling core.
    pub(crate) configured: usize,
    /// Bit `n` set: core `n` owns a matching DAI.
    pub(crate) remote: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::linear_pipeline;
    use crate::registry::{ConnectSpec, EntryKind, PipelineSpec, PipelineStatus};
    use sonido_platform::HostPlatform;

    fn tone(id: u32, pipeline_id: u32) -> ComponentSpec {
        ComponentSpec::new(id, CoreId::PRIMARY, pipeline_id, ComponentParams::Tone { frequency: 1000 })
    }

    #[test]
    fn create_requires_pipeline() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        let err = registry
            .create_component(&tone(10, 1), &DriverRegistry::new(), &platform)
            .unwrap_err();
        assert!(matches!(err, IpcError::UnknownPipeline(1)));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn create_rejects_duplicate_id_across_kinds() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        registry
            .create_pipeline(&PipelineSpec::new(1, 1, CoreId::PRIMARY))
            .unwrap();
        let err = registry
            .create_component(&tone(1, 1), &DriverRegistry::new(), &platform)
            .unwrap_err();
        assert!(matches!(err, IpcError::DuplicateId(1)));
    }

    #[test]
    fn create_on_disabled_core_fails() {
        let platform = HostPlatform::new(2);
        platform.set_core_enabled(CoreId::new(1), false);
        let mut registry = Registry::new();
        registry
            .create_pipeline(&PipelineSpec::new(1, 1, CoreId::PRIMARY))
            .unwrap();
        let spec = ComponentSpec::new(10, CoreId::new(1), 1, ComponentParams::Volume { channels: 2 });
        let err = registry
            .create_component(&spec, &DriverRegistry::new(), &platform)
            .unwrap_err();
        assert!(matches!(err, IpcError::CoreDisabled(core) if core == CoreId::new(1)));
    }

    #[test]
    fn driver_failure_is_allocation_failure() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        registry
            .create_pipeline(&PipelineSpec::new(1, 1, CoreId::PRIMARY))
            .unwrap();
        let spec = ComponentSpec::new(10, CoreId::PRIMARY, 1, ComponentParams::Volume { channels: 0 });
        let err = registry
            .create_component(&spec, &DriverRegistry::new(), &platform)
            .unwrap_err();
        assert!(matches!(err, IpcError::AllocationFailure));
        assert!(!registry.contains(10));
    }

    #[test]
    fn free_requires_ready_state() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        linear_pipeline(&mut registry, &platform);

        registry.set_component_state(11, ComponentState::Active).unwrap();
        assert!(matches!(
            registry.free_component(11),
            Err(IpcError::InvalidState { id: 11, state: ComponentState::Active })
        ));

        registry.set_component_state(11, ComponentState::Ready).unwrap();
        registry.free_component(11).unwrap();
        assert!(!registry.contains(11));
    }

    #[test]
    fn free_disconnects_buffers() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        linear_pipeline(&mut registry, &platform);

        registry.free_component(10).unwrap();
        let buffer = registry.buffer(20).unwrap();
        assert_eq!(buffer.source, None);
        assert_eq!(buffer.sink, Some(11));

        registry.free_component(11).unwrap();
        assert_eq!(registry.buffer(20).unwrap().sink, None);
    }

    #[test]
    fn free_clears_pipeline_endpoints() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        linear_pipeline(&mut registry, &platform);
        registry.complete_pipeline(1).unwrap();

        registry.free_component(10).unwrap();
        let pipeline = registry.get(1).and_then(RegistryEntry::as_pipeline).unwrap();
        assert_eq!(pipeline.source_comp, None);
        assert_eq!(pipeline.sched_comp, None);
        assert_eq!(pipeline.sink_comp, Some(11));
        assert_eq!(pipeline.status, PipelineStatus::Created);
    }

    #[test]
    fn set_state_rejects_non_component() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        linear_pipeline(&mut registry, &platform);
        assert!(matches!(
            registry.set_component_state(20, ComponentState::Active),
            Err(IpcError::TypeMismatch { id: 20, found: EntryKind::Buffer })
        ));
    }

    #[test]
    fn dai_config_matches_binding_and_core() {
        use crate::dai::DaiType;
        use crate::driver::StreamDirection;

        let platform = HostPlatform::new(2);
        let drivers = DriverRegistry::new();
        let mut registry = Registry::new();
        registry
            .create_pipeline(&PipelineSpec::new(1, 1, CoreId::PRIMARY))
            .unwrap();
        for (id, core, index) in [(10, 0, 0), (11, 0, 1), (12, 1, 0)] {
            let params = ComponentParams::Dai {
                direction: StreamDirection::Playback,
                dai_type: DaiType::Ssp,
                dai_index: index,
            };
            registry
                .create_component(&ComponentSpec::new(id, CoreId::new(core), 1, params), &drivers, &platform)
                .unwrap();
        }

        let config = DaiConfig::new(DaiType::Ssp, 0).with_rate(16000);
        let matches = registry.configure_dai(&config, CoreId::PRIMARY).unwrap();
        assert_eq!(matches.configured, 1);
        assert_eq!(matches.remote, 0b10);
        assert_eq!(registry.component(10).unwrap().driver.dai_config(), Some(&config));
        assert!(registry.component(11).unwrap().driver.dai_config().is_none());
        assert!(registry.component(12).unwrap().driver.dai_config().is_none());

        let none = registry
            .configure_dai(&DaiConfig::new(DaiType::Dmic, 0), CoreId::PRIMARY)
            .unwrap();
        assert_eq!(none, DaiMatches::default());
    }

    #[test]
    fn dai_config_driver_error_aborts() {
        use crate::dai::DaiType;
        use crate::driver::{DriverError, StreamDirection};

        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        registry
            .create_pipeline(&PipelineSpec::new(1, 1, CoreId::PRIMARY))
            .unwrap();
        let params = ComponentParams::Dai {
            direction: StreamDirection::Capture,
            dai_type: DaiType::Dmic,
            dai_index: 0,
        };
        registry
            .create_component(&ComponentSpec::new(10, CoreId::PRIMARY, 1, params), &DriverRegistry::new(), &platform)
            .unwrap();

        let bad = DaiConfig::new(DaiType::Dmic, 0).with_rate(0);
        assert!(matches!(
            registry.configure_dai(&bad, CoreId::PRIMARY),
            Err(IpcError::DriverFailure(DriverError::InvalidParams(_)))
        ));
    }

    #[test]
    fn state_display() {
        assert_eq!(ComponentState::Paused.to_string(), "paused");
        assert!(ComponentState::Prepared.is_active());
        assert!(!ComponentState::Ready.is_active());
    }

    #[test]
    fn reconnect_after_free() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        linear_pipeline(&mut registry, &platform);
        registry.free_component(10).unwrap();
        registry
            .create_component(&tone(12, 1), &DriverRegistry::new(), &platform)
            .unwrap();
        registry.connect(ConnectSpec::new(12, 20), &platform).unwrap();
        assert_eq!(registry.buffer(20).unwrap().source, Some(12));
    }
}
