//! Audio buffers: the data edges between components.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use sonido_platform::CoreId;

use super::{Direction, Registry, RegistryEntry, RegistryObject};
use crate::error::IpcError;

/// Host request to create a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferSpec {
    /// Registry id.
    pub id: u32,
    /// Core whose memory holds the buffer.
    pub core: CoreId,
    /// Pipeline id of the owning pipeline.
    pub pipeline_id: u32,
    /// Storage size in bytes.
    pub size: usize,
    /// Memory capability flags requested by the host.
    pub caps: u32,
}

impl BufferSpec {
    /// Creates a buffer request with no capability flags.
    pub fn new(id: u32, core: CoreId, pipeline_id: u32, size: usize) -> Self {
        Self {
            id,
            core,
            pipeline_id,
            size,
            caps: 0,
        }
    }

    /// Sets the memory capability flags.
    pub fn with_caps(mut self, caps: u32) -> Self {
        self.caps = caps;
        self
    }
}

/// A live audio buffer.
pub(crate) struct AudioBuffer {
    pub(crate) pipeline_id: u32,
    pub(crate) data: Vec<u8>,
    pub(crate) caps: u32,
    /// Producing component.
    pub(crate) source: Option<u32>,
    /// Consuming component.
    pub(crate) sink: Option<u32>,
    /// Set once the buffer links components on different cores.
    pub(crate) inter_core: bool,
}

impl AudioBuffer {
    pub(crate) fn size(&self) -> usize {
        self.data.len()
    }

    /// Returns the component on the `direction` side of the buffer.
    pub(crate) fn peer(&self, direction: Direction) -> Option<u32> {
        match direction {
            Direction::Upstream => self.source,
            Direction::Downstream => self.sink,
        }
    }
}

impl Registry {
    /// Validates `spec`, allocates storage, and appends the buffer.
    ///
    /// Nothing is allocated unless validation passes.
    pub(crate) fn create_buffer(
        &mut self,
        spec: &BufferSpec,
        max_size: usize,
    ) -> Result<(), IpcError> {
        if self.contains(spec.id) {
            return Err(IpcError::DuplicateId(spec.id));
        }
        if self.pipeline_entry(spec.pipeline_id).is_none() {
            return Err(IpcError::UnknownPipeline(spec.pipeline_id));
        }
        if spec.size == 0 || spec.size > max_size {
            return Err(IpcError::AllocationFailure);
        }

        let mut data = Vec::new();
        data.try_reserve_exact(spec.size)
            .map_err(|_| IpcError::AllocationFailure)?;
        data.resize(spec.size, 0);

        self.insert(RegistryEntry {
            id: spec.id,
            core: spec.core,
            object: RegistryObject::Buffer(AudioBuffer {
                pipeline_id: spec.pipeline_id,
                data,
                caps: spec.caps,
                source: None,
                sink: None,
                inter_core: false,
            }),
        })
    }

    /// Frees a buffer unless both its producer and consumer are running.
    pub(crate) fn free_buffer(&mut self, id: u32) -> Result<(), IpcError> {
        let buffer = self.buffer(id).ok_or(IpcError::UnknownId(id))?;
        let (source, sink) = (buffer.source, buffer.sink);

        let is_active =
            |comp: Option<u32>| comp.and_then(|c| self.component(c)).is_some_and(|c| c.state.is_active());
        if is_active(source) && is_active(sink) {
            return Err(IpcError::BufferInUse(id));
        }

        if let Some(comp) = source.and_then(|c| self.component_mut(c)) {
            comp.downstream.retain(|&b| b != id);
        }
        if let Some(comp) = sink.and_then(|c| self.component_mut(c)) {
            comp.upstream.retain(|&b| b != id);
        }
        self.remove(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::linear_pipeline;
    use crate::registry::{ComponentState, PipelineSpec};
    use sonido_platform::HostPlatform;

    #[test]
    fn create_allocates_zeroed_storage() {
        let mut registry = Registry::new();
        registry
            .create_pipeline(&PipelineSpec::new(1, 1, CoreId::PRIMARY))
            .unwrap();
        registry
            .create_buffer(&BufferSpec::new(5, CoreId::PRIMARY, 1, 128).with_caps(0x4), 1024)
            .unwrap();
        let buffer = registry.buffer(5).unwrap();
        assert_eq!(buffer.size(), 128);
        assert!(buffer.data.iter().all(|&b| b == 0));
        assert_eq!(buffer.caps, 0x4);
        assert_eq!((buffer.source, buffer.sink), (None, None));
    }

    #[test]
    fn create_validates_before_allocating() {
        let mut registry = Registry::new();
        assert!(matches!(
            registry.create_buffer(&BufferSpec::new(5, CoreId::PRIMARY, 1, 128), 1024),
            Err(IpcError::UnknownPipeline(1))
        ));

        registry
            .create_pipeline(&PipelineSpec::new(1, 1, CoreId::PRIMARY))
            .unwrap();
        assert!(matches!(
            registry.create_buffer(&BufferSpec::new(1, CoreId::PRIMARY, 1, 128), 1024),
            Err(IpcError::DuplicateId(1))
        ));
        assert!(matches!(
            registry.create_buffer(&BufferSpec::new(5, CoreId::PRIMARY, 1, 0), 1024),
            Err(IpcError::AllocationFailure)
        ));
        assert!(matches!(
            registry.create_buffer(&BufferSpec::new(5, CoreId::PRIMARY, 1, 2048), 1024),
            Err(IpcError::AllocationFailure)
        ));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn free_disconnects_both_ends() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        linear_pipeline(&mut registry, &platform);

        registry.free_buffer(20).unwrap();
        assert!(registry.buffer(20).is_none());
        assert!(registry.component(10).unwrap().downstream.is_empty());
        assert!(registry.component(11).unwrap().upstream.is_empty());
    }

    #[test]
    fn free_with_both_ends_active_is_busy() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        linear_pipeline(&mut registry, &platform);
        registry.set_component_state(10, ComponentState::Active).unwrap();
        registry.set_component_state(11, ComponentState::Paused).unwrap();

        assert!(matches!(registry.free_buffer(20), Err(IpcError::BufferInUse(20))));
        assert!(registry.buffer(20).is_some());

        registry.set_component_state(11, ComponentState::Ready).unwrap();
        registry.free_buffer(20).unwrap();
        assert!(registry.component(10).unwrap().downstream.is_empty());
    }
}
