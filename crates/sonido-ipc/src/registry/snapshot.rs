//! Owned copies of registry entries for callers outside the lock.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use sonido_platform::CoreId;

use super::{ComponentState, EntryKind, PipelineStatus, RegistryEntry, RegistryObject, TimeDomain};
use crate::dai::DaiConfig;
use crate::driver::{ComponentParams, ComponentType};

/// Point-in-time copy of one registry entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    /// Registry id.
    pub id: u32,
    /// Owning core.
    pub core: CoreId,
    /// Kind-specific fields.
    pub detail: SnapshotDetail,
}

/// Kind-specific part of a [`SnapshotEntry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotDetail {
    /// A component.
    Component {
        /// Owning pipeline id.
        pipeline_id: u32,
        /// Component type.
        comp_type: ComponentType,
        /// Parameters the driver runs with.
        params: ComponentParams,
        /// Lifecycle state.
        state: ComponentState,
        /// Buffers feeding the component.
        upstream: Vec<u32>,
        /// Buffers the component feeds.
        downstream: Vec<u32>,
        /// Whether the component was made shared for a cross-core link.
        is_shared: bool,
        /// Last DAI configuration applied, for DAI components.
        dai_config: Option<DaiConfig>,
    },
    /// A buffer.
    Buffer {
        /// Owning pipeline id.
        pipeline_id: u32,
        /// Storage size in bytes.
        size: usize,
        /// Memory capability flags.
        caps: u32,
        /// Producing component.
        source: Option<u32>,
        /// Consuming component.
        sink: Option<u32>,
        /// Whether the buffer links components on different cores.
        inter_core: bool,
    },
    /// A pipeline.
    Pipeline {
        /// Pipeline id.
        pipeline_id: u32,
        /// Scheduling period in microseconds.
        period_us: u32,
        /// Scheduling priority.
        priority: u32,
        /// Frames per scheduling period.
        frames_per_sched: u32,
        /// Clock that paces the pipeline.
        time_domain: TimeDomain,
        /// Completion status.
        status: PipelineStatus,
        /// Source endpoint, once complete.
        source_comp: Option<u32>,
        /// Sink endpoint, once complete.
        sink_comp: Option<u32>,
        /// Scheduling component, once complete.
        sched_comp: Option<u32>,
    },
}

impl SnapshotEntry {
    /// Returns the entry kind.
    pub fn kind(&self) -> EntryKind {
        match self.detail {
            SnapshotDetail::Component { .. } => EntryKind::Component,
            SnapshotDetail::Buffer { .. } => EntryKind::Buffer,
            SnapshotDetail::Pipeline { .. } => EntryKind::Pipeline,
        }
    }

    /// Returns the pipeline id the entry belongs to (a pipeline's own id for
    /// pipelines).
    pub fn pipeline_id(&self) -> u32 {
        match self.detail {
            SnapshotDetail::Component { pipeline_id, .. }
            | SnapshotDetail::Buffer { pipeline_id, .. }
            | SnapshotDetail::Pipeline { pipeline_id, .. } => pipeline_id,
        }
    }

    /// Returns the component state, for components.
    pub fn state(&self) -> Option<ComponentState> {
        match self.detail {
            SnapshotDetail::Component { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Returns `(source, sink)`, for buffers.
    pub fn buffer_ends(&self) -> Option<(Option<u32>, Option<u32>)> {
        match self.detail {
            SnapshotDetail::Buffer { source, sink, .. } => Some((source, sink)),
            _ => None,
        }
    }
}

impl RegistryEntry {
    pub(crate) fn snapshot(&self) -> SnapshotEntry {
        let detail = match &self.object {
            RegistryObject::Component(c) => SnapshotDetail::Component {
                pipeline_id: c.pipeline_id,
                comp_type: c.driver.comp_type(),
                params: c.driver.params(),
                state: c.state,
                upstream: c.upstream.clone(),
                downstream: c.downstream.clone(),
                is_shared: c.is_shared,
                dai_config: c.driver.dai_config().copied(),
            },
            RegistryObject::Buffer(b) => SnapshotDetail::Buffer {
                pipeline_id: b.pipeline_id,
                size: b.size(),
                caps: b.caps,
                source: b.source,
                sink: b.sink,
                inter_core: b.inter_core,
            },
            RegistryObject::Pipeline(p) => SnapshotDetail::Pipeline {
                pipeline_id: p.pipeline_id,
                period_us: p.period_us,
                priority: p.priority,
                frames_per_sched: p.frames_per_sched,
                time_domain: p.time_domain,
                status: p.status,
                source_comp: p.source_comp,
                sink_comp: p.sink_comp,
                sched_comp: p.sched_comp,
            },
        };
        SnapshotEntry {
            id: self.id,
            core: self.core,
            detail,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::registry::tests::linear_pipeline;
    use crate::registry::{EntryKind, Registry};
    use sonido_platform::HostPlatform;

    #[test]
    fn snapshot_mirrors_registry() {
        let platform = HostPlatform::new(1);
        let mut registry = Registry::new();
        linear_pipeline(&mut registry, &platform);

        let snaps: Vec<_> = registry.iter().map(|e| e.snapshot()).collect();
        let kinds: Vec<_> = snaps.iter().map(|s| s.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                EntryKind::Pipeline,
                EntryKind::Component,
                EntryKind::Buffer,
                EntryKind::Component
            ]
        );
        assert!(snaps.iter().all(|s| s.pipeline_id() == 1));
        assert_eq!(snaps[2].buffer_ends(), Some((Some(10), Some(11))));
        assert_eq!(snaps[1].state(), Some(crate::ComponentState::Ready));
        assert_eq!(snaps[0].state(), None);
    }
}
