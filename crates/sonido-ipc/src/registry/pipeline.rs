//! Pipelines: scheduling units that group components and buffers.
//!
//! Members point at their pipeline by `pipeline_id`; the pipeline only learns
//! member ids when [`complete`](Registry::complete_pipeline) resolves its
//! endpoints.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use sonido_platform::CoreId;

use super::{ComponentState, Direction, EntryKind, Registry, RegistryEntry, RegistryObject};
use crate::config::PipelineFreePolicy;
use crate::error::IpcError;

/// Clock that paces a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeDomain {
    /// Periodic timer interrupt.
    #[default]
    Timer,
    /// DMA completion interrupt of an endpoint.
    Dma,
}

/// Host request to create a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSpec {
    /// Registry id.
    pub id: u32,
    /// Pipeline id members refer to.
    pub pipeline_id: u32,
    /// Core that schedules the pipeline.
    pub core: CoreId,
    /// Scheduling period in microseconds.
    pub period_us: u32,
    /// Scheduling priority, lower runs first.
    pub priority: u32,
    /// Frames processed per scheduling period.
    pub frames_per_sched: u32,
    /// Clock that paces the pipeline.
    pub time_domain: TimeDomain,
    /// Component that drives scheduling. `None` uses the source endpoint.
    pub sched_id: Option<u32>,
}

impl PipelineSpec {
    /// Creates a 1 ms timer-driven pipeline request.
    pub fn new(id: u32, pipeline_id: u32, core: CoreId) -> Self {
        Self {
            id,
            pipeline_id,
            core,
            period_us: 1000,
            priority: 0,
            frames_per_sched: 48,
            time_domain: TimeDomain::Timer,
            sched_id: None,
        }
    }

    /// Sets the scheduling period.
    pub fn with_period_us(mut self, period_us: u32) -> Self {
        self.period_us = period_us;
        self
    }

    /// Sets the scheduling priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the time domain.
    pub fn with_time_domain(mut self, time_domain: TimeDomain) -> Self {
        self.time_domain = time_domain;
        self
    }

    /// Names the scheduling component.
    pub fn with_sched_id(mut self, sched_id: u32) -> Self {
        self.sched_id = Some(sched_id);
        self
    }
}

/// Completion status of a pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineStatus {
    /// Created; endpoints not resolved.
    #[default]
    Created,
    /// Graph validated and endpoints recorded.
    Complete,
}

/// A live pipeline.
pub(crate) struct Pipeline {
    pub(crate) pipeline_id: u32,
    pub(crate) period_us: u32,
    pub(crate) priority: u32,
    pub(crate) frames_per_sched: u32,
    pub(crate) time_domain: TimeDomain,
    pub(crate) sched_id: Option<u32>,
    pub(crate) status: PipelineStatus,
    pub(crate) source_comp: Option<u32>,
    pub(crate) sink_comp: Option<u32>,
    pub(crate) sched_comp: Option<u32>,
}

impl Pipeline {
    /// Drops every endpoint reference to `id`. A pipeline that loses an
    /// endpoint is no longer complete.
    pub(crate) fn forget_component(&mut self, id: u32) {
        let mut changed = false;
        for slot in [&mut self.source_comp, &mut self.sink_comp, &mut self.sched_comp] {
            if *slot == Some(id) {
                *slot = None;
                changed = true;
            }
        }
        if changed {
            self.status = PipelineStatus::Created;
        }
    }
}

impl Registry {
    /// Appends a pipeline.
    pub(crate) fn create_pipeline(&mut self, spec: &PipelineSpec) -> Result<(), IpcError> {
        if self.contains(spec.id) {
            return Err(IpcError::DuplicateId(spec.id));
        }
        if self.pipeline_entry(spec.pipeline_id).is_some() {
            return Err(IpcError::DuplicatePipelineId(spec.pipeline_id));
        }

        self.insert(RegistryEntry {
            id: spec.id,
            core: spec.core,
            object: RegistryObject::Pipeline(Pipeline {
                pipeline_id: spec.pipeline_id,
                period_us: spec.period_us,
                priority: spec.priority,
                frames_per_sched: spec.frames_per_sched,
                time_domain: spec.time_domain,
                sched_id: spec.sched_id,
                status: PipelineStatus::Created,
                source_comp: None,
                sink_comp: None,
                sched_comp: None,
            }),
        })
    }

    /// Returns the owning core of pipeline entry `id`.
    ///
    /// Any other kind of entry is reported as [`IpcError::UnknownId`].
    pub(crate) fn pipeline_owner(&self, id: u32) -> Result<CoreId, IpcError> {
        self.get(id)
            .filter(|e| e.kind() == EntryKind::Pipeline)
            .map(|e| e.core)
            .ok_or(IpcError::UnknownId(id))
    }

    /// Validates the pipeline graph and records its endpoints.
    pub(crate) fn complete_pipeline(&mut self, id: u32) -> Result<(), IpcError> {
        let pipeline_id = self
            .get(id)
            .and_then(RegistryEntry::as_pipeline)
            .map(|p| p.pipeline_id)
            .ok_or(IpcError::UnknownId(id))?;
        let sched_id = self
            .get(id)
            .and_then(RegistryEntry::as_pipeline)
            .and_then(|p| p.sched_id);

        let incomplete = |reason| IpcError::IncompleteGraph {
            pipeline_id,
            reason,
        };

        if self.components_in(pipeline_id).next().is_none() {
            return Err(incomplete("no components"));
        }
        let source = self
            .endpoint(pipeline_id, Direction::Upstream)
            .ok_or_else(|| incomplete("no source component"))?;
        let sink = self
            .endpoint(pipeline_id, Direction::Downstream)
            .ok_or_else(|| incomplete("no sink component"))?;

        if self
            .components_in(pipeline_id)
            .any(|(comp_id, c)| comp_id != source && c.upstream.is_empty())
        {
            return Err(incomplete("component without input buffer"));
        }
        if self.buffers_in(pipeline_id).any(|(_, b)| b.source.is_none()) {
            return Err(incomplete("buffer without producer"));
        }

        let sched = match sched_id {
            Some(sched) if self.component(sched).is_some_and(|c| c.pipeline_id == pipeline_id) => {
                sched
            }
            Some(_) => return Err(incomplete("scheduling component not in pipeline")),
            None => source,
        };

        if let Some(pipeline) = self.pipeline_mut(pipeline_id) {
            pipeline.source_comp = Some(source);
            pipeline.sink_comp = Some(sink);
            pipeline.sched_comp = Some(sched);
            pipeline.status = PipelineStatus::Complete;
        }
        Ok(())
    }

    /// Frees pipeline entry `id` according to `policy`.
    ///
    /// Under [`PipelineFreePolicy::Cascade`] every member is checked before
    /// anything is freed, so a refused cascade leaves the pipeline intact.
    pub(crate) fn free_pipeline(
        &mut self,
        id: u32,
        policy: PipelineFreePolicy,
    ) -> Result<(), IpcError> {
        let pipeline_id = self
            .get(id)
            .and_then(RegistryEntry::as_pipeline)
            .map(|p| p.pipeline_id)
            .ok_or(IpcError::UnknownId(id))?;

        let mut buffers = Vec::new();
        let mut components = Vec::new();
        for entry in self.iter().filter(|e| e.pipeline_id() == pipeline_id) {
            match entry.kind() {
                EntryKind::Buffer => buffers.push(entry.id),
                EntryKind::Component => components.push(entry.id),
                EntryKind::Pipeline => {}
            }
        }

        if !(buffers.is_empty() && components.is_empty()) {
            if policy == PipelineFreePolicy::Reject {
                return Err(IpcError::PipelineNotEmpty(pipeline_id));
            }
            let running = components.iter().find_map(|&comp_id| {
                self.component(comp_id)
                    .filter(|c| c.state != ComponentState::Ready)
                    .map(|c| (comp_id, c.state))
            });
            if let Some((id, state)) = running {
                return Err(IpcError::InvalidState { id, state });
            }
            for &buf in &buffers {
                self.free_buffer(buf)?;
            }
            for &comp_id in &components {
                self.free_component(comp_id)?;
            }
        }

        self.remove(id);
        Ok(())
    }
}
