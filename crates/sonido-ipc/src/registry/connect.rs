//! Graph connector: component-to-buffer and buffer-to-component edges.

use sonido_platform::{CoreId, Platform, SharedRegion};

use super::{Direction, EntryKind, Registry};
use crate::error::IpcError;

/// Host request to connect two registry entries.
///
/// Exactly one end must be a component and the other a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectSpec {
    /// Upstream entry id.
    pub source_id: u32,
    /// Downstream entry id.
    pub sink_id: u32,
}

impl ConnectSpec {
    /// Creates a connect request for `source_id -> sink_id`.
    pub fn new(source_id: u32, sink_id: u32) -> Self {
        Self { source_id, sink_id }
    }
}

/// A validated connect request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConnectPlan {
    pub(crate) component: u32,
    pub(crate) buffer: u32,
    /// Side of the component the buffer attaches to.
    pub(crate) direction: Direction,
    /// Core that must perform the connection.
    pub(crate) owner: CoreId,
}

impl Registry {
    /// Resolves both ends of `spec` and checks the kinds.
    pub(crate) fn plan_connect(&self, spec: ConnectSpec) -> Result<ConnectPlan, IpcError> {
        let source = self
            .get(spec.source_id)
            .ok_or(IpcError::UnknownId(spec.source_id))?;
        let sink = self
            .get(spec.sink_id)
            .ok_or(IpcError::UnknownId(spec.sink_id))?;

        let (comp, buffer, direction) = match (source.kind(), sink.kind()) {
            (EntryKind::Component, EntryKind::Buffer) => (source, sink, Direction::Downstream),
            (EntryKind::Buffer, EntryKind::Component) => (sink, source, Direction::Upstream),
            (EntryKind::Pipeline, _) => {
                return Err(IpcError::TypeMismatch {
                    id: spec.source_id,
                    found: EntryKind::Pipeline,
                });
            }
            (_, found) => {
                return Err(IpcError::TypeMismatch {
                    id: spec.sink_id,
                    found,
                });
            }
        };

        Ok(ConnectPlan {
            component: comp.id,
            buffer: buffer.id,
            direction,
            owner: comp.core,
        })
    }

    /// Links the buffer and component named by `spec`.
    ///
    /// A buffer joining components on different cores is invalidated before
    /// it is touched and written back after, and the component is switched
    /// to shared mode.
    pub(crate) fn connect<P: Platform + ?Sized>(
        &mut self,
        spec: ConnectSpec,
        platform: &P,
    ) -> Result<(), IpcError> {
        let plan = self.plan_connect(spec)?;

        let buffer = self.buffer(plan.buffer).ok_or(IpcError::UnknownId(plan.buffer))?;
        if buffer.peer(plan.direction.opposite()).is_some() {
            return Err(IpcError::AlreadyConnected {
                source_id: spec.source_id,
                sink_id: spec.sink_id,
            });
        }
        let cross_core = self
            .get(plan.buffer)
            .is_some_and(|b| b.core != plan.owner);

        let comp = self
            .component_mut(plan.component)
            .ok_or(IpcError::UnknownId(plan.component))?;
        let list = comp.buffers_mut(plan.direction);
        list.try_reserve(1)
            .map_err(|_| IpcError::AllocationFailure)?;

        if cross_core && !comp.is_shared {
            comp.driver.make_shared().map_err(|_err| {
                #[cfg(feature = "tracing")]
                tracing::error!("connect: make_shared on {} failed: {_err}", plan.component);
                IpcError::AllocationFailure
            })?;
            comp.is_shared = true;
        }
        comp.buffers_mut(plan.direction).push(plan.buffer);

        let buffer = self
            .buffer_mut(plan.buffer)
            .ok_or(IpcError::UnknownId(plan.buffer))?;
        if cross_core {
            platform.invalidate(SharedRegion::of(&*buffer));
            buffer.inter_core = true;
        }
        match plan.direction {
            Direction::Downstream => buffer.source = Some(plan.component),
            Direction::Upstream => buffer.sink = Some(plan.component),
        }
        if cross_core {
            platform.writeback_invalidate(SharedRegion::of(&*buffer));
        }
        Ok(())
    }
}

impl Direction {
    /// Returns the other side.
    pub const fn opposite(self) -> Self {
        match self {
            Self::Upstream => Self::Downstream,
            Self::Downstream => Self::Upstream,
        }
    }
}
