//! Topology registry: components, buffers, and pipelines keyed by host id.
//!
//! The host assigns every object a 32-bit id from a single number space, so
//! the registry is one insertion-ordered table. Each [`RegistryEntry`] records
//! the owning core and a [`RegistryObject`] holding the object itself.
//!
//! Relationships are ids, never pointers:
//!
//! ```text
//!   Pipeline(pipeline_id = 1)      <- members name it by pipeline_id
//!        ^             ^
//!        |             |
//!   Component 10 -> Buffer 20 -> Component 11
//!   downstream=[20]  source=10    upstream=[20]
//!                    sink=11
//! ```
//!
//! A component lists the buffers feeding it (`upstream`) and the buffers it
//! feeds (`downstream`); a buffer names at most one producing and one
//! consuming component. Freeing either side clears the other's reference, so
//! no id in the table refers to an absent entry.
//!
//! Everything here runs on `&mut Registry` with the IPC lock already held.
//! Locking, core routing, and logging live in [`IpcContext`](crate::IpcContext).

mod buffer;
mod component;
mod connect;
mod pipeline;
mod snapshot;

pub use buffer::BufferSpec;
pub use component::{ComponentSpec, ComponentState};
pub use connect::ConnectSpec;
pub use pipeline::{PipelineSpec, PipelineStatus, TimeDomain};
pub use snapshot::{SnapshotDetail, SnapshotEntry};

pub(crate) use buffer::AudioBuffer;
pub(crate) use component::ComponentDevice;
pub(crate) use pipeline::Pipeline;

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::fmt;

use sonido_platform::CoreId;

use crate::error::IpcError;

/// Wire discriminant of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum EntryKind {
    /// Processing component.
    Component = 1,
    /// Audio buffer.
    Buffer = 2,
    /// Pipeline.
    Pipeline = 3,
}

impl EntryKind {
    /// Decodes a wire discriminant.
    ///
    /// Anything other than 1, 2, or 3 is an internal invariant violation and
    /// is reported as [`IpcError::InvalidKind`].
    pub fn from_raw(raw: u16) -> Result<Self, IpcError> {
        match raw {
            1 => Ok(Self::Component),
            2 => Ok(Self::Buffer),
            3 => Ok(Self::Pipeline),
            other => {
                #[cfg(feature = "tracing")]
                tracing::error!("entry_kind: invalid discriminant {other}");
                Err(IpcError::InvalidKind(other))
            }
        }
    }

    /// Returns the wire discriminant.
    pub const fn raw(self) -> u16 {
        self as u16
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Component => "component",
            Self::Buffer => "buffer",
            Self::Pipeline => "pipeline",
        })
    }
}

/// Side of a component, as seen along the data flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Towards the producers (the buffers feeding a component).
    Upstream,
    /// Towards the consumers (the buffers a component feeds).
    Downstream,
}

/// The object held by a registry entry.
pub(crate) enum RegistryObject {
    Component(ComponentDevice),
    Buffer(AudioBuffer),
    Pipeline(Pipeline),
}

/// One row of the registry.
pub(crate) struct RegistryEntry {
    pub(crate) id: u32,
    pub(crate) core: CoreId,
    pub(crate) object: RegistryObject,
}

impl RegistryEntry {
    pub(crate) fn kind(&self) -> EntryKind {
        match self.object {
            RegistryObject::Component(_) => EntryKind::Component,
            RegistryObject::Buffer(_) => EntryKind::Buffer,
            RegistryObject::Pipeline(_) => EntryKind::Pipeline,
        }
    }

    /// Pipeline id the entry belongs to (or, for a pipeline, its own).
    pub(crate) fn pipeline_id(&self) -> u32 {
        match &self.object {
            RegistryObject::Component(c) => c.pipeline_id,
            RegistryObject::Buffer(b) => b.pipeline_id,
            RegistryObject::Pipeline(p) => p.pipeline_id,
        }
    }

    pub(crate) fn as_component(&self) -> Option<&ComponentDevice> {
        match &self.object {
            RegistryObject::Component(c) => Some(c),
            _ => None,
        }
    }

    pub(crate) fn as_buffer(&self) -> Option<&AudioBuffer> {
        match &self.object {
            RegistryObject::Buffer(b) => Some(b),
            _ => None,
        }
    }

    pub(crate) fn as_pipeline(&self) -> Option<&Pipeline> {
        match &self.object {
            RegistryObject::Pipeline(p) => Some(p),
            _ => None,
        }
    }
}

/// Insertion-ordered table of topology objects.
#[derive(Default)]
pub(crate) struct Registry {
    entries: Vec<RegistryEntry>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RegistryEntry> {
        self.entries.iter()
    }

    pub(crate) fn get(&self, id: u32) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub(crate) fn contains(&self, id: u32) -> bool {
        self.get(id).is_some()
    }

    /// Returns the owning core of `id`, requiring it to be of `kind`.
    pub(crate) fn owner_of(&self, id: u32, kind: EntryKind) -> Result<CoreId, IpcError> {
        let entry = self.get(id).ok_or(IpcError::UnknownId(id))?;
        if entry.kind() != kind {
            return Err(IpcError::TypeMismatch {
                id,
                found: entry.kind(),
            });
        }
        Ok(entry.core)
    }

    /// Appends an entry without aborting on allocation failure.
    fn insert(&mut self, entry: RegistryEntry) -> Result<(), IpcError> {
        self.entries
            .try_reserve(1)
            .map_err(|_| IpcError::AllocationFailure)?;
        self.entries.push(entry);
        Ok(())
    }

    /// Removes an entry, keeping the order of the rest.
    fn remove(&mut self, id: u32) -> Option<RegistryEntry> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos))
    }

    pub(crate) fn component(&self, id: u32) -> Option<&ComponentDevice> {
        self.get(id).and_then(RegistryEntry::as_component)
    }

    fn component_mut(&mut self, id: u32) -> Option<&mut ComponentDevice> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .and_then(|e| match &mut e.object {
                RegistryObject::Component(c) => Some(c),
                _ => None,
            })
    }

    pub(crate) fn buffer(&self, id: u32) -> Option<&AudioBuffer> {
        self.get(id).and_then(RegistryEntry::as_buffer)
    }

    fn buffer_mut(&mut self, id: u32) -> Option<&mut AudioBuffer> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .and_then(|e| match &mut e.object {
                RegistryObject::Buffer(b) => Some(b),
                _ => None,
            })
    }

    /// Finds the pipeline entry carrying `pipeline_id`.
    pub(crate) fn pipeline_entry(&self, pipeline_id: u32) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| {
            e.as_pipeline()
                .is_some_and(|p| p.pipeline_id == pipeline_id)
        })
    }

    fn pipeline_mut(&mut self, pipeline_id: u32) -> Option<&mut Pipeline> {
        self.entries.iter_mut().find_map(|e| match &mut e.object {
            RegistryObject::Pipeline(p) if p.pipeline_id == pipeline_id => Some(p),
            _ => None,
        })
    }

    /// First entry of `kind` in `pipeline_id`, in insertion order.
    pub(crate) fn first_in_pipeline(
        &self,
        kind: EntryKind,
        pipeline_id: u32,
    ) -> Option<&RegistryEntry> {
        self.entries
            .iter()
            .find(|e| e.kind() == kind && e.pipeline_id() == pipeline_id)
    }

    /// Components belonging to `pipeline_id`, in insertion order.
    fn components_in(&self, pipeline_id: u32) -> impl Iterator<Item = (u32, &ComponentDevice)> {
        self.entries.iter().filter_map(move |e| {
            e.as_component()
                .filter(|c| c.pipeline_id == pipeline_id)
                .map(|c| (e.id, c))
        })
    }

    /// Buffers belonging to `pipeline_id`, in insertion order.
    fn buffers_in(&self, pipeline_id: u32) -> impl Iterator<Item = (u32, &AudioBuffer)> {
        self.entries.iter().filter_map(move |e| {
            e.as_buffer()
                .filter(|b| b.pipeline_id == pipeline_id)
                .map(|b| (e.id, b))
        })
    }

    /// Finds the component at the `direction` end of a pipeline.
    ///
    /// The first pass looks for a component where the graph stops on that
    /// side: no buffers there, or only buffers with no component beyond them.
    /// A pipeline joined to another one has none, so the second pass looks
    /// for a component whose first buffer on that side leads into a different
    /// pipeline.
    pub(crate) fn endpoint(&self, pipeline_id: u32, direction: Direction) -> Option<u32> {
        if let Some((id, _)) = self.components_in(pipeline_id).find(|(_, c)| {
            c.buffers(direction)
                .iter()
                .all(|&buf| self.buffer(buf).is_none_or(|b| b.peer(direction).is_none()))
        }) {
            return Some(id);
        }

        self.components_in(pipeline_id)
            .find(|(_, c)| {
                c.buffers(direction)
                    .first()
                    .and_then(|&buf| self.buffer(buf))
                    .and_then(|b| b.peer(direction))
                    .and_then(|peer| self.component(peer))
                    .is_some_and(|peer| peer.pipeline_id != pipeline_id)
            })
            .map(|(id, _)| id)
    }
}
