//! Error types for IPC queue and topology operations.

use sonido_platform::{CoreId, PlatformError};
use thiserror::Error;

use crate::dai::DaiType;
use crate::driver::DriverError;
use crate::message::MessageId;
use crate::registry::{ComponentState, EntryKind};
use crate::transport::TransportError;

/// Errors returned by [`IpcContext`](crate::IpcContext) operations.
///
/// None of these are fatal to the firmware: the protocol layer turns them
/// into an error reply via [`errno()`](Self::errno).
#[derive(Debug, Error)]
pub enum IpcError {
    /// Memory for a message, payload, device, or buffer could not be allocated.
    #[error("allocation failed")]
    AllocationFailure,

    /// An entry with this id already exists.
    #[error("entry id {0} already exists")]
    DuplicateId(u32),

    /// A pipeline with this pipeline id already exists.
    #[error("pipeline id {0} is already taken")]
    DuplicatePipelineId(u32),

    /// No entry with this id exists.
    #[error("no entry with id {0}")]
    UnknownId(u32),

    /// No pipeline entry carries this pipeline id.
    #[error("no pipeline with pipeline id {0}")]
    UnknownPipeline(u32),

    /// No DAI component matched a configuration request.
    #[error("no DAI component matches {dai_type} index {dai_index}")]
    UnknownTarget {
        /// Requested DAI type.
        dai_type: DaiType,
        /// Requested DAI index.
        dai_index: u32,
    },

    /// The message handle does not refer to a live message.
    #[error("unknown message {0}")]
    UnknownMessage(MessageId),

    /// The entry exists but is of the wrong kind for this request.
    #[error("entry {id} is a {found}, not valid for this request")]
    TypeMismatch {
        /// Offending entry id.
        id: u32,
        /// Kind actually found.
        found: EntryKind,
    },

    /// The edge exists, or the buffer end it would use is already taken.
    #[error("{source_id} -> {sink_id} is already connected")]
    AlreadyConnected {
        /// Upstream end of the rejected edge.
        source_id: u32,
        /// Downstream end of the rejected edge.
        sink_id: u32,
    },

    /// The pipeline graph is missing required edges.
    #[error("pipeline {pipeline_id} is incomplete: {reason}")]
    IncompleteGraph {
        /// Pipeline id of the incomplete pipeline.
        pipeline_id: u32,
        /// What is missing.
        reason: &'static str,
    },

    /// A raw entry kind discriminant is not component, buffer, or pipeline.
    #[error("invalid entry kind discriminant {0}")]
    InvalidKind(u16),

    /// The component is not in a state that permits the request.
    #[error("component {id} is {state}, expected ready")]
    InvalidState {
        /// Component id.
        id: u32,
        /// Current state.
        state: ComponentState,
    },

    /// Both ends of the buffer are still running.
    #[error("buffer {0} has an active producer and consumer")]
    BufferInUse(u32),

    /// The pipeline still owns components or buffers.
    #[error("pipeline {0} still owns components or buffers")]
    PipelineNotEmpty(u32),

    /// The core that owns the object is disabled.
    #[error("{0} is disabled")]
    CoreDisabled(CoreId),

    /// Forwarding the request to the owning core failed.
    #[error("forward failed: {0}")]
    Forward(#[from] PlatformError),

    /// A component driver rejected the request.
    #[error("driver failure: {0}")]
    DriverFailure(#[from] DriverError),

    /// The host transport rejected a message.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

const EIO: i32 = 5;
const ENOMEM: i32 = 12;
const EACCES: i32 = 13;
const EBUSY: i32 = 16;
const ENODEV: i32 = 19;
const EINVAL: i32 = 22;

impl IpcError {
    /// Returns the negative errno reported to the host for this error.
    pub const fn errno(&self) -> i32 {
        match self {
            Self::AllocationFailure => -ENOMEM,
            Self::UnknownId(_) | Self::UnknownTarget { .. } => -ENODEV,
            Self::BufferInUse(_) => -EBUSY,
            Self::CoreDisabled(_) => -EACCES,
            Self::Forward(_) | Self::Transport(_) => -EIO,
            Self::DuplicateId(_)
            | Self::DuplicatePipelineId(_)
            | Self::UnknownPipeline(_)
            | Self::UnknownMessage(_)
            | Self::TypeMismatch { .. }
            | Self::AlreadyConnected { .. }
            | Self::IncompleteGraph { .. }
            | Self::InvalidKind(_)
            | Self::InvalidState { .. }
            | Self::PipelineNotEmpty(_)
            | Self::DriverFailure(_) => -EINVAL,
        }
    }

    /// Returns true for internal invariant violations rather than bad requests.
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::InvalidKind(_))
    }
}
