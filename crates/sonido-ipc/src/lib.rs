//! Sonido IPC - Host message queue and audio topology registry
//!
//! This crate is the control plane of multi-core sonido DSP firmware. The host
//! builds audio topologies by sending requests; the firmware answers through a
//! bounded message queue. All state lives in one [`IpcContext`] shared by every
//! core and by interrupt handlers.
//!
//! # Core Abstractions
//!
//! ## Message Queue
//!
//! - [`IpcContext::create_message`] / [`IpcContext::free_message`] - Pooled
//!   outbound messages addressed by generation-checked [`MessageId`] handles
//! - [`IpcContext::send_message`] - FIFO queueing with a high-priority bypass
//! - [`IpcContext::drain_pending`] - Feeds the [`HostTransport`] one message
//!   at a time
//!
//! ## Topology Registry
//!
//! - [`ComponentSpec`] / [`BufferSpec`] / [`PipelineSpec`] - Host requests that
//!   create registry entries
//! - [`ConnectSpec`] - Component-to-buffer and buffer-to-component edges
//! - [`IpcContext::complete_pipeline`] - Graph validation and endpoint discovery
//! - [`SnapshotEntry`] - Owned copies of entries for inspection
//!
//! ## Multi-Core Routing
//!
//! Every entry is owned by one core. Requests against an entry owned elsewhere
//! are forwarded to that core ([`Outcome::Forwarded`]); buffers linking two
//! cores are kept coherent through [`sonido_platform::Platform`] cache
//! operations.
//!
//! ## Component Drivers
//!
//! - [`ComponentDriver`] - Per-type behavior behind each component
//! - [`DriverRegistry`] - Factory table keyed by [`ComponentType`]
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible (requires `alloc`). Disable the default
//! features in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sonido-ipc = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use sonido_ipc::{
//!     BufferSpec, ComponentParams, ComponentSpec, ConnectSpec, IpcConfig, IpcContext,
//!     PipelineSpec, RecordingTransport,
//! };
//! use sonido_platform::{CoreId, HostPlatform};
//!
//! let (transport, probe) = RecordingTransport::new();
//! let ctx = IpcContext::new(HostPlatform::new(1), transport, IpcConfig::default())?;
//!
//! ctx.create_pipeline(&PipelineSpec::new(1, 1, CoreId::PRIMARY))?;
//! ctx.create_component(&ComponentSpec::new(
//!     10,
//!     CoreId::PRIMARY,
//!     1,
//!     ComponentParams::Tone { frequency: 440 },
//! ))?;
//! ctx.create_buffer(&BufferSpec::new(20, CoreId::PRIMARY, 1, 256))?;
//! ctx.create_component(&ComponentSpec::new(
//!     11,
//!     CoreId::PRIMARY,
//!     1,
//!     ComponentParams::Volume { channels: 2 },
//! ))?;
//! ctx.connect(ConnectSpec::new(10, 20))?;
//! ctx.connect(ConnectSpec::new(20, 11))?;
//! ctx.complete_pipeline(1)?;
//!
//! let reply = ctx.create_message(0x8000_0000, 4)?;
//! ctx.send_message(reply, Some(&[0, 0, 0, 0]), false)?;
//! ctx.drain_pending()?;
//! assert_eq!(probe.sent_headers(), vec![0x8000_0000]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Design Principles
//!
//! - **One lock**: every operation takes the context lock with interrupts
//!   disabled and commits shared state before releasing it
//! - **Fallible allocation**: allocation failure is an error reply, never a panic
//! - **Id-based graph**: components and buffers reference each other by id, so
//!   there are no cyclic ownership links

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod config;
pub mod context;
pub mod dai;
pub mod driver;
pub mod error;
pub mod lock;
pub mod message;
pub mod queue;
pub mod registry;
pub mod transport;

pub use config::{ConfigError, IpcConfig, PipelineFreePolicy};
pub use context::{DaiConfigReport, Delivery, IpcContext, Outcome};
pub use dai::{DaiBinding, DaiConfig, DaiFormat, DaiType};
pub use driver::{
    ComponentDriver, ComponentParams, ComponentType, DriverError, DriverFactory, DriverRegistry,
    MAX_CHANNELS, StreamDirection,
};
pub use error::IpcError;
pub use lock::{IpcGuard, IpcLock};
pub use message::{Message, MessageId, MessagePool};
pub use queue::PendingQueue;
pub use registry::{
    BufferSpec, ComponentSpec, ComponentState, ConnectSpec, Direction, EntryKind, PipelineSpec,
    PipelineStatus, SnapshotDetail, SnapshotEntry, TimeDomain,
};
#[cfg(feature = "std")]
pub use transport::{RecordedMessage, RecordingTransport, TransportProbe};
pub use transport::{HostTransport, TransportError};
