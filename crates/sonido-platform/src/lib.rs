//! Sonido Platform - Platform abstraction layer for multi-core audio DSPs
//!
//! This crate provides the primitives the firmware control plane consumes from
//! the board support layer. Nothing here knows about audio graphs or IPC
//! messages; it only describes the machine.
//!
//! # Core Abstractions
//!
//! ## Machine Topology
//!
//! - [`CoreId`] - Identifier of one DSP core
//! - [`Platform::current_core`] / [`Platform::is_core_enabled`] - Who am I, who is up
//! - [`Platform::forward_to_core`] - Inter-core (IDC) request forwarding
//!
//! ## Interrupt Control
//!
//! - [`IrqState`] - Opaque saved interrupt state
//! - [`Platform::irq_save`] / [`Platform::irq_restore`] - Disable and restore
//!   interrupts on the calling core
//!
//! ## Cache Coherency
//!
//! - [`SharedRegion`] - Address range of a structure living in shared memory
//! - [`Platform::commit`] - Make a just-written structure visible to other cores
//! - [`Platform::invalidate`] - Drop stale cache lines before reading
//!
//! ## Host Simulation
//!
//! - [`HostPlatform`] (`std` only) - Instrumented implementation for simulation
//!   and tests. Counts every commit and interrupt transition so callers can
//!   assert lock discipline.
//!
//! # no_std Support
//!
//! This crate is `no_std` compatible for firmware builds.
//! Disable the default `std` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! sonido-platform = { version = "0.1", default-features = false }
//! ```
//!
//! # Example
//!
//! ```rust
//! use sonido_platform::{CoreId, HostPlatform, Platform, SharedRegion};
//!
//! let platform = HostPlatform::new(2);
//! let value = 42_u32;
//!
//! let irq = platform.irq_save();
//! // ... mutate shared state ...
//! platform.commit(SharedRegion::of(&value));
//! platform.irq_restore(irq);
//!
//! assert_eq!(platform.current_core(), CoreId::PRIMARY);
//! assert_eq!(platform.stats().commits, 1);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
pub mod host;
pub mod region;

#[cfg(feature = "std")]
pub use host::{HostPlatform, PlatformStats};
pub use region::SharedRegion;

use thiserror::Error;

/// Identifier of a DSP core.
///
/// Core 0 is the primary core: it boots first, owns the host mailbox, and
/// forwards requests for objects placed on secondary cores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CoreId(u16);

impl CoreId {
    /// The primary core.
    pub const PRIMARY: Self = Self(0);

    /// Creates a core identifier from its index.
    #[inline]
    pub const fn new(index: u16) -> Self {
        Self(index)
    }

    /// Returns the core index.
    #[inline]
    pub const fn index(self) -> u16 {
        self.0
    }

    /// Returns true for the primary core.
    #[inline]
    pub const fn is_primary(self) -> bool {
        self.0 == 0
    }
}

impl core::fmt::Display for CoreId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "core#{}", self.0)
    }
}

/// Interrupt state saved by [`Platform::irq_save`].
///
/// The value is meaningful only to the platform that produced it and must be
/// handed back to [`Platform::irq_restore`] on the same core.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use = "saved interrupt state must be restored"]
pub struct IrqState(u32);

impl IrqState {
    /// Wraps a raw platform interrupt mask.
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw platform interrupt mask.
    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Errors reported by platform primitives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PlatformError {
    /// The target core is powered down or not present.
    #[error("{0} is disabled")]
    CoreDisabled(CoreId),
    /// The inter-core message could not be delivered.
    #[error("IDC message to {core} failed with status {status}")]
    IdcFailed {
        /// Target core.
        core: CoreId,
        /// Platform status code.
        status: i32,
    },
}

/// Board support primitives consumed by the firmware control plane.
///
/// Implementations must be callable from both task and interrupt context and
/// must never block: every method is a bounded, non-suspending operation.
pub trait Platform: Send + Sync {
    /// Disables interrupts on the calling core and returns the previous state.
    fn irq_save(&self) -> IrqState;

    /// Restores an interrupt state returned by [`irq_save`](Self::irq_save).
    fn irq_restore(&self, state: IrqState);

    /// Writes back dirty cache lines covering `region` to shared memory.
    fn writeback(&self, region: SharedRegion);

    /// Invalidates cache lines covering `region` so the next read hits memory.
    fn invalidate(&self, region: SharedRegion);

    /// Writes back and then invalidates `region`.
    fn writeback_invalidate(&self, region: SharedRegion) {
        self.writeback(region);
        self.invalidate(region);
    }

    /// Commits a structure written under a lock so other cores observe it.
    ///
    /// Must be called before the protecting lock is released.
    fn commit(&self, region: SharedRegion) {
        self.writeback_invalidate(region);
    }

    /// Returns the core executing the caller.
    fn current_core(&self) -> CoreId;

    /// Returns the number of cores on this platform.
    fn core_count(&self) -> u16;

    /// Returns true when `core` exists and is powered up.
    fn is_core_enabled(&self, core: CoreId) -> bool;

    /// Returns true when `core` is the calling core.
    fn is_current(&self, core: CoreId) -> bool {
        self.current_core() == core
    }

    /// Forwards the request being processed to `core` and waits for its reply.
    ///
    /// The caller must not hold any lock the target core needs.
    fn forward_to_core(&self, core: CoreId) -> Result<(), PlatformError>;
}
