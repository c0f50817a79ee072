//! Instrumented host implementation of [`Platform`].
//!
//! [`HostPlatform`] runs the firmware control plane on a development machine.
//! Each OS thread plays one DSP core (select it with
//! [`enter_core()`](HostPlatform::enter_core)); interrupt masking is tracked
//! per thread, and every cache operation and forward is counted so tests can
//! assert that locks commit before they release.

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

use crate::{CoreId, IrqState, Platform, PlatformError, SharedRegion};

/// Maximum number of cores a host simulation can model.
pub const MAX_HOST_CORES: usize = 8;

std::thread_local! {
    static CURRENT_CORE: Cell<u16> = const { Cell::new(0) };
    static IRQ_DEPTH: Cell<u32> = const { Cell::new(0) };
}

/// Counter snapshot returned by [`HostPlatform::stats()`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlatformStats {
    /// Number of [`Platform::commit`] calls.
    pub commits: usize,
    /// Number of writebacks (including those issued by commits).
    pub writebacks: usize,
    /// Number of invalidates (including those issued by commits).
    pub invalidates: usize,
    /// Number of [`Platform::irq_save`] calls.
    pub irq_saves: usize,
    /// Number of [`Platform::irq_restore`] calls.
    pub irq_restores: usize,
    /// Number of successful forwards to another core.
    pub forwards: usize,
}

/// Simulated multi-core platform.
pub struct HostPlatform {
    core_count: u16,
    /// Bit `n` set = core `n` enabled.
    enabled: AtomicU32,
    fail_forwards: AtomicBool,
    commits: AtomicUsize,
    writebacks: AtomicUsize,
    invalidates: AtomicUsize,
    irq_saves: AtomicUsize,
    irq_restores: AtomicUsize,
    forwards: [AtomicUsize; MAX_HOST_CORES],
}

impl HostPlatform {
    /// Creates a platform with `core_count` cores, all enabled.
    ///
    /// `core_count` is clamped to `1..=MAX_HOST_CORES`.
    pub fn new(core_count: u16) -> Self {
        let core_count = core_count.clamp(1, MAX_HOST_CORES as u16);
        Self {
            core_count,
            enabled: AtomicU32::new((1_u32 << core_count) - 1),
            fail_forwards: AtomicBool::new(false),
            commits: AtomicUsize::new(0),
            writebacks: AtomicUsize::new(0),
            invalidates: AtomicUsize::new(0),
            irq_saves: AtomicUsize::new(0),
            irq_restores: AtomicUsize::new(0),
            forwards: core::array::from_fn(|_| AtomicUsize::new(0)),
        }
    }

    /// Makes the calling thread act as `core` for subsequent calls.
    pub fn enter_core(core: CoreId) {
        CURRENT_CORE.with(|c| c.set(core.index()));
    }

    /// Returns true while the calling thread has interrupts disabled.
    pub fn irqs_disabled() -> bool {
        IRQ_DEPTH.with(|d| d.get() > 0)
    }

    /// Powers a core up or down.
    pub fn set_core_enabled(&self, core: CoreId, enabled: bool) {
        if core.index() >= self.core_count {
            return;
        }
        let bit = 1_u32 << core.index();
        if enabled {
            self.enabled.fetch_or(bit, Ordering::SeqCst);
        } else {
            self.enabled.fetch_and(!bit, Ordering::SeqCst);
        }
    }

    /// Makes every subsequent forward fail as if the IDC mailbox timed out.
    pub fn set_forward_failure(&self, fail: bool) {
        self.fail_forwards.store(fail, Ordering::SeqCst);
    }

    /// Returns how many requests were forwarded to `core`.
    pub fn forwards_to(&self, core: CoreId) -> usize {
        self.forwards
            .get(core.index() as usize)
            .map_or(0, |c| c.load(Ordering::SeqCst))
    }

    /// Returns a snapshot of all counters.
    pub fn stats(&self) -> PlatformStats {
        PlatformStats {
            commits: self.commits.load(Ordering::SeqCst),
            writebacks: self.writebacks.load(Ordering::SeqCst),
            invalidates: self.invalidates.load(Ordering::SeqCst),
            irq_saves: self.irq_saves.load(Ordering::SeqCst),
            irq_restores: self.irq_restores.load(Ordering::SeqCst),
            forwards: self.forwards.iter().map(|c| c.load(Ordering::SeqCst)).sum(),
        }
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::new(1)
    }
}

impl Platform for HostPlatform {
    fn irq_save(&self) -> IrqState {
        self.irq_saves.fetch_add(1, Ordering::SeqCst);
        IRQ_DEPTH.with(|d| {
            let prev = d.get();
            d.set(prev + 1);
            IrqState::from_raw(prev)
        })
    }

    fn irq_restore(&self, state: IrqState) {
        self.irq_restores.fetch_add(1, Ordering::SeqCst);
        IRQ_DEPTH.with(|d| d.set(state.raw()));
    }

    fn writeback(&self, _region: SharedRegion) {
        self.writebacks.fetch_add(1, Ordering::SeqCst);
    }

    fn invalidate(&self, _region: SharedRegion) {
        self.invalidates.fetch_add(1, Ordering::SeqCst);
    }

    fn commit(&self, region: SharedRegion) {
        self.commits.fetch_add(1, Ordering::SeqCst);
        self.writeback_invalidate(region);
    }

    fn current_core(&self) -> CoreId {
        CoreId::new(CURRENT_CORE.with(Cell::get))
    }

    fn core_count(&self) -> u16 {
        self.core_count
    }

    fn is_core_enabled(&self, core: CoreId) -> bool {
        core.index() < self.core_count
            && self.enabled.load(Ordering::SeqCst) & (1 << core.index()) != 0
    }

    fn forward_to_core(&self, core: CoreId) -> Result<(), PlatformError> {
        if !self.is_core_enabled(core) {
            return Err(PlatformError::CoreDisabled(core));
        }
        if self.fail_forwards.load(Ordering::SeqCst) {
            return Err(PlatformError::IdcFailed { core, status: -110 });
        }
        self.forwards[core.index() as usize].fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_cores_enabled_by_default() {
        let platform = HostPlatform::new(4);
        for core in 0..4 {
            assert!(platform.is_core_enabled(CoreId::new(core)));
        }
        assert!(!platform.is_core_enabled(CoreId::new(4)));
    }

    #[test]
    fn core_count_is_clamped() {
        assert_eq!(HostPlatform::new(0).core_count(), 1);
        assert_eq!(HostPlatform::new(64).core_count(), MAX_HOST_CORES as u16);
    }

    #[test]
    fn disable_and_reenable_core() {
        let platform = HostPlatform::new(2);
        platform.set_core_enabled(CoreId::new(1), false);
        assert!(!platform.is_core_enabled(CoreId::new(1)));
        platform.set_core_enabled(CoreId::new(1), true);
        assert!(platform.is_core_enabled(CoreId::new(1)));
    }

    #[test]
    fn irq_save_restore_nests() {
        let platform = HostPlatform::new(1);
        assert!(!HostPlatform::irqs_disabled());
        let outer = platform.irq_save();
        let inner = platform.irq_save();
        assert!(HostPlatform::irqs_disabled());
        platform.irq_restore(inner);
        assert!(HostPlatform::irqs_disabled());
        platform.irq_restore(outer);
        assert!(!HostPlatform::irqs_disabled());

        let stats = platform.stats();
        assert_eq!(stats.irq_saves, 2);
        assert_eq!(stats.irq_restores, 2);
    }

    #[test]
    fn commit_counts_writeback_and_invalidate() {
        let platform = HostPlatform::new(1);
        let value = 7_u64;
        platform.commit(SharedRegion::of(&value));
        let stats = platform.stats();
        assert_eq!(stats.commits, 1);
        assert_eq!(stats.writebacks, 1);
        assert_eq!(stats.invalidates, 1);
    }

    #[test]
    fn current_core_is_per_thread() {
        let platform = std::sync::Arc::new(HostPlatform::new(2));
        HostPlatform::enter_core(CoreId::PRIMARY);
        let remote = std::sync::Arc::clone(&platform);
        let seen = std::thread::spawn(move || {
            HostPlatform::enter_core(CoreId::new(1));
            remote.current_core()
        })
        .join()
        .unwrap();
        assert_eq!(seen, CoreId::new(1));
        assert_eq!(platform.current_core(), CoreId::PRIMARY);
    }

    #[test]
    fn forward_to_disabled_core_fails() {
        let platform = HostPlatform::new(2);
        platform.set_core_enabled(CoreId::new(1), false);
        assert_eq!(
            platform.forward_to_core(CoreId::new(1)),
            Err(PlatformError::CoreDisabled(CoreId::new(1)))
        );
        assert_eq!(platform.stats().forwards, 0);
    }

    #[test]
    fn forward_failure_injection() {
        let platform = HostPlatform::new(2);
        platform.set_forward_failure(true);
        assert!(matches!(
            platform.forward_to_core(CoreId::new(1)),
            Err(PlatformError::IdcFailed { .. })
        ));
        platform.set_forward_failure(false);
        platform.forward_to_core(CoreId::new(1)).unwrap();
        assert_eq!(platform.forwards_to(CoreId::new(1)), 1);
    }
}
