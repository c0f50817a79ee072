//! Interrupt-safe lock with commit-on-release.
//!
//! [`IpcLock`] is the single lock guarding the IPC context. Taking it disables
//! interrupts on the calling core (an interrupt handler draining the message
//! queue would otherwise spin forever on a lock its own core holds), then spins
//! on a [`spin::Mutex`].
//!
//! The returned [`IpcGuard`] tracks whether the protected state was borrowed
//! mutably. When it goes out of scope, on every path including `?` returns, it
//!
//! 1. commits the state's shared region if it was mutated,
//! 2. releases the spin lock,
//! 3. restores the saved interrupt state.
//!
//! The order is fixed by field declaration order: `Drop::drop` runs first
//! (commit), then `guard` is dropped (unlock), then `irq` (restore).

use core::ops::{Deref, DerefMut};

use sonido_platform::{IrqState, Platform, SharedRegion};

/// Spin lock taken with interrupts disabled.
pub struct IpcLock<T> {
    inner: spin::Mutex<T>,
}

impl<T> IpcLock<T> {
    /// Creates an unlocked lock around `value`.
    pub const fn new(value: T) -> Self {
        Self {
            inner: spin::Mutex::new(value),
        }
    }

    /// Disables interrupts and acquires the lock.
    ///
    /// Must not be called while the same core already holds the guard: the
    /// lock is not reentrant and the second acquisition spins forever.
    pub fn lock<'a, P: Platform + ?Sized>(&'a self, platform: &'a P) -> IpcGuard<'a, T, P> {
        let irq = IrqRestore {
            platform,
            state: platform.irq_save(),
        };
        IpcGuard {
            guard: self.inner.lock(),
            irq,
            dirty: false,
        }
    }

    /// Returns true if some core currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }

    /// Consumes the lock and returns the protected value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner()
    }
}

/// Restores interrupts when dropped.
struct IrqRestore<'a, P: Platform + ?Sized> {
    platform: &'a P,
    state: IrqState,
}

impl<P: Platform + ?Sized> Drop for IrqRestore<'_, P> {
    fn drop(&mut self) {
        self.platform.irq_restore(self.state);
    }
}

/// Scoped access to state protected by an [`IpcLock`].
#[must_use = "dropping the guard releases the lock immediately"]
pub struct IpcGuard<'a, T, P: Platform + ?Sized> {
    guard: spin::MutexGuard<'a, T>,
    irq: IrqRestore<'a, P>,
    dirty: bool,
}

impl<'a, T, P: Platform + ?Sized> IpcGuard<'a, T, P> {
    /// Returns the platform the lock was taken with.
    ///
    /// The reference outlives the guard borrow, so it can be used alongside
    /// mutable access to the state.
    pub fn platform(&self) -> &'a P {
        self.irq.platform
    }

    /// Returns true if the state has been borrowed mutably.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}

impl<T, P: Platform + ?Sized> Deref for IpcGuard<'_, T, P> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T, P: Platform + ?Sized> DerefMut for IpcGuard<'_, T, P> {
    fn deref_mut(&mut self) -> &mut T {
        self.dirty = true;
        &mut self.guard
    }
}

impl<T, P: Platform + ?Sized> Drop for IpcGuard<'_, T, P> {
    fn drop(&mut self) {
        if self.dirty {
            self.irq.platform.commit(SharedRegion::of(&*self.guard));
        }
    }
}
