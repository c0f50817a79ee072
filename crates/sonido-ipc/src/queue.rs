//! Pending-message FIFO.
//!
//! Holds handles of messages waiting for the host link. The queue owns no
//! message data: messages live in the [`MessagePool`](crate::message::MessagePool)
//! and a handle is linked here at most once.

#[cfg(not(feature = "std"))]
use alloc::collections::VecDeque;
#[cfg(feature = "std")]
use std::collections::VecDeque;

use crate::error::IpcError;
use crate::message::MessageId;

/// FIFO of queued message handles.
pub struct PendingQueue {
    ids: VecDeque<MessageId>,
}

impl PendingQueue {
    /// Creates a queue able to link `capacity` messages without reallocating.
    pub fn with_capacity(capacity: usize) -> Result<Self, IpcError> {
        let mut ids = VecDeque::new();
        ids.try_reserve_exact(capacity)
            .map_err(|_| IpcError::AllocationFailure)?;
        Ok(Self { ids })
    }

    /// Links `id` at the tail. Returns false if it was already linked.
    pub fn push_back(&mut self, id: MessageId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push_back(id);
        true
    }

    /// Re-links `id` at the head, ahead of everything queued.
    pub fn push_front(&mut self, id: MessageId) {
        if !self.contains(id) {
            self.ids.push_front(id);
        }
    }

    /// Unlinks and returns the oldest handle.
    pub fn pop_front(&mut self) -> Option<MessageId> {
        self.ids.pop_front()
    }

    /// Unlinks `id`. Returns false if it was not linked.
    pub fn remove(&mut self, id: MessageId) -> bool {
        match self.ids.iter().position(|&queued| queued == id) {
            Some(pos) => {
                self.ids.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Returns true if `id` is linked.
    pub fn contains(&self, id: MessageId) -> bool {
        self.ids.contains(&id)
    }

    /// Number of linked handles.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Returns true if nothing is linked.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    #[cfg(test)]
    fn iter(&self) -> impl Iterator<Item = MessageId> + '_ {
        self.ids.iter().copied()
    }
}
