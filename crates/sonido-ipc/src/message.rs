//! Outbound host messages and the pool they live in.
//!
//! A [`Message`] is a 32-bit header plus a zero-initialized payload of fixed
//! size. Producers usually allocate one message up front and resend it every
//! time they have something to report, so messages outlive individual sends.
//!
//! Messages are stored in a [`MessagePool`] of fixed capacity and addressed by
//! [`MessageId`] handles. A handle carries the slot's generation, so a stale
//! handle (freed and the slot reused) never aliases the new occupant.

#[cfg(not(feature = "std"))]
use alloc::vec::Vec;

use core::fmt;

use crate::error::IpcError;

/// Handle to a message in the pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MessageId {
    slot: u16,
    generation: u16,
}

impl MessageId {
    /// Packs the handle into a single word.
    #[inline]
    pub const fn raw(self) -> u32 {
        ((self.generation as u32) << 16) | self.slot as u32
    }

    /// Rebuilds a handle from [`raw()`](Self::raw).
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self {
            slot: (raw & 0xFFFF) as u16,
            generation: (raw >> 16) as u16,
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg#{}.{}", self.slot, self.generation)
    }
}

/// A notification or reply destined for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    id: MessageId,
    header: u32,
    payload: Vec<u8>,
}

impl Message {
    /// Returns the pool handle of this message.
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Returns the header word. Its meaning belongs to the protocol layer.
    pub fn header(&self) -> u32 {
        self.header
    }

    /// Returns the payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Returns the payload size in bytes.
    pub fn tx_size(&self) -> usize {
        self.payload.len()
    }

    /// Copies `data` into the payload, truncated to the payload size.
    pub(crate) fn write_payload(&mut self, data: &[u8]) {
        let len = data.len().min(self.payload.len());
        self.payload[..len].copy_from_slice(&data[..len]);
    }
}

/// Allocates a zeroed payload without aborting on exhaustion.
pub(crate) fn alloc_payload(size: usize) -> Result<Vec<u8>, IpcError> {
    let mut payload = Vec::new();
    payload
        .try_reserve_exact(size)
        .map_err(|_| IpcError::AllocationFailure)?;
    payload.resize(size, 0);
    Ok(payload)
}

struct Slot {
    generation: u16,
    message: Option<Message>,
}

/// Fixed-capacity store of live messages.
///
/// Slot storage is reserved once at construction, so inserting never
/// allocates; only payloads are allocated per message.
pub struct MessagePool {
    slots: Vec<Slot>,
    capacity: usize,
    live: usize,
}

impl MessagePool {
    /// Creates a pool with room for `capacity` messages.
    pub fn with_capacity(capacity: usize) -> Result<Self, IpcError> {
        let capacity = capacity.min(usize::from(u16::MAX));
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(capacity)
            .map_err(|_| IpcError::AllocationFailure)?;
        Ok(Self {
            slots,
            capacity,
            live: 0,
        })
    }

    /// Stores a message built from `header` and `payload`.
    ///
    /// Fails with [`IpcError::AllocationFailure`] when the pool is full; the
    /// payload is dropped in that case.
    pub fn insert(&mut self, header: u32, payload: Vec<u8>) -> Result<MessageId, IpcError> {
        let slot = match self.slots.iter().position(|s| s.message.is_none()) {
            Some(slot) => slot,
            None if self.slots.len() < self.capacity => {
                self.slots.push(Slot {
                    generation: 0,
                    message: None,
                });
                self.slots.len() - 1
            }
            None => return Err(IpcError::AllocationFailure),
        };

        let entry = &mut self.slots[slot];
        entry.generation = entry.generation.wrapping_add(1);
        let id = MessageId {
            slot: slot as u16,
            generation: entry.generation,
        };
        entry.message = Some(Message {
            id,
            header,
            payload,
        });
        self.live += 1;
        Ok(id)
    }

    /// Removes a message. Returns `None` if the handle is stale or unknown.
    pub fn remove(&mut self, id: MessageId) -> Option<Message> {
        let slot = self.slots.get_mut(usize::from(id.slot))?;
        if slot.generation != id.generation {
            return None;
        }
        let message = slot.message.take()?;
        self.live -= 1;
        Some(message)
    }

    /// Returns the message for `id`, if live.
    pub fn get(&self, id: MessageId) -> Option<&Message> {
        let slot = self.slots.get(usize::from(id.slot))?;
        if slot.generation != id.generation {
            return None;
        }
        slot.message.as_ref()
    }

    /// Returns the message for `id` mutably, if live.
    pub fn get_mut(&mut self, id: MessageId) -> Option<&mut Message> {
        let slot = self.slots.get_mut(usize::from(id.slot))?;
        if slot.generation != id.generation {
            return None;
        }
        slot.message.as_mut()
    }

    /// Returns true if `id` refers to a live message.
    pub fn contains(&self, id: MessageId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live messages.
    pub fn len(&self) -> usize {
        self.live
    }

    /// Returns true if no message is live.
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
