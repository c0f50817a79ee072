//! Host transport seam.
//!
//! The physical link to the host (mailbox registers, doorbells, DMA) lives
//! outside this crate. The queue only needs to know whether the link can take
//! a message right now and how to hand one over.

use thiserror::Error;

use crate::message::Message;

/// Errors reported by a [`HostTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The previous message has not been acknowledged yet.
    #[error("transport busy")]
    Busy,
    /// The link refused the message with a platform status code.
    #[error("transport rejected message with status {0}")]
    Rejected(i32),
}

/// Outbound link to the host.
///
/// Called with the IPC lock held and interrupts disabled: implementations
/// must not block.
pub trait HostTransport: Send {
    /// Returns true while a previously sent message is still in flight.
    fn is_busy(&self) -> bool;

    /// Starts transmitting `msg`.
    fn send(&mut self, msg: &Message) -> Result<(), TransportError>;
}

#[cfg(feature = "std")]
pub use recording::{RecordedMessage, RecordingTransport, TransportProbe};

#[cfg(feature = "std")]
mod recording {
    use std::sync::Arc;

    use super::{HostTransport, TransportError};
    use crate::message::{Message, MessageId};

    /// A message as observed by [`RecordingTransport`].
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct RecordedMessage {
        /// Pool handle of the message.
        pub id: MessageId,
        /// Header word at send time.
        pub header: u32,
        /// Payload bytes at send time.
        pub payload: Vec<u8>,
    }

    #[derive(Default)]
    struct Link {
        sent: Vec<RecordedMessage>,
        busy: bool,
        fail_next: Option<i32>,
    }

    /// In-memory transport for host simulation and tests.
    ///
    /// Every accepted message is recorded and leaves the link busy until
    /// [`TransportProbe::complete()`] acknowledges it, the way a mailbox
    /// doorbell stays raised until the host clears it.
    pub struct RecordingTransport {
        link: Arc<spin::Mutex<Link>>,
    }

    /// Handle for inspecting and steering a [`RecordingTransport`] after it
    /// has been moved into a context.
    #[derive(Clone)]
    pub struct TransportProbe {
        link: Arc<spin::Mutex<Link>>,
    }

    impl RecordingTransport {
        /// Creates an idle transport and its probe.
        pub fn new() -> (Self, TransportProbe) {
            let link = Arc::new(spin::Mutex::new(Link::default()));
            (
                Self {
                    link: Arc::clone(&link),
                },
                TransportProbe { link },
            )
        }
    }

    impl HostTransport for RecordingTransport {
        fn is_busy(&self) -> bool {
            self.link.lock().busy
        }

        fn send(&mut self, msg: &Message) -> Result<(), TransportError> {
            let mut link = self.link.lock();
            if link.busy {
                return Err(TransportError::Busy);
            }
            if let Some(status) = link.fail_next.take() {
                return Err(TransportError::Rejected(status));
            }
            link.sent.push(RecordedMessage {
                id: msg.id(),
                header: msg.header(),
                payload: msg.payload().to_vec(),
            });
            link.busy = true;
            Ok(())
        }
    }

    impl TransportProbe {
        /// Returns every message accepted so far, oldest first.
        pub fn sent(&self) -> Vec<RecordedMessage> {
            self.link.lock().sent.clone()
        }

        /// Returns the headers of every accepted message, oldest first.
        pub fn sent_headers(&self) -> Vec<u32> {
            self.link.lock().sent.iter().map(|m| m.header).collect()
        }

        /// Removes and returns every recorded message.
        pub fn take_sent(&self) -> Vec<RecordedMessage> {
            core::mem::take(&mut self.link.lock().sent)
        }

        /// Acknowledges the in-flight message, making the link idle.
        pub fn complete(&self) {
            self.link.lock().busy = false;
        }

        /// Forces the busy flag.
        pub fn set_busy(&self, busy: bool) {
            self.link.lock().busy = busy;
        }

        /// Returns true while a message is in flight.
        pub fn is_busy(&self) -> bool {
            self.link.lock().busy
        }

        /// Makes the next send fail with `status`.
        pub fn fail_next(&self, status: i32) {
            self.link.lock().fail_next = Some(status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessagePool;

    #[test]
    fn send_records_and_marks_busy() {
        let mut pool = MessagePool::with_capacity(1).unwrap();
        let id = pool.insert(0x42, vec![1, 2]).unwrap();
        let (mut transport, probe) = RecordingTransport::new();

        assert!(!transport.is_busy());
        transport.send(pool.get(id).unwrap()).unwrap();
        assert!(transport.is_busy());

        let sent = probe.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].header, 0x42);
        assert_eq!(sent[0].payload, vec![1, 2]);
    }

    #[test]
    fn busy_link_rejects_send() {
        let mut pool = MessagePool::with_capacity(1).unwrap();
        let id = pool.insert(1, Vec::new()).unwrap();
        let (mut transport, probe) = RecordingTransport::new();
        probe.set_busy(true);

        assert_eq!(transport.send(pool.get(id).unwrap()), Err(TransportError::Busy));
        probe.complete();
        transport.send(pool.get(id).unwrap()).unwrap();
        assert_eq!(probe.sent_headers(), vec![1]);
    }

    #[test]
    fn injected_failure_applies_once() {
        let mut pool = MessagePool::with_capacity(1).unwrap();
        let id = pool.insert(1, Vec::new()).unwrap();
        let (mut transport, probe) = RecordingTransport::new();
        probe.fail_next(-5);

        assert_eq!(
            transport.send(pool.get(id).unwrap()),
            Err(TransportError::Rejected(-5))
        );
        assert!(!transport.is_busy());
        transport.send(pool.get(id).unwrap()).unwrap();
        assert_eq!(probe.take_sent().len(), 1);
        assert!(probe.sent().is_empty());
    }
}
