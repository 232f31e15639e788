//! Outbound side of a client connection
//!
//! A [`ConnectionHandle`] is what the game holds to reach a client. It is a
//! resource with its own lifecycle and its own identity ([`ConnId`]), separate
//! from the player id the arena assigns on admission.

use std::fmt;

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Identity of one accepted transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnId(Uuid);

impl ConnId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Cloneable sender half of a connection's outbound frame queue
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnId,
    tx: mpsc::Sender<Bytes>,
}

impl ConnectionHandle {
    /// Create a handle and the receiver its writer task drains
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: ConnId::new(),
                tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnId {
        self.id
    }

    /// Queue a frame without waiting.
    ///
    /// A slow reader loses the frame rather than stalling the caller.
    pub fn deliver(&self, frame: Bytes) -> Result<(), DeliveryError> {
        self.tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => DeliveryError::Lagged,
            TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }
}

/// Why a frame did not reach a connection's queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("outbound queue full, frame dropped")]
    Lagged,

    #[error("connection closed")]
    Closed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_queue_drops_instead_of_blocking() {
        let (conn, mut rx) = ConnectionHandle::channel(1);
        assert_eq!(conn.deliver(Bytes::from_static(b"a\n")), Ok(()));
        assert_eq!(
            conn.deliver(Bytes::from_static(b"b\n")),
            Err(DeliveryError::Lagged)
        );
        assert_eq!(rx.try_recv().unwrap(), Bytes::from_static(b"a\n"));
    }

    #[test]
    fn dropped_receiver_reports_closed() {
        let (conn, rx) = ConnectionHandle::channel(4);
        drop(rx);
        assert_eq!(
            conn.deliver(Bytes::from_static(b"x\n")),
            Err(DeliveryError::Closed)
        );
    }

    #[test]
    fn each_connection_gets_its_own_id() {
        let (a, _ra) = ConnectionHandle::channel(1);
        let (b, _rb) = ConnectionHandle::channel(1);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }
}
