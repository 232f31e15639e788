//! TCP transport: admission, per-connection sessions and the wire protocol

pub mod connection;
pub mod listener;
pub mod outbox;
pub mod protocol;

pub use outbox::{ConnId, ConnectionHandle, DeliveryError};
pub use protocol::{ClientCommand, Notification};
