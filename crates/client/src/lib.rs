//! Headless client core: the local message list, optimistic send
//! reconciliation, typing timer and a reconnecting WebSocket transport.

pub mod connection;
pub mod error;
pub mod grouping;
pub mod reconcile;
pub mod state;
pub mod typing;

pub use connection::{Connection, ConnectionEvent, ConnectionStatus, JoinRequest, ReconnectPolicy};
pub use error::ClientError;
pub use state::{ChatState, Outgoing};
