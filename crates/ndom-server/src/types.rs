//! Shared types for the document host.
//!
//! This module defines:
//! - `ClientId`: a lightweight handle for connected clients
//! - `ClientHandle`: a client's negotiated version and outbound channel
//! - channel aliases between client tasks, the hub and the application
//! - `HubCommand`: everything the hub task reacts to

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use ndom_core::{
    ClientMessage, ConnectUser, ConnectionId, InteractionEvent, NodeDescription, ServerMessage,
};
use ndom_protocol::{ProtocolVersion, WireMessage};
use tokio::sync::mpsc;
use tokio::sync::RwLock;

/// Identifier for a connected client.
///
/// Opaque; unique over the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(pub u64);

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Outbound messages from the hub to a given client.
pub type OutboundTx = mpsc::UnboundedSender<ServerMessage>;
pub type OutboundRx = mpsc::UnboundedReceiver<ServerMessage>;

/// A client after the hello exchange.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    pub version: ProtocolVersion,
    pub tx: OutboundTx,
}

impl ClientHandle {
    /// Queue `msg` unless the client's version predates its kind.
    ///
    /// Returns `false` only when the client is gone.
    pub fn send(&self, msg: &ServerMessage) -> bool {
        if msg.kind().since() > self.version {
            return true;
        }
        self.tx.send(msg.clone()).is_ok()
    }
}

/// Registry of connected clients.
///
/// Owned by the hub task; admission is counted separately at accept.
pub type ClientRegistry = Arc<RwLock<HashMap<ClientId, ClientHandle>>>;

/// Input to the central hub task.
#[derive(Debug)]
pub enum HubCommand {
    /// A client finished its handshake.
    Join {
        client_id: ClientId,
        handle: ClientHandle,
    },

    /// A client's connection ended.
    Leave { client_id: ClientId },

    /// A decoded message from a client.
    FromClient {
        client_id: ClientId,
        msg: ClientMessage,
    },

    /// Replace the whole document and resend it to everyone.
    ReplaceDocument(NodeDescription),

    /// Apply mutations to the document and broadcast them as one batch.
    Publish(Vec<ServerMessage>),
}

/// Channel into the hub task (clients and application).
pub type HubTx = mpsc::UnboundedSender<HubCommand>;
pub type HubRx = mpsc::UnboundedReceiver<HubCommand>;

/// What the hub reports back to the application.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Joined { version: ProtocolVersion },
    Interaction(InteractionEvent),
    UsersConnected(Vec<ConnectUser>),
    UsersDisconnected(Vec<ConnectionId>),
    Left,
}

pub type EventTx = mpsc::UnboundedSender<(ClientId, ClientEvent)>;
pub type EventRx = mpsc::UnboundedReceiver<(ClientId, ClientEvent)>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1_handle_drops_v2_kinds() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ClientHandle {
            version: ProtocolVersion::V1,
            tx,
        };

        assert!(handle.send(&ServerMessage::BatchStart));
        assert!(handle.send(&ServerMessage::attribute_set(1, "a", "b")));
        assert!(handle.send(&ServerMessage::BatchEnd));

        assert_eq!(rx.try_recv().unwrap(), ServerMessage::attribute_set(1, "a", "b"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn send_reports_closed_client() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = ClientHandle {
            version: ProtocolVersion::V2,
            tx,
        };
        assert!(!handle.send(&ServerMessage::ping(1)));
    }
}
