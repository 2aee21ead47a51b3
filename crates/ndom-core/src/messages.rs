//! Message types exchanged over a networked DOM session.
//!
//! These are **transport-agnostic** logical messages:
//! - [`ServerMessage`]: what the server sends to every client.
//! - [`ClientMessage`]: what a client sends back upstream.
//!
//! Clients never originate tree mutations; they only report
//! interactions and answer pings.

use serde::{Deserialize, Serialize};

use crate::event::InteractionEvent;
use crate::node::NodeDescription;
use crate::{ConnectionId, NodeId};

/// A message sent from the server to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full document tree; establishes (or re-establishes) the baseline.
    Snapshot(Snapshot),

    /// Start of a group of messages to apply atomically.
    BatchStart,

    /// Current document time, for aligning animation clocks.
    DocumentTime(DocumentTime),

    /// Children inserted under a parent.
    ChildrenAdded(ChildrenAdded),

    /// Children removed from a parent.
    ChildrenRemoved(ChildrenRemoved),

    /// A single attribute set or removed.
    AttributeChanged(AttributeChanged),

    /// Text node content replaced.
    TextChanged(TextChanged),

    /// End of the group opened by `BatchStart`.
    BatchEnd,

    /// Liveness / latency check; the client answers with `Pong`.
    Ping(Ping),

    /// Recoverable condition.
    Warning(Warning),

    /// Unrecoverable condition for this session.
    Error(ErrorMessage),
}

/// A message sent from a client to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Users joined over this client link.
    ConnectUsers(ConnectUsers),

    /// Users left.
    DisconnectUsers(DisconnectUsers),

    /// A user interacted with a node.
    Event(InteractionEvent),

    /// Answer to a `Ping`.
    Pong(Pong),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Document root.
    pub root: NodeDescription,

    /// Document time at which the snapshot was taken, in milliseconds.
    pub document_time: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentTime {
    /// Milliseconds since the document started.
    pub document_time: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenAdded {
    /// Parent the children are inserted into.
    pub node_id: NodeId,

    /// Sibling the new children follow; `None` inserts at the front.
    pub previous_node_id: Option<NodeId>,

    pub added: Vec<NodeDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChildrenRemoved {
    /// Parent the children are removed from.
    pub node_id: NodeId,

    pub removed: Vec<NodeId>,
}

/// Attribute mutation.
///
/// `value: None` removes the attribute, which is not the same as
/// setting it to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeChanged {
    pub node_id: NodeId,
    pub key: String,
    pub value: Option<String>,
}

/// Full replacement of a text node's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextChanged {
    pub node_id: NodeId,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Sequence number echoed back in the matching `Pong`.
    pub ping: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pong {
    pub pong: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warning {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectUser {
    pub connection_id: ConnectionId,

    /// Optional identity token presented by the user.
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectUsers {
    pub users: Vec<ConnectUser>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisconnectUsers {
    pub connection_ids: Vec<ConnectionId>,
}

// -----------------------------------------------------------------------------
// Convenience constructors
// -----------------------------------------------------------------------------

impl ServerMessage {
    pub fn snapshot(root: NodeDescription, document_time: u64) -> Self {
        ServerMessage::Snapshot(Snapshot {
            root,
            document_time,
        })
    }

    pub fn document_time(document_time: u64) -> Self {
        ServerMessage::DocumentTime(DocumentTime { document_time })
    }

    /// Insert `added` under `parent`, after `previous` or at the front.
    pub fn children_added(
        parent: NodeId,
        previous: Option<NodeId>,
        added: Vec<NodeDescription>,
    ) -> Self {
        ServerMessage::ChildrenAdded(ChildrenAdded {
            node_id: parent,
            previous_node_id: previous,
            added,
        })
    }

    pub fn children_removed(parent: NodeId, removed: Vec<NodeId>) -> Self {
        ServerMessage::ChildrenRemoved(ChildrenRemoved {
            node_id: parent,
            removed,
        })
    }

    pub fn attribute_set(node_id: NodeId, key: impl Into<String>, value: impl Into<String>) -> Self {
        ServerMessage::AttributeChanged(AttributeChanged {
            node_id,
            key: key.into(),
            value: Some(value.into()),
        })
    }

    pub fn attribute_removed(node_id: NodeId, key: impl Into<String>) -> Self {
        ServerMessage::AttributeChanged(AttributeChanged {
            node_id,
            key: key.into(),
            value: None,
        })
    }

    pub fn text_changed(node_id: NodeId, text: impl Into<String>) -> Self {
        ServerMessage::TextChanged(TextChanged {
            node_id,
            text: text.into(),
        })
    }

    pub fn ping(ping: u32) -> Self {
        ServerMessage::Ping(Ping { ping })
    }

    pub fn warning(message: impl Into<String>) -> Self {
        ServerMessage::Warning(Warning {
            message: message.into(),
        })
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error(ErrorMessage {
            message: message.into(),
        })
    }
}

impl ClientMessage {
    pub fn pong(pong: u32) -> Self {
        ClientMessage::Pong(Pong { pong })
    }

    pub fn connect_user(connection_id: ConnectionId, token: Option<String>) -> Self {
        ClientMessage::ConnectUsers(ConnectUsers {
            users: vec![ConnectUser {
                connection_id,
                token,
            }],
        })
    }

    pub fn disconnect_users(connection_ids: Vec<ConnectionId>) -> Self {
        ClientMessage::DisconnectUsers(DisconnectUsers { connection_ids })
    }
}

impl From<InteractionEvent> for ClientMessage {
    fn from(event: InteractionEvent) -> Self {
        ClientMessage::Event(event)
    }
}
