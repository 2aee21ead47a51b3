//! ndom-core
//!
//! Transport-agnostic values exchanged between a document server and
//! its clients:
//! - node records (the shape of a replicated subtree)
//! - server messages (snapshots, mutations, diagnostics, clock sync)
//! - client messages (interaction events, user presence, pong)
//!
//! Byte layouts live in the `ndom-protocol` crate; this crate is
//! purely logical.

pub mod event;
pub mod messages;
pub mod node;

pub use event::{EventKind, InteractionEvent, Vec3};
pub use node::{ElementNode, NodeDescription, TextNode};

pub use messages::{
    AttributeChanged,
    ChildrenAdded,
    ChildrenRemoved,
    ClientMessage,
    ConnectUser,
    ConnectUsers,
    DisconnectUsers,
    DocumentTime,
    ErrorMessage,
    Ping,
    Pong,
    ServerMessage,
    Snapshot,
    TextChanged,
    Warning,
};

/// Server-assigned identifier of a node in the replicated tree.
///
/// Unique for the lifetime of a session; the protocol treats it as an
/// opaque integer.
pub type NodeId = u32;

/// Identifier of a user connection multiplexed over one client link.
pub type ConnectionId = u32;
