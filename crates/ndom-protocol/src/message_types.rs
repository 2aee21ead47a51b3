//! Message type registry.
//!
//! This module defines the one-byte tags that open every frame, in two
//! disjoint namespaces:
//! - [`ServerMessageType`] for server → client frames,
//! - [`ClientMessageType`] for client → server frames.
//!
//! Tags are append-only. A shipped tag is never reassigned; tags 7 and
//! 8 in the server namespace are reserved.
//!
//! The actual encode/decode logic lives in `from_server`,
//! `from_client` and `binary_codec`.

use std::fmt;

use crate::error::Direction;
use crate::version::ProtocolVersion;

/// Server → client message tags.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ServerMessageType {
    Snapshot = 1,
    BatchStart = 2,
    DocumentTime = 3,
    ChildrenAdded = 4,
    ChildrenRemoved = 5,
    AttributeChanged = 6,
    TextChanged = 9,
    BatchEnd = 10,
    Ping = 11,
    Warning = 12,
    Error = 13,
}

impl ServerMessageType {
    pub const ALL: [ServerMessageType; 11] = [
        ServerMessageType::Snapshot,
        ServerMessageType::BatchStart,
        ServerMessageType::DocumentTime,
        ServerMessageType::ChildrenAdded,
        ServerMessageType::ChildrenRemoved,
        ServerMessageType::AttributeChanged,
        ServerMessageType::TextChanged,
        ServerMessageType::BatchEnd,
        ServerMessageType::Ping,
        ServerMessageType::Warning,
        ServerMessageType::Error,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ServerMessageType::Snapshot),
            2 => Some(ServerMessageType::BatchStart),
            3 => Some(ServerMessageType::DocumentTime),
            4 => Some(ServerMessageType::ChildrenAdded),
            5 => Some(ServerMessageType::ChildrenRemoved),
            6 => Some(ServerMessageType::AttributeChanged),
            9 => Some(ServerMessageType::TextChanged),
            10 => Some(ServerMessageType::BatchEnd),
            11 => Some(ServerMessageType::Ping),
            12 => Some(ServerMessageType::Warning),
            13 => Some(ServerMessageType::Error),
            _ => None,
        }
    }

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ServerMessageType::Snapshot => "snapshot",
            ServerMessageType::BatchStart => "batchStart",
            ServerMessageType::DocumentTime => "documentTime",
            ServerMessageType::ChildrenAdded => "childrenAdded",
            ServerMessageType::ChildrenRemoved => "childrenRemoved",
            ServerMessageType::AttributeChanged => "attributeChanged",
            ServerMessageType::TextChanged => "textChanged",
            ServerMessageType::BatchEnd => "batchEnd",
            ServerMessageType::Ping => "ping",
            ServerMessageType::Warning => "warning",
            ServerMessageType::Error => "error",
        }
    }

    /// First protocol version in which this kind is legal.
    pub fn since(self) -> ProtocolVersion {
        match self {
            ServerMessageType::BatchStart
            | ServerMessageType::BatchEnd
            | ServerMessageType::DocumentTime => ProtocolVersion::V2,
            _ => ProtocolVersion::V1,
        }
    }
}

/// Client → server message tags.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ClientMessageType {
    ConnectUsers = 1,
    DisconnectUsers = 2,
    Event = 3,
    Pong = 4,
}

impl ClientMessageType {
    pub const ALL: [ClientMessageType; 4] = [
        ClientMessageType::ConnectUsers,
        ClientMessageType::DisconnectUsers,
        ClientMessageType::Event,
        ClientMessageType::Pong,
    ];

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ClientMessageType::ConnectUsers),
            2 => Some(ClientMessageType::DisconnectUsers),
            3 => Some(ClientMessageType::Event),
            4 => Some(ClientMessageType::Pong),
            _ => None,
        }
    }

    #[inline]
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ClientMessageType::ConnectUsers => "connectUsers",
            ClientMessageType::DisconnectUsers => "disconnectUsers",
            ClientMessageType::Event => "event",
            ClientMessageType::Pong => "pong",
        }
    }

    pub fn since(self) -> ProtocolVersion {
        match self {
            ClientMessageType::ConnectUsers | ClientMessageType::DisconnectUsers => {
                ProtocolVersion::V2
            }
            ClientMessageType::Event | ClientMessageType::Pong => ProtocolVersion::V1,
        }
    }
}

/// Common view over both tag namespaces, used by the dispatcher.
pub trait MessageKind: Copy + fmt::Debug {
    const DIRECTION: Direction;

    fn from_tag(tag: u8) -> Option<Self>;
    fn tag(self) -> u8;
    fn name(self) -> &'static str;
    fn since(self) -> ProtocolVersion;
}

impl MessageKind for ServerMessageType {
    const DIRECTION: Direction = Direction::FromServer;

    fn from_tag(tag: u8) -> Option<Self> {
        ServerMessageType::from_u8(tag)
    }
    fn tag(self) -> u8 {
        ServerMessageType::tag(self)
    }
    fn name(self) -> &'static str {
        ServerMessageType::name(self)
    }
    fn since(self) -> ProtocolVersion {
        ServerMessageType::since(self)
    }
}

impl MessageKind for ClientMessageType {
    const DIRECTION: Direction = Direction::FromClient;

    fn from_tag(tag: u8) -> Option<Self> {
        ClientMessageType::from_u8(tag)
    }
    fn tag(self) -> u8 {
        ClientMessageType::tag(self)
    }
    fn name(self) -> &'static str {
        ClientMessageType::name(self)
    }
    fn since(self) -> ProtocolVersion {
        ClientMessageType::since(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_roundtrip_through_registry() {
        for kind in ServerMessageType::ALL {
            assert_eq!(ServerMessageType::from_u8(kind.tag()), Some(kind));
        }
        for kind in ClientMessageType::ALL {
            assert_eq!(ClientMessageType::from_u8(kind.tag()), Some(kind));
        }
    }

    #[test]
    fn registry_is_closed() {
        let server_count = (0..=u8::MAX)
            .filter(|t| ServerMessageType::from_u8(*t).is_some())
            .count();
        let client_count = (0..=u8::MAX)
            .filter(|t| ClientMessageType::from_u8(*t).is_some())
            .count();
        assert_eq!(server_count, ServerMessageType::ALL.len());
        assert_eq!(client_count, ClientMessageType::ALL.len());
    }

    #[test]
    fn reserved_tags_stay_unassigned() {
        assert_eq!(ServerMessageType::from_u8(7), None);
        assert_eq!(ServerMessageType::from_u8(8), None);
        assert_eq!(ServerMessageType::from_u8(0), None);
        assert_eq!(ClientMessageType::from_u8(0), None);
    }

    #[test]
    fn error_tag_is_stable() {
        assert_eq!(ServerMessageType::Error.tag(), 13);
        assert_eq!(ClientMessageType::from_u8(13), None);
    }
}
