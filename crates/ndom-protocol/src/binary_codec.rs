//! Message dispatch: binary frame ↔ `ServerMessage` / `ClientMessage`.
//!
//! Framing model (single-message buffer):
//!
//! ```text
//! [0]  : tag (ServerMessageType or ClientMessageType as u8)
//! [1..]: body, layout per kind (see `from_server` / `from_client`)
//! ```
//!
//! Decoding runs a small state machine per frame:
//!
//! ```text
//! AwaitingTag ──tag known──▶ DecodingBody(kind) ──ok──▶ Decoded(msg)
//!      │                            │
//!      └──unknown / empty──▶ Failed(err) ◀──err──┘
//! ```
//!
//! Nothing survives between frames. A frame must hold exactly one
//! message: leftover bytes are `TrailingBytes`. Splitting a stream into
//! frames is the transport's job (e.g. length-prefix each frame).

use ndom_core::{ClientMessage, ServerMessage};
use tracing::trace;

use crate::buffer::{BufferReader, BufferWriter};
use crate::error::{DecodeError, DecodeResult, EncodeResult};
use crate::from_client;
use crate::from_server;
use crate::message_types::{ClientMessageType, MessageKind, ServerMessageType};
use crate::version::ProtocolVersion;

/// Starting capacity for the `*_to_vec` helpers.
const DEFAULT_FRAME_CAPACITY: usize = 64;

/// A message family with its own tag namespace.
pub trait WireMessage: Sized {
    type Kind: MessageKind;

    /// Kind (and therefore tag) of this value.
    fn kind(&self) -> Self::Kind;

    /// Write tag and body. On error nothing has been written.
    fn encode(&self, writer: &mut BufferWriter) -> EncodeResult<()>;

    /// Read the body of a message whose tag has already been consumed.
    fn decode_body(kind: Self::Kind, reader: &mut BufferReader<'_>) -> DecodeResult<Self>;
}

impl WireMessage for ServerMessage {
    type Kind = ServerMessageType;

    fn kind(&self) -> ServerMessageType {
        match self {
            ServerMessage::Snapshot(_) => ServerMessageType::Snapshot,
            ServerMessage::BatchStart => ServerMessageType::BatchStart,
            ServerMessage::DocumentTime(_) => ServerMessageType::DocumentTime,
            ServerMessage::ChildrenAdded(_) => ServerMessageType::ChildrenAdded,
            ServerMessage::ChildrenRemoved(_) => ServerMessageType::ChildrenRemoved,
            ServerMessage::AttributeChanged(_) => ServerMessageType::AttributeChanged,
            ServerMessage::TextChanged(_) => ServerMessageType::TextChanged,
            ServerMessage::BatchEnd => ServerMessageType::BatchEnd,
            ServerMessage::Ping(_) => ServerMessageType::Ping,
            ServerMessage::Warning(_) => ServerMessageType::Warning,
            ServerMessage::Error(_) => ServerMessageType::Error,
        }
    }

    fn encode(&self, writer: &mut BufferWriter) -> EncodeResult<()> {
        match self {
            ServerMessage::Snapshot(m) => from_server::encode_snapshot(m, writer)?,
            ServerMessage::ChildrenAdded(m) => from_server::encode_children_added(m, writer)?,
            ServerMessage::BatchStart => from_server::encode_batch_start(writer),
            ServerMessage::DocumentTime(m) => from_server::encode_document_time(m, writer),
            ServerMessage::ChildrenRemoved(m) => from_server::encode_children_removed(m, writer),
            ServerMessage::AttributeChanged(m) => from_server::encode_attribute_changed(m, writer),
            ServerMessage::TextChanged(m) => from_server::encode_text_changed(m, writer),
            ServerMessage::BatchEnd => from_server::encode_batch_end(writer),
            ServerMessage::Ping(m) => from_server::encode_ping(m, writer),
            ServerMessage::Warning(m) => from_server::encode_warning(m, writer),
            ServerMessage::Error(m) => from_server::encode_error(m, writer),
        }
        Ok(())
    }

    fn decode_body(kind: ServerMessageType, reader: &mut BufferReader<'_>) -> DecodeResult<Self> {
        Ok(match kind {
            ServerMessageType::Snapshot => {
                ServerMessage::Snapshot(from_server::decode_snapshot(reader)?)
            }
            ServerMessageType::BatchStart => ServerMessage::BatchStart,
            ServerMessageType::DocumentTime => {
                ServerMessage::DocumentTime(from_server::decode_document_time(reader)?)
            }
            ServerMessageType::ChildrenAdded => {
                ServerMessage::ChildrenAdded(from_server::decode_children_added(reader)?)
            }
            ServerMessageType::ChildrenRemoved => {
                ServerMessage::ChildrenRemoved(from_server::decode_children_removed(reader)?)
            }
            ServerMessageType::AttributeChanged => {
                ServerMessage::AttributeChanged(from_server::decode_attribute_changed(reader)?)
            }
            ServerMessageType::TextChanged => {
                ServerMessage::TextChanged(from_server::decode_text_changed(reader)?)
            }
            ServerMessageType::BatchEnd => ServerMessage::BatchEnd,
            ServerMessageType::Ping => ServerMessage::Ping(from_server::decode_ping(reader)?),
            ServerMessageType::Warning => {
                ServerMessage::Warning(from_server::decode_warning(reader)?)
            }
            ServerMessageType::Error => ServerMessage::Error(from_server::decode_error(reader)?),
        })
    }
}

impl WireMessage for ClientMessage {
    type Kind = ClientMessageType;

    fn kind(&self) -> ClientMessageType {
        match self {
            ClientMessage::ConnectUsers(_) => ClientMessageType::ConnectUsers,
            ClientMessage::DisconnectUsers(_) => ClientMessageType::DisconnectUsers,
            ClientMessage::Event(_) => ClientMessageType::Event,
            ClientMessage::Pong(_) => ClientMessageType::Pong,
        }
    }

    fn encode(&self, writer: &mut BufferWriter) -> EncodeResult<()> {
        write_client_message(self, writer);
        Ok(())
    }

    fn decode_body(kind: ClientMessageType, reader: &mut BufferReader<'_>) -> DecodeResult<Self> {
        Ok(match kind {
            ClientMessageType::ConnectUsers => {
                ClientMessage::ConnectUsers(from_client::decode_connect_users(reader)?)
            }
            ClientMessageType::DisconnectUsers => {
                ClientMessage::DisconnectUsers(from_client::decode_disconnect_users(reader)?)
            }
            ClientMessageType::Event => ClientMessage::Event(from_client::decode_event(reader)?),
            ClientMessageType::Pong => ClientMessage::Pong(from_client::decode_pong(reader)?),
        })
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Where the dispatcher is within one frame.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchState<K, M> {
    AwaitingTag,
    DecodingBody(K),
    Decoded(M),
    Failed(DecodeError),
}

/// Decode one frame, optionally gated by a negotiated version.
fn dispatch<M: WireMessage>(buf: &[u8], version: Option<ProtocolVersion>) -> DecodeResult<M> {
    let mut reader = BufferReader::new(buf);
    let mut state: DispatchState<M::Kind, M> = DispatchState::AwaitingTag;

    loop {
        state = match state {
            DispatchState::AwaitingTag => match reader.read_uint8() {
                Err(_) => DispatchState::Failed(DecodeError::TruncatedBuffer { field: "tag" }),
                Ok(tag) => match M::Kind::from_tag(tag) {
                    None => DispatchState::Failed(DecodeError::UnknownTag {
                        tag,
                        direction: <M::Kind as MessageKind>::DIRECTION,
                    }),
                    Some(kind) => match version {
                        Some(v) if kind.since() > v => {
                            DispatchState::Failed(DecodeError::UnsupportedInVersion {
                                kind: kind.name(),
                                version: v,
                            })
                        }
                        _ => DispatchState::DecodingBody(kind),
                    },
                },
            },
            DispatchState::DecodingBody(kind) => match M::decode_body(kind, &mut reader) {
                Ok(_) if !reader.is_empty() => DispatchState::Failed(DecodeError::TrailingBytes {
                    remaining: reader.remaining(),
                }),
                Ok(msg) => DispatchState::Decoded(msg),
                Err(err) => DispatchState::Failed(err),
            },
            DispatchState::Decoded(msg) => return Ok(msg),
            DispatchState::Failed(err) => {
                let direction = <M::Kind as MessageKind>::DIRECTION;
                trace!(
                    %direction,
                    len = buf.len(),
                    error = %err,
                    "frame decode failed"
                );
                return Err(err);
            }
        };
    }
}

/// Client messages carry no node trees, so they always encode.
fn write_client_message(msg: &ClientMessage, writer: &mut BufferWriter) {
    match msg {
        ClientMessage::ConnectUsers(m) => from_client::encode_connect_users(m, writer),
        ClientMessage::DisconnectUsers(m) => from_client::encode_disconnect_users(m, writer),
        ClientMessage::Event(m) => from_client::encode_event(m, writer),
        ClientMessage::Pong(m) => from_client::encode_pong(m, writer),
    }
}

fn to_vec<M: WireMessage>(msg: &M) -> EncodeResult<Vec<u8>> {
    let mut writer = BufferWriter::new(DEFAULT_FRAME_CAPACITY);
    msg.encode(&mut writer)?;
    Ok(writer.get_buffer().to_vec())
}

// ============================================================================
// SERVER → CLIENT
// ============================================================================

/// Encode a single server message; the bytes are appended to `writer`.
///
/// Fails for node trees deeper than [`MAX_NODE_DEPTH`](crate::MAX_NODE_DEPTH),
/// leaving `writer` untouched.
pub fn encode_server_message(msg: &ServerMessage, writer: &mut BufferWriter) -> EncodeResult<()> {
    msg.encode(writer)
}

/// Decode a single server message from a buffer holding exactly one.
///
/// Accepts every registered kind; this is what a client uses when it
/// has not negotiated a version (or in tooling).
pub fn decode_server_message(buf: &[u8]) -> DecodeResult<ServerMessage> {
    dispatch(buf, None)
}

/// Like [`decode_server_message`], rejecting kinds newer than `version`.
pub fn decode_server_message_for(
    version: ProtocolVersion,
    buf: &[u8],
) -> DecodeResult<ServerMessage> {
    dispatch(buf, Some(version))
}

pub fn server_message_to_vec(msg: &ServerMessage) -> EncodeResult<Vec<u8>> {
    to_vec(msg)
}

// ============================================================================
// CLIENT → SERVER
// ============================================================================

pub fn encode_client_message(msg: &ClientMessage, writer: &mut BufferWriter) {
    write_client_message(msg, writer);
}

pub fn decode_client_message(buf: &[u8]) -> DecodeResult<ClientMessage> {
    dispatch(buf, None)
}

pub fn decode_client_message_for(
    version: ProtocolVersion,
    buf: &[u8],
) -> DecodeResult<ClientMessage> {
    dispatch(buf, Some(version))
}

pub fn client_message_to_vec(msg: &ClientMessage) -> Vec<u8> {
    let mut writer = BufferWriter::new(DEFAULT_FRAME_CAPACITY);
    write_client_message(msg, &mut writer);
    writer.get_buffer().to_vec()
}
