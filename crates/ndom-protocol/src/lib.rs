//! ndom-protocol
//!
//! Wire-level encoding/decoding for networked DOM sessions.
//!
//! This crate turns logical messages (`ndom_core::ServerMessage` /
//! `ClientMessage`) into bytes and back again. It never touches a
//! socket; framing and transport belong to the server crate.
//!
//! - [`buffer`]       : varint / string / fixed-width primitives
//! - [`version`]      : protocol versions and the hello exchange
//! - [`binary_codec`] : tag dispatch for whole messages
//! - [`json_codec`]   : one-message-per-line JSON (for tools / replay)

pub mod binary_codec;
pub mod buffer;
pub mod error;
pub mod from_client;
pub mod from_server;
pub mod json_codec;
pub mod message_types;
pub mod node_codec;
pub mod version;

pub use buffer::{BufferReader, BufferWriter, MAX_VARINT_LEN};
pub use error::{DecodeError, DecodeResult, Direction, EncodeError, EncodeResult, FieldContext};
pub use message_types::{ClientMessageType, MessageKind, ServerMessageType};
pub use node_codec::{check_node_depth, decode_node, encode_node, MAX_NODE_DEPTH};
pub use version::{
    decode_client_hello,
    decode_server_hello,
    encode_client_hello,
    encode_server_hello,
    ClientHello,
    ProtocolVersion,
    ServerHello,
    HELLO_MAGIC,
};

pub use binary_codec::{
    client_message_to_vec,
    decode_client_message,
    decode_client_message_for,
    decode_server_message,
    decode_server_message_for,
    encode_client_message,
    encode_server_message,
    server_message_to_vec,
    DispatchState,
    WireMessage,
};
