//! Protocol versions and the session-start exchange.
//!
//! The first frame in each direction is a hello, not a tagged message:
//!
//! ```text
//! ClientHello : "NDOM" varint(count) count × version_byte
//! ServerHello : "NDOM" version_byte
//! ```
//!
//! The server picks the highest version both sides support. Version
//! bytes a client offers but this build does not know are skipped, so
//! newer clients can still land on a common version.
//!
//! Fixed-width fields (event coordinates as `f32`, document time as
//! `u64` milliseconds) are little-endian in every version.

use std::fmt;

use crate::buffer::{BufferReader, BufferWriter};
use crate::error::{DecodeError, DecodeResult, FieldContext};
use crate::message_types::{ClientMessageType, ServerMessageType};

/// Leading bytes of every hello frame.
pub const HELLO_MAGIC: &[u8; 4] = b"NDOM";

/// A protocol revision.
///
/// - `V1`: snapshot, child/attribute/text mutations, ping, warning,
///   error; events and pong upstream.
/// - `V2`: adds batch markers, document time, and user connect /
///   disconnect notices.
#[repr(u8)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ProtocolVersion {
    V1 = 1,
    V2 = 2,
}

impl ProtocolVersion {
    pub const LATEST: ProtocolVersion = ProtocolVersion::V2;

    /// Every version this build speaks, oldest first.
    pub const SUPPORTED: [ProtocolVersion; 2] = [ProtocolVersion::V1, ProtocolVersion::V2];

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(ProtocolVersion::V1),
            2 => Some(ProtocolVersion::V2),
            _ => None,
        }
    }

    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Sub-protocol name, e.g. for a WebSocket handshake.
    pub fn subprotocol(self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "ndom-v1",
            ProtocolVersion::V2 => "ndom-v2",
        }
    }

    pub fn from_subprotocol(name: &str) -> Option<Self> {
        Self::SUPPORTED
            .into_iter()
            .find(|v| v.subprotocol() == name)
    }

    /// Highest version present in `offered` that this build supports.
    pub fn negotiate(offered: &[ProtocolVersion]) -> Option<ProtocolVersion> {
        offered
            .iter()
            .copied()
            .filter(|v| Self::SUPPORTED.contains(v))
            .max()
    }

    pub fn allows_server(self, kind: ServerMessageType) -> bool {
        kind.since() <= self
    }

    pub fn allows_client(self, kind: ClientMessageType) -> bool {
        kind.since() <= self
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.subprotocol())
    }
}

/// Versions a client is willing to speak.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientHello {
    pub versions: Vec<ProtocolVersion>,
}

/// The version the server chose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerHello {
    pub version: ProtocolVersion,
}

impl ClientHello {
    /// Offer every supported version.
    pub fn all_supported() -> Self {
        ClientHello {
            versions: ProtocolVersion::SUPPORTED.to_vec(),
        }
    }

    pub fn negotiate(&self) -> Option<ProtocolVersion> {
        ProtocolVersion::negotiate(&self.versions)
    }
}

pub fn encode_client_hello(hello: &ClientHello, writer: &mut BufferWriter) {
    writer.write_bytes(HELLO_MAGIC);
    writer.write_varint(hello.versions.len() as u64);
    for v in &hello.versions {
        writer.write_uint8(v.as_u8());
    }
}

pub fn decode_client_hello(buf: &[u8]) -> DecodeResult<ClientHello> {
    let mut reader = BufferReader::new(buf);
    read_magic(&mut reader)?;

    let count = reader.read_varint_u32().field("version_count")?;
    let mut versions = Vec::with_capacity((count as usize).min(reader.remaining()));
    for _ in 0..count {
        let raw = reader.read_uint8().field("version")?;
        if let Some(v) = ProtocolVersion::from_u8(raw) {
            versions.push(v);
        }
    }

    finish(&reader)?;
    Ok(ClientHello { versions })
}

pub fn encode_server_hello(hello: &ServerHello, writer: &mut BufferWriter) {
    writer.write_bytes(HELLO_MAGIC);
    writer.write_uint8(hello.version.as_u8());
}

pub fn decode_server_hello(buf: &[u8]) -> DecodeResult<ServerHello> {
    let mut reader = BufferReader::new(buf);
    read_magic(&mut reader)?;

    let raw = reader.read_uint8().field("version")?;
    let version = ProtocolVersion::from_u8(raw).ok_or(DecodeError::UnknownDiscriminant {
        field: "version",
        value: raw,
    })?;

    finish(&reader)?;
    Ok(ServerHello { version })
}

fn read_magic(reader: &mut BufferReader<'_>) -> DecodeResult<()> {
    let magic = reader.read_bytes(HELLO_MAGIC.len()).field("magic")?;
    if magic != HELLO_MAGIC {
        return Err(DecodeError::BadMagic);
    }
    Ok(())
}

fn finish(reader: &BufferReader<'_>) -> DecodeResult<()> {
    if !reader.is_empty() {
        return Err(DecodeError::TrailingBytes {
            remaining: reader.remaining(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negotiate_picks_highest_common() {
        use ProtocolVersion::*;
        assert_eq!(ProtocolVersion::negotiate(&[V1, V2]), Some(V2));
        assert_eq!(ProtocolVersion::negotiate(&[V2, V1]), Some(V2));
        assert_eq!(ProtocolVersion::negotiate(&[V1]), Some(V1));
        assert_eq!(ProtocolVersion::negotiate(&[]), None);
    }

    #[test]
    fn gating_follows_since() {
        assert!(!ProtocolVersion::V1.allows_server(ServerMessageType::BatchStart));
        assert!(ProtocolVersion::V2.allows_server(ServerMessageType::BatchStart));
        assert!(ProtocolVersion::V1.allows_server(ServerMessageType::Error));
        assert!(!ProtocolVersion::V1.allows_client(ClientMessageType::ConnectUsers));
        assert!(ProtocolVersion::V1.allows_client(ClientMessageType::Pong));
    }

    #[test]
    fn subprotocol_names() {
        assert_eq!(
            ProtocolVersion::from_subprotocol("ndom-v2"),
            Some(ProtocolVersion::V2)
        );
        assert_eq!(ProtocolVersion::from_subprotocol("ndom-v9"), None);
        assert_eq!(ProtocolVersion::V1.to_string(), "ndom-v1");
    }

    #[test]
    fn client_hello_layout() {
        let mut w = BufferWriter::new(8);
        encode_client_hello(&ClientHello::all_supported(), &mut w);
        assert_eq!(w.get_buffer(), b"NDOM\x02\x01\x02");

        let hello = decode_client_hello(w.get_buffer()).unwrap();
        assert_eq!(hello.negotiate(), Some(ProtocolVersion::V2));
    }

    #[test]
    fn client_hello_skips_unknown_versions() {
        let hello = decode_client_hello(b"NDOM\x03\x01\x07\x09").unwrap();
        assert_eq!(hello.versions, vec![ProtocolVersion::V1]);
        assert_eq!(hello.negotiate(), Some(ProtocolVersion::V1));

        let hello = decode_client_hello(b"NDOM\x01\x63").unwrap();
        assert_eq!(hello.negotiate(), None);
    }

    #[test]
    fn server_hello_layout() {
        let mut w = BufferWriter::new(5);
        encode_server_hello(
            &ServerHello {
                version: ProtocolVersion::V1,
            },
            &mut w,
        );
        assert_eq!(w.get_buffer(), b"NDOM\x01");
        assert_eq!(
            decode_server_hello(w.get_buffer()).unwrap().version,
            ProtocolVersion::V1
        );
    }

    #[test]
    fn hello_errors() {
        assert_eq!(decode_client_hello(b"XDOM\x00"), Err(DecodeError::BadMagic));
        assert_eq!(
            decode_client_hello(b"ND"),
            Err(DecodeError::TruncatedBuffer { field: "magic" })
        );
        assert_eq!(
            decode_server_hello(b"NDOM\x05"),
            Err(DecodeError::UnknownDiscriminant {
                field: "version",
                value: 5
            })
        );
        assert_eq!(
            decode_server_hello(b"NDOM\x02\x00"),
            Err(DecodeError::TrailingBytes { remaining: 1 })
        );
    }
}
