//! Encode and decode errors.
//!
//! Every decode failure names the field that could not be read. Buffer
//! primitives only know a generic name (`"varint"`, `"string"`, ...);
//! codecs relabel through [`FieldContext`].

use std::fmt;

use thiserror::Error;

use crate::version::ProtocolVersion;

/// Result type for decode operations.
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Result type for encode operations.
pub type EncodeResult<T> = Result<T, EncodeError>;

/// Values the encoder refuses because no decoder would accept them.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// A node record has more levels than the decoder accepts.
    #[error("node tree is {depth} levels deep, at most {max} can be encoded")]
    NestingTooDeep { depth: usize, max: usize },
}

/// Which namespace a tag was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Server → client messages.
    FromServer,
    /// Client → server messages.
    FromClient,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::FromServer => f.write_str("from-server"),
            Direction::FromClient => f.write_str("from-client"),
        }
    }
}

/// Errors that can arise when decoding a binary frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Fewer bytes available than the field requires.
    #[error("buffer truncated while reading {field}")]
    TruncatedBuffer { field: &'static str },

    /// String bytes are not valid UTF-8.
    #[error("invalid UTF-8 in {field}")]
    InvalidUtf8 { field: &'static str },

    /// Varint too wide for its target, or not in minimal form.
    #[error("overlong varint in {field}")]
    OverlongVarint { field: &'static str },

    /// Tag byte not registered for the expected direction.
    #[error("unknown {direction} message tag {tag}")]
    UnknownTag { tag: u8, direction: Direction },

    /// A nested kind byte or flag is not recognized.
    #[error("unknown discriminant {value} in {field}")]
    UnknownDiscriminant { field: &'static str, value: u8 },

    /// Node records nested deeper than the decoder accepts.
    #[error("node records nested deeper than {max}")]
    NestingTooDeep { max: usize },

    /// Message kind is newer than the negotiated protocol version.
    #[error("{kind} messages are not available in protocol {version}")]
    UnsupportedInVersion {
        kind: &'static str,
        version: ProtocolVersion,
    },

    /// Bytes left over after a complete message.
    #[error("{remaining} trailing bytes after message")]
    TrailingBytes { remaining: usize },

    /// Hello frame without the protocol magic.
    #[error("missing protocol magic in hello frame")]
    BadMagic,
}

impl DecodeError {
    /// Relabel the field this error refers to.
    ///
    /// Errors without a field are returned unchanged.
    pub fn with_field(self, name: &'static str) -> Self {
        match self {
            DecodeError::TruncatedBuffer { .. } => DecodeError::TruncatedBuffer { field: name },
            DecodeError::InvalidUtf8 { .. } => DecodeError::InvalidUtf8 { field: name },
            DecodeError::OverlongVarint { .. } => DecodeError::OverlongVarint { field: name },
            DecodeError::UnknownDiscriminant { value, .. } => {
                DecodeError::UnknownDiscriminant { field: name, value }
            }
            other => other,
        }
    }

    /// True for `TruncatedBuffer`, whatever the field.
    pub fn is_truncated(&self) -> bool {
        matches!(self, DecodeError::TruncatedBuffer { .. })
    }
}

/// Attach a field name to a decode result.
///
/// ```
/// use ndom_protocol::{BufferReader, FieldContext};
///
/// let mut reader = BufferReader::new(&[]);
/// let err = reader.read_varint().field("node_id").unwrap_err();
/// assert_eq!(err.to_string(), "buffer truncated while reading node_id");
/// ```
pub trait FieldContext<T> {
    fn field(self, name: &'static str) -> DecodeResult<T>;
}

impl<T> FieldContext<T> for DecodeResult<T> {
    #[inline]
    fn field(self, name: &'static str) -> DecodeResult<T> {
        self.map_err(|e| e.with_field(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_field_keeps_value() {
        let err = DecodeError::UnknownDiscriminant {
            field: "u8",
            value: 9,
        }
        .with_field("event_kind");
        assert_eq!(
            err,
            DecodeError::UnknownDiscriminant {
                field: "event_kind",
                value: 9
            }
        );
    }

    #[test]
    fn with_field_ignores_fieldless_errors() {
        let err = DecodeError::TrailingBytes { remaining: 2 }.with_field("x");
        assert_eq!(err, DecodeError::TrailingBytes { remaining: 2 });
    }

    #[test]
    fn display_names_direction() {
        let err = DecodeError::UnknownTag {
            tag: 255,
            direction: Direction::FromServer,
        };
        assert_eq!(err.to_string(), "unknown from-server message tag 255");
    }
}
