//! Buffer primitives.
//!
//! [`BufferWriter`] appends to a growable `BytesMut`; [`BufferReader`]
//! walks a borrowed slice with a forward-only cursor. The two are
//! separate types so a buffer is never read and written at once.
//!
//! Encodings:
//!
//! ```text
//! varint : unsigned LEB128, 7 bits per byte, least significant group
//!          first, 0x80 set on every byte except the last. Minimal form.
//! string : varint(utf8_len) ++ utf8 bytes      ("" => [0x00])
//! bool   : one byte, 0 or 1
//! fixed  : u32 / u64 / f32 / f64, little-endian
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{DecodeError, DecodeResult};

/// Longest varint the reader accepts (`u64::MAX`).
pub const MAX_VARINT_LEN: usize = 10;

// ============================================================================
// Writer
// ============================================================================

/// Growable output buffer.
#[derive(Debug, Default)]
pub struct BufferWriter {
    buf: BytesMut,
}

impl BufferWriter {
    pub fn new(initial_capacity: usize) -> Self {
        BufferWriter {
            buf: BytesMut::with_capacity(initial_capacity),
        }
    }

    #[inline]
    pub fn write_uint8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    #[inline]
    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(u8::from(value));
    }

    /// Unsigned LEB128; always the minimal number of bytes.
    pub fn write_varint(&mut self, mut value: u64) {
        while value >= 0x80 {
            self.buf.put_u8((value as u8 & 0x7f) | 0x80);
            value >>= 7;
        }
        self.buf.put_u8(value as u8);
    }

    /// Length-prefixed UTF-8.
    pub fn write_string(&mut self, value: &str) {
        self.write_varint(value.len() as u64);
        self.buf.put_slice(value.as_bytes());
    }

    /// Raw bytes, no length prefix.
    pub fn write_bytes(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    pub fn write_fixed_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_fixed_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buf.put_f32_le(value);
    }

    pub fn write_f64(&mut self, value: f64) {
        self.buf.put_f64_le(value);
    }

    /// The exact bytes written so far.
    pub fn get_buffer(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

// ============================================================================
// Reader
// ============================================================================

/// Forward-only reader over one message's bytes.
#[derive(Debug, Clone)]
pub struct BufferReader<'a> {
    cursor: &'a [u8],
    total: usize,
}

impl<'a> BufferReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        BufferReader {
            cursor: bytes,
            total: bytes.len(),
        }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.total - self.cursor.len()
    }

    pub fn remaining(&self) -> usize {
        self.cursor.remaining()
    }

    pub fn is_empty(&self) -> bool {
        !self.cursor.has_remaining()
    }

    fn ensure(&self, needed: usize, field: &'static str) -> DecodeResult<()> {
        if self.cursor.remaining() < needed {
            return Err(DecodeError::TruncatedBuffer { field });
        }
        Ok(())
    }

    pub fn read_uint8(&mut self) -> DecodeResult<u8> {
        self.ensure(1, "uint8")?;
        Ok(self.cursor.get_u8())
    }

    /// One byte that must be 0 or 1.
    pub fn read_bool(&mut self) -> DecodeResult<bool> {
        self.ensure(1, "bool")?;
        match self.cursor.get_u8() {
            0 => Ok(false),
            1 => Ok(true),
            value => Err(DecodeError::UnknownDiscriminant {
                field: "bool",
                value,
            }),
        }
    }

    /// Unsigned LEB128 up to `u64`.
    ///
    /// Rejects encodings longer than [`MAX_VARINT_LEN`], values that
    /// overflow `u64`, and non-minimal forms (a trailing zero group).
    pub fn read_varint(&mut self) -> DecodeResult<u64> {
        let mut value: u64 = 0;
        for i in 0..MAX_VARINT_LEN {
            self.ensure(1, "varint")?;
            let byte = self.cursor.get_u8();

            // Only one bit of the tenth group fits in a u64.
            if i == MAX_VARINT_LEN - 1 && byte > 1 {
                return Err(DecodeError::OverlongVarint { field: "varint" });
            }

            value |= u64::from(byte & 0x7f) << (7 * i);

            if byte & 0x80 == 0 {
                if i > 0 && byte == 0 {
                    return Err(DecodeError::OverlongVarint { field: "varint" });
                }
                return Ok(value);
            }
        }
        Err(DecodeError::OverlongVarint { field: "varint" })
    }

    /// Varint that must fit a `u32` (ids, counts, sequence numbers).
    pub fn read_varint_u32(&mut self) -> DecodeResult<u32> {
        let value = self.read_varint()?;
        u32::try_from(value).map_err(|_| DecodeError::OverlongVarint { field: "varint" })
    }

    /// Length-prefixed UTF-8.
    pub fn read_string(&mut self) -> DecodeResult<String> {
        let len = self.read_varint()?;
        if len > self.cursor.remaining() as u64 {
            return Err(DecodeError::TruncatedBuffer { field: "string" });
        }
        let bytes = self.read_bytes(len as usize)?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 { field: "string" })
    }

    /// Borrow the next `len` raw bytes.
    pub fn read_bytes(&mut self, len: usize) -> DecodeResult<&'a [u8]> {
        self.ensure(len, "bytes")?;
        let (head, tail) = self.cursor.split_at(len);
        self.cursor = tail;
        Ok(head)
    }

    pub fn read_fixed_u32(&mut self) -> DecodeResult<u32> {
        self.ensure(4, "fixed_u32")?;
        Ok(self.cursor.get_u32_le())
    }

    pub fn read_fixed_u64(&mut self) -> DecodeResult<u64> {
        self.ensure(8, "fixed_u64")?;
        Ok(self.cursor.get_u64_le())
    }

    pub fn read_f32(&mut self) -> DecodeResult<f32> {
        self.ensure(4, "f32")?;
        Ok(self.cursor.get_f32_le())
    }

    pub fn read_f64(&mut self) -> DecodeResult<f64> {
        self.ensure(8, "f64")?;
        Ok(self.cursor.get_f64_le())
    }
}
