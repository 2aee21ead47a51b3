//! Length-prefixed framing over a byte stream.
//!
//! ```text
//! [0..4] : body length, u32 big-endian
//! [4..]  : body (one hello or one encoded message)
//! ```

use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub const LEN_PREFIX: usize = 4;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame of {len} bytes exceeds limit of {max}")]
    TooLarge { len: usize, max: usize },

    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}

/// Read one frame body.
///
/// `Ok(None)` means the peer closed the stream between frames. A close
/// in the middle of a frame is an error. Empty frames are skipped.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<Bytes>, FrameError>
where
    R: AsyncRead + Unpin,
{
    loop {
        let len = match reader.read_u32().await {
            Ok(len) => len as usize,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if len == 0 {
            continue;
        }
        if len > max_len {
            return Err(FrameError::TooLarge { len, max: max_len });
        }

        let mut body = BytesMut::zeroed(len);
        reader.read_exact(&mut body).await?;
        return Ok(Some(body.freeze()));
    }
}

/// Write one frame and flush.
pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut frame = BytesMut::with_capacity(LEN_PREFIX + body.len());
    frame.put_u32(body.len() as u32);
    frame.put_slice(body);

    writer.write_all(&frame).await?;
    writer.flush().await
}
