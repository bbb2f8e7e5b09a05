//! EPP message framing per RFC 5734 §4.
//!
//! Each message on the wire is a four-octet big-endian total length followed
//! by the message body. The total length counts the four header octets, so a
//! frame carrying `n` body bytes is `n + 4` long on the wire.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Length of the message size header in octets.
pub const HEADER_LEN: usize = 4;

/// Errors produced by the frame codec.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The incoming message declared no body or a body beyond the
    /// configured limit.
    #[error("message size exceeds limit: incoming message size {size}")]
    MessageSize {
        /// Declared body size in bytes (total length minus the header).
        size: i64,
    },
    /// The outgoing message would not fit in a 32-bit total length.
    #[error("content is too large: {size} bytes")]
    InvalidSize {
        /// Total frame size that overflowed the header.
        size: u64,
    },
    /// The peer closed the stream cleanly before a new header started.
    #[error("connection closed")]
    Closed,
    /// Underlying I/O error, including unexpected end-of-stream inside a
    /// header or body.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Reads one message from `src` and returns its body.
///
/// Blocks until the four-octet size header is read, validates the declared
/// size, then reads exactly `total - 4` body bytes. The reader never
/// consumes past the body, so the next frame can be read by calling this
/// function again on the same stream. `max_message_size` caps the body
/// size in bytes; zero means no limit.
///
/// # Errors
///
/// Returns [`FrameError::MessageSize`] when the declared total is four or
/// less, or when the body exceeds a non-zero `max_message_size`.
/// Returns [`FrameError::Closed`] when the stream ends cleanly before the
/// header, and an [`io::ErrorKind::UnexpectedEof`] I/O error when it ends
/// inside the header or body.
pub async fn read_frame<R>(src: &mut R, max_message_size: u32) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let body_len = read_frame_header(src, max_message_size).await?;
    read_frame_body(src, body_len).await
}

/// Reads and validates the size header, returning the body length.
///
/// Split out from [`read_frame`] so the server can wait for the header
/// under one deadline and read the body under another.
///
/// # Errors
///
/// See [`read_frame`].
pub async fn read_frame_header<R>(
    src: &mut R,
    max_message_size: u32,
) -> Result<u32, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    let mut filled = 0;

    while filled < HEADER_LEN {
        let n = src.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Err(FrameError::Closed);
            }
            return Err(FrameError::Io(io::ErrorKind::UnexpectedEof.into()));
        }
        filled += n;
    }

    let total = u32::from_be_bytes(header);

    // The size on the wire includes the four header octets.
    let body_len = i64::from(total) - HEADER_LEN as i64;

    if body_len <= 0 || (max_message_size != 0 && body_len > i64::from(max_message_size)) {
        return Err(FrameError::MessageSize { size: body_len });
    }

    u32::try_from(body_len).map_err(|_| FrameError::MessageSize { size: body_len })
}

/// Reads exactly `body_len` body bytes from `src`.
///
/// # Errors
///
/// Returns an [`io::ErrorKind::UnexpectedEof`] I/O error when the stream
/// ends before the full body arrives.
pub async fn read_frame_body<R>(src: &mut R, body_len: u32) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let expected = body_len as usize;
    // Grow with the incoming data instead of trusting the declared size,
    // so an attacker-controlled header cannot force a huge allocation.
    let mut body = Vec::with_capacity(expected.min(64 * 1024));

    let mut limited = src.take(u64::from(body_len));
    let n = limited.read_to_end(&mut body).await?;

    if n < expected {
        return Err(FrameError::Io(io::ErrorKind::UnexpectedEof.into()));
    }

    Ok(body)
}

/// Computes the on-wire total length for a body of `body_len` bytes.
fn frame_total(body_len: usize) -> Result<u32, FrameError> {
    let total = body_len as u64 + HEADER_LEN as u64;
    u32::try_from(total).map_err(|_| FrameError::InvalidSize { size: total })
}

/// Growable message body buffer flushed as one length-prefixed frame.
///
/// Handlers write into the buffer through [`std::io::Write`]; the server
/// flushes it to the connection with [`MessageBuffer::flush_to`], which
/// prepends the RFC 5734 size header and resets the buffer for reuse.
#[derive(Debug, Default)]
pub struct MessageBuffer {
    buf: Vec<u8>,
}

impl MessageBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of buffered body bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Returns `true` when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Discards any buffered bytes.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Flushes the buffer to `dst` after writing the message size header.
    ///
    /// Writes nothing when the buffer is empty. On success the buffer is
    /// reset so it can be reused for the next message.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidSize`] when the framed message would
    /// exceed `u32::MAX` octets, or the underlying I/O error on write
    /// failure.
    pub async fn flush_to<W>(&mut self, dst: &mut W) -> Result<(), FrameError>
    where
        W: AsyncWrite + Unpin,
    {
        if self.buf.is_empty() {
            return Ok(());
        }

        let total = frame_total(self.buf.len())?;

        dst.write_all(&total.to_be_bytes()).await?;
        dst.write_all(&self.buf).await?;
        dst.flush().await?;

        self.buf.clear();

        Ok(())
    }
}

impl io::Write for MessageBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Per-connection response buffer with a latching close flag.
///
/// Created once per connection and reused between commands. A handler
/// writes the response body into the writer; calling
/// [`ResponseWriter::close_after_write`] tells the server to terminate the
/// connection after the current frame is flushed.
#[derive(Debug, Default)]
pub struct ResponseWriter {
    buffer: MessageBuffer,
    close_after_write: bool,
}

impl ResponseWriter {
    /// Creates an empty response writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the connection to be closed after the response is flushed.
    pub fn close_after_write(&mut self) {
        self.close_after_write = true;
    }

    /// Returns `true` when the connection should close after the flush.
    #[must_use]
    pub fn should_close_after_write(&self) -> bool {
        self.close_after_write
    }

    /// Number of buffered body bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` when nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Clears the buffer and the close flag for reuse.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.close_after_write = false;
    }

    /// Flushes the buffered response as one frame.
    ///
    /// # Errors
    ///
    /// See [`MessageBuffer::flush_to`].
    pub async fn flush_to<W>(&mut self, dst: &mut W) -> Result<(), FrameError>
    where
        W: AsyncWrite + Unpin,
    {
        self.buffer.flush_to(dst).await
    }
}

impl io::Write for ResponseWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.buffer, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
