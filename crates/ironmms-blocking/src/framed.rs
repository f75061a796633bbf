use std::io::{self, Read, Write};

use bytes::{Bytes, BytesMut};
use ironmms_pdu::PduHint;

const READ_CHUNK_SIZE: usize = 4096;

/// Buffered frame reader/writer over a blocking byte stream.
///
/// TCP hands out arbitrary byte runs; a [`PduHint`] tells this reader
/// where the next frame boundary lies. Bytes beyond that boundary stay
/// buffered for the next call, so back-to-back frames in one TCP segment
/// are handed out one at a time.
pub struct Framed<S> {
    stream: S,
    buf: BytesMut,
}

impl<S> Framed<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            buf: BytesMut::new(),
        }
    }

    pub fn into_inner(self) -> (S, BytesMut) {
        (self.stream, self.buf)
    }

    pub fn get_inner(&self) -> (&S, &BytesMut) {
        (&self.stream, &self.buf)
    }

    pub fn get_inner_mut(&mut self) -> (&mut S, &mut BytesMut) {
        (&mut self.stream, &mut self.buf)
    }

    pub fn peek(&self) -> &[u8] {
        &self.buf
    }
}

impl<S> Framed<S>
where
    S: Read,
{
    /// Blocks until `length` bytes are buffered, then hands out exactly
    /// that many; anything past them stays buffered.
    pub fn read_exact(&mut self, length: usize) -> io::Result<BytesMut> {
        while self.buf.len() < length {
            self.fill_buf()?;
        }

        Ok(self.buf.split_to(length))
    }

    /// Blocks until the hint can size the next frame, then returns it
    /// whole. An EOF mid-frame is a hard error: the peer quit while a
    /// frame was in flight.
    pub fn read_by_hint(&mut self, hint: &dyn PduHint) -> io::Result<Bytes> {
        loop {
            if let Some(length) = hint.find_size(self.peek()).map_err(io::Error::other)? {
                return Ok(self.read_exact(length)?.freeze());
            }

            self.fill_buf()?;
        }
    }

    /// One stream read into the buffer; EOF is reported as
    /// `UnexpectedEof` since callers only read while expecting data.
    fn fill_buf(&mut self) -> io::Result<()> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        let len = self.stream.read(&mut chunk)?;

        if len == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed"));
        }

        self.buf.extend_from_slice(&chunk[..len]);
        Ok(())
    }
}

impl<S> Framed<S>
where
    S: Write,
{
    /// Writes an entire buffer to the underlying stream.
    pub fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)
    }
}
