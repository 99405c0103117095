//! Streaming frame decoder
//!
//! Decodes frames incrementally off a live byte stream. Bytes pulled from the
//! stream are retained in an internal buffer until a whole frame is present,
//! so an attempt that runs dry before the length byte leaves every undecoded
//! byte in place for a later retry.

use std::io::Read;

use bytes::{Buf, BytesMut};
use tracing::{trace, warn};

use crate::{
    checksum,
    error::{Error, Result},
    frame::{validate_length, ControlFlags, Frame},
    link::LinkAddress,
};

const HEADER_SIZE: usize = 3;
const READ_CHUNK_SIZE: usize = 512;

/// Incremental frame decoder over a byte stream
///
/// `read_frame` commits a frame atomically: it either yields a complete,
/// checksum-verified [`Frame`], a decode error, or "no frame" when the stream
/// has ended or broken. Header fields are validated as soon as the three
/// header bytes are available, before any payload is awaited.
pub struct FrameReader<R> {
    stream: R,
    buf: BytesMut,
}

enum Step {
    Frame(Frame),
    NeedMore,
}

impl<R: Read> FrameReader<R> {
    /// Wrap a byte stream
    pub fn new(stream: R) -> Self {
        Self {
            stream,
            buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
        }
    }

    /// Decode the next frame off the stream
    ///
    /// Returns `Ok(None)` when the stream ends or raises an I/O error. If
    /// that happens before the length byte was available, the buffered
    /// prefix is kept and a later call re-observes the same bytes.
    ///
    /// # Errors
    ///
    /// Propagates wire decode errors (invalid address, control or length
    /// byte, checksum mismatch). The consumed frame bytes are discarded.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            match self.try_decode()? {
                Step::Frame(frame) => return Ok(Some(frame)),
                Step::NeedMore => {
                    if !self.fill() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Attempt to decode one frame from the buffered bytes
    fn try_decode(&mut self) -> Result<Step> {
        if self.buf.len() < HEADER_SIZE {
            return Ok(Step::NeedMore);
        }

        let address = LinkAddress::from_wire(self.buf[0])?;
        let control =
            ControlFlags::from_bits(self.buf[1]).ok_or(Error::InvalidControl(self.buf[1]))?;
        let length = validate_length(self.buf[2])?;

        // header + payload + checksum
        let total = HEADER_SIZE + length + 1;
        if self.buf.len() < total {
            return Ok(Step::NeedMore);
        }

        let mut bytes = self.buf.split_to(total);
        let received = bytes[total - 1];
        let expected = checksum::calculate(&bytes[..total - 1]);
        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        bytes.advance(HEADER_SIZE);
        bytes.truncate(length);

        trace!(
            address = %address,
            control = format!("0x{:02X}", control.bits()),
            length,
            "decoded frame"
        );

        // sizes already validated against the wire domain
        let frame = Frame::new(address, control, bytes.freeze())?;
        Ok(Step::Frame(frame))
    }

    /// Pull more bytes off the stream; false on EOF or I/O error
    fn fill(&mut self) -> bool {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        match self.stream.read(&mut chunk) {
            Ok(0) => {
                trace!("stream reached end of input");
                false
            }
            Ok(n) => {
                self.buf.extend_from_slice(&chunk[..n]);
                true
            }
            Err(e) => {
                warn!(error = %e, "stream read failed");
                false
            }
        }
    }
}
