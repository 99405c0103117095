//! Response reader
//!
//! Turns a raw byte stream into discrete [`ResponseMessage`]s. Chained
//! frames accumulate per link address until an unchained frame terminates
//! the chain; the two links' chains progress independently and may
//! interleave arbitrarily in the byte stream. Messages come out in the
//! order their chains complete, not the order they start.

use std::io::Read;

use tracing::{trace, warn};

use crate::{
    codec::FrameReader,
    frame::Frame,
    link::PerLink,
    response::ResponseMessage,
};

/// Streaming reader of reassembled responses
///
/// Once the underlying stream ends, breaks, or yields an inconsistent chain,
/// the reader is permanently exhausted: every further call returns `None`.
pub struct ResponseReader<R> {
    frames: FrameReader<R>,
    pending: PerLink<Vec<Frame>>,
    finished: bool,
}

impl<R: Read> ResponseReader<R> {
    /// Wrap a byte stream
    pub fn new(stream: R) -> Self {
        Self {
            frames: FrameReader::new(stream),
            pending: PerLink::default(),
            finished: false,
        }
    }

    /// Read frames until a chain completes, yielding its response
    ///
    /// Decode errors and chain inconsistencies are logged and collapse into
    /// `None`, exactly like end-of-stream; the caller cannot distinguish a
    /// clean EOF from a corrupt frame here.
    pub fn next_message(&mut self) -> Option<ResponseMessage> {
        if self.finished {
            return None;
        }

        loop {
            let frame = match self.frames.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    self.finished = true;
                    return None;
                }
                Err(e) => {
                    warn!(error = %e, "frame decode failed; reader exhausted");
                    self.finished = true;
                    return None;
                }
            };

            let link = frame.address();

            if frame.chained() {
                let pending = self.pending.get_mut(link);
                if let Some(first) = pending.first() {
                    if first.unsolicited() != frame.unsolicited() {
                        warn!(
                            link = %link,
                            "unsolicited flag changed mid-chain; reader exhausted"
                        );
                        self.finished = true;
                        return None;
                    }
                }
                trace!(link = %link, accumulated = pending.len() + 1, "chained frame");
                pending.push(frame);
                continue;
            }

            let mut chain = std::mem::take(self.pending.get_mut(link));
            chain.push(frame);

            match ResponseMessage::from_frames(&chain) {
                Ok(message) => {
                    trace!(link = %link, frames = chain.len(), "chain complete");
                    return Some(message);
                }
                Err(e) => {
                    warn!(error = %e, link = %link, "chain reconstruction failed; reader exhausted");
                    self.finished = true;
                    return None;
                }
            }
        }
    }
}
