//! Logical response messages reassembled from frame chains
//!
//! A response may span several chained frames terminated by one unchained
//! frame. Reconstruction validates the chain and concatenates the payloads;
//! the result always ends in a two-byte status word.

use bytes::{Bytes, BytesMut};
use std::fmt;

use crate::{
    constants::{MIN_PAYLOAD_SIZE, STATUS_OK, STATUS_WORD_SIZE},
    error::{Error, Result},
    frame::Frame,
    link::LinkAddress,
};

/// A fully reassembled response from a terminal unit
///
/// # Examples
///
/// ```
/// use termlink_core::{ControlFlags, Frame, LinkAddress, ResponseMessage};
///
/// let first = Frame::new(LinkAddress::Primary, ControlFlags::CHAINED, vec![0xAB, 0xCD]).unwrap();
/// let last = Frame::command(LinkAddress::Primary, vec![0x90, 0x00]).unwrap();
///
/// let message = ResponseMessage::from_frames(&[first, last]).unwrap();
/// assert_eq!(message.body(), &[0xAB, 0xCD]);
/// assert_eq!(message.status(), 0x9000);
/// assert!(message.is_success());
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct ResponseMessage {
    address: LinkAddress,
    unsolicited: bool,
    payload: Bytes,
}

impl ResponseMessage {
    /// Create a response message from an already-assembled payload
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayloadSize`] if the payload is shorter than
    /// the trailing status word.
    pub fn new(
        address: LinkAddress,
        unsolicited: bool,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let payload = payload.into();

        if payload.len() < MIN_PAYLOAD_SIZE {
            return Err(Error::InvalidPayloadSize {
                size: payload.len(),
            });
        }

        Ok(Self {
            address,
            unsolicited,
            payload,
        })
    }

    /// Reconstruct a response from an ordered chain of frames
    ///
    /// The chain is valid iff it is non-empty, every frame but the last is
    /// chained, the last is unchained, and all frames share one link address
    /// and one unsolicited flag.
    ///
    /// # Errors
    ///
    /// Returns an error naming the violated chain property.
    pub fn from_frames(frames: &[Frame]) -> Result<Self> {
        let last = frames.last().ok_or(Error::EmptyChain)?;

        if last.chained() {
            return Err(Error::MissingTerminalFrame);
        }
        if frames[..frames.len() - 1].iter().any(|f| !f.chained()) {
            return Err(Error::PrematureTerminalFrame);
        }
        if frames.iter().any(|f| f.address() != last.address()) {
            return Err(Error::InconsistentLinkAddress);
        }
        if frames.iter().any(|f| f.unsolicited() != last.unsolicited()) {
            return Err(Error::InconsistentSolicitedFlag);
        }

        let total = frames.iter().map(|f| f.payload().len()).sum();
        let mut payload = BytesMut::with_capacity(total);
        for frame in frames {
            payload.extend_from_slice(frame.payload());
        }

        Self::new(last.address(), last.unsolicited(), payload.freeze())
    }

    /// Link address the response arrived on
    pub fn address(&self) -> LinkAddress {
        self.address
    }

    /// Whether the response arrived unprompted
    pub fn unsolicited(&self) -> bool {
        self.unsolicited
    }

    /// Full payload including the trailing status word
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Payload minus the trailing status word
    pub fn body(&self) -> &[u8] {
        &self.payload[..self.payload.len() - STATUS_WORD_SIZE]
    }

    /// Status code: big-endian combination of the last two payload bytes
    pub fn status(&self) -> u16 {
        let tail = &self.payload[self.payload.len() - STATUS_WORD_SIZE..];
        u16::from_be_bytes([tail[0], tail[1]])
    }

    /// Whether the status word equals the single "OK" value
    ///
    /// This is an exact-match check against `0x9000`; no prefix or range
    /// rule applies.
    pub fn is_success(&self) -> bool {
        self.status() == STATUS_OK
    }
}

impl fmt::Debug for ResponseMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseMessage")
            .field("address", &self.address)
            .field("unsolicited", &self.unsolicited)
            .field("status", &format!("0x{:04X}", self.status()))
            .field("body", &hex::encode_upper(self.body()))
            .finish()
    }
}

impl fmt::Display for ResponseMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Response[{}](status=0x{:04X}, body_len={})",
            self.address,
            self.status(),
            self.body().len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ControlFlags;
    use pretty_assertions::assert_eq;

    fn chained(address: LinkAddress, unsolicited: bool, payload: &[u8]) -> Frame {
        let mut control = ControlFlags::CHAINED;
        if unsolicited {
            control |= ControlFlags::UNSOLICITED;
        }
        Frame::new(address, control, payload.to_vec()).unwrap()
    }

    fn terminal(address: LinkAddress, unsolicited: bool, payload: &[u8]) -> Frame {
        let control = if unsolicited {
            ControlFlags::UNSOLICITED
        } else {
            ControlFlags::empty()
        };
        Frame::new(address, control, payload.to_vec()).unwrap()
    }

    #[test]
    fn test_single_frame_response() {
        let message =
            ResponseMessage::from_frames(&[terminal(LinkAddress::Primary, false, &[0x90, 0x00])])
                .unwrap();

        assert_eq!(message.address(), LinkAddress::Primary);
        assert!(!message.unsolicited());
        assert_eq!(message.body(), &[] as &[u8]);
        assert_eq!(message.status(), 0x9000);
        assert!(message.is_success());
    }

    #[test]
    fn test_chain_concatenates_in_order() {
        let frames = [
            chained(LinkAddress::Secondary, true, &[0x01, 0x02]),
            chained(LinkAddress::Secondary, true, &[0x03, 0x04]),
            terminal(LinkAddress::Secondary, true, &[0x05, 0x64, 0x00]),
        ];

        let message = ResponseMessage::from_frames(&frames).unwrap();

        assert_eq!(message.payload().as_ref(), &[1, 2, 3, 4, 5, 0x64, 0x00]);
        assert_eq!(message.body(), &[1, 2, 3, 4, 5]);
        assert_eq!(message.status(), 0x6400);
        assert!(message.unsolicited());
        assert!(!message.is_success());
    }

    #[test]
    fn test_empty_chain() {
        assert!(matches!(
            ResponseMessage::from_frames(&[]),
            Err(Error::EmptyChain)
        ));
    }

    #[test]
    fn test_missing_terminal_frame() {
        let frames = [chained(LinkAddress::Primary, false, &[0x90, 0x00])];

        assert!(matches!(
            ResponseMessage::from_frames(&frames),
            Err(Error::MissingTerminalFrame)
        ));
    }

    #[test]
    fn test_premature_terminal_frame() {
        let frames = [
            terminal(LinkAddress::Primary, false, &[0x01, 0x02]),
            terminal(LinkAddress::Primary, false, &[0x90, 0x00]),
        ];

        assert!(matches!(
            ResponseMessage::from_frames(&frames),
            Err(Error::PrematureTerminalFrame)
        ));
    }

    #[test]
    fn test_inconsistent_link_address() {
        let frames = [
            chained(LinkAddress::Primary, false, &[0x01, 0x02]),
            terminal(LinkAddress::Secondary, false, &[0x90, 0x00]),
        ];

        assert!(matches!(
            ResponseMessage::from_frames(&frames),
            Err(Error::InconsistentLinkAddress)
        ));
    }

    #[test]
    fn test_flipping_unsolicited_flag_anywhere_fails() {
        for flipped in 0..3 {
            let frames: Vec<Frame> = (0..3)
                .map(|i| {
                    let unsolicited = i == flipped;
                    if i < 2 {
                        chained(LinkAddress::Primary, unsolicited, &[i as u8, 0])
                    } else {
                        terminal(LinkAddress::Primary, unsolicited, &[0x90, 0x00])
                    }
                })
                .collect();

            assert!(matches!(
                ResponseMessage::from_frames(&frames),
                Err(Error::InconsistentSolicitedFlag)
            ));
        }
    }

    #[test]
    fn test_failure_status_is_not_success() {
        for status in [[0x6F, 0x00], [0x69, 0x85], [0x91, 0x00], [0x90, 0x01]] {
            let message =
                ResponseMessage::from_frames(&[terminal(LinkAddress::Primary, false, &status)])
                    .unwrap();
            assert!(!message.is_success());
        }
    }

    #[test]
    fn test_new_rejects_short_payload() {
        assert!(matches!(
            ResponseMessage::new(LinkAddress::Primary, false, vec![0x90]),
            Err(Error::InvalidPayloadSize { size: 1 })
        ));
    }
}
