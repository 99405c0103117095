//! Terminal link frame structure and encoding/decoding

use bitflags::bitflags;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    constants::{FRAME_OVERHEAD, MAX_PAYLOAD_SIZE, MIN_FRAME_SIZE, MIN_PAYLOAD_SIZE},
    error::{Error, Result},
    link::LinkAddress,
};

bitflags! {
    /// Control byte of a frame
    ///
    /// Only two bits are assigned; a control byte with any other bit set is
    /// invalid on the wire.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ControlFlags: u8 {
        /// More frames of the same response follow
        const CHAINED = 0x01;

        /// The frame carries unprompted traffic
        const UNSOLICITED = 0x40;
    }
}

/// A single wire unit of the terminal link protocol
///
/// # Frame Structure
///
/// ```text
/// ┌─────────────┬─────────────┬─────────────┬─────────────┬─────────────┐
/// │   Address   │   Control   │   Length    │   Payload   │  Checksum   │
/// │   1 byte    │   1 byte    │   1 byte    │  2-254 B    │   1 byte    │
/// └─────────────┴─────────────┴─────────────┴─────────────┴─────────────┘
/// ```
///
/// The checksum is the XOR of every preceding frame byte. Frames are
/// immutable once constructed, either by decoding bytes off the stream or by
/// encoding an outgoing command payload.
///
/// # Examples
///
/// ```
/// use termlink_core::{Frame, LinkAddress};
///
/// let frame = Frame::command(LinkAddress::Primary, vec![0x90, 0x00]).unwrap();
/// let encoded = frame.encode();
/// assert_eq!(&encoded[..], &[1, 0, 2, 0x90, 0x00, 0x93]);
///
/// let decoded = Frame::decode(&encoded).unwrap();
/// assert_eq!(decoded, frame);
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    address: LinkAddress,
    control: ControlFlags,
    payload: Bytes,
}

impl Frame {
    /// Create a frame with an explicit control byte
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPayloadSize`] if the payload is outside the
    /// 2-254 byte domain.
    pub fn new(
        address: LinkAddress,
        control: ControlFlags,
        payload: impl Into<Bytes>,
    ) -> Result<Self> {
        let payload = payload.into();

        if payload.len() < MIN_PAYLOAD_SIZE || payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::InvalidPayloadSize {
                size: payload.len(),
            });
        }

        Ok(Self {
            address,
            control,
            payload,
        })
    }

    /// Create an outgoing command frame (unchained, solicited)
    pub fn command(address: LinkAddress, payload: impl Into<Bytes>) -> Result<Self> {
        Self::new(address, ControlFlags::empty(), payload)
    }

    /// Link address the frame is directed at
    pub fn address(&self) -> LinkAddress {
        self.address
    }

    /// Control flags of the frame
    pub fn control(&self) -> ControlFlags {
        self.control
    }

    /// Whether more frames of the same response follow
    pub fn chained(&self) -> bool {
        self.control.contains(ControlFlags::CHAINED)
    }

    /// Whether the frame carries unprompted traffic
    pub fn unsolicited(&self) -> bool {
        self.control.contains(ControlFlags::UNSOLICITED)
    }

    /// Payload bytes
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Consume the frame, returning its payload
    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    /// Encode the frame to wire bytes, computing the checksum
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(FRAME_OVERHEAD + self.payload.len());

        buf.put_u8(self.address.to_wire());
        buf.put_u8(self.control.bits());
        buf.put_u8(self.payload.len() as u8);
        buf.put_slice(&self.payload);
        buf.put_u8(checksum::calculate(&buf));

        buf
    }

    /// Decode a complete frame from a byte buffer
    ///
    /// The buffer must hold exactly one frame. The checksum is verified over
    /// the whole buffer before any field is interpreted, so corruption
    /// anywhere in the frame surfaces as a checksum error.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Buffer is shorter than a minimum frame
    /// - Checksum verification fails
    /// - Address, control or length byte is invalid
    /// - Declared length does not match the bytes present
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < MIN_FRAME_SIZE {
            return Err(Error::FrameTooShort {
                expected: MIN_FRAME_SIZE,
                actual: buf.len(),
            });
        }

        let (body, received) = buf.split_at(buf.len() - 1);
        let received = received[0];
        let expected = checksum::calculate(body);
        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        let address = LinkAddress::from_wire(body[0])?;
        let control = ControlFlags::from_bits(body[1]).ok_or(Error::InvalidControl(body[1]))?;
        let length = validate_length(body[2])?;

        let payload = &body[3..];
        if payload.len() != length {
            return Err(Error::LengthMismatch {
                declared: length,
                actual: payload.len(),
            });
        }

        Ok(Self {
            address,
            control,
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// Total encoded size of the frame
    pub fn size(&self) -> usize {
        FRAME_OVERHEAD + self.payload.len()
    }
}

/// Check a wire length byte against the valid payload domain
pub(crate) fn validate_length(byte: u8) -> Result<usize> {
    let length = byte as usize;
    if (MIN_PAYLOAD_SIZE..=MAX_PAYLOAD_SIZE).contains(&length) {
        Ok(length)
    } else {
        Err(Error::InvalidLength(byte))
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("address", &self.address)
            .field("chained", &self.chained())
            .field("unsolicited", &self.unsolicited())
            .field("payload", &hex::encode_upper(&self.payload))
            .finish()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Frame[{}](control=0x{:02X}, len={})",
            self.address,
            self.control.bits(),
            self.payload.len()
        )
    }
}
