//! Error types for termlink-core

/// Result type alias for termlink wire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Wire-level protocol errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Frame buffer is too short to be valid
    #[error("Frame too short: expected at least {expected} bytes, got {actual} bytes")]
    FrameTooShort {
        expected: usize,
        actual: usize,
    },

    /// Address byte is not a known link address
    #[error("Invalid link address: 0x{0:02X}")]
    InvalidAddress(u8),

    /// Control byte has bits set outside the chained/unsolicited flags
    #[error("Invalid control byte: 0x{0:02X}")]
    InvalidControl(u8),

    /// Length byte outside the valid payload domain
    #[error("Invalid length byte: {0}")]
    InvalidLength(u8),

    /// Declared payload length does not match the bytes present
    #[error("Length mismatch: declared {declared} bytes, got {actual} bytes")]
    LengthMismatch {
        declared: usize,
        actual: usize,
    },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:02X}, received 0x{received:02X}")]
    ChecksumMismatch {
        expected: u8,
        received: u8,
    },

    /// Payload size outside the encodable domain
    #[error("Invalid payload size: {size} bytes")]
    InvalidPayloadSize {
        size: usize,
    },

    /// Attempted to reconstruct a response from no frames
    #[error("Empty frame chain")]
    EmptyChain,

    /// No terminating unchained frame at the end of the chain
    #[error("No terminating unchained frame")]
    MissingTerminalFrame,

    /// Unchained frame in the middle of a chain
    #[error("Unchained frame before the end of the chain")]
    PrematureTerminalFrame,

    /// Frames of one chain carry different link addresses
    #[error("Inconsistent link address within chain")]
    InconsistentLinkAddress,

    /// Frames of one chain carry different unsolicited flags
    #[error("Inconsistent solicited flag within chain")]
    InconsistentSolicitedFlag,
}
