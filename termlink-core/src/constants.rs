//! Protocol constants

/// Status word a terminal unit reports on success
pub const STATUS_OK: u16 = 0x9000;

/// Size of the trailing status word in a response payload
pub const STATUS_WORD_SIZE: usize = 2;

/// Minimum frame payload size (a bare status word)
pub const MIN_PAYLOAD_SIZE: usize = 2;

/// Maximum frame payload size
pub const MAX_PAYLOAD_SIZE: usize = 254;

/// Framing bytes around the payload (address, control, length, checksum)
pub const FRAME_OVERHEAD: usize = 4;

/// Minimum encoded frame size
pub const MIN_FRAME_SIZE: usize = MIN_PAYLOAD_SIZE + FRAME_OVERHEAD;

/// Maximum encoded frame size
pub const MAX_FRAME_SIZE: usize = MAX_PAYLOAD_SIZE + FRAME_OVERHEAD;
