//! Frame checksum
//!
//! Every frame ends in a single checksum byte: the running exclusive-or of
//! every preceding byte of the frame (address, control, length and each
//! payload byte).

/// Calculate the XOR checksum over `bytes`
///
/// # Examples
///
/// ```
/// use termlink_core::checksum;
///
/// // address=1, control=0, length=2, payload=[0x90, 0x00]
/// assert_eq!(checksum::calculate(&[1, 0, 2, 0x90, 0x00]), 0x93);
/// ```
pub fn calculate(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, byte| acc ^ byte)
}

/// Verify a received checksum byte
pub fn verify(bytes: &[u8], expected: u8) -> bool {
    calculate(bytes) == expected
}
