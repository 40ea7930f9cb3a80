//! Error types for USB-MIDI packet handling

use thiserror::Error;

/// Errors that can occur while building or parsing event packets
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Cable numbers occupy a nibble
    #[error("invalid cable number: {0} (must be 0-15)")]
    InvalidCable(u8),

    /// Code index numbers occupy a nibble
    #[error("invalid code index number: 0x{0:02X}")]
    InvalidCodeIndex(u8),

    /// Payload longer than the three bytes an event packet carries
    #[error("payload too long: {0} bytes")]
    PayloadTooLong(usize),

    /// Capture line that does not hold exactly four bytes
    #[error("line {line}: expected 4 bytes, found {found}")]
    WrongLength { line: usize, found: usize },

    /// Capture token that is not a hex byte
    #[error("line {line}: invalid hex byte '{token}'")]
    InvalidHex { line: usize, token: String },
}
