//! USB-MIDI Event Packet framing
//!
//! Every transfer on a USB-MIDI 1.0 bulk endpoint is a sequence of 4-byte
//! event packets.
//!
//! # Packet Format
//! ```text
//! [CN|CIN] [MIDI_0] [MIDI_1] [MIDI_2]
//! ```
//!
//! - Byte 0 high nibble: virtual cable number (0-15)
//! - Byte 0 low nibble: Code Index Number, which fixes the payload length
//! - Bytes 1-3: MIDI payload, unused trailing bytes are padding
//!
//! The payload is opaque here. Only the number of valid bytes matters.

use std::fmt;

use crate::error::PacketError;

/// Size of one event packet on the wire
pub const PACKET_LEN: usize = 4;

/// Maximum payload carried by one event packet
pub const MAX_PAYLOAD_LEN: usize = 3;

/// Number of virtual cables addressable per endpoint
pub const CABLE_COUNT: usize = 16;

/// Virtual cable number (0-15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "u8", into = "u8")
)]
pub struct CableNumber(u8);

impl CableNumber {
    /// Highest valid cable number
    pub const MAX: CableNumber = CableNumber(15);

    /// Create a cable number, rejecting values that do not fit a nibble
    pub const fn new(value: u8) -> Result<Self, PacketError> {
        if value as usize >= CABLE_COUNT {
            Err(PacketError::InvalidCable(value))
        } else {
            Ok(Self(value))
        }
    }

    /// Build from the high nibble of a packet header byte
    pub const fn from_header(header: u8) -> Self {
        Self(header >> 4)
    }

    /// Get the raw value
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Get the value as an index
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Iterate over all sixteen cables
    pub fn all() -> impl Iterator<Item = CableNumber> {
        (0..CABLE_COUNT as u8).map(CableNumber)
    }
}

impl TryFrom<u8> for CableNumber {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CableNumber> for u8 {
    fn from(cable: CableNumber) -> Self {
        cable.0
    }
}

impl fmt::Display for CableNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Code Index Number (USB-MIDI 1.0, table 4-1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodeIndexNumber(u8);

impl CodeIndexNumber {
    /// Miscellaneous function codes, reserved
    pub const MISC: Self = Self(0x0);
    /// Cable events, reserved
    pub const CABLE_EVENT: Self = Self(0x1);
    /// Two-byte system common message
    pub const SYSTEM_COMMON_2: Self = Self(0x2);
    /// Three-byte system common message
    pub const SYSTEM_COMMON_3: Self = Self(0x3);
    /// SysEx starts or continues
    pub const SYSEX_START: Self = Self(0x4);
    /// Single-byte system common message or SysEx ending with one byte
    pub const SYSEX_END_1: Self = Self(0x5);
    /// SysEx ending with two bytes
    pub const SYSEX_END_2: Self = Self(0x6);
    /// SysEx ending with three bytes
    pub const SYSEX_END_3: Self = Self(0x7);
    /// Note off
    pub const NOTE_OFF: Self = Self(0x8);
    /// Note on
    pub const NOTE_ON: Self = Self(0x9);
    /// Polyphonic key pressure
    pub const POLY_KEY_PRESS: Self = Self(0xA);
    /// Control change
    pub const CONTROL_CHANGE: Self = Self(0xB);
    /// Program change
    pub const PROGRAM_CHANGE: Self = Self(0xC);
    /// Channel pressure
    pub const CHANNEL_PRESSURE: Self = Self(0xD);
    /// Pitch bend change
    pub const PITCH_BEND: Self = Self(0xE);
    /// Single byte, typically system realtime
    pub const SINGLE_BYTE: Self = Self(0xF);

    /// Create a code index number, rejecting values that do not fit a nibble
    pub const fn new(value: u8) -> Result<Self, PacketError> {
        if value > 0x0F {
            Err(PacketError::InvalidCodeIndex(value))
        } else {
            Ok(Self(value))
        }
    }

    /// Build from the low nibble of a packet header byte
    pub const fn from_header(header: u8) -> Self {
        Self(header & 0x0F)
    }

    /// Get the raw value
    pub const fn as_u8(self) -> u8 {
        self.0
    }

    /// Whether this class carries no defined payload
    pub const fn is_reserved(self) -> bool {
        matches!(self.0, 0x0 | 0x1)
    }

    /// Number of valid payload bytes, `None` for the reserved classes
    pub const fn payload_len(self) -> Option<usize> {
        match self.0 {
            0x0 | 0x1 => None,
            0x5 | 0xF => Some(1),
            0x2 | 0x6 | 0xC | 0xD => Some(2),
            _ => Some(3),
        }
    }
}

/// A single 4-byte USB-MIDI event packet
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EventPacket([u8; PACKET_LEN]);

impl EventPacket {
    /// Build a packet from a cable, a code index and up to three payload bytes
    ///
    /// Unused payload bytes are zero-padded.
    pub fn new(
        cable: CableNumber,
        cin: CodeIndexNumber,
        payload: &[u8],
    ) -> Result<Self, PacketError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(PacketError::PayloadTooLong(payload.len()));
        }
        let mut raw = [0u8; PACKET_LEN];
        raw[0] = (cable.as_u8() << 4) | cin.as_u8();
        raw[1..=payload.len()].copy_from_slice(payload);
        Ok(Self(raw))
    }

    /// Wrap raw wire bytes
    pub const fn from_bytes(raw: [u8; PACKET_LEN]) -> Self {
        Self(raw)
    }

    /// Raw wire bytes
    pub const fn as_bytes(&self) -> &[u8; PACKET_LEN] {
        &self.0
    }

    /// Virtual cable this packet belongs to
    pub const fn cable(&self) -> CableNumber {
        CableNumber::from_header(self.0[0])
    }

    /// Code index number of this packet
    pub const fn cin(&self) -> CodeIndexNumber {
        CodeIndexNumber::from_header(self.0[0])
    }

    /// The three payload slots, including padding
    pub fn payload_slots(&self) -> &[u8] {
        &self.0[1..]
    }

    /// Number of valid payload bytes (0 for the reserved classes)
    pub fn payload_len(&self) -> usize {
        self.cin().payload_len().unwrap_or(0)
    }

    /// Decode this packet
    pub fn decode(&self) -> Decoded {
        decode(*self)
    }
}

impl From<[u8; PACKET_LEN]> for EventPacket {
    fn from(raw: [u8; PACKET_LEN]) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for EventPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventPacket({:02X?})", self.0)
    }
}

impl fmt::Display for EventPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X} {:02X} {:02X} {:02X}",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// Result of decoding one event packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decoded {
    /// Misc or cable-event class, no payload is defined
    Reserved {
        /// Cable the packet was addressed to
        cable: CableNumber,
        /// The offending code index
        cin: CodeIndexNumber,
    },
    /// Payload bytes for a cable
    Payload(Payload),
}

/// Valid payload bytes of a decoded packet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Payload {
    /// Cable the bytes belong to
    pub cable: CableNumber,
    len: u8,
    bytes: [u8; MAX_PAYLOAD_LEN],
}

impl Payload {
    /// Number of valid bytes (1, 2 or 3)
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Always false, kept for API symmetry with slices
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The valid bytes
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// Decode a packet into its cable and valid payload bytes
///
/// The payload length depends only on the code index number.
pub fn decode(packet: EventPacket) -> Decoded {
    let cable = packet.cable();
    let cin = packet.cin();
    match cin.payload_len() {
        None => Decoded::Reserved { cable, cin },
        Some(len) => {
            let mut bytes = [0u8; MAX_PAYLOAD_LEN];
            bytes.copy_from_slice(packet.payload_slots());
            Decoded::Payload(Payload {
                cable,
                len: len as u8,
                bytes,
            })
        }
    }
}
