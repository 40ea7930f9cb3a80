//! USB-MIDI Protocol Library
//!
//! This crate provides the framing layer of USB-MIDI 1.0 bulk transfers:
//!
//! - **Cable numbers**: up to 16 virtual cables share one endpoint pair
//! - **Code Index Numbers**: the packet class, which fixes the payload length
//! - **Event packets**: 4-byte units carrying up to three MIDI bytes
//!
//! MIDI message semantics are not interpreted. The only question answered
//! here is "which cable, and how many bytes".
//!
//! # Example
//!
//! ```rust
//! use midi_protocol::{decode, CableNumber, Decoded, EventPacket};
//!
//! let packet = EventPacket::from_bytes([0x09, 0x90, 0x40, 0x7F]);
//! if let Decoded::Payload(payload) = decode(packet) {
//!     assert_eq!(payload.cable, CableNumber::new(0).unwrap());
//!     assert_eq!(payload.bytes(), &[0x90, 0x40, 0x7F]);
//! }
//! ```

pub mod capture;
pub mod error;
pub mod packet;

pub use capture::{parse_capture, parse_line};
pub use error::PacketError;
pub use packet::{
    decode, CableNumber, CodeIndexNumber, Decoded, EventPacket, Payload, CABLE_COUNT,
    MAX_PAYLOAD_LEN, PACKET_LEN,
};
