//! Capabilities the core consumes from its collaborators
//!
//! The USB device stack and the serial drivers live outside this crate. The
//! core only sees them through these narrow, non-blocking, buffer-oriented
//! traits.

use std::collections::VecDeque;

use midi_protocol::{CableNumber, EventPacket};
use serde::{Deserialize, Serialize};

/// Kind of serial wire behind a physical port
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    /// Dedicated UART peripheral
    HardwareUart,
    /// Bit timing produced by a programmable I/O block
    SoftUart,
}

impl PortKind {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::HardwareUart => "UART",
            Self::SoftUart => "soft-UART",
        }
    }
}

/// One 5-pin DIN port pair as seen by the task loop
///
/// Every call returns immediately with however much work could be done.
pub trait PhysicalPort {
    /// Move up to `buf.len()` received bytes out of the RX FIFO
    fn poll_rx(&mut self, buf: &mut [u8]) -> usize;

    /// Queue bytes for transmission, returning how many were accepted
    fn write_tx(&mut self, bytes: &[u8]) -> usize;

    /// Push already queued bytes toward the wire
    fn drain_tx(&mut self);
}

impl<P: PhysicalPort + ?Sized> PhysicalPort for Box<P> {
    fn poll_rx(&mut self, buf: &mut [u8]) -> usize {
        (**self).poll_rx(buf)
    }

    fn write_tx(&mut self, bytes: &[u8]) -> usize {
        (**self).write_tx(bytes)
    }

    fn drain_tx(&mut self) {
        (**self).drain_tx()
    }
}

/// Non-blocking pull of USB-MIDI event packets from the bulk OUT endpoint
pub trait PacketSource {
    /// Take the next packet, `None` if none is available right now
    fn try_read_packet(&mut self) -> Option<EventPacket>;
}

impl PacketSource for VecDeque<EventPacket> {
    fn try_read_packet(&mut self) -> Option<EventPacket> {
        self.pop_front()
    }
}

/// Stream writes toward the bulk IN endpoint
pub trait StreamSink {
    /// Forward bytes tagged with a cable, returning how many were accepted
    fn write(&mut self, cable: CableNumber, bytes: &[u8]) -> usize;

    /// Whether the host has the device mounted
    fn connection_active(&self) -> bool;
}
