//! Virtual USB host
//!
//! Plays the USB side of the bridge: it queues event packets for the bulk OUT
//! endpoint, captures the per-cable stream writes sent to the bulk IN
//! endpoint, and can be mounted or unmounted.

use std::collections::VecDeque;

use midi_mux::{PacketSource, StreamSink};
use midi_protocol::{CableNumber, CodeIndexNumber, EventPacket, PacketError};
use tracing::debug;

/// One stream write received from the bridge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedWrite {
    /// Cable the bytes were tagged with
    pub cable: CableNumber,
    /// Bytes accepted by the host
    pub bytes: Vec<u8>,
}

/// Simulated USB host with a packet queue and a stream capture
#[derive(Debug, Default)]
pub struct VirtualHost {
    outbound: VecDeque<EventPacket>,
    captured: Vec<CapturedWrite>,
    connected: bool,
    /// Bytes accepted per stream write, unlimited when `None`
    write_limit: Option<usize>,
    packets_served: u64,
}

impl VirtualHost {
    /// Create a mounted host
    pub fn new() -> Self {
        Self {
            connected: true,
            ..Default::default()
        }
    }

    /// Create a host that has not mounted the device
    pub fn disconnected() -> Self {
        Self::default()
    }

    /// Mount or unmount the device
    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    /// Limit how many bytes each stream write accepts
    pub fn set_write_limit(&mut self, limit: Option<usize>) {
        self.write_limit = limit;
    }

    /// Queue a packet for the OUT endpoint
    pub fn queue_packet(&mut self, packet: EventPacket) {
        self.outbound.push_back(packet);
    }

    /// Queue raw packets for the OUT endpoint
    pub fn queue_raw(&mut self, packets: &[[u8; 4]]) {
        self.outbound
            .extend(packets.iter().copied().map(EventPacket::from_bytes));
    }

    /// Queue a message for a cable
    pub fn send(
        &mut self,
        cable: CableNumber,
        cin: CodeIndexNumber,
        payload: &[u8],
    ) -> Result<(), PacketError> {
        self.queue_packet(EventPacket::new(cable, cin, payload)?);
        Ok(())
    }

    /// Packets still waiting on the OUT endpoint
    pub fn pending_packets(&self) -> usize {
        self.outbound.len()
    }

    /// Packets handed to the bridge so far
    pub fn packets_served(&self) -> u64 {
        self.packets_served
    }

    /// All captured stream writes, in order
    pub fn captured(&self) -> &[CapturedWrite] {
        &self.captured
    }

    /// Take all captured stream writes
    pub fn take_captured(&mut self) -> Vec<CapturedWrite> {
        std::mem::take(&mut self.captured)
    }

    /// Concatenated bytes received on one cable
    pub fn stream(&self, cable: CableNumber) -> Vec<u8> {
        self.captured
            .iter()
            .filter(|w| w.cable == cable)
            .flat_map(|w| w.bytes.iter().copied())
            .collect()
    }
}

impl PacketSource for VirtualHost {
    fn try_read_packet(&mut self) -> Option<EventPacket> {
        let packet = self.outbound.pop_front()?;
        self.packets_served += 1;
        Some(packet)
    }
}

impl StreamSink for VirtualHost {
    fn write(&mut self, cable: CableNumber, bytes: &[u8]) -> usize {
        let accepted = bytes.len().min(self.write_limit.unwrap_or(usize::MAX));
        if accepted > 0 {
            debug!("Host received {} bytes on cable {}", accepted, cable);
            self.captured.push(CapturedWrite {
                cable,
                bytes: bytes[..accepted].to_vec(),
            });
        }
        accepted
    }

    fn connection_active(&self) -> bool {
        self.connected
    }
}
