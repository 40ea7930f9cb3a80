//! Virtual-cable stream demultiplexer
//!
//! Turns the packet sequence of the bulk OUT endpoint into contiguous byte
//! runs, one cable per run, bounded by the caller's buffer. A packet whose
//! payload does not fit is split: the prefix is returned now, the suffix on
//! the next call. A packet for another cable ends the run and waits for the
//! next call.
//!
//! # Reserved code indexes
//!
//! Packets with CIN 0x0 or 0x1 carry no defined payload. They are consumed
//! and counted as framing errors. What happens to bytes already copied during
//! the same call is set by [`ReservedCinPolicy`].

use midi_protocol::{CableNumber, Decoded, EventPacket};
use tracing::{debug, warn};

use crate::config::ReservedCinPolicy;
use crate::port::PacketSource;

/// A single-cable run of bytes written to the caller's buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRun {
    /// Cable every byte of the run belongs to
    pub cable: CableNumber,
    /// Number of bytes written at the start of the buffer
    pub len: usize,
}

/// Packet held between calls, either partially delivered or not yet started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct InFlight {
    packet: EventPacket,
    /// Payload bytes already handed to a caller
    bytes_copied: usize,
    /// Payload bytes still owed to a caller
    bytes_remaining: usize,
}

impl InFlight {
    fn new(packet: EventPacket) -> Self {
        Self {
            packet,
            bytes_copied: 0,
            bytes_remaining: packet.payload_len(),
        }
    }

    fn pending(&self) -> &[u8] {
        let start = self.bytes_copied;
        &self.packet.payload_slots()[start..start + self.bytes_remaining]
    }

    fn advance(&mut self, n: usize) {
        self.bytes_copied += n;
        self.bytes_remaining -= n;
    }
}

/// Resumable reader of per-cable byte runs
#[derive(Debug, Clone, Default)]
pub struct Demultiplexer {
    in_flight: Option<InFlight>,
    policy: ReservedCinPolicy,
    framing_errors: u64,
    discarded_bytes: u64,
}

impl Demultiplexer {
    /// Create a demultiplexer with the default reserved-CIN policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a demultiplexer with an explicit reserved-CIN policy
    pub fn with_policy(policy: ReservedCinPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Active reserved-CIN policy
    pub fn policy(&self) -> ReservedCinPolicy {
        self.policy
    }

    /// Reserved-CIN packets seen so far
    pub fn framing_errors(&self) -> u64 {
        self.framing_errors
    }

    /// Bytes thrown away because a reserved packet aborted their call
    pub fn discarded_bytes(&self) -> u64 {
        self.discarded_bytes
    }

    /// Cable of the packet held for the next call, if any
    pub fn pending_cable(&self) -> Option<CableNumber> {
        self.in_flight.map(|f| f.packet.cable())
    }

    /// Payload bytes of the held packet not yet returned
    pub fn pending_bytes(&self) -> usize {
        self.in_flight.map_or(0, |f| f.bytes_remaining)
    }

    /// Read the next run of bytes for a single cable into `buf`
    ///
    /// Returns `None` when nothing is available right now. The cable of the
    /// first packet looked at fixes the cable of the whole run.
    pub fn read<S>(&mut self, source: &mut S, buf: &mut [u8]) -> Option<StreamRun>
    where
        S: PacketSource + ?Sized,
    {
        let mut written = 0;
        let mut active: Option<CableNumber> = None;

        loop {
            let mut in_flight = match self.in_flight.take() {
                Some(held) => held,
                None => match source.try_read_packet() {
                    Some(packet) => InFlight::new(packet),
                    None => break,
                },
            };

            let cable = in_flight.packet.cable();
            match active {
                None => active = Some(cable),
                Some(current) if current != cable => {
                    // Stays buffered and starts the next run
                    self.in_flight = Some(in_flight);
                    break;
                }
                Some(_) => {}
            }

            if let Decoded::Reserved { cin, .. } = in_flight.packet.decode() {
                self.framing_errors += 1;
                warn!(
                    "Reserved CIN 0x{:X} on cable {} ({})",
                    cin.as_u8(),
                    cable,
                    in_flight.packet
                );
                match self.policy {
                    ReservedCinPolicy::DiscardCall => {
                        if written > 0 {
                            debug!("Discarding {} bytes copied before reserved packet", written);
                            self.discarded_bytes += written as u64;
                        }
                        return None;
                    }
                    ReservedCinPolicy::KeepPrefix => break,
                }
            }

            let n = in_flight.bytes_remaining.min(buf.len() - written);
            buf[written..written + n].copy_from_slice(&in_flight.pending()[..n]);
            written += n;
            in_flight.advance(n);

            if in_flight.bytes_remaining > 0 {
                // Out of room; the suffix goes out on the next call
                self.in_flight = Some(in_flight);
                break;
            }
        }

        match active {
            Some(cable) if written > 0 => Some(StreamRun {
                cable,
                len: written,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    fn source(packets: &[[u8; 4]]) -> VecDeque<EventPacket> {
        packets.iter().copied().map(EventPacket::from_bytes).collect()
    }

    fn cable(n: u8) -> CableNumber {
        CableNumber::new(n).unwrap()
    }

    #[test]
    fn test_single_note_on() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[[0x09, 0x90, 0x40, 0x7F]]);
        let mut buf = [0u8; 48];

        let run = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(run, StreamRun { cable: cable(0), len: 3 });
        assert_eq!(&buf[..3], &[0x90, 0x40, 0x7F]);
        assert_eq!(demux.read(&mut src, &mut buf), None);
    }

    #[test]
    fn test_two_program_changes_same_cable() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[[0x1C, 0xC0, 0x05, 0x00], [0x1C, 0xC0, 0x07, 0x00]]);
        let mut buf = [0u8; 4];

        let run = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(run, StreamRun { cable: cable(1), len: 4 });
        assert_eq!(&buf, &[0xC0, 0x05, 0xC0, 0x07]);
    }

    #[test]
    fn test_cable_change_ends_run() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[
            [0x09, 0x90, 0x40, 0x7F],
            [0x08, 0x80, 0x40, 0x00],
            [0x29, 0x91, 0x3C, 0x60],
        ]);
        let mut buf = [0u8; 48];

        let first = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(first, StreamRun { cable: cable(0), len: 6 });
        assert_eq!(&buf[..6], &[0x90, 0x40, 0x7F, 0x80, 0x40, 0x00]);
        assert_eq!(demux.pending_cable(), Some(cable(2)));

        let second = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(second, StreamRun { cable: cable(2), len: 3 });
        assert_eq!(&buf[..3], &[0x91, 0x3C, 0x60]);
    }

    #[test]
    fn test_truncated_packet_resumes() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[[0x09, 0x90, 0x40, 0x7F], [0x09, 0x90, 0x43, 0x7F]]);
        let mut buf = [0u8; 4];

        let first = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(first.len, 4);
        assert_eq!(&buf, &[0x90, 0x40, 0x7F, 0x90]);
        assert_eq!(demux.pending_bytes(), 2);

        let second = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(second, StreamRun { cable: cable(0), len: 2 });
        assert_eq!(&buf[..2], &[0x43, 0x7F]);
        assert_eq!(demux.pending_bytes(), 0);
    }

    #[test]
    fn test_remainder_larger_than_buffer() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[[0x4B, 0xB0, 0x07, 0x64], [0x4B, 0xB0, 0x0A, 0x40]]);
        let mut buf = [0u8; 1];
        let mut collected = Vec::new();

        while let Some(run) = demux.read(&mut src, &mut buf) {
            assert_eq!(run.cable, cable(4));
            assert_eq!(run.len, 1);
            collected.push(buf[0]);
        }
        assert_eq!(collected, vec![0xB0, 0x07, 0x64, 0xB0, 0x0A, 0x40]);
    }

    #[test]
    fn test_remainder_then_cable_switch() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[[0x09, 0x90, 0x40, 0x7F], [0x1F, 0xF8, 0x00, 0x00]]);
        let mut buf = [0u8; 2];

        assert_eq!(
            demux.read(&mut src, &mut buf),
            Some(StreamRun { cable: cable(0), len: 2 })
        );
        // Remainder completes, then the cable 1 packet stops the run
        assert_eq!(
            demux.read(&mut src, &mut buf),
            Some(StreamRun { cable: cable(0), len: 1 })
        );
        assert_eq!(buf[0], 0x7F);
        assert_eq!(
            demux.read(&mut src, &mut buf),
            Some(StreamRun { cable: cable(1), len: 1 })
        );
        assert_eq!(buf[0], 0xF8);
    }

    #[test]
    fn test_reserved_discards_call() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[
            [0x09, 0x90, 0x40, 0x7F],
            [0x00, 0x00, 0x00, 0x00],
            [0x08, 0x80, 0x40, 0x00],
        ]);
        let mut buf = [0u8; 48];

        assert_eq!(demux.read(&mut src, &mut buf), None);
        assert_eq!(demux.framing_errors(), 1);
        assert_eq!(demux.discarded_bytes(), 3);

        // The packet after the reserved one is still delivered
        let run = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(run, StreamRun { cable: cable(0), len: 3 });
        assert_eq!(&buf[..3], &[0x80, 0x40, 0x00]);
    }

    #[test]
    fn test_reserved_keep_prefix() {
        let mut demux = Demultiplexer::with_policy(ReservedCinPolicy::KeepPrefix);
        let mut src = source(&[[0x09, 0x90, 0x40, 0x7F], [0x01, 0x00, 0x00, 0x00]]);
        let mut buf = [0u8; 48];

        let run = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(run, StreamRun { cable: cable(0), len: 3 });
        assert_eq!(demux.framing_errors(), 1);
        assert_eq!(demux.discarded_bytes(), 0);
        assert_eq!(demux.read(&mut src, &mut buf), None);
    }

    #[test]
    fn test_reserved_after_remainder_discards_remainder() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[
            [0x09, 0x90, 0x40, 0x7F],
            [0x01, 0x00, 0x00, 0x00],
            [0x0F, 0xF8, 0x00, 0x00],
        ]);
        let mut buf = [0u8; 2];

        let run = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(run, StreamRun { cable: cable(0), len: 2 });
        assert_eq!(demux.pending_bytes(), 1);

        // The held 0x7F is copied, then lost with the rest of the call
        assert_eq!(demux.read(&mut src, &mut buf), None);
        assert_eq!(demux.pending_bytes(), 0);
        assert_eq!(demux.framing_errors(), 1);
        assert_eq!(demux.discarded_bytes(), 1);

        let run = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(run, StreamRun { cable: cable(0), len: 1 });
        assert_eq!(buf[0], 0xF8);
    }

    #[test]
    fn test_reserved_after_remainder_keep_prefix() {
        let mut demux = Demultiplexer::with_policy(ReservedCinPolicy::KeepPrefix);
        let mut src = source(&[[0x09, 0x90, 0x40, 0x7F], [0x01, 0x00, 0x00, 0x00]]);
        let mut buf = [0u8; 2];

        demux.read(&mut src, &mut buf).unwrap();
        let run = demux.read(&mut src, &mut buf).unwrap();
        assert_eq!(run, StreamRun { cable: cable(0), len: 1 });
        assert_eq!(buf[0], 0x7F);
        assert_eq!(demux.discarded_bytes(), 0);
    }

    #[test]
    fn test_reserved_on_other_cable_waits_for_next_call() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[[0x09, 0x90, 0x40, 0x7F], [0x31, 0x00, 0x00, 0x00]]);
        let mut buf = [0u8; 48];

        assert_eq!(
            demux.read(&mut src, &mut buf),
            Some(StreamRun { cable: cable(0), len: 3 })
        );
        assert_eq!(demux.framing_errors(), 0);
        assert_eq!(demux.read(&mut src, &mut buf), None);
        assert_eq!(demux.framing_errors(), 1);
    }

    #[test]
    fn test_empty_buffer_holds_packet() {
        let mut demux = Demultiplexer::new();
        let mut src = source(&[[0x09, 0x90, 0x40, 0x7F]]);

        assert_eq!(demux.read(&mut src, &mut []), None);
        assert_eq!(demux.pending_bytes(), 3);

        let mut buf = [0u8; 3];
        assert_eq!(
            demux.read(&mut src, &mut buf),
            Some(StreamRun { cable: cable(0), len: 3 })
        );
    }

    #[test]
    fn test_independent_instances() {
        let mut a = Demultiplexer::new();
        let mut b = Demultiplexer::new();
        let mut src_a = source(&[[0x09, 0x90, 0x40, 0x7F]]);
        let mut src_b = source(&[[0x5F, 0xFA, 0x00, 0x00]]);
        let mut buf = [0u8; 2];

        assert_eq!(a.read(&mut src_a, &mut buf).map(|r| r.len), Some(2));
        assert_eq!(b.read(&mut src_b, &mut buf).map(|r| r.cable), Some(cable(5)));
        assert_eq!(a.pending_bytes(), 1);
        assert_eq!(b.pending_bytes(), 0);
    }
}
