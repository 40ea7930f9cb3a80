//! Multi-port USB-MIDI Bridge Core
//!
//! This crate provides the logic between a USB-MIDI endpoint pair carrying up
//! to 16 virtual cables and a fixed set of 5-pin DIN serial ports.
//!
//! # Architecture
//!
//! ```text
//! PacketSource -> Demultiplexer -> PortRouter -> port TX FIFOs
//! port RX FIFOs -> PortRouter -> StreamSink
//! ```
//!
//! - [`Demultiplexer`] turns 4-byte event packets into single-cable byte
//!   runs, resumable across calls when a packet does not fit
//! - [`PortRouter`] looks runs up in a [`PortMappingTable`] and tags inbound
//!   bytes with each port's cable
//! - [`Bridge`] is the non-blocking task loop tying them together
//!
//! The USB stack and the serial drivers are collaborators reached through
//! the [`PacketSource`], [`StreamSink`] and [`PhysicalPort`] traits.
//!
//! # Example
//!
//! ```rust
//! use std::collections::VecDeque;
//!
//! use midi_mux::{Demultiplexer, StreamRun};
//! use midi_protocol::{CableNumber, EventPacket};
//!
//! let mut source: VecDeque<EventPacket> =
//!     VecDeque::from([EventPacket::from_bytes([0x09, 0x90, 0x40, 0x7F])]);
//! let mut demux = Demultiplexer::new();
//! let mut buf = [0u8; 48];
//!
//! let run = demux.read(&mut source, &mut buf).unwrap();
//! assert_eq!(run, StreamRun { cable: CableNumber::new(0).unwrap(), len: 3 });
//! assert_eq!(&buf[..3], &[0x90, 0x40, 0x7F]);
//! ```

pub mod bridge;
pub mod config;
pub mod demux;
pub mod error;
pub mod events;
pub mod fifo;
pub mod mapping;
pub mod port;
pub mod router;

pub use bridge::{Bridge, PollSummary};
pub use config::{BridgeConfig, CableRange, PortConfig, ReservedCinPolicy};
pub use demux::{Demultiplexer, StreamRun};
pub use error::{ConfigError, RoutingError};
pub use events::RouterEvent;
pub use fifo::{ByteFifo, FifoProducer, DEFAULT_FIFO_SIZE};
pub use mapping::{PortId, PortMappingTable, RouteEntry};
pub use port::{PacketSource, PhysicalPort, PortKind, StreamSink};
pub use router::{PortRouter, PortStats};
