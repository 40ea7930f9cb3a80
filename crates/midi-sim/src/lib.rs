//! USB-MIDI Bridge Simulation Library
//!
//! This crate provides simulated collaborators for exercising the bridge
//! core without a USB stack or serial hardware:
//!
//! - **VirtualPort**: a DIN port with bounded RX/TX FIFOs and a captured wire
//! - **VirtualHost**: the USB host side, queuing OUT packets and capturing IN
//!   stream writes
//!
//! # Example
//!
//! ```rust
//! use midi_mux::{Bridge, BridgeConfig};
//! use midi_protocol::CableNumber;
//! use midi_sim::{SharedPort, VirtualHost, VirtualPort};
//!
//! let config = BridgeConfig::default();
//! let ports: Vec<SharedPort<VirtualPort>> = config
//!     .ports
//!     .iter()
//!     .map(|p| SharedPort::new(VirtualPort::new(p.name.clone(), p.kind)))
//!     .collect();
//! let mut bridge = Bridge::new(&config, ports.iter().map(|p| p.boxed()).collect()).unwrap();
//!
//! let mut host = VirtualHost::new();
//! host.queue_raw(&[[0x29, 0x92, 0x3C, 0x60]]);
//! ports[0].borrow_mut().receive_from_wire(&[0xF8]);
//!
//! bridge.poll(&mut host);
//!
//! assert_eq!(ports[1].borrow().wire(), &[0x92, 0x3C, 0x60]);
//! assert_eq!(host.stream(CableNumber::new(0).unwrap()), vec![0xF8]);
//! ```

pub mod host;
pub mod port;

pub use host::{CapturedWrite, VirtualHost};
pub use port::{SharedPort, VirtualPort};
