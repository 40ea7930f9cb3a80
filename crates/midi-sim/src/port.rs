//! Virtual DIN port
//!
//! Stands in for a UART or soft-UART driver. Both directions go through a
//! [`ByteFifo`], exactly as with the interrupt-fed hardware FIFOs: bytes
//! arriving from the wire are pushed through the split producer by
//! [`VirtualPort::receive_from_wire`], and `drain_tx` moves queued bytes onto
//! the simulated wire, optionally limited to a fixed number of bytes per call
//! to mimic a slow 31250 baud line.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use midi_mux::{ByteFifo, PhysicalPort, PortKind, DEFAULT_FIFO_SIZE};
use tracing::{debug, warn};

/// Simulated serial port backed by two bounded FIFOs
#[derive(Debug)]
pub struct VirtualPort<const N: usize = DEFAULT_FIFO_SIZE> {
    /// Identifier for logging
    id: String,
    kind: PortKind,
    rx: ByteFifo<N>,
    tx: ByteFifo<N>,
    /// Bytes that made it onto the wire
    wire: Vec<u8>,
    /// Bytes moved to the wire per `drain_tx`, unlimited when `None`
    drain_limit: Option<usize>,
    drain_calls: usize,
}

impl<const N: usize> VirtualPort<N> {
    /// Create a new virtual port
    pub fn new(id: impl Into<String>, kind: PortKind) -> Self {
        Self {
            id: id.into(),
            kind,
            rx: ByteFifo::new(),
            tx: ByteFifo::new(),
            wire: Vec::new(),
            drain_limit: None,
            drain_calls: 0,
        }
    }

    /// Limit how many bytes each `drain_tx` moves to the wire
    pub fn with_drain_limit(mut self, limit: usize) -> Self {
        self.drain_limit = Some(limit);
        self
    }

    /// Get the identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the port kind
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    /// Bytes arriving on the DIN input, as the RX interrupt would queue them
    ///
    /// Returns how many fit; the rest are dropped.
    pub fn receive_from_wire(&mut self, bytes: &[u8]) -> usize {
        let (mut producer, _) = self.rx.split();
        let accepted = producer.push_slice(bytes);
        if accepted != bytes.len() {
            warn!(
                "{}: RX overflow, dropped {} bytes",
                self.id,
                bytes.len() - accepted
            );
        }
        accepted
    }

    /// Take everything transmitted on the wire so far
    pub fn take_wire(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.wire)
    }

    /// Everything transmitted on the wire so far
    pub fn wire(&self) -> &[u8] {
        &self.wire
    }

    /// Bytes waiting in the TX FIFO
    pub fn tx_queued(&self) -> usize {
        self.tx.len()
    }

    /// Bytes waiting in the RX FIFO
    pub fn rx_queued(&self) -> usize {
        self.rx.len()
    }

    /// The TX FIFO
    pub fn tx_fifo(&self) -> &ByteFifo<N> {
        &self.tx
    }

    /// The RX FIFO
    pub fn rx_fifo(&self) -> &ByteFifo<N> {
        &self.rx
    }

    /// Number of `drain_tx` calls seen
    pub fn drain_calls(&self) -> usize {
        self.drain_calls
    }
}

impl<const N: usize> PhysicalPort for VirtualPort<N> {
    fn poll_rx(&mut self, buf: &mut [u8]) -> usize {
        self.rx.pop_into(buf)
    }

    fn write_tx(&mut self, bytes: &[u8]) -> usize {
        self.tx.push_slice(bytes)
    }

    fn drain_tx(&mut self) {
        self.drain_calls += 1;
        let limit = self.drain_limit.unwrap_or(usize::MAX);
        let mut moved = 0;
        while moved < limit {
            match self.tx.pop() {
                Some(byte) => {
                    self.wire.push(byte);
                    moved += 1;
                }
                None => break,
            }
        }
        if moved > 0 {
            debug!("{}: {} bytes on the wire", self.id, moved);
        }
    }
}

/// Shared handle to a port that has been handed to the router
///
/// The router owns its ports as boxed trait objects; tests and the host
/// runner keep a clone of this handle to feed and inspect the port.
#[derive(Debug)]
pub struct SharedPort<P>(Rc<RefCell<P>>);

impl<P> SharedPort<P> {
    /// Wrap a port
    pub fn new(port: P) -> Self {
        Self(Rc::new(RefCell::new(port)))
    }

    /// Borrow the port
    pub fn borrow(&self) -> Ref<'_, P> {
        self.0.borrow()
    }

    /// Mutably borrow the port
    pub fn borrow_mut(&self) -> RefMut<'_, P> {
        self.0.borrow_mut()
    }
}

impl<P> Clone for SharedPort<P> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<P: PhysicalPort + 'static> SharedPort<P> {
    /// Boxed clone suitable for [`midi_mux::PortRouter::new`]
    pub fn boxed(&self) -> Box<dyn PhysicalPort> {
        Box::new(self.clone())
    }
}

impl<P: PhysicalPort> PhysicalPort for SharedPort<P> {
    fn poll_rx(&mut self, buf: &mut [u8]) -> usize {
        self.0.borrow_mut().poll_rx(buf)
    }

    fn write_tx(&mut self, bytes: &[u8]) -> usize {
        self.0.borrow_mut().write_tx(bytes)
    }

    fn drain_tx(&mut self) {
        self.0.borrow_mut().drain_tx()
    }
}
