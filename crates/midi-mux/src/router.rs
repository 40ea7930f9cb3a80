//! Physical port router
//!
//! Fans demultiplexed runs out to port TX FIFOs and tags port RX bytes with
//! their cable for the USB stream sink. Shortfalls anywhere are dropped, never
//! retried, and reported as warnings plus [`RouterEvent`]s.

use std::collections::VecDeque;

use midi_protocol::CableNumber;
use tracing::{debug, warn};

use crate::config::BridgeConfig;
use crate::demux::Demultiplexer;
use crate::error::ConfigError;
use crate::events::RouterEvent;
use crate::mapping::{PortId, PortMappingTable};
use crate::port::{PacketSource, PhysicalPort, PortKind, StreamSink};

/// Events kept before the oldest ones are discarded
pub const MAX_PENDING_EVENTS: usize = 256;

/// Cumulative byte counters for one port
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PortStats {
    /// Bytes read out of the port RX FIFO
    pub rx_bytes: u64,
    /// RX bytes the stream sink accepted
    pub rx_forwarded: u64,
    /// RX bytes the stream sink refused
    pub rx_dropped: u64,
    /// RX bytes thrown away while the host was not connected
    pub rx_discarded: u64,
    /// Bytes the port TX FIFO accepted
    pub tx_bytes: u64,
    /// Bytes the port TX FIFO refused
    pub tx_dropped: u64,
}

struct RoutedPort {
    name: String,
    kind: PortKind,
    handle: Box<dyn PhysicalPort>,
    stats: PortStats,
}

/// Routes byte runs between virtual cables and physical ports
pub struct PortRouter {
    table: PortMappingTable,
    ports: Vec<RoutedPort>,
    service_order: Vec<PortId>,
    rx_buf: Vec<u8>,
    tx_buf: Vec<u8>,
    unrouted_bytes: u64,
    events: VecDeque<RouterEvent>,
}

impl PortRouter {
    /// Build a router for `config`, one handle per configured port, in order
    pub fn new(
        config: &BridgeConfig,
        handles: Vec<Box<dyn PhysicalPort>>,
    ) -> Result<Self, ConfigError> {
        let table = PortMappingTable::from_config(config)?;
        if handles.len() != config.ports.len() {
            return Err(ConfigError::PortCountMismatch {
                expected: config.ports.len(),
                actual: handles.len(),
            });
        }

        let ports: Vec<RoutedPort> = config
            .ports
            .iter()
            .zip(handles)
            .map(|(cfg, handle)| RoutedPort {
                name: cfg.name.clone(),
                kind: cfg.kind,
                handle,
                stats: PortStats::default(),
            })
            .collect();

        // Hardware UARTs first, then soft-UARTs, each in configuration order
        let mut service_order: Vec<PortId> = (0..ports.len()).map(PortId).collect();
        service_order.sort_by_key(|id| match ports[id.index()].kind {
            PortKind::HardwareUart => 0,
            PortKind::SoftUart => 1,
        });

        for (idx, port) in ports.iter().enumerate() {
            debug!(
                "Port {} ({}): rx tag {:?}",
                port.name,
                port.kind.name(),
                table.rx_cable(PortId(idx))
            );
        }

        Ok(Self {
            table,
            ports,
            service_order,
            rx_buf: vec![0; config.rx_chunk_size],
            tx_buf: vec![0; config.tx_chunk_size],
            unrouted_bytes: 0,
            events: VecDeque::new(),
        })
    }

    /// The routing table
    pub fn table(&self) -> &PortMappingTable {
        &self.table
    }

    /// Order in which ports are polled and drained each iteration
    pub fn service_order(&self) -> &[PortId] {
        &self.service_order
    }

    /// Number of ports
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Name of a port
    pub fn port_name(&self, port: PortId) -> Option<&str> {
        self.ports.get(port.index()).map(|p| p.name.as_str())
    }

    /// Kind of a port
    pub fn port_kind(&self, port: PortId) -> Option<PortKind> {
        self.ports.get(port.index()).map(|p| p.kind)
    }

    /// Counters for a port
    pub fn stats(&self, port: PortId) -> Option<&PortStats> {
        self.ports.get(port.index()).map(|p| &p.stats)
    }

    /// Bytes dropped because their cable had no port
    pub fn unrouted_bytes(&self) -> u64 {
        self.unrouted_bytes
    }

    /// Take all recorded events
    pub fn drain_events(&mut self) -> Vec<RouterEvent> {
        self.events.drain(..).collect()
    }

    fn record(&mut self, event: RouterEvent) {
        if self.events.len() == MAX_PENDING_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Push one run into the TX FIFO of the port wired to `cable`
    ///
    /// Returns the bytes accepted. Whatever is not accepted is dropped.
    pub fn dispatch(&mut self, cable: CableNumber, bytes: &[u8]) -> usize {
        let id = match self.table.lookup(cable) {
            Ok(id) => id,
            Err(e) => {
                warn!("Dropped {} bytes: {}", bytes.len(), e);
                self.unrouted_bytes += bytes.len() as u64;
                self.record(RouterEvent::Unrouted {
                    cable,
                    dropped: bytes.len(),
                });
                return 0;
            }
        };

        let port = &mut self.ports[id.index()];
        let accepted = port.handle.write_tx(bytes).min(bytes.len());
        port.stats.tx_bytes += accepted as u64;
        debug!("Cable {} -> {}: {} bytes", cable, port.name, accepted);

        if accepted != bytes.len() {
            let dropped = bytes.len() - accepted;
            port.stats.tx_dropped += dropped as u64;
            warn!("Dropped {} bytes sending to {}", dropped, port.name);
            self.record(RouterEvent::TxShortfall {
                port: id,
                cable,
                offered: bytes.len(),
                accepted,
            });
        }
        accepted
    }

    /// Drain every run the demultiplexer can produce right now
    ///
    /// Returns the total bytes accepted by port TX FIFOs.
    pub fn route_outbound<S>(&mut self, demux: &mut Demultiplexer, source: &mut S) -> usize
    where
        S: PacketSource + ?Sized,
    {
        let errors_before = demux.framing_errors();
        let mut buf = std::mem::take(&mut self.tx_buf);
        let mut total = 0;

        while let Some(run) = demux.read(source, &mut buf) {
            total += self.dispatch(run.cable, &buf[..run.len]);
        }

        self.tx_buf = buf;

        let framing = demux.framing_errors() - errors_before;
        if framing > 0 {
            self.record(RouterEvent::FramingError { count: framing });
        }
        total
    }

    /// Poll one port's RX FIFO and forward what it holds
    ///
    /// Bytes are always drained from the port. They are only written to the
    /// sink while `connected` and the port has an RX cable; otherwise they
    /// are discarded. Returns the bytes the sink accepted.
    pub fn poll_port<K>(&mut self, id: PortId, sink: &mut K, connected: bool) -> usize
    where
        K: StreamSink + ?Sized,
    {
        let tag = self.table.rx_cable(id);
        let Some(port) = self.ports.get_mut(id.index()) else {
            return 0;
        };

        let nread = port.handle.poll_rx(&mut self.rx_buf).min(self.rx_buf.len());
        if nread == 0 {
            return 0;
        }
        port.stats.rx_bytes += nread as u64;

        let Some(cable) = tag else {
            port.stats.rx_discarded += nread as u64;
            debug!("Discarded {} bytes from {} (no RX cable)", nread, port.name);
            return 0;
        };

        if !connected {
            port.stats.rx_discarded += nread as u64;
            debug!("Discarded {} bytes from {} (not connected)", nread, port.name);
            return 0;
        }

        let accepted = sink.write(cable, &self.rx_buf[..nread]).min(nread);
        port.stats.rx_forwarded += accepted as u64;
        debug!("{} -> cable {}: {} bytes", port.name, cable, accepted);

        if accepted != nread {
            let dropped = nread - accepted;
            port.stats.rx_dropped += dropped as u64;
            warn!("Dropped {} bytes receiving from {}", dropped, port.name);
            self.record(RouterEvent::RxShortfall {
                port: id,
                cable,
                offered: nread,
                accepted,
            });
        }
        accepted
    }

    /// Poll every port's RX FIFO in service order
    pub fn poll_inbound<K>(&mut self, sink: &mut K) -> usize
    where
        K: StreamSink + ?Sized,
    {
        let connected = sink.connection_active();
        let mut total = 0;
        for idx in 0..self.service_order.len() {
            let id = self.service_order[idx];
            total += self.poll_port(id, sink, connected);
        }
        total
    }

    /// Give every port TX FIFO a chance to flush toward the wire
    pub fn drain_outbound(&mut self) {
        for id in &self.service_order {
            self.ports[id.index()].handle.drain_tx();
        }
    }
}

impl std::fmt::Debug for PortRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.ports.iter().map(|p| p.name.as_str()).collect();
        f.debug_struct("PortRouter")
            .field("ports", &names)
            .field("table", &self.table)
            .field("pending_events", &self.events.len())
            .finish()
    }
}
