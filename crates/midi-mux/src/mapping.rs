//! Cable-to-port routing table
//!
//! An ordered list of `(cable range -> port)` entries built once from the
//! configuration. The table is read-only after construction.

use midi_protocol::CableNumber;

use crate::config::{BridgeConfig, CableRange};
use crate::error::{ConfigError, RoutingError};

/// Index of a port in the configured layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PortId(pub usize);

impl PortId {
    /// Get the raw index
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One routing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteEntry {
    /// Cables covered by this entry
    pub cables: CableRange,
    /// Destination port
    pub port: PortId,
}

/// Outbound and inbound cable mapping for a fixed set of ports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortMappingTable {
    routes: Vec<RouteEntry>,
    rx_tags: Vec<Option<CableNumber>>,
}

impl PortMappingTable {
    /// Build the table from a configuration, validating it first
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let routes = config
            .ports
            .iter()
            .enumerate()
            .filter_map(|(idx, port)| {
                port.tx_cables.map(|cables| RouteEntry {
                    cables,
                    port: PortId(idx),
                })
            })
            .collect();
        let rx_tags = config.ports.iter().map(|p| p.rx_cable).collect();

        Ok(Self { routes, rx_tags })
    }

    /// Destination port for an outbound cable
    pub fn lookup(&self, cable: CableNumber) -> Result<PortId, RoutingError> {
        self.routes
            .iter()
            .find(|entry| entry.cables.contains(cable))
            .map(|entry| entry.port)
            .ok_or(RoutingError::UnmappedCable(cable))
    }

    /// Cable tag for bytes received on a port
    pub fn rx_cable(&self, port: PortId) -> Option<CableNumber> {
        self.rx_tags.get(port.index()).copied().flatten()
    }

    /// Routing entries in configuration order
    pub fn routes(&self) -> &[RouteEntry] {
        &self.routes
    }

    /// Number of ports the table was built for
    pub fn port_count(&self) -> usize {
        self.rx_tags.len()
    }
}
