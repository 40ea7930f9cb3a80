//! Bridge configuration
//!
//! The port layout is fixed at startup. [`BridgeConfig::default`] describes
//! the stock board: one hardware UART carrying cables 0 and 1, and four
//! soft-UART ports carrying cables 2 through 5.

use std::collections::HashSet;

use midi_protocol::CableNumber;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::port::PortKind;

/// Default number of bytes pulled from a port RX FIFO per iteration
pub const DEFAULT_RX_CHUNK: usize = 48;

/// Default demultiplexer read buffer size
pub const DEFAULT_TX_CHUNK: usize = 48;

/// Upper bound for either chunk size
pub const MAX_CHUNK: usize = 1024;

/// What a demultiplexer read does with bytes it already copied when it meets
/// a packet with a reserved code index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservedCinPolicy {
    /// Drop everything copied during the call and report no data
    #[default]
    DiscardCall,
    /// Return the bytes copied before the reserved packet
    KeepPrefix,
}

impl ReservedCinPolicy {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::DiscardCall => "Discard call",
            Self::KeepPrefix => "Keep prefix",
        }
    }
}

/// Inclusive range of virtual cables
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CableRange {
    /// First cable in the range
    pub first: CableNumber,
    /// Last cable in the range
    pub last: CableNumber,
}

impl CableRange {
    /// Range covering `first..=last`
    pub const fn new(first: CableNumber, last: CableNumber) -> Self {
        Self { first, last }
    }

    /// Range covering a single cable
    pub const fn single(cable: CableNumber) -> Self {
        Self {
            first: cable,
            last: cable,
        }
    }

    /// Whether `cable` falls inside the range
    pub fn contains(&self, cable: CableNumber) -> bool {
        self.first <= cable && cable <= self.last
    }

    /// Whether the range holds no cable
    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }

    /// Iterate over the cables in the range
    pub fn iter(&self) -> impl Iterator<Item = CableNumber> {
        let (first, last) = (self.first, self.last);
        CableNumber::all().filter(move |c| first <= *c && *c <= last)
    }
}

/// One physical port in the layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    /// Name used in logs (e.g. "MIDI A")
    pub name: String,
    /// Kind of serial wire
    pub kind: PortKind,
    /// Outbound cables delivered to this port
    #[serde(default)]
    pub tx_cables: Option<CableRange>,
    /// Cable tag for bytes received on this port
    #[serde(default)]
    pub rx_cable: Option<CableNumber>,
}

impl PortConfig {
    /// Port with both directions wired
    pub fn new(
        name: impl Into<String>,
        kind: PortKind,
        tx_cables: CableRange,
        rx_cable: CableNumber,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            tx_cables: Some(tx_cables),
            rx_cable: Some(rx_cable),
        }
    }
}

/// Full bridge configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Bytes pulled from each port RX FIFO per iteration
    #[serde(default = "default_rx_chunk")]
    pub rx_chunk_size: usize,
    /// Capacity of the demultiplexer read buffer
    #[serde(default = "default_tx_chunk")]
    pub tx_chunk_size: usize,
    /// Reserved code index handling
    #[serde(default)]
    pub reserved_cin_policy: ReservedCinPolicy,
    /// Port layout, in polling order within each port kind
    pub ports: Vec<PortConfig>,
}

fn default_rx_chunk() -> usize {
    DEFAULT_RX_CHUNK
}

fn default_tx_chunk() -> usize {
    DEFAULT_TX_CHUNK
}

impl Default for BridgeConfig {
    fn default() -> Self {
        let cable = |n: u8| CableNumber::new(n).unwrap_or_default();
        let mut ports = vec![PortConfig::new(
            "MIDI A",
            PortKind::HardwareUart,
            CableRange::new(cable(0), cable(1)),
            cable(0),
        )];
        for (idx, label) in ["B", "C", "D", "E"].iter().enumerate() {
            let n = idx as u8 + 2;
            ports.push(PortConfig::new(
                format!("MIDI {}", label),
                PortKind::SoftUart,
                CableRange::single(cable(n)),
                cable(n),
            ));
        }

        Self {
            rx_chunk_size: DEFAULT_RX_CHUNK,
            tx_chunk_size: DEFAULT_TX_CHUNK,
            reserved_cin_policy: ReservedCinPolicy::default(),
            ports,
        }
    }
}

impl BridgeConfig {
    /// Ports that receive outbound traffic
    pub fn tx_port_count(&self) -> usize {
        self.ports.iter().filter(|p| p.tx_cables.is_some()).count()
    }

    /// Check the layout and chunk sizes
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_chunk("rx_chunk_size", self.rx_chunk_size)?;
        check_chunk("tx_chunk_size", self.tx_chunk_size)?;

        if self.ports.is_empty() {
            return Err(ConfigError::NoPorts);
        }

        let mut names = HashSet::new();
        for port in &self.ports {
            if !names.insert(port.name.as_str()) {
                return Err(ConfigError::DuplicatePortName(port.name.clone()));
            }
        }

        let mut tx_owner: [Option<&str>; midi_protocol::CABLE_COUNT] = Default::default();
        let mut rx_owner: [Option<&str>; midi_protocol::CABLE_COUNT] = Default::default();
        for port in &self.ports {
            if let Some(range) = port.tx_cables {
                if range.is_empty() {
                    return Err(ConfigError::EmptyRange {
                        port: port.name.clone(),
                        first: range.first,
                        last: range.last,
                    });
                }
                for cable in range.iter() {
                    if let Some(first) = tx_owner[cable.index()] {
                        return Err(ConfigError::OverlappingRange {
                            cable,
                            first: first.to_string(),
                            second: port.name.clone(),
                        });
                    }
                    tx_owner[cable.index()] = Some(&port.name);
                }
            }
            if let Some(cable) = port.rx_cable {
                if let Some(first) = rx_owner[cable.index()] {
                    return Err(ConfigError::DuplicateRxCable {
                        cable,
                        first: first.to_string(),
                        second: port.name.clone(),
                    });
                }
                rx_owner[cable.index()] = Some(&port.name);
            }
        }

        Ok(())
    }
}

fn check_chunk(name: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 || value > MAX_CHUNK {
        return Err(ConfigError::InvalidChunkSize {
            name,
            value,
            max: MAX_CHUNK,
        });
    }
    Ok(())
}
