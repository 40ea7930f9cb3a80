//! Error types for the bridge core

use midi_protocol::CableNumber;
use thiserror::Error;

/// Errors detected while building the port mapping from configuration
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No ports configured
    #[error("no ports configured")]
    NoPorts,

    /// Two ports share a name
    #[error("duplicate port name: {0}")]
    DuplicatePortName(String),

    /// Range with its first cable above its last
    #[error("port {port}: cable range {first}..={last} is empty")]
    EmptyRange {
        port: String,
        first: CableNumber,
        last: CableNumber,
    },

    /// Two ports claim the same outbound cable
    #[error("cable {cable} is routed to both {first} and {second}")]
    OverlappingRange {
        cable: CableNumber,
        first: String,
        second: String,
    },

    /// Two ports tag their inbound bytes with the same cable
    #[error("cable {cable} is the inbound tag of both {first} and {second}")]
    DuplicateRxCable {
        cable: CableNumber,
        first: String,
        second: String,
    },

    /// Chunk size outside the accepted bounds
    #[error("{name} must be between 1 and {max}, got {value}")]
    InvalidChunkSize {
        name: &'static str,
        value: usize,
        max: usize,
    },

    /// Number of port handles differs from the configured ports
    #[error("configuration lists {expected} ports but {actual} handles were supplied")]
    PortCountMismatch { expected: usize, actual: usize },
}

/// Errors raised while routing a byte run
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// No port is wired to this cable
    #[error("no port is wired to cable {0}")]
    UnmappedCable(CableNumber),
}
