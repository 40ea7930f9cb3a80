//! Error types for the bridge runner

use std::path::PathBuf;

use midi_mux::ConfigError;
use midi_protocol::PacketError;
use thiserror::Error;

/// Errors that stop the bridge from starting
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("bad capture file {path}: {source}")]
    Capture { path: PathBuf, source: PacketError },

    #[error("failed to open serial device {device}: {source}")]
    Serial {
        device: String,
        source: serialport::Error,
    },

    #[error("invalid serial binding {0:?}, expected NAME=DEVICE")]
    InvalidBinding(String),

    #[error("no configured port named {0:?}")]
    UnknownPort(String),

    #[error("port {0:?} is bound to more than one device")]
    DuplicateBinding(String),
}
