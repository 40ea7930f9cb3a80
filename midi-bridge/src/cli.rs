//! Command-line arguments

use std::path::PathBuf;
use std::str::FromStr;

use clap::Parser;

use crate::error::BridgeError;

/// MIDI DIN current-loop baud rate
pub const MIDI_BAUD: u32 = 31_250;

/// Multi-port USB-MIDI bridge runner
#[derive(Parser, Debug)]
#[command(
    name = "midi-bridge",
    version,
    about = "Run the USB-MIDI cable bridge against serial devices or simulated ports",
    long_about = None
)]
pub struct Args {
    /// Port layout as JSON (defaults to 1 UART + 4 soft-UARTs)
    #[arg(short, long, env = "MIDI_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Capture file of event packets to play into the OUT endpoint
    #[arg(short, long)]
    pub replay: Option<PathBuf>,

    /// Bind a configured port to a serial device, e.g. "MIDI A=/dev/ttyUSB0"
    #[arg(short, long = "serial", value_name = "NAME=DEVICE")]
    pub serial: Vec<SerialBinding>,

    /// Baud rate for bound serial devices
    #[arg(long, default_value_t = MIDI_BAUD)]
    pub baud: u32,

    /// Task loop period in milliseconds
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u64).range(1..))]
    pub tick_ms: u64,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,
}

/// A `NAME=DEVICE` pair from the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialBinding {
    /// Configured port name
    pub port: String,
    /// Serial device path
    pub device: String,
}

impl FromStr for SerialBinding {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (port, device) = s
            .split_once('=')
            .ok_or_else(|| BridgeError::InvalidBinding(s.to_string()))?;
        let (port, device) = (port.trim(), device.trim());
        if port.is_empty() || device.is_empty() {
            return Err(BridgeError::InvalidBinding(s.to_string()));
        }
        Ok(Self {
            port: port.to_string(),
            device: device.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_parse() {
        let binding: SerialBinding = "MIDI A=/dev/ttyUSB0".parse().unwrap();
        assert_eq!(binding.port, "MIDI A");
        assert_eq!(binding.device, "/dev/ttyUSB0");

        let binding: SerialBinding = "MIDI C = COM4".parse().unwrap();
        assert_eq!(binding.port, "MIDI C");
        assert_eq!(binding.device, "COM4");
    }

    #[test]
    fn test_binding_rejects_malformed() {
        assert!("MIDI A".parse::<SerialBinding>().is_err());
        assert!("=/dev/ttyUSB0".parse::<SerialBinding>().is_err());
        assert!("MIDI A=".parse::<SerialBinding>().is_err());
    }

    #[test]
    fn test_args_defaults() {
        let args = Args::try_parse_from(["midi-bridge"]).unwrap();
        assert_eq!(args.baud, MIDI_BAUD);
        assert_eq!(args.tick_ms, 1);
        assert!(args.serial.is_empty());
        assert!(!args.print_config);
    }

    #[test]
    fn test_args_multiple_bindings() {
        let args = Args::try_parse_from([
            "midi-bridge",
            "--serial",
            "MIDI A=/dev/ttyUSB0",
            "-s",
            "MIDI B=/dev/ttyUSB1",
            "--tick-ms",
            "5",
        ])
        .unwrap();
        assert_eq!(args.serial.len(), 2);
        assert_eq!(args.serial[1].port, "MIDI B");
        assert_eq!(args.tick_ms, 5);
    }

    #[test]
    fn test_args_reject_zero_tick() {
        assert!(Args::try_parse_from(["midi-bridge", "--tick-ms", "0"]).is_err());
    }
}
