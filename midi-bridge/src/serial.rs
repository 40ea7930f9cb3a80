//! Serial device backed DIN port

use std::io::{Read, Write};
use std::time::Duration;

use midi_mux::{ByteFifo, PhysicalPort};
use serialport::SerialPort;
use tracing::{debug, warn};

use crate::error::BridgeError;

/// Bytes written to the device per drain
const DRAIN_CHUNK: usize = 64;

/// A configured port wired to a real serial device
///
/// Outbound bytes are queued in a bounded FIFO, like the firmware's TX
/// interrupt buffer, and written to the device when drained.
pub struct SerialDevicePort {
    name: String,
    device: String,
    port: Box<dyn SerialPort>,
    tx: ByteFifo,
    scratch: [u8; DRAIN_CHUNK],
    write_errors: u64,
}

impl SerialDevicePort {
    /// Open `device` for the port called `name`
    pub fn open(name: &str, device: &str, baud_rate: u32) -> Result<Self, BridgeError> {
        let port = serialport::new(device, baud_rate)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|source| BridgeError::Serial {
                device: device.to_string(),
                source,
            })?;

        Ok(Self {
            name: name.to_string(),
            device: device.to_string(),
            port,
            tx: ByteFifo::new(),
            scratch: [0; DRAIN_CHUNK],
            write_errors: 0,
        })
    }

    /// Device path
    pub fn device(&self) -> &str {
        &self.device
    }
}

impl PhysicalPort for SerialDevicePort {
    fn poll_rx(&mut self, buf: &mut [u8]) -> usize {
        match self.port.bytes_to_read() {
            Ok(0) => return 0,
            Ok(_) => {}
            Err(e) => {
                warn!("Error polling {} ({}): {}", self.name, self.device, e);
                return 0;
            }
        }

        match self.port.read(buf) {
            Ok(n) => {
                if n > 0 {
                    debug!("Read {} bytes from {}", n, self.name);
                }
                n
            }
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => 0,
            Err(e) => {
                warn!("Error reading from {} ({}): {}", self.name, self.device, e);
                0
            }
        }
    }

    fn write_tx(&mut self, bytes: &[u8]) -> usize {
        self.tx.push_slice(bytes)
    }

    fn drain_tx(&mut self) {
        let n = self.tx.pop_into(&mut self.scratch);
        if n == 0 {
            return;
        }
        if let Err(e) = self.port.write_all(&self.scratch[..n]) {
            self.write_errors += 1;
            warn!(
                "Dropped {} bytes writing to {} ({}): {}",
                n, self.name, self.device, e
            );
        }
    }
}

impl std::fmt::Debug for SerialDevicePort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDevicePort")
            .field("name", &self.name)
            .field("device", &self.device)
            .field("tx_queued", &self.tx.len())
            .field("write_errors", &self.write_errors)
            .finish()
    }
}
