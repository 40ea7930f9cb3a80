//! USB-MIDI Bridge Runner
//!
//! Runs the bridge task loop on a host machine. Configured ports can be bound
//! to serial devices; every other port is simulated and whatever it would put
//! on the DIN wire is logged. A capture file can stand in for the USB host's
//! OUT traffic.

mod cli;
mod error;
mod serial;

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use midi_mux::{Bridge, BridgeConfig, PhysicalPort, PortId};
use midi_protocol::parse_capture;
use midi_sim::{SharedPort, VirtualHost, VirtualPort};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Args, SerialBinding};
use error::BridgeError;
use serial::SerialDevicePort;

/// A simulated port, kept so its wire output can be logged
struct SimulatedPort {
    name: String,
    port: SharedPort<VirtualPort>,
}

fn config_from_json(text: &str) -> Result<BridgeConfig, BridgeError> {
    let config: BridgeConfig = serde_json::from_str(text)?;
    config.validate()?;
    Ok(config)
}

fn load_config(path: Option<&Path>) -> Result<BridgeConfig, BridgeError> {
    let Some(path) = path else {
        return Ok(BridgeConfig::default());
    };
    let text = std::fs::read_to_string(path).map_err(|source| BridgeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    config_from_json(&text)
}

fn load_replay(path: &Path) -> Result<VirtualHost, BridgeError> {
    let text = std::fs::read_to_string(path).map_err(|source| BridgeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let packets = parse_capture(&text).map_err(|source| BridgeError::Capture {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Loaded {} packets from {}", packets.len(), path.display());
    let mut host = VirtualHost::new();
    for packet in packets {
        host.queue_packet(packet);
    }
    Ok(host)
}

/// Map port names to serial devices, rejecting unknown or repeated names
fn resolve_bindings<'a>(
    config: &BridgeConfig,
    bindings: &'a [SerialBinding],
) -> Result<HashMap<&'a str, &'a str>, BridgeError> {
    let mut resolved = HashMap::new();
    for binding in bindings {
        if !config.ports.iter().any(|p| p.name == binding.port) {
            return Err(BridgeError::UnknownPort(binding.port.clone()));
        }
        if resolved
            .insert(binding.port.as_str(), binding.device.as_str())
            .is_some()
        {
            return Err(BridgeError::DuplicateBinding(binding.port.clone()));
        }
    }
    Ok(resolved)
}

fn build_ports(
    config: &BridgeConfig,
    bindings: &HashMap<&str, &str>,
    baud_rate: u32,
) -> Result<(Vec<Box<dyn PhysicalPort>>, Vec<SimulatedPort>), BridgeError> {
    let mut ports: Vec<Box<dyn PhysicalPort>> = Vec::with_capacity(config.ports.len());
    let mut simulated = Vec::new();

    for port in &config.ports {
        match bindings.get(port.name.as_str()) {
            Some(device) => {
                let serial = SerialDevicePort::open(&port.name, device, baud_rate)?;
                info!(
                    "{} ({}) bound to {} at {} baud",
                    port.name,
                    port.kind.name(),
                    serial.device(),
                    baud_rate
                );
                ports.push(Box::new(serial));
            }
            None => {
                let shared = SharedPort::new(VirtualPort::new(port.name.clone(), port.kind));
                debug!("{} ({}) simulated", port.name, port.kind.name());
                ports.push(shared.boxed());
                simulated.push(SimulatedPort {
                    name: port.name.clone(),
                    port: shared,
                });
            }
        }
    }
    Ok((ports, simulated))
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Log what crossed the simulated edges during one iteration
fn log_traffic(host: &mut VirtualHost, simulated: &[SimulatedPort]) {
    for write in host.take_captured() {
        info!("IN  cable {:>2}: {}", write.cable, hex(&write.bytes));
    }
    for sim in simulated {
        let wire = sim.port.borrow_mut().take_wire();
        if !wire.is_empty() {
            info!("OUT {}: {}", sim.name, hex(&wire));
        }
    }
}

fn log_stats(bridge: &Bridge) {
    let router = bridge.router();
    info!("Stopped after {} iterations", bridge.iterations());
    for idx in 0..router.port_count() {
        let id = PortId(idx);
        let (Some(name), Some(stats)) = (router.port_name(id), router.stats(id)) else {
            continue;
        };
        info!(
            "{}: tx {} (dropped {}), rx {} (forwarded {}, dropped {}, discarded {})",
            name,
            stats.tx_bytes,
            stats.tx_dropped,
            stats.rx_bytes,
            stats.rx_forwarded,
            stats.rx_dropped,
            stats.rx_discarded
        );
    }

    let demux = bridge.demux();
    info!(
        "Unrouted {} bytes, {} framing errors, {} bytes discarded by framing",
        router.unrouted_bytes(),
        demux.framing_errors(),
        demux.discarded_bytes()
    );
}

async fn run(
    bridge: &mut Bridge,
    host: &mut VirtualHost,
    simulated: &[SimulatedPort],
    period: Duration,
) -> std::io::Result<()> {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut replaying = host.pending_packets() > 0;
    let mut dropped = 0usize;

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                info!("Shutting down");
                if dropped > 0 {
                    info!("{} bytes dropped in total", dropped);
                }
                return Ok(());
            }
            _ = ticker.tick() => {
                bridge.poll(host);
                log_traffic(host, simulated);

                for event in bridge.drain_events() {
                    debug!("Router event: {:?}", event);
                    dropped += event.dropped();
                }

                if replaying && host.pending_packets() == 0 {
                    replaying = false;
                    info!("Replay finished after {} packets", host.packets_served());
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "midi_bridge=info,midi_mux=info,midi_protocol=info,midi_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(args.config.as_deref()).context("loading configuration")?;

    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    info!("Starting MIDI bridge with {} ports", config.ports.len());

    let bindings = resolve_bindings(&config, &args.serial)?;
    let (ports, simulated) = build_ports(&config, &bindings, args.baud)?;
    let mut bridge = Bridge::new(&config, ports)?;

    let mut host = match &args.replay {
        Some(path) => load_replay(path)?,
        None => VirtualHost::new(),
    };

    run(
        &mut bridge,
        &mut host,
        &simulated,
        Duration::from_millis(args.tick_ms),
    )
    .await
    .context("waiting for shutdown signal")?;

    log_stats(&bridge);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use midi_mux::ConfigError;

    fn binding(port: &str, device: &str) -> SerialBinding {
        SerialBinding {
            port: port.to_string(),
            device: device.to_string(),
        }
    }

    #[test]
    fn test_default_config_without_path() {
        let config = load_config(None).unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_config_from_json() {
        let config = config_from_json(
            r#"{
                "tx_chunk_size": 16,
                "ports": [
                    {"name": "OUT 1", "kind": "hardware_uart",
                     "tx_cables": {"first": 0, "last": 15}, "rx_cable": 0}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(config.tx_chunk_size, 16);
        assert_eq!(config.rx_chunk_size, 48);
        assert_eq!(config.ports.len(), 1);
        assert_eq!(config.ports[0].name, "OUT 1");
    }

    #[test]
    fn test_config_from_json_is_validated() {
        let err = config_from_json(r#"{"ports": []}"#).unwrap_err();
        assert!(matches!(err, BridgeError::Config(ConfigError::NoPorts)));

        let err = config_from_json("{").unwrap_err();
        assert!(matches!(err, BridgeError::ConfigParse(_)));
    }

    #[test]
    fn test_default_config_round_trips_through_json() {
        let json = serde_json::to_string(&BridgeConfig::default()).unwrap();
        assert_eq!(config_from_json(&json).unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_resolve_bindings() {
        let config = BridgeConfig::default();
        let bindings = vec![binding("MIDI A", "/dev/ttyUSB0")];
        let resolved = resolve_bindings(&config, &bindings).unwrap();
        assert_eq!(resolved.get("MIDI A"), Some(&"/dev/ttyUSB0"));

        let unknown = vec![binding("MIDI Z", "/dev/ttyUSB0")];
        assert!(matches!(
            resolve_bindings(&config, &unknown),
            Err(BridgeError::UnknownPort(name)) if name == "MIDI Z"
        ));

        let twice = vec![
            binding("MIDI B", "/dev/ttyUSB0"),
            binding("MIDI B", "/dev/ttyUSB1"),
        ];
        assert!(matches!(
            resolve_bindings(&config, &twice),
            Err(BridgeError::DuplicateBinding(_))
        ));
    }

    #[test]
    fn test_unbound_ports_are_simulated() {
        let config = BridgeConfig::default();
        let (ports, simulated) = build_ports(&config, &HashMap::new(), cli::MIDI_BAUD).unwrap();
        assert_eq!(ports.len(), 5);
        assert_eq!(simulated.len(), 5);
        assert_eq!(simulated[4].name, "MIDI E");
    }

    #[test]
    fn test_simulated_ports_carry_routed_bytes() {
        let config = BridgeConfig::default();
        let (ports, simulated) = build_ports(&config, &HashMap::new(), cli::MIDI_BAUD).unwrap();
        let mut bridge = Bridge::new(&config, ports).unwrap();
        let mut host = VirtualHost::new();
        host.queue_raw(&[[0x39, 0x93, 0x30, 0x40]]);

        bridge.poll(&mut host);
        assert_eq!(simulated[2].port.borrow().wire(), &[0x93, 0x30, 0x40]);
    }

    #[test]
    fn test_demo_files_parse() {
        let config = config_from_json(include_str!("../../demos/single-port.json")).unwrap();
        assert_eq!(config.tx_port_count(), 1);

        let packets = parse_capture(include_str!("../../demos/chord-and-clock.capture")).unwrap();
        assert_eq!(packets.len(), 11);
    }

    #[test]
    fn test_hex() {
        assert_eq!(hex(&[0x90, 0x40, 0x7F]), "90 40 7F");
        assert_eq!(hex(&[]), "");
    }
}
