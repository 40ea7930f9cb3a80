//! Task loop driving the demultiplexer and the router
//!
//! One call to [`Bridge::poll`] is one iteration:
//!
//! 1. poll the RX FIFO of each hardware UART
//! 2. poll the RX FIFO of each soft-UART, in configuration order
//! 3. drain every demultiplexed OUT run into the port TX FIFOs
//! 4. let every port TX FIFO flush toward its wire
//!
//! Nothing blocks. Step 3 only runs while the host has the device mounted;
//! step 4 runs unconditionally.

use tracing::{info, trace};

use crate::config::BridgeConfig;
use crate::demux::Demultiplexer;
use crate::error::ConfigError;
use crate::events::RouterEvent;
use crate::port::{PacketSource, PhysicalPort, StreamSink};
use crate::router::PortRouter;

/// Work done during one iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// Bytes forwarded from ports to the USB sink
    pub inbound: usize,
    /// Bytes accepted by port TX FIFOs
    pub outbound: usize,
}

/// The single-threaded bridge between USB cables and DIN ports
#[derive(Debug)]
pub struct Bridge {
    demux: Demultiplexer,
    router: PortRouter,
    iterations: u64,
    was_connected: bool,
}

impl Bridge {
    /// Build the bridge for a configuration and its port handles
    pub fn new(
        config: &BridgeConfig,
        ports: Vec<Box<dyn PhysicalPort>>,
    ) -> Result<Self, ConfigError> {
        let router = PortRouter::new(config, ports)?;
        info!(
            "Bridge ready: {} ports, reserved CIN policy: {}",
            router.port_count(),
            config.reserved_cin_policy.name()
        );
        Ok(Self {
            demux: Demultiplexer::with_policy(config.reserved_cin_policy),
            router,
            iterations: 0,
            was_connected: false,
        })
    }

    /// Run one iteration of the task loop
    pub fn poll<U>(&mut self, usb: &mut U) -> PollSummary
    where
        U: PacketSource + StreamSink + ?Sized,
    {
        let connected = usb.connection_active();
        if connected != self.was_connected {
            info!(
                "USB connection {}",
                if connected { "active" } else { "inactive" }
            );
            self.was_connected = connected;
        }

        let inbound = self.router.poll_inbound(usb);
        let outbound = if connected {
            self.router.route_outbound(&mut self.demux, usb)
        } else {
            0
        };
        self.router.drain_outbound();

        self.iterations += 1;
        if inbound + outbound > 0 {
            trace!(
                "Iteration {}: {} bytes in, {} bytes out",
                self.iterations,
                inbound,
                outbound
            );
        }
        PollSummary { inbound, outbound }
    }

    /// Run the task loop forever
    pub fn run<U>(&mut self, usb: &mut U) -> !
    where
        U: PacketSource + StreamSink + ?Sized,
    {
        loop {
            self.poll(usb);
        }
    }

    /// Iterations completed so far
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// The demultiplexer
    pub fn demux(&self) -> &Demultiplexer {
        &self.demux
    }

    /// The router
    pub fn router(&self) -> &PortRouter {
        &self.router
    }

    /// Take all events the router recorded
    pub fn drain_events(&mut self) -> Vec<RouterEvent> {
        self.router.drain_events()
    }
}
