//! Router activity events
//!
//! Every non-fatal problem the router hits is logged and also recorded here,
//! so callers and tests can observe exactly what was dropped and where.

use midi_protocol::CableNumber;

use crate::mapping::PortId;

/// Something the router had to drop or report
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// A port TX FIFO accepted fewer bytes than offered
    TxShortfall {
        /// Destination port
        port: PortId,
        /// Cable the run came from
        cable: CableNumber,
        /// Bytes offered to the port
        offered: usize,
        /// Bytes the port accepted
        accepted: usize,
    },

    /// The USB stream sink accepted fewer bytes than offered
    RxShortfall {
        /// Source port
        port: PortId,
        /// Cable the bytes were tagged with
        cable: CableNumber,
        /// Bytes offered to the sink
        offered: usize,
        /// Bytes the sink accepted
        accepted: usize,
    },

    /// A run arrived on a cable with no port wired to it
    Unrouted {
        /// Cable of the run
        cable: CableNumber,
        /// Bytes dropped
        dropped: usize,
    },

    /// The demultiplexer consumed reserved-CIN packets
    FramingError {
        /// Number of reserved packets seen during this pass
        count: u64,
    },
}

impl RouterEvent {
    /// Bytes lost because of this event
    pub fn dropped(&self) -> usize {
        match self {
            Self::TxShortfall {
                offered, accepted, ..
            }
            | Self::RxShortfall {
                offered, accepted, ..
            } => offered - accepted,
            Self::Unrouted { dropped, .. } => *dropped,
            Self::FramingError { .. } => 0,
        }
    }
}
