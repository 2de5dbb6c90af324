//! TCP round-trip latency benchmark.
//!
//! A client sends a fixed message to an echo server one frame at a time,
//! timing each round trip, and reports min/percentile/max/average latency.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP listener and stream wrappers
//! - [`frame`]: 4-byte big-endian length-prefixed framing
//! - [`peer`]: echo responder, RTT driver and statistics (behind `peer` feature)

/// Re-export transport types.
pub mod transport {
    pub use rttbench_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use rttbench_frame::*;
}

/// Re-export peer types (requires `peer` feature).
#[cfg(feature = "peer")]
pub mod peer {
    pub use rttbench_peer::*;
}
