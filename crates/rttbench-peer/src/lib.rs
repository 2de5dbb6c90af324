//! Echo responder, sequential RTT driver and latency statistics.
//!
//! This is the benchmark layer. The server side echoes every frame back on
//! the connection it arrived on; the client side sends one frame at a time,
//! times each round trip and summarises the samples as percentiles.

pub mod client;
pub mod config;
pub mod driver;
pub mod error;
pub mod listener;
pub mod responder;
pub mod stats;

pub use client::{connect, run, run_session, RunOutcome, Termination};
pub use config::{
    join_host_port, RunConfig, DEFAULT_COUNT, DEFAULT_HOST, DEFAULT_MESSAGE, DEFAULT_PORT, DEFAULT_WARMUP,
};
pub use driver::{Action, Driver, DriverEvent, DriverState, Sample};
pub use error::{PeerError, Result};
pub use listener::EchoServer;
pub use responder::EchoResponder;
pub use stats::{format_report, percentile, percentile_index, Summary};

#[cfg(feature = "async")]
pub use responder::serve_framed;
