use std::time::Duration;

use rttbench_frame::{FrameConfig, DEFAULT_MAX_PAYLOAD};

use crate::error::{PeerError, Result};

/// Default server host.
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// Default server port.
pub const DEFAULT_PORT: u16 = 4000;
/// Default message payload.
pub const DEFAULT_MESSAGE: &str = "hola";
/// Default number of round trips per run.
pub const DEFAULT_COUNT: u64 = 1000;
/// Default number of leading round trips whose samples are discarded.
pub const DEFAULT_WARMUP: u64 = 100;

/// `host:port`, bracketing bare IPv6 literals.
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Parameters of one benchmark run. Read-only once the run starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Server host name or IP.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Payload sent (and expected back) on every round trip.
    pub message: String,
    /// Total number of round trips.
    pub count: u64,
    /// Whether the first `warmup` samples are discarded.
    pub warmup_enabled: bool,
    /// Number of leading round trips to discard when warmup is enabled.
    pub warmup: u64,
    /// Give up on a stalled peer after this long. `None` waits forever.
    pub read_timeout: Option<Duration>,
    /// Largest payload accepted from or sent to the peer.
    pub max_payload_size: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            message: DEFAULT_MESSAGE.to_string(),
            count: DEFAULT_COUNT,
            warmup_enabled: true,
            warmup: DEFAULT_WARMUP,
            read_timeout: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl RunConfig {
    /// Address of the server to connect to.
    pub fn addr(&self) -> String {
        join_host_port(&self.host, self.port)
    }

    /// Number of leading samples to discard.
    pub fn effective_warmup(&self) -> u64 {
        if self.warmup_enabled {
            self.warmup
        } else {
            0
        }
    }

    /// Frame settings for the client connection.
    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_payload_size: self.max_payload_size,
            read_timeout: self.read_timeout,
            write_timeout: self.read_timeout,
        }
    }

    /// Reject configurations that could never complete.
    pub fn validate(&self) -> Result<()> {
        if self.message.len() > self.max_payload_size {
            return Err(PeerError::InvalidConfig(format!(
                "message is {} bytes, max frame payload is {}",
                self.message.len(),
                self.max_payload_size
            )));
        }
        if self.read_timeout == Some(Duration::ZERO) {
            return Err(PeerError::InvalidConfig(
                "read timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
