/// Errors that can occur in TCP transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to connect to the specified address.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// The address did not resolve to any socket address.
    #[error("address {addr} did not resolve")]
    Resolve {
        addr: String,
        source: Option<std::io::Error>,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    /// Whether the error concerns a single accepted connection rather than
    /// the listener itself.
    ///
    /// `Io` errors come from configuring an already-accepted stream. Aborted
    /// or reset handshakes surface from `accept` itself.
    pub fn is_connection_level(&self) -> bool {
        match self {
            TransportError::Io(_) => true,
            TransportError::Accept(e) => matches!(
                e.kind(),
                std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Whether this is a non-blocking accept with nothing pending.
    pub fn is_would_block(&self) -> bool {
        matches!(self, TransportError::Accept(e) if e.kind() == std::io::ErrorKind::WouldBlock)
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
