/// Errors that can occur in peer operations.
#[derive(Debug, thiserror::Error)]
pub enum PeerError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] rttbench_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] rttbench_frame::FrameError),

    /// The run configuration cannot be executed.
    #[error("invalid run configuration: {0}")]
    InvalidConfig(String),

    /// Failed to start a connection worker thread.
    #[error("failed to spawn connection worker: {0}")]
    Spawn(std::io::Error),
}

pub type Result<T> = std::result::Result<T, PeerError>;
