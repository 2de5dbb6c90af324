use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::NetStream;

/// TCP listening endpoint.
///
/// Accepted and connected streams come back as [`NetStream`] with
/// `TCP_NODELAY` already applied.
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpTransport {
    /// Bind and listen on `addr` (e.g. `127.0.0.1:4000`, port 0 for ephemeral).
    pub fn bind(addr: &str) -> Result<Self> {
        let resolved = resolve(addr)?;
        let listener = TcpListener::bind(resolved).map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;
        let local_addr = listener.local_addr().map_err(|e| TransportError::Bind {
            addr: addr.to_string(),
            source: e,
        })?;

        info!(%local_addr, "listening on tcp");

        Ok(Self {
            listener,
            local_addr,
        })
    }

    /// Accept an incoming connection.
    ///
    /// Blocks unless [`TcpTransport::set_nonblocking`] was enabled, in which
    /// case an idle listener returns `TransportError::Accept` with
    /// `ErrorKind::WouldBlock`.
    pub fn accept(&self) -> Result<NetStream> {
        let (stream, peer) = self.listener.accept().map_err(TransportError::Accept)?;
        debug!(%peer, "accepted connection");
        NetStream::from_tcp(stream)
    }

    /// Toggle non-blocking accept.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener
            .set_nonblocking(nonblocking)
            .map_err(Into::into)
    }

    /// Connect to a listening endpoint.
    pub fn connect(addr: &str) -> Result<NetStream> {
        let resolved = resolve(addr)?;
        let stream = TcpStream::connect(resolved).map_err(|e| TransportError::Connect {
            addr: addr.to_string(),
            source: e,
        })?;
        debug!(%resolved, "connected to tcp endpoint");
        NetStream::from_tcp(stream)
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

fn resolve(addr: &str) -> Result<SocketAddr> {
    let mut addrs = addr
        .to_socket_addrs()
        .map_err(|e| TransportError::Resolve {
            addr: addr.to_string(),
            source: Some(e),
        })?;
    addrs.next().ok_or_else(|| TransportError::Resolve {
        addr: addr.to_string(),
        source: None,
    })
}
