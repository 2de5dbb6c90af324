use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

use rttbench_frame::FrameConfig;
use rttbench_transport::{NetStream, TcpTransport, TransportError};
use tracing::{debug, info, warn};

use crate::error::{PeerError, Result};
use crate::responder::EchoResponder;

/// How often an idle accept loop re-checks its shutdown flag.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Listens for connections and hands each one its own echo responder.
pub struct EchoServer {
    transport: TcpTransport,
    frame_config: FrameConfig,
    next_conn_id: AtomicU64,
}

impl EchoServer {
    /// Bind to `addr` (e.g. `127.0.0.1:4000`).
    pub fn bind(addr: &str) -> Result<Self> {
        let transport = TcpTransport::bind(addr)?;
        Ok(Self {
            transport,
            frame_config: FrameConfig::default(),
            next_conn_id: AtomicU64::new(1),
        })
    }

    /// Override frame limits and timeouts for accepted connections.
    pub fn with_frame_config(mut self, config: FrameConfig) -> Self {
        self.frame_config = config;
        self
    }

    /// Accept the next connection.
    pub fn accept(&self) -> Result<EchoResponder<NetStream>> {
        let stream = self.transport.accept()?;
        Ok(self.responder_for(stream)?)
    }

    fn responder_for(
        &self,
        stream: NetStream,
    ) -> rttbench_transport::Result<EchoResponder<NetStream>> {
        stream.set_read_timeout(self.frame_config.read_timeout)?;
        stream.set_write_timeout(self.frame_config.write_timeout)?;
        let id = self.next_conn_id.fetch_add(1, Ordering::Relaxed);
        Ok(EchoResponder::with_config(
            format!("conn-{id}"),
            stream,
            &self.frame_config,
        ))
    }

    /// Accept connections until `running` is cleared, echoing each one on
    /// its own thread.
    ///
    /// Returns the number of connections accepted. Connections still open
    /// when the flag clears keep running on their threads.
    pub fn serve_until(&self, running: &AtomicBool) -> Result<u64> {
        self.transport.set_nonblocking(true)?;
        info!(addr = %self.local_addr(), "echo server accepting connections");

        let mut accepted = 0u64;
        while running.load(Ordering::SeqCst) {
            let mut responder = match self.transport.accept() {
                Err(err) if err.is_would_block() => {
                    thread::sleep(ACCEPT_POLL_INTERVAL);
                    continue;
                }
                result => match self.admit(result)? {
                    Some(responder) => responder,
                    None => continue,
                },
            };

            thread::Builder::new()
                .name(format!("echo-{}", responder.id()))
                .spawn(move || match responder.run() {
                    Ok(echoed) => debug!(conn = responder.id(), echoed, "connection closed"),
                    Err(err) => debug!(conn = responder.id(), error = %err, "connection error"),
                })
                .map_err(PeerError::Spawn)?;
            accepted += 1;
        }

        debug!(accepted, "echo server stopped");
        Ok(accepted)
    }

    /// Turn the result of one accept into a responder.
    ///
    /// Failures confined to that connection are logged and yield `None` so
    /// the accept loop keeps serving; listener failures are returned.
    fn admit(
        &self,
        accepted: rttbench_transport::Result<NetStream>,
    ) -> Result<Option<EchoResponder<NetStream>>> {
        let admitted = accepted.and_then(|stream| {
            let peer = stream.peer_addr().ok();
            let responder = self.responder_for(stream)?;
            debug!(conn = responder.id(), ?peer, "connection accepted");
            Ok(responder)
        });

        match admitted {
            Ok(responder) => Ok(Some(responder)),
            Err(err) if err.is_connection_level() => {
                warn!(error = %err, "dropping connection that failed setup");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Bound socket address.
    pub fn local_addr(&self) -> SocketAddr {
        self.transport.local_addr()
    }
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::sync::Arc;

    use rttbench_frame::{FrameReader, FrameWriter};

    use super::*;

    #[test]
    fn accept_returns_numbered_responders() {
        let server = EchoServer::bind("127.0.0.1:0").expect("server should bind");
        let addr = server.local_addr().to_string();

        let clients = thread::spawn(move || {
            let first = TcpTransport::connect(&addr).expect("first client should connect");
            let second = TcpTransport::connect(&addr).expect("second client should connect");
            (first, second)
        });

        let first = server.accept().expect("first accept should succeed");
        let second = server.accept().expect("second accept should succeed");
        assert_eq!(first.id(), "conn-1");
        assert_eq!(second.id(), "conn-2");
        assert!(first.get_ref().nodelay().unwrap());

        let _ = clients.join().expect("client thread should finish");
    }

    #[test]
    fn accepted_responder_echoes() {
        let server = EchoServer::bind("127.0.0.1:0").expect("server should bind");
        let addr = server.local_addr().to_string();

        let handle = thread::spawn(move || {
            let mut responder = server.accept().expect("accept should succeed");
            responder.run().expect("responder should run to EOF")
        });

        let stream = TcpTransport::connect(&addr).expect("client should connect");
        let mut reader = FrameReader::new(stream.try_clone().unwrap());
        let mut writer = FrameWriter::new(stream);

        writer.send(b"hello").unwrap();
        assert_eq!(reader.read_frame().unwrap().payload.as_ref(), b"hello");
        writer.send(b"").unwrap();
        assert!(reader.read_frame().unwrap().payload.is_empty());

        drop(writer);
        drop(reader);
        assert_eq!(handle.join().expect("server thread should finish"), 2);
    }

    #[test]
    fn failed_connection_setup_does_not_stop_server() {
        let server = EchoServer::bind("127.0.0.1:0").expect("server should bind");
        let addr = server.local_addr().to_string();

        let aborted = TransportError::Accept(io::Error::from(io::ErrorKind::ConnectionAborted));
        assert!(server.admit(Err(aborted)).expect("aborted accept is not fatal").is_none());
        let setup = TransportError::Io(io::Error::from(io::ErrorKind::InvalidInput));
        assert!(server.admit(Err(setup)).expect("stream setup is not fatal").is_none());

        let client = thread::spawn(move || {
            let stream = TcpTransport::connect(&addr).expect("client should connect");
            let mut reader = FrameReader::new(stream.try_clone().unwrap());
            let mut writer = FrameWriter::new(stream);
            writer.send(b"still up").unwrap();
            reader.read_frame().unwrap()
        });

        let mut responder = server
            .admit(server.transport.accept())
            .expect("accept should succeed")
            .expect("connection should be admitted");
        assert_eq!(responder.id(), "conn-1");
        assert_eq!(responder.run().expect("responder should run to EOF"), 1);

        let echoed = client.join().expect("client should finish");
        assert_eq!(echoed.payload.as_ref(), b"still up");
    }

    #[test]
    fn listener_failure_is_fatal() {
        let server = EchoServer::bind("127.0.0.1:0").expect("server should bind");
        let fatal = TransportError::Accept(io::Error::other("too many open files"));
        assert!(matches!(
            server.admit(Err(fatal)),
            Err(PeerError::Transport(TransportError::Accept(_)))
        ));
    }

    #[test]
    fn serve_until_handles_concurrent_connections() {
        let server = Arc::new(EchoServer::bind("127.0.0.1:0").expect("server should bind"));
        let addr = server.local_addr().to_string();
        let running = Arc::new(AtomicBool::new(true));

        let serve = {
            let server = Arc::clone(&server);
            let running = Arc::clone(&running);
            thread::spawn(move || server.serve_until(&running))
        };

        let clients: Vec<_> = (0..3)
            .map(|i| {
                let addr = addr.clone();
                thread::spawn(move || {
                    let stream = TcpTransport::connect(&addr).expect("client should connect");
                    let mut reader = FrameReader::new(stream.try_clone().unwrap());
                    let mut writer = FrameWriter::new(stream);
                    for n in 0..20 {
                        let payload = format!("client-{i}-msg-{n}");
                        writer.send(payload.as_bytes()).unwrap();
                        let echoed = reader.read_frame().unwrap();
                        assert_eq!(echoed.payload.as_ref(), payload.as_bytes());
                    }
                })
            })
            .collect();

        for client in clients {
            client.join().expect("client should finish");
        }

        running.store(false, Ordering::SeqCst);
        let accepted = serve
            .join()
            .expect("serve thread should finish")
            .expect("serve should not fail");
        assert_eq!(accepted, 3);
    }
}
