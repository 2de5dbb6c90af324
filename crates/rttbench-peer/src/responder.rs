use std::io::{ErrorKind, Read, Write};

use bytes::BytesMut;
use rttbench_frame::{encode_frame, FrameConfig, FrameDecoder, FrameError};
use tracing::{debug, trace};

use crate::error::Result;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Echoes every frame received on one connection back to its sender.
///
/// Each responder owns its stream and its decode buffer; nothing is shared
/// between connections.
pub struct EchoResponder<S> {
    id: String,
    stream: S,
    decoder: FrameDecoder,
    out: BytesMut,
    echoed: u64,
}

impl<S: Read + Write> EchoResponder<S> {
    /// Create a responder with default frame limits.
    pub fn new(stream: S) -> Self {
        Self::with_config("conn", stream, &FrameConfig::default())
    }

    /// Create a responder with an explicit id and frame limits.
    pub fn with_config(id: impl Into<String>, stream: S, config: &FrameConfig) -> Self {
        Self {
            id: id.into(),
            stream,
            decoder: FrameDecoder::with_max_payload(config.max_payload_size),
            out: BytesMut::new(),
            echoed: 0,
        }
    }

    /// Feed one chunk read from the stream and echo every frame it completes.
    ///
    /// Echoes of frames that arrived coalesced in one chunk go out in a
    /// single write. Returns how many frames were echoed.
    ///
    /// If the chunk turns bad partway through, the frames decoded before
    /// the error are still echoed and then the decode error is returned.
    pub fn on_chunk(&mut self, chunk: &[u8]) -> Result<usize> {
        self.out.clear();
        let mut count = 0usize;
        let mut decoded = Ok(());
        for frame in self.decoder.feed(chunk) {
            let frame = match frame {
                Ok(frame) => frame,
                Err(err) => {
                    decoded = Err(err);
                    break;
                }
            };
            trace!(conn = %self.id, size = frame.payload.len(), "echoing frame");
            encode_frame(&frame.payload, &mut self.out)?;
            count += 1;
        }

        if count > 0 {
            self.stream
                .write_all(&self.out)
                .and_then(|()| self.stream.flush())
                .map_err(FrameError::Io)?;
            self.echoed += count as u64;
        }
        decoded?;
        Ok(count)
    }

    /// Echo until the peer closes the connection.
    ///
    /// Returns the total number of frames echoed.
    pub fn run(&mut self) -> Result<u64> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            let read = match self.stream.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err).into()),
            };

            if read == 0 {
                if self.decoder.has_partial() {
                    debug!(
                        conn = %self.id,
                        buffered = self.decoder.buffered(),
                        "peer closed inside a frame"
                    );
                }
                return Ok(self.echoed);
            }

            self.on_chunk(&chunk[..read])?;
        }
    }

    /// Connection id used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Frames echoed so far.
    pub fn echoed(&self) -> u64 {
        self.echoed
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &S {
        &self.stream
    }

    /// Consume the responder and return the inner stream.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Echo over an async stream until the peer closes it.
///
/// Returns the number of frames echoed.
#[cfg(feature = "async")]
pub async fn serve_framed<T>(io: T, max_payload_size: usize) -> Result<u64>
where
    T: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin,
{
    use futures_util::{SinkExt, StreamExt};
    use rttbench_frame::RttCodec;
    use tokio_util::codec::Framed;

    let mut framed = Framed::new(io, RttCodec::new(max_payload_size));
    let mut echoed = 0u64;
    while let Some(frame) = framed.next().await {
        let frame = frame?;
        framed.send(frame.payload).await?;
        echoed += 1;
    }
    Ok(echoed)
}
