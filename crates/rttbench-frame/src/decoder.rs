use bytes::BytesMut;

use crate::codec::{decode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Per-connection frame decoder.
///
/// Owns the accumulation buffer for exactly one connection. Bytes are only
/// ever appended by [`FrameDecoder::feed`] and only removed once a complete
/// frame has been taken off the front, so between calls the buffer holds
/// zero or more complete frames followed by at most one partial frame.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: BytesMut,
    max_payload_size: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Create a decoder with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    /// Create a decoder with an explicit payload limit.
    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            max_payload_size,
        }
    }

    /// Append a chunk and iterate the frames that are now complete.
    ///
    /// The iterator is lazy: frames that are not pulled stay buffered and
    /// are returned by the next `feed` or [`FrameDecoder::next_frame`].
    pub fn feed(&mut self, chunk: &[u8]) -> Frames<'_> {
        self.push(chunk);
        Frames {
            decoder: self,
            failed: false,
        }
    }

    /// Append a chunk without decoding anything yet.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Take the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        decode_frame(&mut self.buf, self.max_payload_size)
    }

    /// Number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Whether any bytes of an unfinished frame are waiting.
    pub fn has_partial(&self) -> bool {
        !self.buf.is_empty()
    }
}

/// Iterator over the complete frames in a [`FrameDecoder`].
///
/// Yields `Err` at most once; the iterator is exhausted afterwards.
pub struct Frames<'a> {
    decoder: &'a mut FrameDecoder,
    failed: bool,
}

impl Iterator for Frames<'_> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        match self.decoder.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => None,
            Err(err) => {
                self.failed = true;
                Some(Err(err))
            }
        }
    }
}

impl std::iter::FusedIterator for Frames<'_> {}
