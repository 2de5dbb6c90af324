//! Length-prefixed message framing for the rttbench echo protocol.
//!
//! Every message on the wire is framed as:
//! - A 4-byte big-endian unsigned payload length
//! - Exactly that many payload bytes (UTF-8 text in practice)
//!
//! Splitting a TCP byte stream back into messages, including frames that
//! arrive fragmented or coalesced, is handled by [`FrameDecoder`].

pub mod codec;
pub mod decoder;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod tokio_codec;

pub use codec::{decode_frame, encode_frame, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
pub use decoder::{FrameDecoder, Frames};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;

#[cfg(feature = "async")]
pub use tokio_codec::RttCodec;
