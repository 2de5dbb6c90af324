//! TCP transport for the rttbench echo benchmark.
//!
//! Provides the ordered, reliable byte stream the framing layer runs on:
//! - [`TcpTransport`] binds, accepts and connects
//! - [`NetStream`] is the connected stream, always with `TCP_NODELAY` set
//!
//! This is the lowest layer of rttbench. Everything else builds on top of
//! the [`NetStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::NetStream;
pub use tcp::TcpTransport;
