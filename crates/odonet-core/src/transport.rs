//! Transport abstraction for hop-to-hop connections.
//!
//! Every exchange between a child and its parent is one short-lived stream:
//! the child connects, writes one packet, reads at most one packet back, and
//! both sides close. Production uses tokio TCP, tests use Turmoil's
//! simulated TCP.

use std::io;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

/// Abstract connection-oriented transport.
///
/// Endpoints are `host:port` strings so the same configuration document
/// works for real sockets and for named simulation hosts.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Bidirectional byte stream for one exchange
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Listener producing inbound streams
    type Listener: TransportListener<Stream = Self::Stream>;

    /// Start accepting connections on `endpoint`.
    async fn bind(&self, endpoint: &str) -> io::Result<Self::Listener>;

    /// Open a stream to `endpoint`.
    async fn connect(&self, endpoint: &str) -> io::Result<Self::Stream>;
}

/// Accepts inbound streams from children.
#[async_trait]
pub trait TransportListener: Send + Sync + 'static {
    /// Stream type handed out per accepted connection
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Wait for the next child to connect.
    ///
    /// Returns the stream and a printable peer address for logging.
    async fn accept(&self) -> io::Result<(Self::Stream, String)>;
}
