//! Turmoil-based Transport implementation using simulated TCP.

use std::io;

use async_trait::async_trait;
use odonet_core::transport::{Transport, TransportListener};
use turmoil::net::{TcpListener, TcpStream};

/// Simulation transport over Turmoil's deterministic TCP.
///
/// Endpoints are `host:port` strings naming simulation hosts, so a relay
/// whose config says `"parent": {"ipv4": "root", "port": 8264}` reaches the
/// host registered as `"root"`. Listeners bind `0.0.0.0:<port>`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimTransport;

/// Bound simulated listener.
pub struct SimListener {
    listener: TcpListener,
}

#[async_trait]
impl Transport for SimTransport {
    type Listener = SimListener;
    type Stream = TcpStream;

    async fn bind(&self, endpoint: &str) -> io::Result<Self::Listener> {
        let listener = TcpListener::bind(endpoint).await?;
        Ok(SimListener { listener })
    }

    async fn connect(&self, endpoint: &str) -> io::Result<Self::Stream> {
        TcpStream::connect(endpoint).await
    }
}

#[async_trait]
impl TransportListener for SimListener {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(Self::Stream, String)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((stream, peer.to_string()))
    }
}
