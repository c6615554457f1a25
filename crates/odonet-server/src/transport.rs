//! Production transport over tokio TCP.

use std::io;

use async_trait::async_trait;
use odonet_core::transport::{Transport, TransportListener};
use tokio::net::{TcpListener, TcpStream};

/// Plain TCP: one connection per hop exchange.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpTransport;

/// Bound TCP listener.
#[derive(Debug)]
pub struct TcpAcceptor {
    listener: TcpListener,
}

#[async_trait]
impl Transport for TcpTransport {
    type Listener = TcpAcceptor;
    type Stream = TcpStream;

    async fn bind(&self, endpoint: &str) -> io::Result<Self::Listener> {
        let listener = TcpListener::bind(endpoint).await?;
        Ok(TcpAcceptor { listener })
    }

    async fn connect(&self, endpoint: &str) -> io::Result<Self::Stream> {
        let stream = TcpStream::connect(endpoint).await?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }
}

#[async_trait]
impl TransportListener for TcpAcceptor {
    type Stream = TcpStream;

    async fn accept(&self) -> io::Result<(Self::Stream, String)> {
        let (stream, peer) = self.listener.accept().await?;
        Ok((stream, peer.to_string()))
    }
}
