//! Root engine driver.
//!
//! Accepts children, feeds each packet to the shared [`Root`] state machine,
//! writes back the response it picked, and performs the follow-up actions
//! (event persistence). A child gets `networking.this.timeout` to deliver
//! its packet. The presentation layer talks to the same state through a
//! [`RootHandle`].

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use odonet_core::{
    directory::RoutingDirectory,
    env::Environment,
    error::RoutingError,
    relay::link_timeout,
    root::{CommandResponse, DeviceRecord, Inbound, Root, RootAction, Updates},
    transport::{Transport, TransportListener},
};
use odonet_proto::{Address, NodeConfig, NodeId, Packet, ProtocolError, read_packet, write_packet};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{backup::EventStore, error::ServerError};

/// Clonable access to the root state for the presentation layer.
///
/// Every call takes the lock briefly; none of them wait on the network.
#[derive(Debug, Clone)]
pub struct RootHandle {
    root: Arc<Mutex<Root>>,
}

impl RootHandle {
    /// Handle owning a fresh lock around `root`
    #[must_use]
    pub fn from_root(root: Root) -> Self {
        Self { root: Arc::new(Mutex::new(root)) }
    }

    /// Run a named operator command.
    pub fn handle_command(&self, name: &str, data: Value) -> CommandResponse {
        self.root.lock().handle_command(name, data)
    }

    /// Take the changes accumulated since the last call.
    pub fn drain_updates(&self) -> Updates {
        self.root.lock().drain_updates()
    }

    /// Cached current image by file name
    #[must_use]
    pub fn file(&self, name: &str) -> Option<Bytes> {
        self.root.lock().file(name)
    }

    /// Snapshot of every registered node
    #[must_use]
    pub fn devices(&self) -> Vec<DeviceRecord> {
        self.root.lock().devices().cloned().collect()
    }

    /// Snapshot of one node's record
    #[must_use]
    pub fn device(&self, node: NodeId) -> Option<DeviceRecord> {
        self.root.lock().device(node).cloned()
    }

    /// Last path seen from `node`
    #[must_use]
    pub fn route(&self, node: NodeId) -> Option<Address> {
        self.root.lock().route(node).cloned()
    }

    fn handle_packet(&self, packet: &Packet, now: DateTime<Utc>) -> Result<Inbound, RoutingError> {
        self.root.lock().handle_packet(packet, now)
    }

    /// Packets waiting for the root's child `next_hop`
    #[must_use]
    pub fn pending(&self, next_hop: NodeId) -> usize {
        self.root.lock().directory().pending(next_hop)
    }
}

/// The root process.
pub struct RootNode<T, E> {
    transport: T,
    env: E,
    root: RootHandle,
    events: EventStore,
    listen: String,
    timeout: Duration,
}

impl<T, E> RootNode<T, E>
where
    T: Transport,
    E: Environment,
{
    /// Root listening where `config` says, filing events into `events`.
    #[must_use]
    pub fn new(config: NodeConfig, transport: T, env: E, events: EventStore) -> Self {
        let listen = config.listen_endpoint();
        let timeout = link_timeout(&config);
        let root = RootHandle::from_root(Root::new(config, Arc::new(RoutingDirectory::new())));
        Self { transport, env, root, events, listen, timeout }
    }

    /// Handle for the presentation layer
    #[must_use]
    pub fn handle(&self) -> RootHandle {
        self.root.clone()
    }

    /// Bind and accept children forever.
    ///
    /// # Errors
    ///
    /// Only if the listener cannot be bound.
    pub async fn run(self: Arc<Self>) -> Result<(), ServerError> {
        let listener = self
            .transport
            .bind(&self.listen)
            .await
            .map_err(|source| ServerError::Bind { endpoint: self.listen.clone(), source })?;
        info!(endpoint = %self.listen, "Starting root");

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let node = Arc::clone(&self);
                    tokio::spawn(async move { node.handle_child(stream, &peer).await });
                },
                Err(err) => warn!(error = %err, "Accept failed"),
            }
        }
    }

    async fn receive(&self, stream: &mut T::Stream) -> Result<Option<Packet>, ProtocolError> {
        tokio::select! {
            result = read_packet(stream) => result,
            () = self.env.sleep(self.timeout) => Err(ProtocolError::TimedOut(self.timeout)),
        }
    }

    async fn handle_child(&self, mut stream: T::Stream, peer: &str) {
        let packet = match self.receive(&mut stream).await {
            Ok(Some(packet)) => packet,
            Ok(None) => {
                debug!(peer, "Child closed without sending");
                return;
            },
            Err(err) => {
                warn!(peer, error = %err, "Failed to read packet from child");
                return;
            },
        };

        let now = self.env.wall_clock();
        let inbound = match self.root.handle_packet(&packet, now) {
            Ok(inbound) => inbound,
            Err(err) => {
                warn!(peer, error = %err, "Dropping packet");
                return;
            },
        };

        if let Some(response) = inbound.response
            && let Err(err) = write_packet(&mut stream, &response).await
        {
            warn!(peer, error = %err, "Failed to deliver queued packet");
        }

        for action in inbound.actions {
            match action {
                RootAction::PersistEvent(event) => {
                    if let Err(err) = self.events.save_async(*event).await {
                        error!(error = %err, "Failed to store event");
                    }
                },
            }
        }
    }
}
