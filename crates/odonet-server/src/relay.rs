//! Relay engine driver.
//!
//! Runs the two halves of a relay against a [`Transport`]:
//!
//! - the listener: one task per connecting child. The child's packet is
//!   forwarded to the parent first, then whatever is queued for that child
//!   is written back before the connection closes.
//! - the tick loop: heartbeats, device polling, event backup, pacing.
//!
//! Every upward exchange is `connect, write one packet, read at most one
//! packet, close`, bounded by a timeout. Reading a child's packet is bounded
//! by the same timeout, so a child that stalls mid-packet only costs its own
//! connection. A failed exchange is logged and reported as undelivered;
//! nothing here stops the node.
//!
//! The parent's response may be a command for this node. Commands that
//! produce a reply (config, wifi quality, shell output) send it upward
//! through the same path, so a chain of replies is handled iteratively.

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use odonet_core::{
    device::{Device, DeviceError, DeviceFactory, TickResult, build_devices},
    directory::RoutingDirectory,
    env::Environment,
    relay::{
        LocalCommand, RelayRouter, RelaySettings, ResponseOutcome, TickSchedule, boot_packets, event_packet,
        image_packet,
    },
    transport::{Transport, TransportListener},
};
use odonet_proto::{Address, Message, NodeConfig, Packet, Payload, ProtocolError, read_packet, write_packet};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::{backup::EventStore, error::ServerError, host::HostControl};

/// One relay process.
pub struct RelayNode<T, E, H> {
    transport: T,
    env: E,
    host: H,
    router: RelayRouter,
    settings: RelaySettings,
    parent: String,
    listen: String,
    config: Mutex<NodeConfig>,
    devices: Mutex<Vec<Box<dyn Device>>>,
    factory: Box<dyn DeviceFactory>,
    store: EventStore,
}

impl<T, E, H> RelayNode<T, E, H>
where
    T: Transport,
    E: Environment,
    H: HostControl,
{
    /// Build a relay from its config and collaborators.
    ///
    /// Devices are constructed immediately; failures are logged and those
    /// devices left out.
    ///
    /// # Errors
    ///
    /// [`ServerError::NoParent`] if the config has no `networking.parent`.
    pub fn new(
        config: NodeConfig,
        transport: T,
        env: E,
        host: H,
        factory: Box<dyn DeviceFactory>,
        store: EventStore,
    ) -> Result<Self, ServerError> {
        let parent = config.parent_endpoint().ok_or(ServerError::NoParent(config.id()))?;
        let settings = RelaySettings::from_config(&config);
        let router = RelayRouter::new(config.id(), Arc::new(RoutingDirectory::new()));
        let devices = build_devices(factory.as_ref(), &config.devices);

        Ok(Self {
            transport,
            env,
            host,
            router,
            settings,
            parent,
            listen: config.listen_endpoint(),
            config: Mutex::new(config),
            devices: Mutex::new(devices),
            factory,
            store,
        })
    }

    /// Routing state shared with connection handlers
    #[must_use]
    pub fn router(&self) -> &RelayRouter {
        &self.router
    }

    /// Current config document
    #[must_use]
    pub fn config(&self) -> NodeConfig {
        self.config.lock().clone()
    }

    /// Number of devices currently built
    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.lock().len()
    }

    /// Bind the listener, announce boot, and tick forever.
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
        info!(node = %self.router.id(), endpoint = %self.listen, parent = %self.parent, "Starting relay");

        tokio::spawn(Arc::clone(&self).serve(listener));

        self.boot().await;
        let stored = self.store.count_async().await.unwrap_or_else(|err| {
            warn!(error = %err, "Could not count stored events");
            0
        });
        let mut schedule = TickSchedule::new(&self.settings, stored);

        loop {
            let started = self.env.now();
            self.tick(&mut schedule).await;
            let elapsed = self.env.now() - started;
            self.env.sleep(schedule.remaining(elapsed)).await;
        }
    }

    /// Accept children until the listener fails.
    pub async fn serve(self: Arc<Self>, listener: T::Listener) {
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

    /// Announce this node: `"{id}-boot"` then the full config.
    pub async fn boot(&self) {
        let config = self.config();
        match boot_packets(&config) {
            Ok(packets) => {
                for packet in packets {
                    self.send(packet, self.settings.forward_timeout).await;
                }
            },
            Err(err) => error!(error = %err, "Failed to build boot packets"),
        }
    }

    /// One pass of the tick loop.
    pub async fn tick(&self, schedule: &mut TickSchedule) {
        let plan = schedule.begin_tick();
        if plan.heartbeat
            && let Some(packet) = local_packet(Payload::heartbeat())
        {
            self.send(packet, self.settings.heartbeat_timeout).await;
        }

        for (index, result) in self.poll_devices() {
            let result = match result {
                Ok(result) => result,
                Err(err) => {
                    warn!(device = index, error = %err, "Device tick failed");
                    continue;
                },
            };

            if let Some(jpeg) = result.image {
                self.send_image(index, jpeg).await;
            }

            if let Some(mut event) = result.event {
                let delivered = match event_packet(self.router.id(), &mut event) {
                    Ok(packet) => self.send(packet, self.settings.forward_timeout).await,
                    Err(err) => {
                        error!(error = %err, "Failed to encode event");
                        false
                    },
                };

                if !delivered
                    && schedule.take_backup_slot()
                    && let Err(err) = self.store.save_async(event).await
                {
                    error!(error = %err, "Failed to back up event");
                }
            }
        }
    }

    fn poll_devices(&self) -> Vec<(usize, Result<TickResult, DeviceError>)> {
        let now = self.env.wall_clock();
        let mut devices = self.devices.lock();
        devices
            .iter_mut()
            .enumerate()
            .filter(|(_, device)| device.ready())
            .map(|(index, device)| (index, device.tick(now)))
            .collect()
    }

    async fn send_image(&self, index: usize, jpeg: Bytes) {
        match image_packet(index, jpeg) {
            Ok(packet) => {
                self.send(packet, self.settings.forward_timeout).await;
            },
            Err(err) => error!(device = index, error = %err, "Failed to encode image"),
        }
    }

    /// Send a packet upward and act on the response.
    ///
    /// Returns whether `packet` itself reached the parent.
    pub async fn send(&self, packet: Packet, timeout: Duration) -> bool {
        let (delivered, mut command) = self.forward(&packet, timeout).await;

        while let Some(next) = command.take() {
            if let Some(reply) = self.execute(next).await {
                command = self.forward(&reply, self.settings.forward_timeout).await.1;
            }
        }
        delivered
    }

    /// One upward exchange. Returns whether it succeeded and the command the
    /// parent answered with, if any.
    async fn forward(&self, packet: &Packet, timeout: Duration) -> (bool, Option<LocalCommand>) {
        let outgoing = match self.router.upward(packet) {
            Ok(outgoing) => outgoing,
            Err(err) => {
                error!(address = %packet.address(), error = %err, "Cannot forward packet");
                return (false, None);
            },
        };

        let exchange = async {
            let mut stream = self.transport.connect(&self.parent).await?;
            write_packet(&mut stream, &outgoing).await?;
            read_packet(&mut stream).await
        };

        let response = tokio::select! {
            result = exchange => result,
            () = self.env.sleep(timeout) => {
                error!(parent = %self.parent, ?timeout, "Packet forwarding timed out");
                return (false, None);
            },
        };

        let response = match response {
            Ok(response) => response,
            Err(err) => {
                error!(parent = %self.parent, error = %err, "Packet forwarding failed");
                return (false, None);
            },
        };

        match self.router.interpret_response(response) {
            Ok(ResponseOutcome::Command(command)) => (true, Some(command)),
            Ok(ResponseOutcome::Ignored(payload)) => {
                debug!(kind = ?payload.kind(), "Ignoring response");
                (true, None)
            },
            Ok(ResponseOutcome::Nothing | ResponseOutcome::Queued { .. }) => (true, None),
            Err(err) => {
                warn!(error = %err, "Dropping response");
                (true, None)
            },
        }
    }

    /// Carry out a command from the root; returns the reply to send upward.
    pub async fn execute(&self, command: LocalCommand) -> Option<Packet> {
        match command {
            LocalCommand::SendConfig => local_packet(Payload::Blob(Message::Config(self.config()))),
            LocalCommand::Reboot => {
                if let Err(err) = self.host.reboot().await {
                    error!(error = %err, "Reboot failed");
                }
                None
            },
            LocalCommand::ReloadDevices => {
                let config = self.config();
                let devices = build_devices(self.factory.as_ref(), &config.devices);
                info!(devices = devices.len(), "Devices reloaded");
                *self.devices.lock() = devices;
                None
            },
            LocalCommand::ReportWifi => {
                let (device, ssid) = {
                    let config = self.config.lock();
                    let net = &config.networking;
                    (net.this.wifi_device.clone(), net.parent.as_ref().map(|p| p.ssid.clone()).unwrap_or_default())
                };
                let quality = self
                    .host
                    .wifi_quality(device.as_deref(), &ssid)
                    .await
                    .unwrap_or_else(|| Message::UNKNOWN_WIFI_QUALITY.to_string());
                local_packet(Payload::Blob(Message::WifiQuality { quality }))
            },
            LocalCommand::ReplaceConfig(config) => {
                if let Err(err) = self.host.persist_config(&config).await {
                    error!(error = %err, "Failed to persist config");
                }
                info!(node = %self.router.id(), "Config replaced");
                *self.config.lock() = *config;
                None
            },
            LocalCommand::RunShell(command) => {
                info!("> {command}");
                let argv: Vec<String> = command.split(' ').filter(|s| !s.is_empty()).map(String::from).collect();
                let output = self.host.run_shell(&argv).await.unwrap_or_else(|err| {
                    error!(error = %err, "Shell cmd failed");
                    Message::SHELL_ERROR.to_string()
                });
                local_packet(Payload::Blob(Message::ShellOutput { output }))
            },
            LocalCommand::MoveCamera { camera, direction } => {
                let mut devices = self.devices.lock();
                match devices.get_mut(usize::from(camera)) {
                    Some(device) => {
                        if let Err(err) = device.move_to(direction) {
                            warn!(camera, error = %err, "Camera move failed");
                        }
                    },
                    None => warn!(camera, "No such camera"),
                }
                None
            },
        }
    }

    /// Read the child's packet, giving up after the forward timeout.
    async fn receive(&self, stream: &mut T::Stream) -> Result<Option<Packet>, ProtocolError> {
        let timeout = self.settings.forward_timeout;
        tokio::select! {
            result = read_packet(stream) => result,
            () = self.env.sleep(timeout) => Err(ProtocolError::TimedOut(timeout)),
        }
    }

    /// Handle one child connection: forward, then answer from the queue.
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

        if packet.address().is_empty() {
            warn!(peer, "Dropping packet without address");
            return;
        }

        info!("Routing {} -> @", packet.address());
        self.send(packet.clone(), self.settings.forward_timeout).await;

        match self.router.response_for(&packet) {
            Ok(Some(response)) => {
                if let Err(err) = write_packet(&mut stream, &response).await {
                    warn!(peer, error = %err, "Failed to deliver queued packet");
                }
            },
            Ok(None) => {},
            Err(err) => warn!(peer, error = %err, "Cannot answer child"),
        }
    }
}

fn local_packet(payload: Payload) -> Option<Packet> {
    payload
        .into_packet(Address::empty())
        .inspect_err(|err| error!(error = %err, "Failed to encode packet"))
        .ok()
}
