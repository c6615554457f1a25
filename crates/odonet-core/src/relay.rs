//! Relay engine logic (non-root node).
//!
//! A relay is both a child (it forwards everything upward to its parent) and
//! a parent (its own children connect to it). This module holds the parts
//! that do not touch the network:
//!
//! - [`RelayRouter`]: shared by the tick loop and every connection handler.
//!   Prepends this node to outgoing packets, interprets the parent's
//!   response, and picks the response for a connecting child.
//! - [`TickSchedule`]: owned by the tick loop. Heartbeat cadence, tick
//!   pacing, and the local event backup budget.
//! - [`LocalCommand`]: commands addressed to this node, decoded from the
//!   response payload.
//!
//! # Response Interpretation
//!
//! ```text
//!   response address  | meaning
//!   ------------------+---------------------------------------------------
//!   (no response)     | nothing queued for us
//!   "B"   (B = us)    | command for this node
//!   "BCD" (B = us)    | strip B, queue "CD=..." under C for later pickup
//!   "XCD" (X != us)   | RoutingError::NotForThisHop, dropped
//! ```

use std::{sync::Arc, time::Duration};

use odonet_proto::{
    Address, CameraDirection, Event, Message, NodeConfig, NodeId, Packet, Payload,
};
use tracing::{debug, info, warn};

use crate::{directory::RoutingDirectory, error::RoutingError};

/// Pacing and limits read from the node config.
#[derive(Debug, Clone, PartialEq)]
pub struct RelaySettings {
    /// This node
    pub id: NodeId,
    /// Target duration of one tick
    pub tick_length: Duration,
    /// Ticks between heartbeats
    pub ping_freq: u64,
    /// How long to wait for the parent when forwarding
    pub forward_timeout: Duration,
    /// How long to wait for the parent when sending a heartbeat
    pub heartbeat_timeout: Duration,
    /// Events that may be stored locally while the parent is unreachable
    pub events_backup_size: usize,
}

impl RelaySettings {
    /// Heartbeats give up sooner than ordinary traffic.
    pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(2);

    /// Read settings from a node config.
    ///
    /// Nonsensical values (negative or non-finite durations, zero
    /// `ping_freq`) fall back to the defaults.
    #[must_use]
    pub fn from_config(config: &NodeConfig) -> Self {
        let this = &config.networking.this;
        Self {
            id: config.id(),
            tick_length: seconds(config.about.tick_length, Duration::from_millis(800)),
            ping_freq: this.ping_freq.max(1),
            forward_timeout: link_timeout(config),
            heartbeat_timeout: Self::HEARTBEAT_TIMEOUT,
            events_backup_size: config.about.events_backup_size,
        }
    }
}

/// Deadline for one network exchange on a link, from
/// `networking.this.timeout`. Bounds both waiting on a parent and waiting
/// for a child's packet to arrive.
#[must_use]
pub fn link_timeout(config: &NodeConfig) -> Duration {
    seconds(config.networking.this.timeout, Duration::from_secs(10))
}

fn seconds(value: f64, fallback: Duration) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(fallback)
}

/// A command the root addressed to this node.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalCommand {
    /// Send the current config document upward
    SendConfig,
    /// Reboot the host
    Reboot,
    /// Rebuild devices from the current config
    ReloadDevices,
    /// Measure the parent link and report it upward
    ReportWifi,
    /// Persist and switch to a new config document
    ReplaceConfig(Box<NodeConfig>),
    /// Run a command line and report its output upward
    RunShell(String),
    /// Move a camera one step
    MoveCamera {
        /// Device index
        camera: u16,
        /// Step direction
        direction: CameraDirection,
    },
}

impl LocalCommand {
    /// Interpret a payload addressed to this node.
    ///
    /// Returns `None` for payloads that are not commands.
    #[must_use]
    pub fn from_payload(payload: Payload) -> Option<Self> {
        match payload {
            Payload::Text(text) => match text.as_str() {
                "config" => Some(Self::SendConfig),
                "reboot" => Some(Self::Reboot),
                "reload" => Some(Self::ReloadDevices),
                "wifisignal" => Some(Self::ReportWifi),
                _ => None,
            },
            Payload::Blob(Message::Config(config)) => Some(Self::ReplaceConfig(Box::new(config))),
            Payload::Blob(Message::ShellCommand { command }) => Some(Self::RunShell(command)),
            Payload::Blob(Message::MoveCamera { camera, direction }) => {
                Some(Self::MoveCamera { camera, direction })
            },
            Payload::Blob(_) | Payload::Image { .. } | Payload::Json(_) => None,
        }
    }
}

/// What the parent's response means for this node.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    /// Parent had nothing queued for us
    Nothing,
    /// Command to execute locally
    Command(LocalCommand),
    /// Addressed to us but not a command we understand
    Ignored(Payload),
    /// Queued for a child; it will be delivered when that child connects
    Queued {
        /// Child the packet waits for
        next_hop: NodeId,
    },
}

/// Routing decisions shared by the tick loop and connection handlers.
#[derive(Debug, Clone)]
pub struct RelayRouter {
    id: NodeId,
    directory: Arc<RoutingDirectory>,
}

impl RelayRouter {
    /// Router for node `id` queueing into `directory`
    #[must_use]
    pub fn new(id: NodeId, directory: Arc<RoutingDirectory>) -> Self {
        Self { id, directory }
    }

    /// This node
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Queues for this node's children
    #[must_use]
    pub fn directory(&self) -> &Arc<RoutingDirectory> {
        &self.directory
    }

    /// The packet as it must be sent to the parent: this node prepended.
    pub fn upward(&self, packet: &Packet) -> Result<Packet, RoutingError> {
        Ok(packet.with_hop(self.id)?)
    }

    /// Interpret the single packet the parent answered with.
    ///
    /// Packets for a child are queued under that child as a side effect.
    ///
    /// # Errors
    ///
    /// - [`RoutingError::EmptyAddress`] for an unaddressed response
    /// - [`RoutingError::NotForThisHop`] if the first hop is another node
    /// - [`RoutingError::Protocol`] if a payload for this node does not
    ///   decode
    pub fn interpret_response(&self, response: Option<Packet>) -> Result<ResponseOutcome, RoutingError> {
        let Some(response) = response else {
            return Ok(ResponseOutcome::Nothing);
        };

        let Some((first, rest)) = response.strip_hop() else {
            return Err(RoutingError::EmptyAddress);
        };
        if first != self.id {
            return Err(RoutingError::NotForThisHop { this: self.id, first });
        }

        match rest.address().first() {
            None => {
                let payload = Payload::from_packet(&rest)?;
                info!(node = %self.id, kind = ?payload.kind(), "Received command");
                Ok(LocalCommand::from_payload(payload.clone())
                    .map_or(ResponseOutcome::Ignored(payload), ResponseOutcome::Command))
            },
            Some(next_hop) => {
                info!("Routing {} -> {}", self.id, next_hop);
                self.directory.enqueue(next_hop, rest);
                Ok(ResponseOutcome::Queued { next_hop })
            },
        }
    }

    /// Pick the response for a child that just sent `inbound`.
    ///
    /// `inbound.address()[0]` is the child; whatever is queued under it is
    /// taken from the directory.
    pub fn response_for(&self, inbound: &Packet) -> Result<Option<Packet>, RoutingError> {
        let child = inbound.address().first().ok_or(RoutingError::EmptyAddress)?;
        let response = self.directory.dequeue_if_any(child);
        if let Some(packet) = &response {
            debug!(child = %child, address = %packet.address(), "Delivering queued packet");
        }
        Ok(response)
    }
}

/// What the tick loop should do this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickPlan {
    /// Zero-based tick number
    pub tick: u64,
    /// Send a heartbeat before polling devices
    pub heartbeat: bool,
}

/// Tick-loop bookkeeping.
#[derive(Debug, Clone)]
pub struct TickSchedule {
    ticks: u64,
    ping_freq: u64,
    tick_length: Duration,
    backup_budget: usize,
}

impl TickSchedule {
    /// Schedule for `settings`, with `stored_events` already in the local
    /// backup counting against the budget.
    #[must_use]
    pub fn new(settings: &RelaySettings, stored_events: usize) -> Self {
        Self {
            ticks: 0,
            ping_freq: settings.ping_freq.max(1),
            tick_length: settings.tick_length,
            backup_budget: settings.events_backup_size.saturating_sub(stored_events),
        }
    }

    /// Start the next tick. The first tick always carries a heartbeat.
    pub fn begin_tick(&mut self) -> TickPlan {
        let plan = TickPlan { tick: self.ticks, heartbeat: self.ticks % self.ping_freq == 0 };
        self.ticks += 1;
        plan
    }

    /// Claim room for one locally backed-up event.
    ///
    /// Returns false once the budget is spent.
    pub fn take_backup_slot(&mut self) -> bool {
        if self.backup_budget == 0 {
            warn!("Event backup budget exhausted, dropping event");
            return false;
        }
        self.backup_budget -= 1;
        true
    }

    /// Events that may still be backed up
    #[must_use]
    pub fn backup_budget(&self) -> usize {
        self.backup_budget
    }

    /// How long to sleep after a tick that took `elapsed`
    #[must_use]
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.tick_length.saturating_sub(elapsed)
    }
}

/// Boot announcement: `"{id}-boot"` followed by the full config document.
pub fn boot_packets(config: &NodeConfig) -> Result<[Packet; 2], RoutingError> {
    Ok([
        Payload::text(format!("{}-boot", config.id())).into_packet(Address::empty())?,
        Payload::Blob(Message::Config(config.clone())).into_packet(Address::empty())?,
    ])
}

/// Image packet for device `index`
pub fn image_packet(index: usize, jpeg: bytes::Bytes) -> Result<Packet, RoutingError> {
    let device_index = u16::try_from(index).unwrap_or(u16::MAX);
    Ok(Payload::Image { device_index, jpeg }.into_packet(Address::empty())?)
}

/// Event packet, stamped with the producing node
pub fn event_packet(node: NodeId, event: &mut Event) -> Result<Packet, RoutingError> {
    event.node = Some(node);
    Ok(Payload::Blob(Message::Event(event.clone())).into_packet(Address::empty())?)
}
