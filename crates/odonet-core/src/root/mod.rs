//! Root engine logic.
//!
//! The root terminates the tree. It never forwards upward; instead it keeps
//! a registry of every node it has heard from, remembers the path each
//! node's last packet took, and queues operator commands back down those
//! paths.
//!
//! ## Inbound Handling
//!
//! ```text
//!   packet "BC=..."   last hop = B, origin = C
//!     1. response  <- directory.dequeue(B)
//!     2. routes[C]  = "BC"
//!     3. node data: registry, config, wifi, event, image, deleteme
//! ```
//!
//! ## Architecture
//!
//! [`Root`] is pure state: it never touches sockets or disks. Inbound
//! handling returns an [`Inbound`] holding the response to write back and
//! the [`RootAction`]s (persist an event, ...) the driver must perform.
//! The driver wraps one `Root` in a mutex shared by connection handlers and
//! the presentation bridge.

pub mod commands;
pub mod registry;
pub mod updates;

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use odonet_proto::{Address, Event, Message, NodeConfig, NodeId, Packet, Payload};
use tracing::{debug, info, warn};

pub use self::{
    commands::{BridgeCommand, CommandResponse},
    registry::DeviceRecord,
    updates::Updates,
};
use crate::{
    config::{create_node_config, is_same_config, link_configs},
    directory::RoutingDirectory,
    error::{CommandValidationError, RoutingError},
};

/// Side effects the driver performs after inbound handling
#[derive(Debug, Clone, PartialEq)]
pub enum RootAction {
    /// Store an event (already stamped with its node)
    PersistEvent(Box<Event>),
}

/// Result of handling one inbound packet
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    /// Packet to write back to the child before closing, if any was queued
    pub response: Option<Packet>,
    /// Follow-up work for the driver
    pub actions: Vec<RootAction>,
}

/// Root state machine.
#[derive(Debug)]
pub struct Root {
    config: NodeConfig,
    secret: String,
    directory: Arc<RoutingDirectory>,
    registry: BTreeMap<NodeId, DeviceRecord>,
    routes: HashMap<NodeId, Address>,
    files: HashMap<String, Bytes>,
    updates: Updates,
}

impl Root {
    /// Root configured by `config`, queueing into `directory`.
    #[must_use]
    pub fn new(config: NodeConfig, directory: Arc<RoutingDirectory>) -> Self {
        let secret = config.security.as_ref().map(|s| s.secret.clone()).unwrap_or_default();
        if secret.is_empty() {
            warn!("No security.secret configured, provisioned passphrases will be weak");
        }

        let mut updates = Updates::default();
        updates.mark(updates::PAGE, true);

        Self {
            config,
            secret,
            directory,
            registry: BTreeMap::new(),
            routes: HashMap::new(),
            files: HashMap::new(),
            updates,
        }
    }

    /// Root's own config
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Queues for the root's children
    #[must_use]
    pub fn directory(&self) -> &Arc<RoutingDirectory> {
        &self.directory
    }

    /// Record for `node`, if it is registered
    #[must_use]
    pub fn device(&self, node: NodeId) -> Option<&DeviceRecord> {
        self.registry.get(&node)
    }

    /// All registered nodes, ordered by identifier
    pub fn devices(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.registry.values()
    }

    /// Last path seen from `node`
    #[must_use]
    pub fn route(&self, node: NodeId) -> Option<&Address> {
        self.routes.get(&node)
    }

    /// Cached file by name
    #[must_use]
    pub fn file(&self, name: &str) -> Option<Bytes> {
        self.files.get(name).cloned()
    }

    /// Take the updates accumulated since the last call.
    pub fn drain_updates(&mut self) -> Updates {
        self.updates.drain()
    }

    /// Handle a packet a child delivered.
    ///
    /// # Errors
    ///
    /// [`RoutingError::EmptyAddress`] if the packet has no address. Nothing
    /// is recorded and no response is sent.
    pub fn handle_packet(&mut self, packet: &Packet, now: DateTime<Utc>) -> Result<Inbound, RoutingError> {
        let address = packet.address();
        let (Some(last_hop), Some(origin)) = (address.first(), address.last()) else {
            return Err(RoutingError::EmptyAddress);
        };

        info!(address = %address, kind = ?packet.kind(), "Packet received");

        let response = self.directory.dequeue_if_any(last_hop);
        self.routes.insert(origin, address.clone());
        let actions = self.handle_node_data(origin, packet, now);

        Ok(Inbound { response, actions })
    }

    fn handle_node_data(&mut self, node: NodeId, packet: &Packet, now: DateTime<Utc>) -> Vec<RootAction> {
        if !self.registry.contains_key(&node) {
            info!(node = %node, "New device registered");
            self.registry.insert(node, DeviceRecord::new(node));

            for word in ["config", "wifisignal"] {
                if let Err(err) = self.dispatch(node, Payload::text(word)) {
                    warn!(node = %node, error = %err, "Failed to queue first-contact request");
                }
            }
        }

        if let Some(record) = self.registry.get_mut(&node) {
            record.last_updated = Some(now);
            record.address = Some(packet.address().clone());
        }
        self.updates.mark_node(node, updates::LAST_UPDATED, now.to_rfc3339());

        let payload = match Payload::from_packet(packet) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(node = %node, error = %err, "Undecodable payload");
                return Vec::new();
            },
        };

        let mut actions = Vec::new();
        match payload {
            Payload::Text(text) if text == "deleteme" => {
                info!(node = %node, "Node asked to be deleted");
                self.delete_node(node);
            },
            Payload::Text(text) => debug!(node = %node, text = %text, "Text"),
            Payload::Blob(Message::Config(config)) => {
                if let Some(record) = self.registry.get_mut(&node) {
                    record.name.clone_from(&config.about.name);
                    record.config = Some(config);
                }
                self.updates.mark(updates::PAGE, true);
            },
            Payload::Blob(Message::WifiQuality { quality }) => {
                if let Some(record) = self.registry.get_mut(&node) {
                    record.wifi_quality = Some(quality);
                }
            },
            Payload::Blob(Message::ShellOutput { output }) => {
                info!(node = %node, "Shell output:\n{output}");
            },
            Payload::Blob(Message::Event(mut event)) => {
                event.node = Some(node);
                info!(node = %node, images = event.len(), score = event.score, "Received event");
                self.updates.mark(updates::NEW_EVENT, true);
                actions.push(RootAction::PersistEvent(Box::new(event)));
            },
            Payload::Image { device_index, jpeg } => self.cache_image(node, device_index, jpeg, now),
            Payload::Json(_) | Payload::Blob(_) => {
                debug!(node = %node, "Ignoring payload without a handler");
            },
        }
        actions
    }

    fn cache_image(&mut self, node: NodeId, index: u16, jpeg: Bytes, now: DateTime<Utc>) {
        let Some(record) = self.registry.get_mut(&node) else {
            return;
        };

        let name = format!("{node}_current_image_{index}_{}.jpg", now.format("%s%.6f"));
        match record.current_images.insert(index, name.clone()) {
            Some(previous) => {
                self.files.remove(&previous);
            },
            None => self.updates.mark(updates::PAGE, true),
        }

        self.files.insert(name.clone(), jpeg);
        self.updates.mark_node(node, &format!("current_image_{index}"), name);
    }

    /// Forget `node`. If it is still alive it re-registers on next contact.
    pub fn delete_node(&mut self, node: NodeId) {
        if let Some(record) = self.registry.remove(&node) {
            for name in record.current_images.values() {
                self.files.remove(name);
            }
        }
        self.routes.remove(&node);
    }

    /// Queue `payload` for `node` along its recorded route.
    ///
    /// The packet is addressed with the full route and queued under the
    /// route's first hop; it rides down one hop per uplink contact.
    pub fn dispatch(&self, node: NodeId, payload: Payload) -> Result<(), RoutingError> {
        let route = self.routes.get(&node).ok_or(RoutingError::NoRoute(node))?;
        let next_hop = route.first().ok_or(RoutingError::NoRoute(node))?;

        let packet = payload.into_packet(route.clone())?;
        info!(node = %node, route = %route, next_hop = %next_hop, "Queued for next hop");
        self.directory.enqueue(next_hop, packet);
        Ok(())
    }

    /// Check a proposed path for re-homing `target`.
    ///
    /// Separators typed by operators (`@`, `-`, `<`, `>`, whitespace) are
    /// stripped first, so `"@ <-> B <-> C"` and `"BC"` are equivalent.
    ///
    /// # Errors
    ///
    /// - [`CommandValidationError::InvalidRoute`] if the path is empty, does
    ///   not end at `target`, or is the current route
    /// - [`CommandValidationError::NodeInRouteMissing`] /
    ///   [`CommandValidationError::NodeInRouteNotReady`] if a node on the
    ///   path is unregistered or has no known config
    /// - [`CommandValidationError::DuplicateNodes`] if the path has a cycle
    pub fn validate_route(&self, target: NodeId, raw: &str) -> Result<Address, CommandValidationError> {
        let cleaned: String =
            raw.chars().filter(|c| !matches!(c, '@' | '-' | '<' | '>') && !c.is_whitespace()).collect();
        let route: Address = cleaned.parse().map_err(|_| CommandValidationError::InvalidRoute)?;

        if route.last() != Some(target) || self.routes.get(&target) == Some(&route) {
            return Err(CommandValidationError::InvalidRoute);
        }

        for node in route.iter() {
            let record = self.registry.get(&node).ok_or(CommandValidationError::NodeInRouteMissing(node))?;
            if !record.is_ready() {
                return Err(CommandValidationError::NodeInRouteNotReady(node));
            }
            if route.iter().filter(|other| *other == node).count() > 1 {
                return Err(CommandValidationError::DuplicateNodes(node));
            }
        }

        Ok(route)
    }

    /// Presentation bridge entry point.
    pub fn handle_command(&mut self, name: &str, data: serde_json::Value) -> CommandResponse {
        info!(command = name, "Received command");
        let result = BridgeCommand::parse(name, data).and_then(|command| self.execute(command));
        if let Err(err) = &result {
            warn!(command = name, error = ?err, "Command rejected");
        }
        result.into()
    }

    /// Apply a parsed command.
    pub fn execute(&mut self, command: BridgeCommand) -> Result<(), CommandValidationError> {
        match command {
            BridgeCommand::Reset => {
                self.registry.clear();
                self.files.clear();
                self.routes.clear();
                self.updates.mark(updates::PAGE, true);
            },
            BridgeCommand::Config { id, conf } => {
                let record = self.registry.get(&id).ok_or(CommandValidationError::UnknownNode(id))?;
                if record.config.as_ref().is_none_or(|old| !is_same_config(old, &conf)) {
                    self.dispatch(id, Payload::Blob(Message::Config(*conf)))?;
                }
            },
            BridgeCommand::Reboot { id } => self.send_and_forget(id, "reboot")?,
            BridgeCommand::Reload { id } => self.send_and_forget(id, "reload")?,
            BridgeCommand::Shell { id, script } => {
                if !script.is_empty() {
                    self.dispatch(id, Payload::Blob(Message::ShellCommand { command: script }))?;
                }
            },
            BridgeCommand::Route { id, route } => {
                let route = self.validate_route(id, &route)?;
                let old = self.ready_config(id)?;
                let parent = match route.parent_of_last() {
                    None => &self.config,
                    Some(parent) => self.ready_config(parent)?,
                };

                let linked = link_configs(old, parent, &[]);
                if !is_same_config(old, &linked) {
                    self.dispatch(id, Payload::Blob(Message::Config(linked)))?;
                }
            },
            BridgeCommand::Configure { id, new_id } => {
                let new_id = new_id
                    .as_deref()
                    .and_then(|s| s.parse::<NodeId>().ok())
                    .filter(|new_id| *new_id != id && !self.routes.contains_key(new_id))
                    .ok_or(CommandValidationError::InvalidId)?;

                let provisioned = create_node_config(self.ready_config(id)?, new_id, &self.secret);
                self.dispatch(id, Payload::Blob(Message::Config(provisioned)))?;
                self.send_and_forget(id, "reboot")?;
            },
            BridgeCommand::MoveCam { id, cam, dir } => {
                self.dispatch(id, Payload::Blob(Message::MoveCamera { camera: cam, direction: dir }))?;
            },
        }
        Ok(())
    }

    /// Queue a control word, then drop the node from the registry.
    fn send_and_forget(&mut self, node: NodeId, word: &str) -> Result<(), CommandValidationError> {
        self.dispatch(node, Payload::text(word))?;
        self.delete_node(node);
        self.updates.mark(updates::PAGE, true);
        Ok(())
    }

    fn ready_config(&self, node: NodeId) -> Result<&NodeConfig, CommandValidationError> {
        let record = self.registry.get(&node).ok_or(CommandValidationError::UnknownNode(node))?;
        record.config.as_ref().ok_or(CommandValidationError::NotReady(node))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use odonet_proto::PacketKind;
    use serde_json::json;

    use super::*;

    fn id(c: char) -> NodeId {
        NodeId::new(c).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
    }

    fn node_config(c: char, parent_port: u16) -> NodeConfig {
        let json = format!(
            r#"{{
                "about": {{ "id": "{c}", "name": "Node {c}" }},
                "networking": {{
                    "this": {{ "ipv4": "10.0.{ord}.10", "port": {port}, "ssid": "ODONET_{c}", "wpa_pass": "p{c}" }},
                    "parent": {{ "ipv4": "10.0.64.10", "port": {parent_port}, "ssid": "ODONET_@", "wpa_pass": "r" }}
                }}
            }}"#,
            ord = c as u32,
            port = 8200 + c as u32,
        );
        NodeConfig::from_json(json.as_bytes()).unwrap()
    }

    fn root() -> Root {
        let config = NodeConfig::from_json(
            br#"{
                "about": { "id": "R", "name": "Root", "type": "root" },
                "networking": { "this": { "ipv4": "10.0.64.10", "port": 8264, "ssid": "ODONET_@", "wpa_pass": "r" } },
                "security": { "secret": "s3cret" }
            }"#,
        )
        .unwrap();
        Root::new(config, Arc::new(RoutingDirectory::new()))
    }

    fn arrive(root: &mut Root, address: &str, payload: Payload) -> Inbound {
        let packet = payload.into_packet(address.parse().unwrap()).unwrap();
        root.handle_packet(&packet, now()).unwrap()
    }

    /// Register `c` at `address` and report its config.
    fn register(root: &mut Root, address: &str, c: char) {
        arrive(root, address, Payload::Blob(Message::Config(node_config(c, 8264))));
    }

    fn drain_queue(root: &Root, next_hop: char) -> Vec<Packet> {
        std::iter::from_fn(|| root.directory().dequeue_if_any(id(next_hop))).collect()
    }

    fn texts(packets: &[Packet]) -> Vec<String> {
        packets
            .iter()
            .map(|p| Payload::from_packet(p).unwrap().as_text().unwrap_or("<blob>").to_string())
            .collect()
    }

    #[test]
    fn empty_address_is_rejected() {
        let mut root = root();
        let packet = Payload::text("hi").into_packet(Address::empty()).unwrap();
        assert_eq!(root.handle_packet(&packet, now()), Err(RoutingError::EmptyAddress));
        assert_eq!(root.devices().count(), 0);
    }

    #[test]
    fn first_contact_registers_and_asks_for_config() {
        let mut root = root();
        let inbound = arrive(&mut root, "BC", Payload::text("C-boot"));

        assert_eq!(inbound.response, None);
        assert_eq!(root.route(id('C')).unwrap().to_string(), "BC");

        let record = root.device(id('C')).unwrap();
        assert_eq!(record.name, "New Device");
        assert_eq!(record.address_display(), "@ <-> B <-> C");

        let queued = drain_queue(&root, 'B');
        assert_eq!(texts(&queued), ["config", "wifisignal"]);
        assert!(queued.iter().all(|p| p.address().to_string() == "BC"));
    }

    #[test]
    fn queued_packet_rides_next_contact_from_last_hop() {
        let mut root = root();
        arrive(&mut root, "BC", Payload::text("C-boot"));

        let inbound = arrive(&mut root, "B", Payload::heartbeat());
        let response = inbound.response.unwrap();
        assert_eq!(response.address().to_string(), "BC");
        assert_eq!(Payload::from_packet(&response).unwrap(), Payload::text("config"));
    }

    #[test]
    fn config_updates_name_and_raises_page() {
        let mut root = root();
        root.drain_updates();
        register(&mut root, "B", 'B');

        let record = root.device(id('B')).unwrap();
        assert_eq!(record.name, "Node B");
        assert!(record.is_ready());

        let updates = root.drain_updates();
        assert_eq!(updates.global.get("page"), Some(&json!(true)));
        assert!(updates.nodes[&id('B')].contains_key("last_updated"));
        assert!(root.drain_updates().is_empty());
    }

    #[test]
    fn wifi_quality_is_recorded() {
        let mut root = root();
        arrive(&mut root, "B", Payload::Blob(Message::WifiQuality { quality: "0.70/0.55".to_string() }));
        assert_eq!(root.device(id('B')).unwrap().wifi_quality.as_deref(), Some("0.70/0.55"));
    }

    #[test]
    fn event_is_stamped_and_persisted() {
        let mut root = root();
        root.drain_updates();

        let event = Event::new(now(), None);
        let inbound = arrive(&mut root, "BC", Payload::Blob(Message::Event(event)));

        let [RootAction::PersistEvent(event)] = inbound.actions.as_slice() else {
            panic!("expected one persist action, got {:?}", inbound.actions);
        };
        assert_eq!(event.node, Some(id('C')));
        assert_eq!(root.drain_updates().global.get("new_event"), Some(&json!(true)));
    }

    #[test]
    fn image_replaces_previous_artifact() {
        let mut root = root();
        let first = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 1).unwrap();

        let image = |jpeg: &'static [u8]| {
            Payload::Image { device_index: 0, jpeg: Bytes::from_static(jpeg) }
                .into_packet("B".parse().unwrap())
                .unwrap()
        };

        root.handle_packet(&image(b"one"), first).unwrap();
        root.drain_updates();
        root.handle_packet(&image(b"two"), second).unwrap();

        let record = root.device(id('B')).unwrap();
        let name = record.current_images[&0].clone();
        assert_eq!(name, "B_current_image_0_1717236001.000000.jpg");
        assert_eq!(root.file(&name), Some(Bytes::from_static(b"two")));
        assert_eq!(root.file("B_current_image_0_1717236000.000000.jpg"), None);

        let updates = root.drain_updates();
        assert!(!updates.global.contains_key("page"));
        assert_eq!(updates.nodes[&id('B')]["current_image_0"], json!(name));
    }

    #[test]
    fn deleteme_removes_node() {
        let mut root = root();
        arrive(&mut root, "BC", Payload::text("C-boot"));
        arrive(&mut root, "BC", Payload::text("deleteme"));

        assert!(root.device(id('C')).is_none());
        assert!(root.route(id('C')).is_none());
    }

    #[test]
    fn command_for_unknown_node_is_rejected() {
        let mut root = root();
        let response = root.handle_command("reboot", json!({ "id": "Z" }));
        assert_eq!(response.to_json(), json!({ "alert": "Unknown node" }));
    }

    #[test]
    fn reboot_queues_and_forgets() {
        let mut root = root();
        arrive(&mut root, "BC", Payload::text("C-boot"));
        drain_queue(&root, 'B');

        assert_eq!(root.handle_command("reboot", json!({ "id": "C" })), CommandResponse::Ok);
        assert_eq!(texts(&drain_queue(&root, 'B')), ["reboot"]);
        assert!(root.device(id('C')).is_none());
    }

    #[test]
    fn route_validation() {
        let mut root = root();
        register(&mut root, "B", 'B');
        register(&mut root, "BC", 'C');
        arrive(&mut root, "D", Payload::text("D-boot"));

        let c = id('C');
        assert_eq!(root.validate_route(c, ""), Err(CommandValidationError::InvalidRoute));
        assert_eq!(root.validate_route(c, "@ <-> B"), Err(CommandValidationError::InvalidRoute));
        assert_eq!(root.validate_route(c, "@ <-> B <-> C"), Err(CommandValidationError::InvalidRoute));
        assert_eq!(
            root.validate_route(c, "XC"),
            Err(CommandValidationError::NodeInRouteMissing(id('X')))
        );
        assert_eq!(
            root.validate_route(c, "DC"),
            Err(CommandValidationError::NodeInRouteNotReady(id('D')))
        );
        assert_eq!(root.validate_route(c, "CBC"), Err(CommandValidationError::DuplicateNodes(c)));
        assert_eq!(root.validate_route(c, "@-C").unwrap().to_string(), "C");
    }

    #[test]
    fn rehome_to_root_sends_linked_config() {
        let mut root = root();
        register(&mut root, "B", 'B');
        let mut c_config = node_config('C', 8266);
        c_config.networking.parent.as_mut().unwrap().ipv4 = "10.0.66.10".to_string();
        arrive(&mut root, "BC", Payload::Blob(Message::Config(c_config)));
        drain_queue(&root, 'B');

        assert_eq!(root.handle_command("route", json!({ "id": "C", "route": "@ <-> C" })), CommandResponse::Ok);

        let queued = drain_queue(&root, 'B');
        assert_eq!(queued.len(), 1);
        let Payload::Blob(Message::Config(linked)) = Payload::from_packet(&queued[0]).unwrap() else {
            panic!("expected config");
        };
        let parent = linked.networking.parent.unwrap();
        assert_eq!((parent.ipv4.as_str(), parent.port), ("10.0.64.10", 8264));
        assert_eq!(parent.ssid, "ODONET_@");
    }

    #[test]
    fn configure_validates_new_id() {
        let mut root = root();
        register(&mut root, "B", 'B');
        register(&mut root, "BC", 'C');

        for new_id in [json!(null), json!("C"), json!("B"), json!("EF"), json!("="), json!("-")] {
            let response = root.handle_command("configure", json!({ "id": "C", "new_id": new_id }));
            assert_eq!(response.to_json(), json!({ "alert": "Invalid Id" }), "new_id {new_id}");
        }
    }

    #[test]
    fn configure_sends_provisioned_config_then_reboot() {
        let mut root = root();
        register(&mut root, "B", 'B');
        register(&mut root, "BC", 'C');
        drain_queue(&root, 'B');

        let response = root.handle_command("configure", json!({ "id": "C", "new_id": "E" }));
        assert_eq!(response, CommandResponse::Ok);

        let queued = drain_queue(&root, 'B');
        assert_eq!(queued.len(), 2);
        let Payload::Blob(Message::Config(provisioned)) = Payload::from_packet(&queued[0]).unwrap() else {
            panic!("expected config");
        };
        assert_eq!(provisioned.id(), id('E'));
        assert_eq!(provisioned.networking.this.port, 8269);
        assert_eq!(Payload::from_packet(&queued[1]).unwrap(), Payload::text("reboot"));
        assert!(root.device(id('C')).is_none());
    }

    #[test]
    fn unchanged_config_is_not_sent() {
        let mut root = root();
        register(&mut root, "B", 'B');
        drain_queue(&root, 'B');

        let conf = serde_json::to_value(node_config('B', 8264)).unwrap();
        assert_eq!(root.handle_command("config", json!({ "id": "B", "conf": conf })), CommandResponse::Ok);
        assert!(drain_queue(&root, 'B').is_empty());
    }

    #[test]
    fn empty_shell_script_is_not_sent() {
        let mut root = root();
        arrive(&mut root, "B", Payload::text("B-boot"));
        drain_queue(&root, 'B');

        root.handle_command("shell", json!({ "id": "B", "script": "" }));
        assert!(drain_queue(&root, 'B').is_empty());

        root.handle_command("shell", json!({ "id": "B", "script": "uptime" }));
        let queued = drain_queue(&root, 'B');
        assert_eq!(
            Payload::from_packet(&queued[0]).unwrap(),
            Payload::Blob(Message::ShellCommand { command: "uptime".to_string() })
        );
    }

    #[test]
    fn move_cam_and_reset() {
        let mut root = root();
        arrive(&mut root, "B", Payload::text("B-boot"));
        drain_queue(&root, 'B');

        root.handle_command("move-cam", json!({ "id": "B", "cam": 1, "dir": "up" }));
        let queued = drain_queue(&root, 'B');
        assert_eq!(queued[0].kind(), PacketKind::Blob);

        assert_eq!(root.handle_command("reset", json!({})), CommandResponse::Ok);
        assert_eq!(root.devices().count(), 0);
        assert!(root.route(id('B')).is_none());
    }
}
