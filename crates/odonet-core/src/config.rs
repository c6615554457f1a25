//! Derivations on configuration documents used by root commands.
//!
//! - [`link_configs`]: re-home a node under a new parent
//! - [`create_node_config`]: re-provision a node with a new identity
//! - [`is_same_config`]: skip sending a document the node already has

use odonet_proto::{
    NodeConfig, NodeId,
    payloads::{BackupLink, ParentLink},
};
use sha2::{Digest, Sha256};

/// Hex characters of the derived access point passphrase
const WPA_PASS_LEN: usize = 20;

/// First port handed out to provisioned nodes; the node id's byte is added.
const BASE_PORT: u16 = 8200;

/// Point `config` at `parent` (and optional backup parents).
///
/// Copies the parent's own listener and access point parameters into
/// `networking.parent`, and rebuilds `networking.backup` in priority order.
/// Everything else is left as it was.
#[must_use]
pub fn link_configs(config: &NodeConfig, parent: &NodeConfig, backups: &[NodeConfig]) -> NodeConfig {
    let mut linked = config.clone();
    let parent_net = &parent.networking.this;

    let link = linked.networking.parent.get_or_insert_with(|| ParentLink {
        ipv4: String::new(),
        port: 0,
        ssid: String::new(),
        wpa_pass: String::new(),
        extra: serde_json::Map::new(),
    });
    link.ipv4.clone_from(&parent_net.ipv4);
    link.port = parent_net.port;
    link.ssid.clone_from(&parent_net.ssid);
    link.wpa_pass.clone_from(&parent_net.wpa_pass);

    linked.networking.backup = backups
        .iter()
        .enumerate()
        .map(|(priority, backup)| {
            let net = &backup.networking.this;
            BackupLink {
                priority: priority as u32,
                ipv4: net.ipv4.clone(),
                port: net.port,
                ssid: net.ssid.clone(),
                wpa_pass: net.wpa_pass.clone(),
            }
        })
        .collect();

    linked
}

/// Derive the config for a node re-provisioned as `node_id`.
///
/// Listener and access point parameters are a pure function of the id, so
/// two provisioned nodes never collide:
///
/// | Field      | Value                                   |
/// |------------|-----------------------------------------|
/// | `ipv4`     | `10.0.{id byte}.10`                     |
/// | `port`     | `8200 + id byte`                        |
/// | `channel`  | `1 + id byte % 14`                      |
/// | `ssid`     | `ODONET_{id}`                           |
/// | `wpa_pass` | first 20 hex chars of SHA-256(secret ‖ id) |
#[must_use]
pub fn create_node_config(config: &NodeConfig, node_id: NodeId, secret: &str) -> NodeConfig {
    let mut provisioned = config.clone();
    let ord = node_id.as_byte();

    provisioned.about.id = node_id;
    provisioned.about.name = format!("Node {node_id}");

    let this = &mut provisioned.networking.this;
    this.ipv4 = format!("10.0.{ord}.10");
    this.port = BASE_PORT + u16::from(ord);
    this.channel = Some(1 + ord % 14);
    this.ssid = format!("ODONET_{node_id}");
    this.wpa_pass = derive_wpa_pass(secret, node_id);

    provisioned
}

/// True if both documents are structurally identical.
#[must_use]
pub fn is_same_config(a: &NodeConfig, b: &NodeConfig) -> bool {
    a == b
}

fn derive_wpa_pass(secret: &str, node_id: NodeId) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update([node_id.as_byte()]);
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(WPA_PASS_LEN);
    digest
}
