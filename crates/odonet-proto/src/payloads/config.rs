//! Node configuration document.
//!
//! The same JSON document is read from disk at startup, sent upward when
//! the root asks for `config`, and sent downward when the root pushes a
//! replacement. Fields this crate does not know about land in the `extra`
//! maps so a document survives the round trip through the mesh unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{NodeId, errors::Result};

/// Full configuration for one node (or the root).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Identity and pacing
    pub about: About,
    /// Where this node listens and which parent it talks to
    pub networking: Networking,
    /// Attached sensors
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
    /// Provisioning secret (root only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<Security>,
    /// Unrecognized top-level keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `about` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct About {
    /// Node identifier
    pub id: NodeId,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Node role (`"node"`, `"root"`, ...)
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Seconds per relay tick
    #[serde(default = "default_tick_length")]
    pub tick_length: f64,
    /// How many events may be backed up locally while the parent is away
    #[serde(default = "default_events_backup_size")]
    pub events_backup_size: usize,
    /// Unrecognized keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `networking` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Networking {
    /// This node's own listener and access point
    pub this: LocalNetwork,
    /// Upstream hop (absent on the root)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentLink>,
    /// Alternative parents, lowest priority first
    #[serde(default)]
    pub backup: Vec<BackupLink>,
    /// Unrecognized keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `networking.this`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalNetwork {
    /// Listen address
    pub ipv4: String,
    /// Listen port
    pub port: u16,
    /// Ticks between heartbeats
    #[serde(default = "default_ping_freq")]
    pub ping_freq: u64,
    /// Seconds to wait for the parent when forwarding
    #[serde(default = "default_timeout")]
    pub timeout: f64,
    /// Access point name children join
    #[serde(default)]
    pub ssid: String,
    /// Access point passphrase
    #[serde(default)]
    pub wpa_pass: String,
    /// Access point channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<u8>,
    /// Interface used to join the parent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wifi_device: Option<String>,
    /// Interface used for the access point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ap_device: Option<String>,
    /// Presentation layer address (root only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_ipv4: Option<String>,
    /// Presentation layer port (root only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_port: Option<u16>,
    /// Unrecognized keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `networking.parent`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentLink {
    /// Parent listen address
    pub ipv4: String,
    /// Parent listen port
    pub port: u16,
    /// Parent access point name
    #[serde(default)]
    pub ssid: String,
    /// Parent access point passphrase
    #[serde(default)]
    pub wpa_pass: String,
    /// Unrecognized keys
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Entry of `networking.backup`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupLink {
    /// Lower is tried first
    pub priority: u32,
    /// Backup parent listen address
    pub ipv4: String,
    /// Backup parent listen port
    pub port: u16,
    /// Backup parent access point name
    pub ssid: String,
    /// Backup parent access point passphrase
    pub wpa_pass: String,
}

/// Entry of `devices`; everything besides `type` is device-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Driver name
    #[serde(rename = "type")]
    pub kind: String,
    /// Driver settings
    #[serde(flatten)]
    pub settings: Map<String, Value>,
}

/// `security` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Security {
    /// Shared secret used to derive access point passphrases
    pub secret: String,
}

fn default_tick_length() -> f64 {
    0.8
}

fn default_events_backup_size() -> usize {
    500
}

fn default_ping_freq() -> u64 {
    6
}

fn default_timeout() -> f64 {
    10.0
}

impl NodeConfig {
    /// Parse a JSON document.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Render as pretty JSON, the layout used on disk.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Node identifier
    #[must_use]
    pub fn id(&self) -> NodeId {
        self.about.id
    }

    /// `host:port` of the upstream hop, if this node has one
    #[must_use]
    pub fn parent_endpoint(&self) -> Option<String> {
        self.networking.parent.as_ref().map(|p| format!("{}:{}", p.ipv4, p.port))
    }

    /// `host:port` this node listens on
    #[must_use]
    pub fn listen_endpoint(&self) -> String {
        format!("{}:{}", self.networking.this.ipv4, self.networking.this.port)
    }
}
