//! Config documents and polling helpers for simulated trees.
//!
//! Simulation hosts are named after their node id in lowercase (`"root"` for
//! the root), and every node listens on `0.0.0.0` so Turmoil routes by host
//! name.

use std::time::Duration;

use odonet_proto::{NodeConfig, ProtocolError};
use serde_json::{Value, json};

/// Port the root listens on
pub const ROOT_PORT: u16 = 8264;

/// One node of a simulated tree.
#[derive(Debug, Clone)]
pub struct MeshNode {
    id: char,
    port: u16,
    parent: Option<(String, u16)>,
    devices: Vec<Value>,
    backup_size: usize,
}

impl MeshNode {
    /// The root, id `R`, on [`ROOT_PORT`]
    #[must_use]
    pub fn root() -> Self {
        Self { id: 'R', port: ROOT_PORT, parent: None, devices: Vec::new(), backup_size: 500 }
    }

    /// Relay `id` listening on `port`, child of the host `parent_host`
    #[must_use]
    pub fn relay(id: char, port: u16, parent_host: &str, parent_port: u16) -> Self {
        Self {
            id,
            port,
            parent: Some((parent_host.to_string(), parent_port)),
            devices: Vec::new(),
            backup_size: 500,
        }
    }

    /// Attach one scripted device
    #[must_use]
    pub fn with_scripted_device(mut self) -> Self {
        self.devices.push(json!({ "type": crate::ScriptedDevices::KIND }));
        self
    }

    /// Cap the local event backup
    #[must_use]
    pub fn with_backup_size(mut self, size: usize) -> Self {
        self.backup_size = size;
        self
    }

    /// Simulation host name for this node
    #[must_use]
    pub fn host_name(&self) -> String {
        if self.parent.is_none() { "root".to_string() } else { self.id.to_ascii_lowercase().to_string() }
    }

    /// Build the config document.
    ///
    /// Ticks are 0.8 s, every tick carries a heartbeat, and the parent gets
    /// two seconds to answer.
    ///
    /// # Errors
    ///
    /// If `id` is not a valid node id.
    pub fn config(&self) -> Result<NodeConfig, ProtocolError> {
        let mut networking = json!({
            "this": {
                "ipv4": "0.0.0.0",
                "port": self.port,
                "ping_freq": 1,
                "timeout": 2.0,
                "ssid": format!("ODONET_{}", self.id),
                "wpa_pass": "sim",
                "wifi_device": "wlan0",
            },
        });
        if let Some((host, port)) = &self.parent {
            networking["parent"] = json!({ "ipv4": host, "port": port, "ssid": "ODONET_PARENT", "wpa_pass": "sim" });
        }

        let mut document = json!({
            "about": {
                "id": self.id.to_string(),
                "name": format!("Node {}", self.id),
                "type": if self.parent.is_none() { "root" } else { "node" },
                "tick_length": 0.8,
                "events_backup_size": self.backup_size,
            },
            "networking": networking,
            "devices": self.devices,
        });
        if self.parent.is_none() {
            document["security"] = json!({ "secret": "sim-secret" });
        }

        NodeConfig::from_json(document.to_string().as_bytes())
    }
}

/// Poll `check` every 100 ms of virtual time until it holds or `timeout`
/// passes. Returns whether it held.
pub async fn eventually(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
