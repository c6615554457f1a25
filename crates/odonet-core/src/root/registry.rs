//! Device registry kept by the root.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use odonet_proto::{Address, NodeConfig, NodeId};

/// What the root knows about one node.
///
/// Created on first contact, updated on every packet, removed only by an
/// explicit delete.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    /// Node identifier
    pub id: NodeId,
    /// Display name, taken from the config once it arrives
    pub name: String,
    /// Last config document the node reported
    pub config: Option<NodeConfig>,
    /// Last reported link quality (`"q/s"`)
    pub wifi_quality: Option<String>,
    /// When the last packet from this node arrived
    pub last_updated: Option<DateTime<Utc>>,
    /// Path of the last packet, root's child first
    pub address: Option<Address>,
    /// Cached current image file name per device index
    pub current_images: BTreeMap<u16, String>,
}

impl DeviceRecord {
    /// Name shown until the node reports its config
    pub const DEFAULT_NAME: &'static str = "New Device";

    /// Record for a node seen for the first time
    #[must_use]
    pub fn new(id: NodeId) -> Self {
        Self {
            id,
            name: Self::DEFAULT_NAME.to_string(),
            config: None,
            wifi_quality: None,
            last_updated: None,
            address: None,
            current_images: BTreeMap::new(),
        }
    }

    /// True once the node's config is known
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.config.is_some()
    }

    /// Path for display: `"@ <-> B <-> C"`
    #[must_use]
    pub fn address_display(&self) -> String {
        let hops = self.address.iter().flat_map(Address::iter).map(|id| id.to_string());
        std::iter::once("@".to_string()).chain(hops).collect::<Vec<_>>().join(" <-> ")
    }

    /// Config rendered for display
    #[must_use]
    pub fn config_display(&self) -> Option<String> {
        self.config.as_ref().and_then(|config| serde_json::to_string_pretty(config).ok())
    }
}
