//! "What changed since the last poll" flags for the presentation layer.

use std::collections::BTreeMap;

use odonet_proto::NodeId;
use serde_json::{Map, Value};

/// Global key: the node list or a node's layout changed
pub const PAGE: &str = "page";

/// Global key: an event was stored
pub const NEW_EVENT: &str = "new_event";

/// Per-node key: time of the last packet
pub const LAST_UPDATED: &str = "last_updated";

/// Accumulated updates, drained by the presentation layer.
///
/// Later values for the same key overwrite earlier ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Updates {
    /// Keys not tied to a node
    pub global: BTreeMap<String, Value>,
    /// Keys per node
    pub nodes: BTreeMap<NodeId, BTreeMap<String, Value>>,
}

impl Updates {
    /// Raise a global flag.
    pub fn mark(&mut self, key: &str, value: impl Into<Value>) {
        self.global.insert(key.to_string(), value.into());
    }

    /// Set a per-node key.
    pub fn mark_node(&mut self, node: NodeId, key: &str, value: impl Into<Value>) {
        self.nodes.entry(node).or_default().insert(key.to_string(), value.into());
    }

    /// True if nothing changed
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.nodes.is_empty()
    }

    /// Take everything accumulated so far, leaving this empty.
    pub fn drain(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Flat JSON object: global keys at the top, node keys under
    /// `node_{id}`.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let mut object: Map<String, Value> =
            self.global.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (node, keys) in &self.nodes {
            let keys: Map<String, Value> = keys.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            object.insert(format!("node_{node}"), Value::Object(keys));
        }
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn drain_clears() {
        let mut updates = Updates::default();
        updates.mark(PAGE, true);
        updates.mark_node(NodeId::new('C').unwrap(), "current_image_0", "C_current_image_0_1.jpg");

        let drained = updates.drain();
        assert!(updates.is_empty());
        assert_eq!(
            drained.to_json(),
            json!({ "page": true, "node_C": { "current_image_0": "C_current_image_0_1.jpg" } })
        );
    }
}
