//! Device driver contract.
//!
//! The relay does not care what produced an image or an event, only that
//! `tick()` returns quickly and can be called every tick. Drivers are built
//! from the `devices` section of the node config through a
//! [`DeviceFactory`]; a device that fails to build is logged and left out.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use odonet_proto::{CameraDirection, Event, payloads::DeviceConfig};
use thiserror::Error;
use tracing::error;

/// Errors raised by device drivers.
///
/// A failing device is skipped for the tick; other devices are unaffected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// No driver registered for this `type`
    #[error("unknown device type {0:?}")]
    UnknownType(String),

    /// Driver rejected its settings or could not open its hardware
    #[error("failed to initialize {kind} device: {reason}")]
    Init {
        /// Device type
        kind: String,
        /// What went wrong
        reason: String,
    },

    /// Capture failed this tick
    #[error("capture failed: {0}")]
    Capture(String),

    /// Operation not supported by this device
    #[error("{kind} device cannot {operation}")]
    Unsupported {
        /// Device type
        kind: String,
        /// Refused operation
        operation: &'static str,
    },
}

/// What a device produced this tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickResult {
    /// Current frame to publish, if a new one is due
    pub image: Option<Bytes>,
    /// Completed event, if one closed this tick
    pub event: Option<Event>,
}

impl TickResult {
    /// Nothing produced
    #[must_use]
    pub fn idle() -> Self {
        Self::default()
    }
}

/// A sensor attached to a relay.
pub trait Device: Send {
    /// Driver name, as written in the config `type` field
    fn kind(&self) -> &str;

    /// True once the device can produce data
    fn ready(&self) -> bool;

    /// Poll the device. Must not block for long.
    fn tick(&mut self, now: DateTime<Utc>) -> Result<TickResult, DeviceError>;

    /// Move a pan/tilt device one step.
    fn move_to(&mut self, direction: CameraDirection) -> Result<(), DeviceError> {
        let _ = direction;
        Err(DeviceError::Unsupported { kind: self.kind().to_string(), operation: "move" })
    }
}

/// Builds drivers from config entries.
pub trait DeviceFactory: Send + Sync {
    /// Build the driver for one `devices` entry.
    fn build(&self, config: &DeviceConfig) -> Result<Box<dyn Device>, DeviceError>;
}

/// Build every configured device, skipping the ones that fail.
///
/// Indices in the returned list are the device indices used in image
/// payloads and camera commands.
pub fn build_devices(factory: &dyn DeviceFactory, configs: &[DeviceConfig]) -> Vec<Box<dyn Device>> {
    configs
        .iter()
        .filter_map(|config| match factory.build(config) {
            Ok(device) => Some(device),
            Err(err) => {
                error!(kind = %config.kind, error = %err, "Failed to init device");
                None
            },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    impl Device for Counter {
        fn kind(&self) -> &str {
            "counter"
        }

        fn ready(&self) -> bool {
            true
        }

        fn tick(&mut self, _now: DateTime<Utc>) -> Result<TickResult, DeviceError> {
            self.0 += 1;
            Ok(TickResult { image: Some(Bytes::from(self.0.to_string())), event: None })
        }
    }

    struct OnlyCounters;

    impl DeviceFactory for OnlyCounters {
        fn build(&self, config: &DeviceConfig) -> Result<Box<dyn Device>, DeviceError> {
            match config.kind.as_str() {
                "counter" => Ok(Box::new(Counter(0))),
                other => Err(DeviceError::UnknownType(other.to_string())),
            }
        }
    }

    fn entry(kind: &str) -> DeviceConfig {
        DeviceConfig { kind: kind.to_string(), settings: serde_json::Map::new() }
    }

    #[test]
    fn unknown_devices_are_skipped() {
        let devices = build_devices(&OnlyCounters, &[entry("counter"), entry("lidar"), entry("counter")]);
        assert_eq!(devices.len(), 2);
    }

    #[test]
    fn move_is_unsupported_by_default() {
        let mut device = Counter(0);
        assert!(matches!(
            device.move_to(CameraDirection::Left),
            Err(DeviceError::Unsupported { operation: "move", .. })
        ));
        assert!(device.tick(Utc::now()).unwrap().image.is_some());
    }
}
