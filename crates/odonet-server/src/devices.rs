//! Built-in device drivers.
//!
//! Camera hardware and motion detection live outside this repository. The
//! `file` driver publishes whatever JPEG sits at a path, which is enough to
//! run a mesh end to end on machines without a camera.

use std::{path::PathBuf, time::Duration};

use chrono::{DateTime, Utc};
use odonet_core::device::{Device, DeviceError, DeviceFactory, TickResult};
use odonet_proto::payloads::DeviceConfig;
use serde::Deserialize;

/// Drivers shipped with the server.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinDevices;

impl DeviceFactory for BuiltinDevices {
    fn build(&self, config: &DeviceConfig) -> Result<Box<dyn Device>, DeviceError> {
        match config.kind.as_str() {
            FileCamera::KIND => Ok(Box::new(FileCamera::from_config(config)?)),
            other => Err(DeviceError::UnknownType(other.to_string())),
        }
    }
}

#[derive(Deserialize)]
struct FileCameraSettings {
    path: PathBuf,
    #[serde(default = "default_rate")]
    rate: f64,
}

fn default_rate() -> f64 {
    1.0
}

/// Streams a JPEG file every `rate` seconds.
#[derive(Debug)]
pub struct FileCamera {
    path: PathBuf,
    rate: Duration,
    last_sent: Option<DateTime<Utc>>,
}

impl FileCamera {
    /// Value of `type` selecting this driver
    pub const KIND: &'static str = "file";

    /// Camera reading `path` every `rate`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, rate: Duration) -> Self {
        Self { path: path.into(), rate, last_sent: None }
    }

    /// Build from a `devices` entry: `{"type": "file", "path": ..., "rate": seconds}`
    pub fn from_config(config: &DeviceConfig) -> Result<Self, DeviceError> {
        let init_error = |reason: String| DeviceError::Init { kind: Self::KIND.to_string(), reason };

        let settings: FileCameraSettings =
            serde_json::from_value(serde_json::Value::Object(config.settings.clone()))
                .map_err(|e| init_error(e.to_string()))?;
        let rate = Duration::try_from_secs_f64(settings.rate).map_err(|e| init_error(e.to_string()))?;

        Ok(Self::new(settings.path, rate))
    }

    fn due(&self, now: DateTime<Utc>) -> bool {
        self.last_sent.is_none_or(|last| (now - last).to_std().is_ok_and(|elapsed| elapsed >= self.rate))
    }
}

impl Device for FileCamera {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn ready(&self) -> bool {
        self.path.is_file()
    }

    fn tick(&mut self, now: DateTime<Utc>) -> Result<TickResult, DeviceError> {
        if !self.due(now) {
            return Ok(TickResult::idle());
        }

        let jpeg = std::fs::read(&self.path)
            .map_err(|e| DeviceError::Capture(format!("{}: {e}", self.path.display())))?;
        self.last_sent = Some(now);
        Ok(TickResult { image: Some(jpeg.into()), event: None })
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use odonet_core::device::build_devices;
    use serde_json::json;

    use super::*;

    fn entry(value: serde_json::Value) -> DeviceConfig {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn streams_file_at_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cam.jpg");
        std::fs::write(&path, b"\xff\xd8frame").unwrap();

        let mut camera = FileCamera::new(&path, Duration::from_secs(2));
        assert!(camera.ready());

        let t0 = Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap();
        let image = camera.tick(t0).unwrap().image.unwrap();
        assert_eq!(&image[..], b"\xff\xd8frame");

        assert_eq!(camera.tick(t0 + chrono::Duration::seconds(1)).unwrap(), TickResult::idle());
        assert!(camera.tick(t0 + chrono::Duration::seconds(2)).unwrap().image.is_some());
    }

    #[test]
    fn missing_file_is_not_ready_and_fails_capture() {
        let mut camera = FileCamera::new("/nonexistent/cam.jpg", Duration::ZERO);
        assert!(!camera.ready());
        assert!(matches!(camera.tick(Utc::now()), Err(DeviceError::Capture(_))));
    }

    #[test]
    fn factory_skips_unknown_and_invalid() {
        let devices = build_devices(&BuiltinDevices, &[
            entry(json!({ "type": "file", "path": "/tmp/a.jpg", "rate": 5 })),
            entry(json!({ "type": "rtsp", "ip": "10.0.0.9" })),
            entry(json!({ "type": "file" })),
            entry(json!({ "type": "file", "path": "/tmp/b.jpg", "rate": -1 })),
        ]);
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].kind(), "file");
    }
}
