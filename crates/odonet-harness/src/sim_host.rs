//! Host stand-in that records what the root asked a relay to do.

use std::{io, sync::Arc};

use async_trait::async_trait;
use odonet_proto::NodeConfig;
use odonet_server::HostControl;
use parking_lot::Mutex;
use tracing::debug;

/// Everything a [`RecordingHost`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct HostLog {
    /// Reboot requests
    pub reboots: usize,
    /// Command lines run, already split into argv
    pub shell: Vec<Vec<String>>,
    /// Config documents persisted, oldest first
    pub configs: Vec<NodeConfig>,
    /// Wifi scans requested, as `(device, ssid)`
    pub scans: Vec<(Option<String>, String)>,
}

/// Records host operations and answers with canned values.
///
/// Clones share the log, so a test keeps one clone and hands the other to
/// the relay.
#[derive(Debug, Clone)]
pub struct RecordingHost {
    log: Arc<Mutex<HostLog>>,
    wifi_quality: Option<String>,
    shell_output: String,
}

impl RecordingHost {
    /// Canned link quality reported by [`HostControl::wifi_quality`]
    pub const WIFI_QUALITY: &'static str = "0.9/0.8";

    /// Host reporting [`Self::WIFI_QUALITY`] and echoing shell commands
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(HostLog::default())),
            wifi_quality: Some(Self::WIFI_QUALITY.to_string()),
            shell_output: String::new(),
        }
    }

    /// Report no wifi measurement
    #[must_use]
    pub fn without_wifi(mut self) -> Self {
        self.wifi_quality = None;
        self
    }

    /// Answer every shell command with `output` instead of echoing it
    #[must_use]
    pub fn with_shell_output(mut self, output: impl Into<String>) -> Self {
        self.shell_output = output.into();
        self
    }

    /// Snapshot of the log
    #[must_use]
    pub fn log(&self) -> HostLog {
        self.log.lock().clone()
    }
}

impl Default for RecordingHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HostControl for RecordingHost {
    async fn reboot(&self) -> io::Result<()> {
        debug!("Recorded reboot");
        self.log.lock().reboots += 1;
        Ok(())
    }

    async fn run_shell(&self, argv: &[String]) -> io::Result<String> {
        if argv.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command"));
        }
        self.log.lock().shell.push(argv.to_vec());

        if self.shell_output.is_empty() { Ok(argv.join(" ")) } else { Ok(self.shell_output.clone()) }
    }

    async fn wifi_quality(&self, device: Option<&str>, ssid: &str) -> Option<String> {
        self.log.lock().scans.push((device.map(String::from), ssid.to_string()));
        self.wifi_quality.clone()
    }

    async fn persist_config(&self, config: &NodeConfig) -> io::Result<()> {
        self.log.lock().configs.push(config.clone());
        Ok(())
    }
}
