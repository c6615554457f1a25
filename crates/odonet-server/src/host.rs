//! Side effects on the machine a relay runs on.
//!
//! Commands from the root may reboot the host, run a command line, scan the
//! parent link, or rewrite the config file. The relay driver reaches all of
//! them through [`HostControl`] so simulations can record them instead.

use std::{io, path::PathBuf};

use async_trait::async_trait;
use odonet_proto::NodeConfig;
use tokio::process::Command;
use tracing::{debug, info};

use crate::wifi;

/// Host operations a relay may be asked to perform.
#[async_trait]
pub trait HostControl: Send + Sync + 'static {
    /// Reboot the machine.
    async fn reboot(&self) -> io::Result<()>;

    /// Run `argv` and return its standard output.
    async fn run_shell(&self, argv: &[String]) -> io::Result<String>;

    /// Measure the link to the access point `ssid` through `device`.
    ///
    /// Returns `"quality/signal"` as ratios, or `None` if nothing was
    /// measured.
    async fn wifi_quality(&self, device: Option<&str>, ssid: &str) -> Option<String>;

    /// Write `config` where it will be read on next start.
    async fn persist_config(&self, config: &NodeConfig) -> io::Result<()>;
}

/// The real machine.
#[derive(Debug, Clone)]
pub struct SystemHost {
    config_path: PathBuf,
}

impl SystemHost {
    /// Host whose config lives at `config_path`
    #[must_use]
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self { config_path: config_path.into() }
    }
}

#[async_trait]
impl HostControl for SystemHost {
    async fn reboot(&self) -> io::Result<()> {
        info!("Rebooting");
        Command::new("reboot").spawn()?;
        Ok(())
    }

    async fn run_shell(&self, argv: &[String]) -> io::Result<String> {
        let (program, args) =
            argv.split_first().ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "empty command"))?;

        let output = Command::new(program).args(args).output().await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn wifi_quality(&self, device: Option<&str>, ssid: &str) -> Option<String> {
        let device = device?;
        let output = match Command::new("iwlist").args([device, "scan"]).output().await {
            Ok(output) => output,
            Err(err) => {
                debug!(device, error = %err, "iwlist unavailable");
                return None;
            },
        };
        wifi::quality_for(&String::from_utf8_lossy(&output.stdout), ssid)
    }

    async fn persist_config(&self, config: &NodeConfig) -> io::Result<()> {
        let json = config.to_json_pretty().map_err(io::Error::other)?;
        tokio::fs::write(&self.config_path, json).await?;
        info!(path = %self.config_path.display(), "Config saved");
        Ok(())
    }
}
