//! Structured messages carried in Blob packets.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use super::{Event, NodeConfig};
use crate::errors::ProtocolError;

/// Direction for a pan/tilt camera
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraDirection {
    /// Tilt up
    Up,
    /// Tilt down
    Down,
    /// Pan left
    Left,
    /// Pan right
    Right,
}

impl fmt::Display for CameraDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        };
        f.write_str(name)
    }
}

impl FromStr for CameraDirection {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "left" => Ok(Self::Left),
            "right" => Ok(Self::Right),
            other => Err(ProtocolError::Json(format!("unknown camera direction {other:?}"))),
        }
    }
}

/// Every structured message a node or the root may send.
///
/// Upward traffic: `Config` (reply to `config`), `WifiQuality`,
/// `ShellOutput`, `Event`. Downward traffic: `Config` (replacement),
/// `ShellCommand`, `MoveCamera`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum Message {
    /// Full configuration document
    Config(NodeConfig),
    /// Link quality to the parent access point, as `"quality/scale"`
    WifiQuality {
        /// `"-1/-1"` when the link could not be measured
        quality: String,
    },
    /// Command line to run on the node
    ShellCommand {
        /// Whitespace separated program and arguments
        command: String,
    },
    /// Captured output of a [`Message::ShellCommand`]
    ShellOutput {
        /// Combined output, or `"error."`
        output: String,
    },
    /// Move a camera one step
    MoveCamera {
        /// Device index on the node
        camera: u16,
        /// Step direction
        direction: CameraDirection,
    },
    /// Captured event
    Event(Event),
}

impl Message {
    /// Quality string sent when the link cannot be measured
    pub const UNKNOWN_WIFI_QUALITY: &'static str = "-1/-1";

    /// Output string sent when a shell command failed to run
    pub const SHELL_ERROR: &'static str = "error.";

    /// Short name for logging
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::WifiQuality { .. } => "wifiquality",
            Self::ShellCommand { .. } => "shellcmd",
            Self::ShellOutput { .. } => "shelloutput",
            Self::MoveCamera { .. } => "movecam",
            Self::Event(_) => "event",
        }
    }
}
