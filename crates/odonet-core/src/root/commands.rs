//! Operator commands arriving through the presentation bridge.
//!
//! The bridge hands over a command name and a JSON argument object, and
//! expects a JSON object back: `{}` on success, `{"alert": "..."}` when the
//! command was refused.

use odonet_proto::{CameraDirection, NodeConfig, NodeId};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::error::CommandValidationError;

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeCommand {
    /// Forget every node, route, and cached file
    Reset,
    /// Replace a node's config document
    Config {
        /// Target node
        id: NodeId,
        /// New document
        conf: Box<NodeConfig>,
    },
    /// Reboot a node
    Reboot {
        /// Target node
        id: NodeId,
    },
    /// Rebuild a node's devices
    Reload {
        /// Target node
        id: NodeId,
    },
    /// Run a command line on a node
    Shell {
        /// Target node
        id: NodeId,
        /// Command line
        script: String,
    },
    /// Re-home a node along a new path
    Route {
        /// Target node
        id: NodeId,
        /// Path as typed by the operator, e.g. `"@ <-> B <-> C"`
        route: String,
    },
    /// Re-provision a node under a new identifier
    Configure {
        /// Target node
        id: NodeId,
        /// Requested identifier, unvalidated
        new_id: Option<String>,
    },
    /// Move a camera one step
    MoveCam {
        /// Target node
        id: NodeId,
        /// Device index
        cam: u16,
        /// Step direction
        dir: CameraDirection,
    },
}

#[derive(Deserialize)]
struct Target {
    id: NodeId,
}

#[derive(Deserialize)]
struct ConfigArgs {
    id: NodeId,
    conf: NodeConfig,
}

#[derive(Deserialize)]
struct ShellArgs {
    id: NodeId,
    script: String,
}

#[derive(Deserialize)]
struct RouteArgs {
    id: NodeId,
    route: String,
}

#[derive(Deserialize)]
struct ConfigureArgs {
    id: NodeId,
    new_id: Option<String>,
}

#[derive(Deserialize)]
struct MoveCamArgs {
    id: NodeId,
    cam: u16,
    dir: CameraDirection,
}

fn args<T: for<'de> Deserialize<'de>>(data: Value) -> Result<T, CommandValidationError> {
    serde_json::from_value(data).map_err(|e| CommandValidationError::InvalidArguments(e.to_string()))
}

impl BridgeCommand {
    /// Parse a bridge call.
    ///
    /// # Errors
    ///
    /// - [`CommandValidationError::UnknownCommand`] for an unrecognized name
    /// - [`CommandValidationError::InvalidArguments`] if `data` does not
    ///   match the command
    pub fn parse(name: &str, data: Value) -> Result<Self, CommandValidationError> {
        let command = match name {
            "reset" => Self::Reset,
            "config" => {
                let ConfigArgs { id, conf } = args(data)?;
                Self::Config { id, conf: Box::new(conf) }
            },
            "reboot" => Self::Reboot { id: args::<Target>(data)?.id },
            "reload" => Self::Reload { id: args::<Target>(data)?.id },
            "shell" => {
                let ShellArgs { id, script } = args(data)?;
                Self::Shell { id, script }
            },
            "route" => {
                let RouteArgs { id, route } = args(data)?;
                Self::Route { id, route }
            },
            "configure" => {
                let ConfigureArgs { id, new_id } = args(data)?;
                Self::Configure { id, new_id }
            },
            "move-cam" => {
                let MoveCamArgs { id, cam, dir } = args(data)?;
                Self::MoveCam { id, cam, dir }
            },
            other => return Err(CommandValidationError::UnknownCommand(other.to_string())),
        };
        Ok(command)
    }
}

/// Result of a bridge call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    /// Command applied (or queued)
    Ok,
    /// Command refused, with the alert to show the operator
    Rejected {
        /// Operator-facing message
        alert: String,
    },
}

impl CommandResponse {
    /// JSON body returned to the bridge
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Ok => json!({}),
            Self::Rejected { alert } => json!({ "alert": alert }),
        }
    }
}

impl From<Result<(), CommandValidationError>> for CommandResponse {
    fn from(result: Result<(), CommandValidationError>) -> Self {
        match result {
            Ok(()) => Self::Ok,
            Err(err) => Self::Rejected { alert: err.to_string() },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_commands() {
        let c = NodeId::new('C').unwrap();

        assert_eq!(BridgeCommand::parse("reboot", json!({ "id": "C" })).unwrap(), BridgeCommand::Reboot {
            id: c
        });
        assert_eq!(
            BridgeCommand::parse("move-cam", json!({ "id": "C", "cam": 0, "dir": "left" })).unwrap(),
            BridgeCommand::MoveCam { id: c, cam: 0, dir: CameraDirection::Left }
        );
        assert_eq!(
            BridgeCommand::parse("configure", json!({ "id": "C", "new_id": null })).unwrap(),
            BridgeCommand::Configure { id: c, new_id: None }
        );
        assert_eq!(BridgeCommand::parse("reset", Value::Null).unwrap(), BridgeCommand::Reset);
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(matches!(
            BridgeCommand::parse("selfdestruct", json!({})),
            Err(CommandValidationError::UnknownCommand(_))
        ));
        assert!(matches!(
            BridgeCommand::parse("shell", json!({ "id": "C" })),
            Err(CommandValidationError::InvalidArguments(_))
        ));
    }

    #[test]
    fn response_bodies() {
        assert_eq!(CommandResponse::Ok.to_json(), json!({}));
        let rejected: CommandResponse = Err(CommandValidationError::InvalidRoute).into();
        assert_eq!(rejected.to_json(), json!({ "alert": "Invalid Route" }));
    }
}
