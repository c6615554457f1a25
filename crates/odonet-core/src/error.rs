//! Error types for the OdoNet core.
//!
//! - [`RoutingError`]: a packet cannot be routed. The packet is dropped and
//!   the connection closed without a meaningful response.
//! - [`CommandValidationError`]: an operator command was refused. Surfaced to
//!   the presentation layer as an alert, never applied.
//!
//! Device failures live in [`crate::device::DeviceError`].

use odonet_proto::{NodeId, ProtocolError};
use thiserror::Error;

/// Errors raised while routing a packet through a hop.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoutingError {
    /// Inbound packet carries no address, so its origin is unknown
    #[error("packet without address")]
    EmptyAddress,

    /// Response from the parent is addressed to a different node
    #[error("response addressed to {first}, this hop is {this}")]
    NotForThisHop {
        /// This node
        this: NodeId,
        /// First hop of the response address
        first: NodeId,
    },

    /// No route recorded for the target node
    #[error("no route to node {0}")]
    NoRoute(NodeId),

    /// Packet could not be framed or its payload decoded
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Reasons an operator command is refused.
///
/// The display strings are the alerts shown to the operator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandValidationError {
    /// Route is empty, does not end at the target, or is the current route
    #[error("Invalid Route")]
    InvalidRoute,

    /// Route names a node the root has never heard from
    #[error("Node in route does not exist")]
    NodeInRouteMissing(NodeId),

    /// Route names a node whose config is not known yet
    #[error("Node in route is not ready")]
    NodeInRouteNotReady(NodeId),

    /// Route visits a node twice
    #[error("Duplicate nodes in route")]
    DuplicateNodes(NodeId),

    /// Re-provisioning id is missing, unchanged, too long, or taken
    #[error("Invalid Id")]
    InvalidId,

    /// Target node is not in the registry or has no route
    #[error("Unknown node")]
    UnknownNode(NodeId),

    /// Target node has not reported its config yet
    #[error("Node is not ready")]
    NotReady(NodeId),

    /// Command name not recognized
    #[error("Unknown command")]
    UnknownCommand(String),

    /// Command arguments could not be parsed
    #[error("Invalid command: {0}")]
    InvalidArguments(String),
}

impl From<RoutingError> for CommandValidationError {
    fn from(err: RoutingError) -> Self {
        match err {
            RoutingError::NoRoute(node) => Self::UnknownNode(node),
            other => Self::InvalidArguments(other.to_string()),
        }
    }
}
