//! Runtime errors.
//!
//! Only loading the config and binding the listener at startup may end the
//! process. Everything raised after that is logged by the driver that hit
//! it.

use std::{io, path::PathBuf};

use odonet_proto::{NodeId, ProtocolError};
use thiserror::Error;

/// Errors raised by the server runtime.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Config file could not be read
    #[error("failed to read config {path}: {source}")]
    ConfigRead {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// Config file is not a valid node config document
    #[error("invalid config {path}: {source}")]
    ConfigParse {
        /// Config file
        path: PathBuf,
        /// Underlying error
        source: ProtocolError,
    },

    /// A relay was configured without `networking.parent`
    #[error("node {0} has no networking.parent")]
    NoParent(NodeId),

    /// Listener could not be opened
    #[error("failed to bind {endpoint}: {source}")]
    Bind {
        /// `host:port` that was requested
        endpoint: String,
        /// Underlying error
        source: io::Error,
    },

    /// Event could not be serialized for storage
    #[error("failed to encode event: {0}")]
    EventEncode(String),

    /// Stored event file is corrupt
    #[error("failed to decode event {path}: {reason}")]
    EventDecode {
        /// Event file
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// Blocking filesystem task did not complete
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// Filesystem or socket failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}
