//! Error types for the OdoNet wire format.
//!
//! All errors are structured, testable, and provide actionable information.

use std::{io, time::Duration};

use thiserror::Error;

/// Protocol-level errors that can occur while framing or parsing packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    // Framing errors
    /// No `'='` delimiter within the bounded address prefix
    #[error("address delimiter not found within the first {scanned} bytes")]
    DelimiterNotFound {
        /// Number of bytes inspected before giving up
        scanned: usize,
    },

    /// Address contains a byte that is not a valid node identifier
    #[error("invalid node identifier byte {0:#04x} in address")]
    InvalidNodeId(u8),

    /// Address is longer than any path through the tree can be
    #[error("address too long: {len} hops exceeds maximum {max}")]
    AddressTooLong {
        /// Actual number of hops
        len: usize,
        /// Maximum allowed hops
        max: usize,
    },

    /// Payload exceeds maximum allowed size
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Actual payload size
        size: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Packet ended before the length announced in its header
    #[error("packet truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Total packet length announced by the header
        expected: usize,
        /// Bytes actually received
        actual: usize,
    },

    // Payload errors
    /// Text payload is not ASCII
    #[error("text payload is not ASCII")]
    InvalidText,

    /// Image payload is missing its 2-byte device index
    #[error("image payload too short: {0} bytes")]
    ImageTooShort(usize),

    /// JSON payload failed to parse or serialize
    #[error("invalid JSON payload: {0}")]
    Json(String),

    /// Failed to encode data as CBOR
    #[error("failed to encode CBOR: {0}")]
    CborEncode(String),

    /// Failed to decode CBOR data
    #[error("failed to decode CBOR: {0}")]
    CborDecode(String),

    /// Underlying stream failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Peer did not finish sending its packet in time
    #[error("timed out after {0:?} waiting for packet")]
    TimedOut(Duration),
}

impl ProtocolError {
    /// Returns true if the error came from the connection rather than the
    /// packet contents.
    ///
    /// Transport failures are always recoverable: the hop simply did not
    /// deliver anything this time.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Truncated { .. } | Self::Io(_) | Self::TimedOut(_))
    }
}

impl From<io::Error> for ProtocolError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Convenient Result type alias for protocol operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
