//! Node identifiers and source-routing addresses.
//!
//! An [`Address`] is the path a packet has taken (or will take) through the
//! tree, written as a string of [`NodeId`]s. Addresses only ever grow at the
//! front: each hop that forwards a packet upward prepends itself.
//!
//! ```text
//!   C --("C=...")--> B --("BC=...")--> root
//!
//!   at the root: address[0] = B (last hop), address[last] = C (origin)
//!                routes[C] = "BC"
//! ```

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::{ProtocolError, Result};

/// Single-character node identifier, unique across the tree.
///
/// Any printable, non-space ASCII character except the `'='` address
/// delimiter and the separators operators type into route strings
/// (`@`, `-`, `<`, `>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId(u8);

impl NodeId {
    /// Printable characters that are not identifiers
    pub const RESERVED: &'static [u8] = b"=@-<>";

    /// Validate a raw address byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        if byte.is_ascii_graphic() && !Self::RESERVED.contains(&byte) {
            Ok(Self(byte))
        } else {
            Err(ProtocolError::InvalidNodeId(byte))
        }
    }

    /// Validate a character.
    pub fn new(c: char) -> Result<Self> {
        u8::try_from(c).map_err(|_| ProtocolError::InvalidNodeId(0xFF)).and_then(Self::from_byte)
    }

    /// Raw byte as it appears on the wire
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self.0
    }

    /// Identifier as a character
    #[must_use]
    pub const fn as_char(self) -> char {
        self.0 as char
    }

    /// Filesystem-safe spelling: alphanumerics as themselves, anything else
    /// as `x` plus two hex digits (`_` becomes `x5f`).
    #[must_use]
    pub fn file_token(self) -> String {
        if self.0.is_ascii_alphanumeric() { self.as_char().to_string() } else { format!("x{:02x}", self.0) }
    }

    /// Inverse of [`Self::file_token`].
    #[must_use]
    pub fn from_file_token(token: &str) -> Option<Self> {
        match token.as_bytes() {
            [byte] if byte.is_ascii_alphanumeric() => Some(Self(*byte)),
            [b'x', _, _] => u8::from_str_radix(&token[1..], 16)
                .ok()
                .filter(|byte| !byte.is_ascii_alphanumeric())
                .and_then(|byte| Self::from_byte(byte).ok()),
            _ => None,
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl FromStr for NodeId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c),
            (None, _) => Err(ProtocolError::InvalidNodeId(0)),
            (Some(_), Some(_)) => {
                Err(ProtocolError::AddressTooLong { len: s.chars().count(), max: 1 })
            },
        }
    }
}

impl TryFrom<String> for NodeId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.as_char().to_string()
    }
}

/// Ordered path of node identifiers used for source routing.
///
/// # Invariants
///
/// - For a packet that has travelled upward, `first()` is the immediate
///   previous hop and `last()` is the node the packet originated from.
/// - Addresses are immutable once built. [`Address::prepend`] and
///   [`Address::split_first`] return new values.
/// - At most [`Address::MAX_LEN`] hops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Address(Vec<NodeId>);

impl Address {
    /// Longest address accepted on the wire.
    ///
    /// The tree holds fewer than 100 nodes, so no loop-free path is longer.
    pub const MAX_LEN: usize = 100;

    /// Address of a packet that has not travelled yet
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build an address from identifiers in path order.
    pub fn from_ids(ids: impl IntoIterator<Item = NodeId>) -> Result<Self> {
        let ids: Vec<NodeId> = ids.into_iter().collect();
        if ids.len() > Self::MAX_LEN {
            return Err(ProtocolError::AddressTooLong { len: ids.len(), max: Self::MAX_LEN });
        }
        Ok(Self(ids))
    }

    /// Parse the raw address bytes that precede the `'='` delimiter.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > Self::MAX_LEN {
            return Err(ProtocolError::AddressTooLong { len: bytes.len(), max: Self::MAX_LEN });
        }
        bytes.iter().map(|&b| NodeId::from_byte(b)).collect::<Result<Vec<_>>>().map(Self)
    }

    /// Number of hops in the path
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True for a packet that has not been forwarded yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The hop closest to the reader: previous hop going up, next hop going
    /// down.
    #[must_use]
    pub fn first(&self) -> Option<NodeId> {
        self.0.first().copied()
    }

    /// The far end of the path: origin going up, destination going down.
    #[must_use]
    pub fn last(&self) -> Option<NodeId> {
        self.0.last().copied()
    }

    /// Identifier immediately before `last()`, if any.
    ///
    /// For a downward route this is the destination's parent.
    #[must_use]
    pub fn parent_of_last(&self) -> Option<NodeId> {
        self.0.len().checked_sub(2).map(|i| self.0[i])
    }

    /// New address with `hop` in front.
    ///
    /// Fails only if the path would exceed [`Address::MAX_LEN`].
    pub fn prepend(&self, hop: NodeId) -> Result<Self> {
        let mut ids = Vec::with_capacity(self.0.len() + 1);
        ids.push(hop);
        ids.extend_from_slice(&self.0);
        Self::from_ids(ids)
    }

    /// Split off the first hop, returning it and the remaining path.
    #[must_use]
    pub fn split_first(&self) -> Option<(NodeId, Self)> {
        self.0.split_first().map(|(first, rest)| (*first, Self(rest.to_vec())))
    }

    /// True if `id` appears anywhere in the path
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.0.contains(&id)
    }

    /// True if some identifier appears more than once (a cycle)
    #[must_use]
    pub fn has_duplicates(&self) -> bool {
        self.0.iter().enumerate().any(|(i, id)| self.0[i + 1..].contains(id))
    }

    /// Identifiers in path order
    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.0.iter().copied()
    }

    /// Raw bytes as written before the delimiter
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().map(|id| id.as_byte()).collect()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for id in &self.0 {
            write!(f, "{id}")?;
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<NodeId> for Address {
    fn from(id: NodeId) -> Self {
        Self(vec![id])
    }
}
