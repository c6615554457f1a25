//! Packet framing: address, delimiter, fixed header, payload.
//!
//! A [`Packet`] is the unit every hop reads and writes. It holds raw payload
//! bytes, not a decoded [`crate::Payload`], so relays can forward traffic
//! without understanding it.

use bytes::{BufMut, Bytes, BytesMut};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    Address, NodeId, PacketKind,
    errors::{ProtocolError, Result},
};

/// Fixed 6-byte header that follows the `'='` delimiter (little-endian).
///
/// Fields are stored as raw byte arrays so every 6-byte pattern is a valid
/// header and casting untrusted bytes is safe.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct PacketHeader {
    payload_len: [u8; 4], // u32 payload length
    kind: [u8; 2],        // u16 PacketKind
}

impl PacketHeader {
    /// Size of the serialized header
    pub const SIZE: usize = 6;

    /// Create a header for a payload of `payload_len` bytes.
    #[must_use]
    pub fn new(kind: PacketKind, payload_len: u32) -> Self {
        Self { payload_len: payload_len.to_le_bytes(), kind: kind.to_u16().to_le_bytes() }
    }

    /// Parse header from the bytes right after the delimiter (zero-copy).
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let (header, _) = Self::ref_from_prefix(bytes).map_err(|_| {
            ProtocolError::Truncated { expected: Self::SIZE, actual: bytes.len() }
        })?;

        let payload_len = header.payload_len();
        if payload_len > Packet::MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: payload_len as usize,
                max: Packet::MAX_PAYLOAD_SIZE as usize,
            });
        }

        Ok(header)
    }

    /// Payload length announced by the sender
    #[must_use]
    pub fn payload_len(&self) -> u32 {
        u32::from_le_bytes(self.payload_len)
    }

    /// Raw kind value as written on the wire
    #[must_use]
    pub fn kind_raw(&self) -> u16 {
        u16::from_le_bytes(self.kind)
    }

    /// Kind, with unknown values mapped to [`PacketKind::Blob`]
    #[must_use]
    pub fn kind(&self) -> PacketKind {
        PacketKind::from_wire(self.kind_raw())
    }

    /// Serialize header to bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(self.as_bytes());
        arr
    }
}

/// Sizes of a packet learned from its prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Bytes before the delimiter
    pub address_len: usize,
    /// Payload bytes after the header
    pub payload_len: usize,
}

impl Layout {
    /// Bytes up to and including the header
    #[must_use]
    pub const fn header_end(&self) -> usize {
        self.address_len + 1 + PacketHeader::SIZE
    }

    /// Total encoded length of the packet
    #[must_use]
    pub const fn total_len(&self) -> usize {
        self.header_end() + self.payload_len
    }
}

/// Result of scanning a (possibly partial) packet prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scan {
    /// Not enough bytes yet; at least `needed` bytes in total are required
    Incomplete {
        /// Minimum total length before scanning can make progress
        needed: usize,
    },
    /// Prefix parsed; the packet is `layout.total_len()` bytes long
    Complete(Layout),
}

/// A routed packet.
///
/// Layout on the wire:
/// `[address][b'='][PacketHeader: 6 bytes][payload: payload_len bytes]`
///
/// # Invariants
///
/// - **Immutable payload**: forwarding builds a new packet with a longer
///   address. The payload bytes are shared, never rewritten.
/// - **Size limit**: `payload.len()` must not exceed
///   [`Packet::MAX_PAYLOAD_SIZE`]. Enforced by [`Packet::encode`] and
///   [`Packet::decode`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    address: Address,
    kind: PacketKind,
    payload: Bytes,
}

impl Packet {
    /// Separates the address from the header
    pub const DELIMITER: u8 = b'=';

    /// Largest payload accepted (64 MB), enough for a multi-image event.
    pub const MAX_PAYLOAD_SIZE: u32 = 64 * 1024 * 1024;

    /// Longest prefix scanned for the delimiter before giving up.
    pub const MAX_DELIMITER_SCAN: usize = Address::MAX_LEN + 1;

    /// Create a packet.
    ///
    /// New application data starts with an empty address. Replies routed
    /// down the tree carry the full path to their destination.
    #[must_use]
    pub fn new(address: Address, kind: PacketKind, payload: impl Into<Bytes>) -> Self {
        Self { address, kind, payload: payload.into() }
    }

    /// Path attached to this packet
    #[must_use]
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Payload kind
    #[must_use]
    pub fn kind(&self) -> PacketKind {
        self.kind
    }

    /// Raw payload bytes
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Same packet with `hop` prepended to the address.
    ///
    /// This is the only change a relay makes when forwarding upward.
    pub fn with_hop(&self, hop: NodeId) -> Result<Self> {
        Ok(Self { address: self.address.prepend(hop)?, kind: self.kind, payload: self.payload.clone() })
    }

    /// Strip the first hop, for a packet travelling down the tree.
    ///
    /// Returns the stripped hop and the packet as the next hop should see
    /// it. `None` for a packet with an empty address.
    #[must_use]
    pub fn strip_hop(&self) -> Option<(NodeId, Self)> {
        let (first, rest) = self.address.split_first()?;
        Some((first, Self { address: rest, kind: self.kind, payload: self.payload.clone() }))
    }

    /// Number of bytes [`Packet::encode`] writes
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        Layout { address_len: self.address.len(), payload_len: self.payload.len() }.total_len()
    }

    /// Encode packet into buffer.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::PayloadTooLarge`] if the payload exceeds
    /// [`Packet::MAX_PAYLOAD_SIZE`].
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        if self.payload.len() > Self::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.payload.len(),
                max: Self::MAX_PAYLOAD_SIZE as usize,
            });
        }

        dst.put_slice(&self.address.to_bytes());
        dst.put_u8(Self::DELIMITER);
        dst.put_slice(&PacketHeader::new(self.kind, self.payload.len() as u32).to_bytes());
        dst.put_slice(&self.payload);

        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Scan a prefix of a packet for its layout.
    ///
    /// Reads only as far as needed: the delimiter, then the fixed header.
    /// Each address byte is validated as it is scanned, so garbage is
    /// rejected after a few bytes rather than after a full read.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidNodeId`] for a non-identifier byte before the
    ///   delimiter
    /// - [`ProtocolError::DelimiterNotFound`] if no `'='` appears within
    ///   [`Packet::MAX_DELIMITER_SCAN`] bytes
    /// - [`ProtocolError::PayloadTooLarge`] if the header announces an
    ///   oversized payload
    pub fn scan(prefix: &[u8]) -> Result<Scan> {
        let window = &prefix[..prefix.len().min(Self::MAX_DELIMITER_SCAN)];

        let mut address_len = None;
        for (i, &byte) in window.iter().enumerate() {
            if byte == Self::DELIMITER {
                address_len = Some(i);
                break;
            }
            NodeId::from_byte(byte)?;
        }

        let Some(address_len) = address_len else {
            if window.len() >= Self::MAX_DELIMITER_SCAN {
                return Err(ProtocolError::DelimiterNotFound { scanned: window.len() });
            }
            return Ok(Scan::Incomplete { needed: prefix.len() + 1 + PacketHeader::SIZE });
        };

        let header_start = address_len + 1;
        if prefix.len() < header_start + PacketHeader::SIZE {
            return Ok(Scan::Incomplete { needed: header_start + PacketHeader::SIZE });
        }

        let header = PacketHeader::from_bytes(&prefix[header_start..])?;
        Ok(Scan::Complete(Layout { address_len, payload_len: header.payload_len() as usize }))
    }

    /// Decode a complete packet.
    ///
    /// Trailing bytes after the announced payload are ignored.
    ///
    /// # Errors
    ///
    /// Everything [`Packet::scan`] reports, plus
    /// [`ProtocolError::Truncated`] if `bytes` ends before the packet does.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let layout = match Self::scan(bytes)? {
            Scan::Complete(layout) => layout,
            Scan::Incomplete { needed } => {
                return Err(ProtocolError::Truncated { expected: needed, actual: bytes.len() });
            },
        };

        if bytes.len() < layout.total_len() {
            return Err(ProtocolError::Truncated {
                expected: layout.total_len(),
                actual: bytes.len(),
            });
        }

        let address = Address::from_bytes(&bytes[..layout.address_len])?;
        let header = PacketHeader::from_bytes(&bytes[layout.address_len + 1..])?;
        let payload = Bytes::copy_from_slice(&bytes[layout.header_end()..layout.total_len()]);

        Ok(Self { address, kind: header.kind(), payload })
    }
}
