//! Payload kinds carried in the packet header.
//!
//! The kind is a little-endian `u16` written right after the payload length.
//! It tells the receiver how to interpret the payload bytes; relays never
//! need to look at it.

/// Closed set of payload kinds.
///
/// # Representation
///
/// `#[repr(u16)]` keeps the numeric values stable for wire compatibility
/// with nodes already deployed.
///
/// # Unknown values
///
/// [`PacketKind::from_wire`] maps any value outside the enumeration to
/// [`PacketKind::Blob`]: an unknown kind is carried as opaque bytes rather
/// than failing the whole packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum PacketKind {
    /// ASCII text (control words, boot announcements, heartbeats)
    Text = 1,
    /// 2-byte device index followed by raw JPEG bytes
    Image = 2,
    /// UTF-8 JSON document
    Json = 3,
    /// Serialized structured object (config document, event, ...)
    Blob = 4,
}

impl PacketKind {
    /// Convert to raw u16 value
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Convert from raw u16 value
    ///
    /// Returns `None` if the value doesn't correspond to a known kind.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            1 => Some(Self::Text),
            2 => Some(Self::Image),
            3 => Some(Self::Json),
            4 => Some(Self::Blob),
            _ => None,
        }
    }

    /// Interpret a kind read off the wire.
    ///
    /// This function is total: unrecognized values decode to
    /// [`PacketKind::Blob`].
    #[must_use]
    pub const fn from_wire(value: u16) -> Self {
        match Self::from_u16(value) {
            Some(kind) => kind,
            None => Self::Blob,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        for kind in [PacketKind::Text, PacketKind::Image, PacketKind::Json, PacketKind::Blob] {
            assert_eq!(PacketKind::from_u16(kind.to_u16()), Some(kind));
        }
    }

    #[test]
    fn wire_values_are_fixed() {
        assert_eq!(PacketKind::Text.to_u16(), 1);
        assert_eq!(PacketKind::Image.to_u16(), 2);
        assert_eq!(PacketKind::Json.to_u16(), 3);
        assert_eq!(PacketKind::Blob.to_u16(), 4);
    }

    #[test]
    fn unknown_kind_is_blob() {
        assert_eq!(PacketKind::from_u16(0x9999), None);
        assert_eq!(PacketKind::from_wire(0x9999), PacketKind::Blob);
        assert_eq!(PacketKind::from_wire(0), PacketKind::Blob);
    }
}
