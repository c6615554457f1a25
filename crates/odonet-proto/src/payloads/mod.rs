//! Typed packet payloads.
//!
//! The packet header's kind field selects how payload bytes are read:
//!
//! | Kind  | Bytes                                          |
//! |-------|------------------------------------------------|
//! | Text  | ASCII                                          |
//! | Image | `u16` LE device index, then JPEG               |
//! | Json  | UTF-8 JSON                                     |
//! | Blob  | CBOR encoding of a [`Message`]                 |
//!
//! Relays never decode payloads they forward. Only the node a packet is
//! addressed to (or the root, for upward traffic) turns bytes into a
//! [`Payload`].

pub mod config;
pub mod event;
pub mod message;

use bytes::{BufMut, Bytes};

pub use self::{
    config::{About, BackupLink, DeviceConfig, LocalNetwork, Networking, NodeConfig, ParentLink, Security},
    event::{EVENT_TIME_FORMAT, Event, EventImage, EventObject},
    message::{CameraDirection, Message},
};
use crate::{
    Address, Packet, PacketKind,
    errors::{ProtocolError, Result},
};

/// Decoded packet payload
///
/// # Invariants
///
/// - **Kind agreement**: [`Payload::kind`] is the kind written to the header
///   by [`Payload::into_packet`], and [`Payload::decode`] with that kind
///   yields an equal value.
/// - **ASCII text**: `Text` payloads are rejected on both encode and decode
///   if they contain non-ASCII bytes.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Control word or announcement
    Text(String),
    /// Camera frame
    Image {
        /// Which device on the node captured the frame
        device_index: u16,
        /// Encoded JPEG
        jpeg: Bytes,
    },
    /// Free-form JSON document
    Json(serde_json::Value),
    /// Structured message
    Blob(Message),
}

impl Payload {
    /// Text payload
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Empty text payload sent as a keep-alive
    #[must_use]
    pub fn heartbeat() -> Self {
        Self::Text(String::new())
    }

    /// Header kind for this payload
    #[must_use]
    pub const fn kind(&self) -> PacketKind {
        match self {
            Self::Text(_) => PacketKind::Text,
            Self::Image { .. } => PacketKind::Image,
            Self::Json(_) => PacketKind::Json,
            Self::Blob(_) => PacketKind::Blob,
        }
    }

    /// Text content, if this is a text payload
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Encode payload bytes (without the packet header).
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::InvalidText`] for non-ASCII text
    /// - [`ProtocolError::Json`] / [`ProtocolError::CborEncode`] if
    ///   serialization fails
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        match self {
            Self::Text(text) => {
                if !text.is_ascii() {
                    return Err(ProtocolError::InvalidText);
                }
                dst.put_slice(text.as_bytes());
            },
            Self::Image { device_index, jpeg } => {
                dst.put_u16_le(*device_index);
                dst.put_slice(jpeg);
            },
            Self::Json(value) => {
                serde_json::to_writer(dst.writer(), value)?;
            },
            Self::Blob(message) => {
                ciborium::ser::into_writer(message, dst.writer())
                    .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
            },
        }
        Ok(())
    }

    /// Decode payload bytes for the given kind.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - `bytes.len() > MAX_PAYLOAD_SIZE`
    /// - text is not ASCII
    /// - an image is shorter than its 2-byte device index
    /// - JSON or CBOR parsing fails
    pub fn decode(kind: PacketKind, bytes: &[u8]) -> Result<Self> {
        if bytes.len() > Packet::MAX_PAYLOAD_SIZE as usize {
            return Err(ProtocolError::PayloadTooLarge {
                size: bytes.len(),
                max: Packet::MAX_PAYLOAD_SIZE as usize,
            });
        }

        let payload = match kind {
            PacketKind::Text => {
                if !bytes.is_ascii() {
                    return Err(ProtocolError::InvalidText);
                }
                Self::Text(String::from_utf8_lossy(bytes).into_owned())
            },
            PacketKind::Image => {
                let Some((index, jpeg)) = bytes.split_first_chunk::<2>() else {
                    return Err(ProtocolError::ImageTooShort(bytes.len()));
                };
                Self::Image {
                    device_index: u16::from_le_bytes(*index),
                    jpeg: Bytes::copy_from_slice(jpeg),
                }
            },
            PacketKind::Json => Self::Json(serde_json::from_slice(bytes)?),
            PacketKind::Blob => Self::Blob(
                ciborium::de::from_reader(bytes)
                    .map_err(|e| ProtocolError::CborDecode(e.to_string()))?,
            ),
        };

        Ok(payload)
    }

    /// Build a packet carrying this payload.
    ///
    /// # Errors
    ///
    /// Anything [`Payload::encode`] reports.
    pub fn into_packet(self, address: Address) -> Result<Packet> {
        let mut buf = Vec::new();
        self.encode(&mut buf)?;
        Ok(Packet::new(address, self.kind(), buf))
    }

    /// Decode the payload of a received packet.
    pub fn from_packet(packet: &Packet) -> Result<Self> {
        Self::decode(packet.kind(), packet.payload())
    }
}

impl From<Message> for Payload {
    fn from(message: Message) -> Self {
        Self::Blob(message)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn round_trip(payload: Payload) -> Payload {
        let packet = payload.into_packet(Address::empty()).unwrap();
        Payload::from_packet(&Packet::decode(&packet.to_bytes().unwrap()).unwrap()).unwrap()
    }

    #[test]
    fn text_round_trip() {
        let payload = Payload::text("C-boot");
        assert_eq!(round_trip(payload.clone()), payload);
    }

    #[test]
    fn heartbeat_is_empty_text() {
        let packet = Payload::heartbeat().into_packet(Address::empty()).unwrap();
        assert_eq!(packet.kind(), PacketKind::Text);
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn image_carries_device_index_le() {
        let payload = Payload::Image { device_index: 258, jpeg: Bytes::from_static(b"\xff\xd8") };
        let packet = payload.clone().into_packet(Address::empty()).unwrap();

        assert_eq!(&packet.payload()[..2], &[0x02, 0x01]);
        assert_eq!(round_trip(payload.clone()), payload);
    }

    #[test]
    fn every_kind_survives_edge_sizes() {
        for size in [0usize, 1, 64 * 1024, 64 * 1024 + 7] {
            let filler = "x".repeat(size);
            let payloads = [
                Payload::Text(filler.clone()),
                Payload::Image { device_index: 1, jpeg: Bytes::from(vec![0xd8; size]) },
                Payload::Json(serde_json::Value::String(filler.clone())),
                Payload::Blob(Message::ShellOutput { output: filler }),
            ];
            for payload in payloads {
                assert_eq!(round_trip(payload.clone()), payload, "size {size}");
            }
        }
    }

    #[test]
    fn json_round_trip() {
        let payload = Payload::Json(serde_json::json!({ "temperature": 21.5 }));
        assert_eq!(round_trip(payload.clone()), payload);
    }

    #[test]
    fn event_blob_round_trip() {
        let mut event = Event::new(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap(), None);
        event.images.push(EventImage {
            captured_at: Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 6).unwrap(),
            jpeg: Bytes::from(vec![0xAB; 4096]),
            motion: 12.5,
            objects: vec![EventObject { name: "person".to_string(), bbox: Some([1, 2, 3, 4]) }],
        });
        event.compute_score();

        let payload = Payload::Blob(Message::Event(event));
        assert_eq!(round_trip(payload.clone()), payload);
    }

    #[test]
    fn non_ascii_text_rejected() {
        assert_eq!(
            Payload::text("caf\u{e9}").into_packet(Address::empty()),
            Err(ProtocolError::InvalidText)
        );
        assert_eq!(Payload::decode(PacketKind::Text, b"\xc3\xa9"), Err(ProtocolError::InvalidText));
    }

    #[test]
    fn short_image_rejected() {
        assert_eq!(Payload::decode(PacketKind::Image, b"\x01"), Err(ProtocolError::ImageTooShort(1)));
    }

    #[test]
    fn garbage_blob_rejected() {
        assert!(matches!(
            Payload::decode(PacketKind::Blob, b"\xff\xff\xff"),
            Err(ProtocolError::CborDecode(_))
        ));
    }
}
