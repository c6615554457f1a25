//! Wire format for the OdoNet mesh.
//!
//! Every hop in the tree speaks the same minimal framing:
//!
//! ```text
//! [address bytes]['='][payload length: u32 LE][kind: u16 LE][payload bytes]
//! ```
//!
//! The address is a path of single-character node identifiers. Each relay
//! that forwards a packet upward prepends its own identifier, so by the time a
//! packet reaches the root `address[0]` is the root's immediate child and the
//! last character is the node that produced the packet. Replies travel the
//! same path in reverse, one hop at a time.
//!
//! This crate is pure data: framing, parsing, and the typed payloads carried
//! inside packets. Routing decisions live in `odonet-core`.
//!
//! # Compatibility
//!
//! The framing is the interop contract between every node in the tree. The
//! header is little-endian to match the nodes already deployed in the field.
//! It must not change shape without a new value in the kind field.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod errors;
pub mod kind;
pub mod packet;
pub mod payloads;
pub mod stream;

pub use address::{Address, NodeId};
pub use errors::{ProtocolError, Result};
pub use kind::PacketKind;
pub use packet::{Packet, PacketHeader};
pub use payloads::{CameraDirection, Event, Message, NodeConfig, Payload};
pub use stream::{read_packet, write_packet};
