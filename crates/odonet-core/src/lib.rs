//! OdoNet core logic
//!
//! Routing and node behavior for the OdoNet tree mesh, decoupled from
//! sockets, disks, and the clock.
//!
//! # Architecture
//!
//! Each node is one of two roles:
//!
//! - a relay, which forwards every packet to its parent and carries the
//!   parent's single response back down
//! - the root, which terminates the tree, records the path each node's
//!   packets took, and queues commands down those paths
//!
//! Both roles share a [`RoutingDirectory`]: per-child queues of packets that
//! wait until that child next connects. Nothing is ever pushed; a packet
//! moves one hop down per upward contact.
//!
//! The types here make routing decisions and return what should happen.
//! Runtimes (the server binary, the simulation harness) own the sockets and
//! timers and supply them through [`Transport`] and [`Environment`].
//!
//! # Components
//!
//! - [`directory`]: per-next-hop packet queues
//! - [`relay`]: relay routing, response interpretation, tick pacing
//! - [`root`]: device registry, route table, operator commands
//! - [`config`]: config derivations used when re-homing or re-provisioning
//! - [`device`]: sensor abstraction polled by the relay tick loop
//! - [`mod@env`]: environment abstraction (time)
//! - [`transport`]: transport abstraction (streams)
//! - [`error`]: routing and command errors

pub mod config;
pub mod device;
pub mod directory;
pub mod env;
pub mod error;
pub mod relay;
pub mod root;
pub mod transport;

pub use device::{Device, DeviceError, DeviceFactory, TickResult};
pub use directory::RoutingDirectory;
pub use env::Environment;
pub use error::{CommandValidationError, RoutingError};
pub use relay::{LocalCommand, RelayRouter, RelaySettings, ResponseOutcome, TickSchedule};
pub use root::{BridgeCommand, CommandResponse, Inbound, Root, RootAction};
pub use transport::{Transport, TransportListener};
