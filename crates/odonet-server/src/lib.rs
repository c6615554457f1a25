//! OdoNet runtime.
//!
//! Drives the sans-IO engines from `odonet-core` with tokio: TCP listeners,
//! the relay tick loop, timeouts, the event store, and host side effects.
//!
//! # Components
//!
//! - [`relay`]: relay driver (listener, tick loop, local commands)
//! - [`root`]: root driver and the [`RootHandle`] used by the presentation
//!   layer
//! - [`bridge`]: JSON-lines bridge exposing [`RootHandle`] over a socket
//! - [`backup`]: on-disk event store
//! - [`devices`]: built-in device drivers
//! - [`host`]: reboot, shell, wifi scan, config persistence
//! - [`transport`], [`mod@env`]: production implementations of the core
//!   abstractions

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backup;
pub mod bridge;
pub mod config;
pub mod devices;
pub mod env;
pub mod error;
pub mod host;
pub mod relay;
pub mod root;
pub mod transport;
pub mod wifi;

pub use backup::{EventStore, StoredEvent};
pub use config::load_config;
pub use devices::{BuiltinDevices, FileCamera};
pub use env::SystemEnv;
pub use error::ServerError;
pub use host::{HostControl, SystemHost};
pub use relay::RelayNode;
pub use root::{RootHandle, RootNode};
pub use transport::TcpTransport;
