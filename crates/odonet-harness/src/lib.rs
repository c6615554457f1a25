//! Deterministic simulation harness for the OdoNet mesh.
//!
//! Turmoil-based implementations of the Environment and Transport traits,
//! plus recording stand-ins for the host and for device drivers, so whole
//! trees of relays and a root can run in one process under virtual time.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod mesh;
pub mod sim_device;
pub mod sim_env;
pub mod sim_host;
pub mod sim_transport;

pub use mesh::{MeshNode, eventually};
pub use sim_device::{Script, ScriptedDevices};
pub use sim_env::SimEnv;
pub use sim_host::{HostLog, RecordingHost};
pub use sim_transport::{SimListener, SimTransport};
