//! Scripted device driver for simulations.
//!
//! A device of type `"scripted"` plays back [`TickResult`]s pushed by the
//! test, one per tick, and records camera moves.

use std::{collections::VecDeque, sync::Arc};

use chrono::{DateTime, Utc};
use odonet_core::device::{Device, DeviceError, DeviceFactory, TickResult};
use odonet_proto::{CameraDirection, payloads::DeviceConfig};
use parking_lot::Mutex;

#[derive(Debug, Default)]
struct ScriptState {
    pending: VecDeque<TickResult>,
    moves: Vec<CameraDirection>,
    ticks: u64,
}

/// Shared playback queue. Clones see the same state.
#[derive(Debug, Clone, Default)]
pub struct Script {
    state: Arc<Mutex<ScriptState>>,
}

impl Script {
    /// Empty script; devices tick idle until something is pushed
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `result` for a future tick.
    pub fn push(&self, result: TickResult) {
        self.state.lock().pending.push_back(result);
    }

    /// Results not yet played
    #[must_use]
    pub fn pending(&self) -> usize {
        self.state.lock().pending.len()
    }

    /// Camera moves received so far
    #[must_use]
    pub fn moves(&self) -> Vec<CameraDirection> {
        self.state.lock().moves.clone()
    }

    /// Ticks played so far, across every device built from this script
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.state.lock().ticks
    }
}

/// Factory building `"scripted"` devices that share one [`Script`].
#[derive(Debug, Clone)]
pub struct ScriptedDevices {
    script: Script,
}

impl ScriptedDevices {
    /// Value of `type` selecting the scripted driver
    pub const KIND: &'static str = "scripted";

    /// Factory whose devices play `script`
    #[must_use]
    pub fn new(script: Script) -> Self {
        Self { script }
    }
}

impl DeviceFactory for ScriptedDevices {
    fn build(&self, config: &DeviceConfig) -> Result<Box<dyn Device>, DeviceError> {
        if config.kind != Self::KIND {
            return Err(DeviceError::UnknownType(config.kind.clone()));
        }
        Ok(Box::new(ScriptedDevice { script: self.script.clone() }))
    }
}

struct ScriptedDevice {
    script: Script,
}

impl Device for ScriptedDevice {
    fn kind(&self) -> &str {
        ScriptedDevices::KIND
    }

    fn ready(&self) -> bool {
        true
    }

    fn tick(&mut self, _now: DateTime<Utc>) -> Result<TickResult, DeviceError> {
        let mut state = self.script.state.lock();
        state.ticks += 1;
        Ok(state.pending.pop_front().unwrap_or_default())
    }

    fn move_to(&mut self, direction: CameraDirection) -> Result<(), DeviceError> {
        self.script.state.lock().moves.push(direction);
        Ok(())
    }
}
