//! Power state for light control.

use std::fmt;

use serde::{Deserialize, Serialize};

/// On/off state of a device, encoded as `0`/`1` on the wire.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "u8", into = "u8")]
pub enum PowerState {
    /// The light is off
    #[default]
    Off,
    /// The light is on
    On,
}

impl PowerState {
    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::On)
    }
}

impl From<u8> for PowerState {
    fn from(value: u8) -> Self {
        if value == 1 {
            PowerState::On
        } else {
            PowerState::Off
        }
    }
}

impl From<PowerState> for u8 {
    fn from(state: PowerState) -> Self {
        match state {
            PowerState::Off => 0,
            PowerState::On => 1,
        }
    }
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on { PowerState::On } else { PowerState::Off }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => write!(f, "On"),
            PowerState::Off => write!(f, "Off"),
        }
    }
}
