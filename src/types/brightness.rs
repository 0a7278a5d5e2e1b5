//! Brightness control for Govee lights.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Brightness level from 0 to 100 percent.
///
/// Out-of-range input is clamped rather than rejected, both when built
/// locally and when decoded from a device status response.
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "u32", into = "u8")]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Brightness {
    const MAX: u8 = 100;

    /// Create a brightness, clamping to 100.
    ///
    /// # Examples
    ///
    /// ```
    /// use govee_lan_rs::Brightness;
    ///
    /// assert_eq!(Brightness::new(150).value(), 100);
    /// assert_eq!(Brightness::new(0).value(), 0);
    /// assert_eq!(Brightness::new(42).value(), 42);
    /// ```
    pub fn new(value: u32) -> Self {
        Brightness {
            value: value.min(Self::MAX as u32) as u8,
        }
    }

    pub fn value(&self) -> u8 {
        self.value
    }
}

impl From<u32> for Brightness {
    fn from(value: u32) -> Self {
        Brightness::new(value)
    }
}

impl From<Brightness> for u8 {
    fn from(brightness: Brightness) -> Self {
        brightness.value
    }
}

impl fmt::Display for Brightness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.value)
    }
}
