//! Color temperature control.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Color temperature in Kelvin, clamped to 2000K..=9000K.
///
/// Lower values produce warmer (more yellow/orange) light, while higher
/// values produce cooler (more blue) light.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "u32", into = "u16")]
pub struct ColorKelvin {
    pub(crate) kelvin: u16,
}

impl Default for ColorKelvin {
    fn default() -> Self {
        ColorKelvin { kelvin: Self::MIN }
    }
}

impl ColorKelvin {
    const MIN: u16 = 2000;
    const MAX: u16 = 9000;

    /// Create a color temperature, clamping into the supported range.
    ///
    /// # Examples
    ///
    /// ```
    /// use govee_lan_rs::ColorKelvin;
    ///
    /// assert_eq!(ColorKelvin::new(500).kelvin(), 2000);
    /// assert_eq!(ColorKelvin::new(3500).kelvin(), 3500);
    /// assert_eq!(ColorKelvin::new(20000).kelvin(), 9000);
    /// ```
    pub fn new(kelvin: u32) -> Self {
        ColorKelvin {
            kelvin: kelvin.clamp(Self::MIN as u32, Self::MAX as u32) as u16,
        }
    }

    pub fn kelvin(&self) -> u16 {
        self.kelvin
    }
}

impl From<u32> for ColorKelvin {
    fn from(kelvin: u32) -> Self {
        ColorKelvin::new(kelvin)
    }
}

impl From<ColorKelvin> for u16 {
    fn from(kelvin: ColorKelvin) -> Self {
        kelvin.kelvin
    }
}

impl fmt::Display for ColorKelvin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}K", self.kelvin)
    }
}

/// Decode a `colorTemInKelvin` field where 0 means "rgb mode, no temperature".
pub(crate) fn deserialize_optional_kelvin<'de, D>(
    deserializer: D,
) -> Result<Option<ColorKelvin>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = u32::deserialize(deserializer)?;
    Ok((raw != 0).then(|| ColorKelvin::new(raw)))
}
