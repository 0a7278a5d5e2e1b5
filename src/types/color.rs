//! RGB color representation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An RGB color with red, green, and blue components (0-255 each).
#[derive(Default, Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(from = "WireColor")]
pub struct Color {
    #[serde(rename = "r")]
    pub(crate) red: u8,
    #[serde(rename = "g")]
    pub(crate) green: u8,
    #[serde(rename = "b")]
    pub(crate) blue: u8,
}

impl Color {
    /// Create a color, clamping every channel to 255.
    ///
    /// # Examples
    ///
    /// ```
    /// use govee_lan_rs::Color;
    ///
    /// let color = Color::new(300, 128, 0);
    /// assert_eq!((color.red(), color.green(), color.blue()), (255, 128, 0));
    /// ```
    pub fn new(red: u32, green: u32, blue: u32) -> Self {
        Self {
            red: clamp_channel(red),
            green: clamp_channel(green),
            blue: clamp_channel(blue),
        }
    }

    /// Create a color from values that are already in range.
    pub fn rgb(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }

    pub fn red(&self) -> u8 {
        self.red
    }

    pub fn green(&self) -> u8 {
        self.green
    }

    pub fn blue(&self) -> u8 {
        self.blue
    }
}

fn clamp_channel(value: u32) -> u8 {
    value.min(u8::MAX as u32) as u8
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.red, self.green, self.blue)
    }
}

impl FromStr for Color {
    type Err = String;

    /// Parse from comma-separated string (e.g., "255,128,0").
    fn from_str(s: &str) -> Result<Self, String> {
        let parts = s
            .split(',')
            .map(|c| c.trim().parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| format!("invalid color component: {e}"))?;
        match parts.as_slice() {
            [r, g, b] => Ok(Self::new(*r, *g, *b)),
            _ => Err("Expected format: r,g,b".into()),
        }
    }
}

/// Unclamped wire shape; devices are not trusted to stay within 0-255.
#[derive(Deserialize)]
struct WireColor {
    r: u32,
    g: u32,
    b: u32,
}

impl From<WireColor> for Color {
    fn from(wire: WireColor) -> Self {
        Color::new(wire.r, wire.g, wire.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_each_channel() {
        assert_eq!(Color::new(256, 0, 1000), Color::rgb(255, 0, 255));
        assert_eq!(Color::new(0, 0, 0), Color::rgb(0, 0, 0));
        assert_eq!(Color::new(12, 34, 56), Color::rgb(12, 34, 56));
    }

    #[test]
    fn test_display() {
        assert_eq!(Color::rgb(255, 0, 0).to_string(), "rgb(255, 0, 0)");
        assert_eq!(Color::rgb(0, 0, 255).to_string(), "rgb(0, 0, 255)");
    }

    #[test]
    fn test_from_str() {
        assert_eq!(Color::from_str("255, 128,0").unwrap(), Color::rgb(255, 128, 0));
        assert!(Color::from_str("1,2").is_err());
        assert!(Color::from_str("a,b,c").is_err());
    }

    #[test]
    fn test_wire_format() {
        let color: Color = serde_json::from_str(r#"{"r":300,"g":1,"b":2}"#).unwrap();
        assert_eq!(color, Color::rgb(255, 1, 2));
        assert_eq!(
            serde_json::to_string(&color).unwrap(),
            r#"{"r":255,"g":1,"b":2}"#
        );
    }
}
