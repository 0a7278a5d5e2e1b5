//! Firmware and hardware version triples.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::Error;

/// A `major.minor.patch` version as reported in scan responses.
///
/// Devices send zero-padded components such as `"1.00.10"`; leading
/// zeros are dropped on decode, so the value re-encodes as `"1.0.10"`.
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    pub fn new(major: u32, minor: u32, patch: u32) -> Self {
        Version {
            major,
            minor,
            patch,
        }
    }

    /// Replace this version with the one parsed from `input`.
    ///
    /// On failure the version is reset to `0.0.0` and
    /// [`Error::InvalidVersionFormat`] is returned.
    ///
    /// # Examples
    ///
    /// ```
    /// use govee_lan_rs::Version;
    ///
    /// let mut version = Version::new(9, 9, 9);
    /// version.decode("1.00.10").unwrap();
    /// assert_eq!(version, Version::new(1, 0, 10));
    /// assert_eq!(version.to_string(), "1.0.10");
    ///
    /// assert!(version.decode("1.2").is_err());
    /// assert_eq!(version, Version::default());
    /// ```
    pub fn decode(&mut self, input: &str) -> Result<(), Error> {
        match Self::parse_components(input) {
            Some((major, minor, patch)) => {
                *self = Version::new(major, minor, patch);
                Ok(())
            }
            None => {
                *self = Version::default();
                Err(Error::InvalidVersionFormat(input.to_string()))
            }
        }
    }

    fn parse_components(input: &str) -> Option<(u32, u32, u32)> {
        let mut parts = input.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next()?.parse().ok()?;
        let patch = parts.next()?.parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some((major, minor, patch))
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        let mut version = Version::default();
        version.decode(s)?;
        Ok(version)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
