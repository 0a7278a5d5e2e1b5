//! Responses routed from the listener to device workers.

use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::errors::Error;
use crate::payload::Command;
use crate::types::{
    Brightness, Color, ColorKelvin, PowerState, Version, deserialize_optional_kelvin,
};

type Result<T> = std::result::Result<T, Error>;

/// Identity a device reports in answer to a multicast scan.
///
/// Missing fields decode to their defaults. Malformed version strings are
/// still rejected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScanResponse {
    /// The address the device believes it has; `None` if absent or not an
    /// IPv4 address. Devices are always keyed by the datagram's source.
    #[serde(deserialize_with = "deserialize_lenient_ip")]
    pub ip: Option<Ipv4Addr>,
    #[serde(rename = "device")]
    pub device_id: String,
    pub sku: String,
    pub ble_version_hard: Version,
    pub ble_version_soft: Version,
    pub wifi_version_hard: Version,
    pub wifi_version_soft: Version,
}

/// Current light state reported in answer to `devStatus`.
///
/// Missing fields decode to their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusResponse {
    #[serde(rename = "onOff")]
    pub on_off: PowerState,
    pub brightness: Brightness,
    pub color: Color,
    /// `None` when the device reports 0, i.e. it is showing `color`.
    #[serde(
        rename = "colorTemInKelvin",
        deserialize_with = "deserialize_optional_kelvin"
    )]
    pub color_kelvin: Option<ColorKelvin>,
}

fn deserialize_lenient_ip<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<Ipv4Addr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(raw.as_str().and_then(|ip| ip.parse().ok()))
}

/// A decoded response, tagged by the command it answers.
#[derive(Debug, Clone, PartialEq)]
pub enum Response {
    Scan(ScanResponse),
    Status(StatusResponse),
}

impl Response {
    /// Decode the data object of an envelope according to its command.
    ///
    /// Commands that devices never answer with are reported as
    /// [`Error::UnknownCommand`].
    pub fn decode(cmd: &str, data: Value) -> Result<Self> {
        match Command::from_str(cmd) {
            Ok(Command::Scan) => serde_json::from_value(data)
                .map(Response::Scan)
                .map_err(Error::JsonLoad),
            Ok(Command::DevStatus) => serde_json::from_value(data)
                .map(Response::Status)
                .map_err(Error::JsonLoad),
            _ => Err(Error::UnknownCommand(cmd.to_string())),
        }
    }

    pub fn command(&self) -> Command {
        match self {
            Response::Scan(_) => Command::Scan,
            Response::Status(_) => Command::DevStatus,
        }
    }

    /// The response's `data` object, re-encoded for history entries.
    pub fn data(&self) -> Result<Value> {
        let data = match self {
            Response::Scan(scan) => serde_json::to_value(scan),
            Response::Status(status) => serde_json::to_value(status),
        };
        data.map_err(Error::JsonDump)
    }
}
