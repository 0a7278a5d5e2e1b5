//! Wire envelope and outbound request payloads.
//!
//! Every datagram, in either direction, is wrapped in the same envelope:
//!
//! ```json
//! {"msg":{"cmd":"<command>","data":{...}}}
//! ```

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::Error;
use crate::types::{Brightness, Color, ColorKelvin, PowerState};

type Result<T> = std::result::Result<T, Error>;

/// Command names understood by Govee devices.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
)]
pub enum Command {
    #[strum(serialize = "scan")]
    Scan,
    #[strum(serialize = "turn")]
    Turn,
    #[strum(serialize = "brightness")]
    Brightness,
    #[strum(serialize = "colorwc")]
    ColorWc,
    #[strum(serialize = "colorKelvin")]
    ColorKelvin,
    #[strum(serialize = "devStatus")]
    DevStatus,
}

#[derive(Serialize)]
struct OutboundEnvelope<'a, T> {
    msg: OutboundBody<'a, T>,
}

#[derive(Serialize)]
struct OutboundBody<'a, T> {
    cmd: &'a str,
    data: &'a T,
}

#[derive(Deserialize)]
struct InboundEnvelope {
    msg: InboundBody,
}

#[derive(Deserialize)]
struct InboundBody {
    cmd: String,
    #[serde(default)]
    data: Value,
}

/// Wrap `data` in the command envelope and serialize it.
///
/// # Examples
///
/// ```
/// use govee_lan_rs::envelope;
/// use serde_json::json;
///
/// let bytes = envelope::encode("turn", &json!({"value": 1})).unwrap();
/// assert_eq!(bytes, br#"{"msg":{"cmd":"turn","data":{"value":1}}}"#);
/// ```
pub fn encode<T: Serialize>(cmd: &str, data: &T) -> Result<Vec<u8>> {
    let envelope = OutboundEnvelope {
        msg: OutboundBody { cmd, data },
    };
    serde_json::to_vec(&envelope).map_err(Error::JsonDump)
}

/// Split a datagram into its command name and raw data object.
pub fn decode(bytes: &[u8]) -> Result<(String, Value)> {
    let envelope: InboundEnvelope = serde_json::from_slice(bytes).map_err(Error::JsonLoad)?;
    Ok((envelope.msg.cmd, envelope.msg.data))
}

#[derive(Debug, Serialize)]
struct ScanRequest {
    account_topic: &'static str,
}

#[derive(Debug, Serialize)]
struct ValueRequest {
    value: u8,
}

/// When `colorTemInKelvin` is non-zero the device derives rgb from it and
/// ignores `color`; when it is zero only `color` is used.
#[derive(Debug, Serialize)]
struct ColorRequest {
    color: Color,
    #[serde(rename = "colorTemInKelvin")]
    kelvin: u16,
}

#[derive(Debug, Serialize)]
struct DevStatusRequest {}

/// A command to send to a device (or, for [`Request::Scan`], to the
/// discovery multicast group).
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    Scan,
    Turn(PowerState),
    Brightness(Brightness),
    Color(Color),
    ColorKelvin(ColorKelvin),
    DevStatus,
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::Scan => Command::Scan,
            Request::Turn(_) => Command::Turn,
            Request::Brightness(_) => Command::Brightness,
            Request::Color(_) => Command::ColorWc,
            Request::ColorKelvin(_) => Command::ColorKelvin,
            Request::DevStatus => Command::DevStatus,
        }
    }

    /// The request's `data` object, as it appears inside the envelope.
    pub fn data(&self) -> Result<Value> {
        let data = match self {
            Request::Scan => serde_json::to_value(ScanRequest {
                account_topic: "reserve",
            }),
            Request::Turn(state) => serde_json::to_value(ValueRequest {
                value: u8::from(*state),
            }),
            Request::Brightness(brightness) => serde_json::to_value(ValueRequest {
                value: brightness.value(),
            }),
            Request::Color(color) => serde_json::to_value(ColorRequest {
                color: *color,
                kelvin: 0,
            }),
            Request::ColorKelvin(kelvin) => serde_json::to_value(ColorRequest {
                color: Color::default(),
                kelvin: kelvin.kelvin(),
            }),
            Request::DevStatus => serde_json::to_value(DevStatusRequest {}),
        };
        data.map_err(Error::JsonDump)
    }

    /// Serialize into a complete wire envelope.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let cmd: &'static str = self.command().into();
        encode(cmd, &self.data()?)
    }
}

/// An outbound request and where to send it.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub destination: Ipv4Addr,
    pub request: Request,
}

impl Message {
    pub fn new(destination: Ipv4Addr, request: Request) -> Self {
        Message {
            destination,
            request,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn encoded(request: Request) -> String {
        String::from_utf8(request.encode().unwrap()).unwrap()
    }

    #[test]
    fn test_scan_request() {
        assert_eq!(
            encoded(Request::Scan),
            r#"{"msg":{"cmd":"scan","data":{"account_topic":"reserve"}}}"#
        );
    }

    #[test]
    fn test_turn_request() {
        assert_eq!(
            encoded(Request::Turn(PowerState::On)),
            r#"{"msg":{"cmd":"turn","data":{"value":1}}}"#
        );
        assert_eq!(
            encoded(Request::Turn(PowerState::Off)),
            r#"{"msg":{"cmd":"turn","data":{"value":0}}}"#
        );
    }

    #[test]
    fn test_brightness_request() {
        assert_eq!(
            encoded(Request::Brightness(Brightness::new(75))),
            r#"{"msg":{"cmd":"brightness","data":{"value":75}}}"#
        );
    }

    #[test]
    fn test_color_requests() {
        assert_eq!(
            encoded(Request::Color(Color::rgb(255, 0, 0))),
            r#"{"msg":{"cmd":"colorwc","data":{"color":{"r":255,"g":0,"b":0},"colorTemInKelvin":0}}}"#
        );
        assert_eq!(
            encoded(Request::ColorKelvin(ColorKelvin::new(3500))),
            r#"{"msg":{"cmd":"colorKelvin","data":{"color":{"r":0,"g":0,"b":0},"colorTemInKelvin":3500}}}"#
        );
    }

    #[test]
    fn test_dev_status_request() {
        assert_eq!(
            encoded(Request::DevStatus),
            r#"{"msg":{"cmd":"devStatus","data":{}}}"#
        );
    }

    #[test]
    fn test_decode_envelope() {
        let (cmd, data) = decode(br#"{"msg":{"cmd":"devStatus","data":{"onOff":1}}}"#).unwrap();
        assert_eq!(cmd, "devStatus");
        assert_eq!(data["onOff"], 1);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode(b"not json"), Err(Error::JsonLoad(_))));
        assert!(matches!(decode(br#"{"cmd":"scan"}"#), Err(Error::JsonLoad(_))));
    }

    #[test]
    fn test_command_names() {
        assert_eq!(Command::ColorWc.to_string(), "colorwc");
        assert_eq!(Command::from_str("devStatus").unwrap(), Command::DevStatus);
        assert!(Command::from_str("razer").is_err());
    }
}
