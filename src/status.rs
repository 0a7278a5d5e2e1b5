//! Device state tracking.

use std::net::Ipv4Addr;
use std::time::Duration;

use log::warn;
use serde::Serialize;

use crate::response::{Response, ScanResponse, StatusResponse};
use crate::runtime::Instant;
use crate::types::{Brightness, Color, ColorKelvin, PowerState, Version};

/// How recently a device must have been heard from to count as active.
pub const ACTIVE_WINDOW: Duration = Duration::from_secs(5 * 60);

/// How much the controller knows about a device.
#[derive(Debug, Default, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum DevicePhase {
    /// Only the source IP is known.
    #[default]
    Unknown,
    /// The last applied response was a scan response.
    Discovered,
    /// The last applied response was a status response.
    Updated,
}

/// Identity and last reported state of a device.
///
/// Values are only ever written by the device's worker, one routed
/// response at a time, so a snapshot never mixes fields of two responses.
#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize, Clone)]
pub struct DeviceState {
    ip: Ipv4Addr,
    device_id: Option<String>,
    sku: Option<String>,
    ble_version_hard: Version,
    ble_version_soft: Version,
    wifi_version_hard: Version,
    wifi_version_soft: Version,
    power: PowerState,
    brightness: Brightness,
    color: Color,
    color_kelvin: Option<ColorKelvin>,
    phase: DevicePhase,
    #[serde(skip)]
    last_seen: Option<Instant>,
}

impl DeviceState {
    pub(crate) fn new(ip: Ipv4Addr) -> Self {
        DeviceState {
            ip,
            device_id: None,
            sku: None,
            ble_version_hard: Version::default(),
            ble_version_soft: Version::default(),
            wifi_version_hard: Version::default(),
            wifi_version_soft: Version::default(),
            power: PowerState::default(),
            brightness: Brightness::default(),
            color: Color::default(),
            color_kelvin: None,
            phase: DevicePhase::Unknown,
            last_seen: None,
        }
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn sku(&self) -> Option<&str> {
        self.sku.as_deref()
    }

    pub fn ble_version_hard(&self) -> Version {
        self.ble_version_hard
    }

    pub fn ble_version_soft(&self) -> Version {
        self.ble_version_soft
    }

    pub fn wifi_version_hard(&self) -> Version {
        self.wifi_version_hard
    }

    pub fn wifi_version_soft(&self) -> Version {
        self.wifi_version_soft
    }

    /// Last reported on/off state.
    pub fn power(&self) -> PowerState {
        self.power
    }

    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    pub fn color(&self) -> Color {
        self.color
    }

    /// Last reported color temperature, `None` while the device shows rgb.
    pub fn color_kelvin(&self) -> Option<ColorKelvin> {
        self.color_kelvin
    }

    pub fn phase(&self) -> DevicePhase {
        self.phase
    }

    /// When the last routed response for this device was applied.
    pub fn last_seen(&self) -> Option<Instant> {
        self.last_seen
    }

    /// Returns true if the device was heard from within [`ACTIVE_WINDOW`].
    pub fn is_active(&self) -> bool {
        self.last_seen
            .is_some_and(|seen| seen.elapsed() < ACTIVE_WINDOW)
    }

    pub(crate) fn apply(&mut self, response: &Response) {
        match response {
            Response::Scan(scan) => self.apply_scan(scan),
            Response::Status(status) => self.apply_status(status),
        }
        self.last_seen = Some(Instant::now());
    }

    fn apply_scan(&mut self, scan: &ScanResponse) {
        if let Some(reported) = scan.ip.filter(|reported| *reported != self.ip) {
            warn!(
                "Device {} reports ip {} in scan response; keeping source ip",
                self.ip, reported
            );
        }
        self.device_id = Some(scan.device_id.clone());
        self.sku = Some(scan.sku.clone());
        self.ble_version_hard = scan.ble_version_hard;
        self.ble_version_soft = scan.ble_version_soft;
        self.wifi_version_hard = scan.wifi_version_hard;
        self.wifi_version_soft = scan.wifi_version_soft;
        self.phase = DevicePhase::Discovered;
    }

    fn apply_status(&mut self, status: &StatusResponse) {
        self.power = status.on_off;
        self.brightness = status.brightness;
        self.color = status.color;
        self.color_kelvin = status.color_kelvin;
        self.phase = DevicePhase::Updated;
    }
}
