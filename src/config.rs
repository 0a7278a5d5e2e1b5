//! Controller configuration.

use std::net::Ipv4Addr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Multicast group devices listen on for scan requests.
pub const MULTICAST_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);
/// Port devices send scan and status responses to.
pub const LISTEN_PORT: u16 = 4002;
/// Port devices receive scan requests on.
pub const SCAN_PORT: u16 = 4001;
/// Port devices receive control commands on.
pub const COMMAND_PORT: u16 = 4003;

/// Settings for a [`Controller`](crate::Controller).
///
/// Every field has a default, so partial configurations deserialize:
///
/// ```
/// use govee_lan_rs::ControllerConfig;
///
/// let config: ControllerConfig = serde_json::from_str(r#"{"scan_interval_secs": 30}"#).unwrap();
/// assert_eq!(config.scan_interval_secs, 30);
/// assert_eq!(config.listen_port, 4002);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub multicast_group: Ipv4Addr,
    pub listen_port: u16,
    pub scan_port: u16,
    pub command_port: u16,
    /// Join `multicast_group` on the listen socket. Disable to run on a
    /// loopback-only host.
    pub join_multicast: bool,
    pub scan_interval_secs: u64,
    pub status_timeout_ms: u64,
    pub recv_buffer_size: usize,
    /// Bound of the outbound queue; commands beyond it fail immediately.
    pub queue_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            multicast_group: MULTICAST_GROUP,
            listen_port: LISTEN_PORT,
            scan_port: SCAN_PORT,
            command_port: COMMAND_PORT,
            join_multicast: true,
            scan_interval_secs: 60,
            status_timeout_ms: 5000,
            recv_buffer_size: 8192,
            queue_capacity: 256,
        }
    }
}

impl ControllerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn status_timeout(&self) -> Duration {
        Duration::from_millis(self.status_timeout_ms)
    }
}
