//! The device registry, keyed by source IP.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};

use crate::device::Device;
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

/// Every device the listener has heard from, in discovery order.
///
/// Devices are never removed; a device that stops answering simply stops
/// being active.
#[derive(Default)]
pub(crate) struct Registry {
    inner: RwLock<Entries>,
}

#[derive(Default)]
struct Entries {
    devices: Vec<Device>,
    by_ip: HashMap<Ipv4Addr, usize>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn by_ip(&self, ip: Ipv4Addr) -> Result<Device> {
        let entries = self.inner.read();
        entries
            .by_ip
            .get(&ip)
            .map(|&index| entries.devices[index].clone())
            .ok_or_else(|| Error::not_found(ip))
    }

    /// Devices that have not answered a scan yet have no ID and never match.
    pub(crate) fn by_id(&self, device_id: &str) -> Result<Device> {
        self.inner
            .read()
            .devices
            .iter()
            .find(|device| device.device_id().as_deref() == Some(device_id))
            .cloned()
            .ok_or_else(|| Error::not_found(device_id))
    }

    pub(crate) fn devices(&self) -> Vec<Device> {
        self.inner.read().devices.clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.read().devices.len()
    }

    /// Look up `ip`, registering the device built by `create` if it is new.
    /// `create` runs at most once per IP.
    pub(crate) fn get_or_insert_with<F>(&self, ip: Ipv4Addr, create: F) -> Device
    where
        F: FnOnce() -> Device,
    {
        let entries = self.inner.upgradable_read();
        if let Some(&index) = entries.by_ip.get(&ip) {
            return entries.devices[index].clone();
        }

        let mut entries = RwLockUpgradableReadGuard::upgrade(entries);
        let device = create();
        let index = entries.devices.len();
        entries.devices.push(device.clone());
        entries.by_ip.insert(ip, index);
        device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::OutboundQueue;
    use crate::shutdown::Shutdown;
    use std::sync::Arc;
    use std::time::Duration;

    fn device(ip: Ipv4Addr) -> Device {
        let (queue, _receiver) = OutboundQueue::new(1);
        Device::new(ip, Arc::new(queue), Shutdown::new(), Duration::from_secs(1)).0
    }

    #[test]
    fn test_one_entry_per_ip() {
        let registry = Registry::new();
        let ip = Ipv4Addr::new(10, 0, 0, 7);
        let mut created = 0;

        for _ in 0..3 {
            registry.get_or_insert_with(ip, || {
                created += 1;
                device(ip)
            });
        }
        assert_eq!(created, 1);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.by_ip(ip).unwrap().ip(), ip);
    }

    #[test]
    fn test_devices_in_discovery_order() {
        let registry = Registry::new();
        let ips = [
            Ipv4Addr::new(10, 0, 0, 9),
            Ipv4Addr::new(10, 0, 0, 3),
            Ipv4Addr::new(10, 0, 0, 5),
        ];
        for ip in ips {
            registry.get_or_insert_with(ip, || device(ip));
        }
        let found: Vec<_> = registry.devices().iter().map(Device::ip).collect();
        assert_eq!(found, ips);
    }

    #[test]
    fn test_lookup_misses() {
        let registry = Registry::new();
        let ip = Ipv4Addr::new(10, 0, 0, 7);
        registry.get_or_insert_with(ip, || device(ip));

        assert_eq!(
            registry.by_ip(Ipv4Addr::new(10, 0, 0, 8)).unwrap_err(),
            Error::not_found("10.0.0.8")
        );
        // Not scanned yet, so no ID to match.
        assert!(matches!(
            registry.by_id("AA:BB"),
            Err(Error::DeviceNotFound(_))
        ));
    }
}
