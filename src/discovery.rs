//! Periodic multicast discovery.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};

use crate::errors::Error;
use crate::payload::{Message, Request};
use crate::queue::OutboundQueue;
use crate::shutdown::Shutdown;

type Result<T> = std::result::Result<T, Error>;

/// Queue a scan request for the multicast group. Devices answer it on the
/// listen port with their identity.
pub(crate) fn enqueue_scan(outbound: &OutboundQueue, multicast_group: Ipv4Addr) -> Result<()> {
    outbound.enqueue(Message::new(multicast_group, Request::Scan))
}

/// Queues a scan at startup and then once per interval until shutdown.
pub(crate) struct ScanScheduler {
    outbound: Arc<OutboundQueue>,
    shutdown: Shutdown,
    multicast_group: Ipv4Addr,
    interval: Duration,
}

impl ScanScheduler {
    pub(crate) fn new(
        outbound: Arc<OutboundQueue>,
        shutdown: Shutdown,
        multicast_group: Ipv4Addr,
        interval: Duration,
    ) -> Self {
        ScanScheduler {
            outbound,
            shutdown,
            multicast_group,
            interval,
        }
    }

    pub(crate) async fn run(self) {
        while !self.shutdown.is_cancelled() {
            match enqueue_scan(&self.outbound, self.multicast_group) {
                Ok(()) => debug!("Scan queued for {}", self.multicast_group),
                Err(err) => warn!("Skipping scan: {err}"),
            }

            if !self.shutdown.sleep(self.interval).await {
                break;
            }
        }
        debug!("Scan scheduler exiting");
    }
}
