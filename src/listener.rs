//! Inbound datagram listener and response routing.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, Either};
use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;

use crate::device::Device;
use crate::errors::Error;
use crate::payload;
use crate::queue::OutboundQueue;
use crate::registry::Registry;
use crate::response::Response;
use crate::runtime::{self, AsyncUdpSocket, Instant, JoinHandle, UdpSocket};
use crate::shutdown::Shutdown;

/// Pause after a receive error before reading again.
const RECV_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Listener state shared with the controller for diagnostics.
#[derive(Debug, Default)]
pub(crate) struct ListenerStats {
    running: Mutex<bool>,
    last_datagram: Mutex<Option<Instant>>,
    last_error: Mutex<Option<String>>,
}

impl ListenerStats {
    pub(crate) fn is_running(&self) -> bool {
        *self.running.lock()
    }

    pub(crate) fn time_since_last_datagram(&self) -> Option<Duration> {
        self.last_datagram.lock().map(|t| t.elapsed())
    }

    pub(crate) fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }
}

/// Decodes datagrams and hands each response to the worker of the device
/// it came from, creating the device on first contact.
pub(crate) struct Router {
    registry: Arc<Registry>,
    outbound: Arc<OutboundQueue>,
    shutdown: Shutdown,
    status_timeout: Duration,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl Router {
    pub(crate) fn new(
        registry: Arc<Registry>,
        outbound: Arc<OutboundQueue>,
        shutdown: Shutdown,
        status_timeout: Duration,
        workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
    ) -> Self {
        Router {
            registry,
            outbound,
            shutdown,
            status_timeout,
            workers,
        }
    }

    /// Route one datagram. Malformed datagrams and unknown commands are
    /// logged and dropped without touching the registry.
    pub(crate) fn route(&self, bytes: &[u8], source: SocketAddr) {
        let SocketAddr::V4(source) = source else {
            trace!("Ignoring datagram from {source}");
            return;
        };
        let ip = *source.ip();

        let (cmd, data) = match payload::decode(bytes) {
            Ok(decoded) => decoded,
            Err(err) => {
                error!("Invalid datagram from {ip}: {err}");
                return;
            }
        };

        let response = match Response::decode(&cmd, data) {
            Ok(response) => response,
            Err(Error::UnknownCommand(cmd)) => {
                warn!("Unknown command {cmd:?} from {ip}");
                return;
            }
            Err(err) => {
                error!("Invalid {cmd} response from {ip}: {err}");
                return;
            }
        };

        debug!("Received {cmd} from {ip}");
        self.device_for(ip).route(response);
    }

    fn device_for(&self, ip: Ipv4Addr) -> Device {
        self.registry.get_or_insert_with(ip, || {
            debug!("New device at {ip}");
            let (device, worker) = Device::new(
                ip,
                Arc::clone(&self.outbound),
                self.shutdown.clone(),
                self.status_timeout,
            );
            self.workers.lock().push(runtime::spawn(worker.run()));
            device
        })
    }
}

/// Owns the discovery socket and feeds the router until shutdown.
pub(crate) struct Listener {
    socket: UdpSocket,
    router: Router,
    stats: Arc<ListenerStats>,
    shutdown: Shutdown,
    buffer_size: usize,
}

impl Listener {
    pub(crate) fn new(
        socket: UdpSocket,
        router: Router,
        stats: Arc<ListenerStats>,
        shutdown: Shutdown,
        buffer_size: usize,
    ) -> Self {
        Listener {
            socket,
            router,
            stats,
            shutdown,
            buffer_size,
        }
    }

    /// Receive until shutdown. The socket is closed when this returns.
    pub(crate) async fn run(self) {
        match self.socket.local_addr() {
            Ok(addr) => info!("Listening for device responses on {addr}"),
            Err(err) => warn!("Listening on unknown address: {err}"),
        }
        *self.stats.running.lock() = true;

        let mut buffer = vec![0u8; self.buffer_size];
        let mut cancelled = self.shutdown.cancelled();

        loop {
            let received = {
                let recv = self.socket.recv_from(&mut buffer);
                futures::pin_mut!(recv);
                match future::select(recv, &mut cancelled).await {
                    Either::Left((result, _)) => result,
                    Either::Right(_) => break,
                }
            };

            match received {
                Ok((size, source)) => {
                    *self.stats.last_datagram.lock() = Some(Instant::now());
                    self.router.route(&buffer[..size], source);
                }
                Err(err) => {
                    error!("Listener socket error: {err}");
                    *self.stats.last_error.lock() = Some(err.to_string());
                    if !self.shutdown.sleep(RECV_ERROR_BACKOFF).await {
                        break;
                    }
                }
            }
        }

        *self.stats.running.lock() = false;
        debug!("Listener exiting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEVICE: &str = "192.168.1.23:4003";

    fn router() -> (Router, Arc<Registry>, Arc<Mutex<Vec<JoinHandle<()>>>>) {
        let (queue, _receiver) = OutboundQueue::new(8);
        let registry = Arc::new(Registry::new());
        let workers = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new(
            Arc::clone(&registry),
            Arc::new(queue),
            Shutdown::new(),
            Duration::from_secs(1),
            Arc::clone(&workers),
        );
        (router, registry, workers)
    }

    fn source() -> SocketAddr {
        DEVICE.parse().unwrap()
    }

    const SCAN: &[u8] = br#"{"msg":{"cmd":"scan","data":{"ip":"192.168.1.23","device":"1F:80:C5:32:32:36:72:4E","sku":"H6159","bleVersionHard":"3.01.01","bleVersionSoft":"1.03.01","wifiVersionHard":"1.00.10","wifiVersionSoft":"1.02.03"}}}"#;

    #[tokio::test]
    async fn test_scan_response_registers_device_once() {
        let (router, registry, workers) = router();
        router.route(SCAN, source());
        router.route(SCAN, source());

        assert_eq!(registry.len(), 1);
        assert_eq!(workers.lock().len(), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let device = registry.by_id("1F:80:C5:32:32:36:72:4E").unwrap();
        assert_eq!(device.sku().as_deref(), Some("H6159"));
        assert_eq!(device.history().summary().receive_count, 2);
    }

    #[tokio::test]
    async fn test_status_response_from_new_ip_creates_device() {
        let (router, registry, _workers) = router();
        router.route(
            br#"{"msg":{"cmd":"devStatus","data":{"onOff":1,"brightness":42,"color":{"r":0,"g":0,"b":255},"colorTemInKelvin":0}}}"#,
            source(),
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        let device = registry.by_ip(Ipv4Addr::new(192, 168, 1, 23)).unwrap();
        assert_eq!(device.brightness().value(), 42);
        assert_eq!(device.sku(), None);
    }

    #[tokio::test]
    async fn test_bad_datagrams_are_dropped() {
        let (router, registry, workers) = router();
        router.route(b"hello", source());
        router.route(br#"{"msg":{"cmd":"razer","data":{}}}"#, source());
        router.route(br#"{"msg":{"cmd":"devStatus","data":{"onOff":"yes"}}}"#, source());
        router.route(SCAN, "[::1]:4002".parse().unwrap());

        assert_eq!(registry.len(), 0);
        assert!(workers.lock().is_empty());
    }

    #[tokio::test]
    async fn test_listener_routes_and_stops() {
        let socket = runtime::bind_multicast(Ipv4Addr::new(239, 255, 255, 250), 0, false).unwrap();
        let port = socket.local_addr().unwrap().port();

        let shutdown = Shutdown::new();
        let (queue, _receiver) = OutboundQueue::new(8);
        let registry = Arc::new(Registry::new());
        let stats = Arc::new(ListenerStats::default());
        let router = Router::new(
            Arc::clone(&registry),
            Arc::new(queue),
            shutdown.clone(),
            Duration::from_secs(1),
            Arc::new(Mutex::new(Vec::new())),
        );
        let listener = Listener::new(socket, router, Arc::clone(&stats), shutdown.clone(), 8192);
        let task = tokio::spawn(listener.run());

        let sender = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender.send_to(SCAN, ("127.0.0.1", port)).await.unwrap();

        for _ in 0..50 {
            if registry.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(registry.by_ip(Ipv4Addr::LOCALHOST).is_ok());
        assert!(stats.is_running());
        assert!(stats.time_since_last_datagram().is_some());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!stats.is_running());
    }

    #[tokio::test]
    async fn test_scan_with_missing_fields_registers_device() {
        let (router, registry, _workers) = router();
        router.route(
            br#"{"msg":{"cmd":"scan","data":{"ip":"","device":"AA:BB","sku":"H6072"}}}"#,
            source(),
        );

        assert_eq!(registry.len(), 1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let device = registry.by_id("AA:BB").unwrap();
        assert_eq!(device.ip(), Ipv4Addr::new(192, 168, 1, 23));
        assert_eq!(device.sku().as_deref(), Some("H6072"));
    }

    #[tokio::test]
    async fn test_socket_error_is_recorded_and_shutdown_still_stops() {
        // A connected socket whose peer is gone reports ECONNREFUSED on the
        // next receive.
        let closed_port = {
            let peer = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
            peer.local_addr().unwrap().port()
        };
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        socket
            .connect(&format!("127.0.0.1:{closed_port}"))
            .await
            .unwrap();
        socket.send(b"ping").await.unwrap();

        let shutdown = Shutdown::new();
        let (queue, _receiver) = OutboundQueue::new(8);
        let stats = Arc::new(ListenerStats::default());
        let router = Router::new(
            Arc::new(Registry::new()),
            Arc::new(queue),
            shutdown.clone(),
            Duration::from_secs(1),
            Arc::new(Mutex::new(Vec::new())),
        );
        let listener = Listener::new(socket, router, Arc::clone(&stats), shutdown.clone(), 8192);
        let task = tokio::spawn(listener.run());

        for _ in 0..50 {
            if stats.last_error().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(stats.last_error().is_some());

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(!stats.is_running());
    }
}
