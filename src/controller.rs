//! Composition root: owns the background loops and their shared state.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use futures::channel::mpsc;
use futures::future;
use log::{debug, error, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::config::ControllerConfig;
use crate::device::Device;
use crate::discovery::{self, ScanScheduler};
use crate::dispatcher::Dispatcher;
use crate::errors::Error;
use crate::listener::{Listener, ListenerStats, Router};
use crate::payload::Message;
use crate::queue::OutboundQueue;
use crate::registry::Registry;
use crate::runtime::{self, AsyncUdpSocket, JoinHandle};
use crate::shutdown::Shutdown;

type Result<T> = std::result::Result<T, Error>;

/// Diagnostics for the controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerDiagnostics {
    pub running: bool,
    pub device_count: usize,
    pub active_device_count: usize,
    pub time_since_last_datagram: Option<f64>,
    pub last_error: Option<String>,
}

struct Tasks {
    listener: JoinHandle<()>,
    dispatcher: JoinHandle<()>,
    scheduler: JoinHandle<()>,
    workers: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

/// Discovers and controls Govee devices on the local network.
///
/// The controller runs one listener, one dispatcher and one scan scheduler,
/// plus a worker per discovered device. Devices appear in the registry as
/// soon as they answer a scan.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use govee_lan_rs::{Brightness, Controller, ControllerConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), govee_lan_rs::Error> {
/// let controller = Controller::new(ControllerConfig::default());
/// controller.start()?;
/// tokio::time::sleep(Duration::from_secs(3)).await;
///
/// for device in controller.devices() {
///     println!("{device}");
///     device.set_brightness(Brightness::new(50))?;
/// }
///
/// controller.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct Controller {
    config: ControllerConfig,
    registry: Arc<Registry>,
    outbound: Arc<OutboundQueue>,
    shutdown: Shutdown,
    stats: Arc<ListenerStats>,
    // Handed to the dispatcher by the first successful `start`.
    pending: Mutex<Option<mpsc::Receiver<Message>>>,
    tasks: Mutex<Option<Tasks>>,
    listen_addr: Mutex<Option<SocketAddr>>,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(ControllerConfig::default())
    }
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        let (outbound, receiver) = OutboundQueue::new(config.queue_capacity);
        Controller {
            config,
            registry: Arc::new(Registry::new()),
            outbound: Arc::new(outbound),
            shutdown: Shutdown::new(),
            stats: Arc::new(ListenerStats::default()),
            pending: Mutex::new(Some(receiver)),
            tasks: Mutex::new(None),
            listen_addr: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Bind the listen socket and start the background loops.
    ///
    /// Must be called from within the selected async runtime. If the socket
    /// cannot be bound nothing is started and the call may be retried.
    pub fn start(&self) -> Result<()> {
        if self.shutdown.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let mut pending = self.pending.lock();
        let Some(queue) = pending.take() else {
            return Err(Error::AlreadyStarted);
        };

        let socket = match runtime::bind_multicast(
            self.config.multicast_group,
            self.config.listen_port,
            self.config.join_multicast,
        ) {
            Ok(socket) => socket,
            Err(err) => {
                error!(
                    "Failed to bind listen port {}: {}",
                    self.config.listen_port, err
                );
                *pending = Some(queue);
                return Err(Error::socket("bind", err));
            }
        };
        *self.listen_addr.lock() = socket.local_addr().ok();

        let workers = Arc::new(Mutex::new(Vec::new()));
        let router = Router::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.outbound),
            self.shutdown.clone(),
            self.config.status_timeout(),
            Arc::clone(&workers),
        );
        let listener = Listener::new(
            socket,
            router,
            Arc::clone(&self.stats),
            self.shutdown.clone(),
            self.config.recv_buffer_size,
        );
        let dispatcher = Dispatcher::new(
            queue,
            self.config.multicast_group,
            self.config.scan_port,
            self.config.command_port,
        );
        let scheduler = ScanScheduler::new(
            Arc::clone(&self.outbound),
            self.shutdown.clone(),
            self.config.multicast_group,
            self.config.scan_interval(),
        );

        *self.tasks.lock() = Some(Tasks {
            listener: runtime::spawn(listener.run()),
            dispatcher: runtime::spawn(dispatcher.run()),
            scheduler: runtime::spawn(scheduler.run()),
            workers,
        });
        info!("Controller started");
        Ok(())
    }

    /// Stop every background loop and wait for all of them to exit.
    ///
    /// Pending [`Device::request_status`] calls fail with
    /// [`Error::Cancelled`]. Messages already queued are still sent.
    pub async fn shutdown(&self) {
        info!("Shutting down controller");
        self.shutdown.cancel();

        let tasks = self.tasks.lock().take();
        let Some(tasks) = tasks else {
            self.outbound.close();
            return;
        };

        tasks.listener.await;
        self.outbound.close();
        tasks.dispatcher.await;
        tasks.scheduler.await;

        let workers = std::mem::take(&mut *tasks.workers.lock());
        debug!("Waiting for {} device workers", workers.len());
        future::join_all(workers).await;
        info!("Controller stopped");
    }

    /// Returns true between a successful [`Controller::start`] and shutdown.
    pub fn is_running(&self) -> bool {
        self.tasks.lock().is_some() && !self.shutdown.is_cancelled()
    }

    /// Address of the listen socket, once started.
    pub fn listen_addr(&self) -> Option<SocketAddr> {
        *self.listen_addr.lock()
    }

    /// All known devices, in discovery order.
    pub fn devices(&self) -> Vec<Device> {
        self.registry.devices()
    }

    /// Devices heard from within the last five minutes.
    pub fn active_devices(&self) -> Vec<Device> {
        self.registry
            .devices()
            .into_iter()
            .filter(Device::is_active)
            .collect()
    }

    pub fn device_by_ip(&self, ip: Ipv4Addr) -> Result<Device> {
        self.registry.by_ip(ip)
    }

    pub fn device_by_id(&self, device_id: &str) -> Result<Device> {
        self.registry.by_id(device_id)
    }

    /// Queue a discovery request now, outside the regular interval.
    pub fn scan_now(&self) -> Result<()> {
        discovery::enqueue_scan(&self.outbound, self.config.multicast_group)
    }

    pub fn diagnostics(&self) -> ControllerDiagnostics {
        ControllerDiagnostics {
            running: self.stats.is_running(),
            device_count: self.registry.len(),
            active_device_count: self.active_devices().len(),
            time_since_last_datagram: self
                .stats
                .time_since_last_datagram()
                .map(|t| t.as_secs_f64()),
            last_error: self.stats.last_error(),
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.outbound.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::decode;
    use crate::types::Brightness;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    fn loopback_config() -> ControllerConfig {
        ControllerConfig {
            listen_port: 0,
            join_multicast: false,
            status_timeout_ms: 1000,
            ..ControllerConfig::default()
        }
    }

    /// Answers scan and status requests the way a device would.
    async fn fake_device(socket: UdpSocket, controller_port: u16) {
        let mut buffer = [0u8; 2048];
        loop {
            let Ok((size, _)) = socket.recv_from(&mut buffer).await else {
                return;
            };
            let Ok((cmd, _)) = decode(&buffer[..size]) else {
                continue;
            };
            let reply: &[u8] = match cmd.as_str() {
                "scan" => br#"{"msg":{"cmd":"scan","data":{"ip":"127.0.0.1","device":"AA:BB:CC","sku":"H6008","bleVersionHard":"1.0.0","bleVersionSoft":"1.0.0","wifiVersionHard":"1.0.0","wifiVersionSoft":"1.0.0"}}}"#,
                "devStatus" => br#"{"msg":{"cmd":"devStatus","data":{"onOff":1,"brightness":64,"color":{"r":10,"g":20,"b":30},"colorTemInKelvin":0}}}"#,
                _ => continue,
            };
            let _ = socket.send_to(reply, ("127.0.0.1", controller_port)).await;
        }
    }

    async fn wait_for_device(controller: &Controller, ip: Ipv4Addr) -> Device {
        for _ in 0..100 {
            if let Ok(device) = controller.device_by_ip(ip) {
                return device;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("device {ip} never appeared");
    }

    #[tokio::test]
    async fn test_discovers_and_queries_device() {
        let device_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let device_port = device_socket.local_addr().unwrap().port();

        // Loopback stands in for the multicast group, so scans and commands
        // both reach the fake device.
        let controller = Controller::new(ControllerConfig {
            multicast_group: Ipv4Addr::LOCALHOST,
            scan_port: device_port,
            command_port: device_port,
            ..loopback_config()
        });
        controller.start().unwrap();
        assert!(controller.is_running());
        let controller_port = controller.listen_addr().unwrap().port();
        let responder = tokio::spawn(fake_device(device_socket, controller_port));

        let device = wait_for_device(&controller, Ipv4Addr::LOCALHOST).await;
        for _ in 0..100 {
            if device.sku().is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(controller.device_by_id("AA:BB:CC").unwrap().ip(), Ipv4Addr::LOCALHOST);
        assert_eq!(device.to_string(), "H6008: 127.0.0.1 (AA:BB:CC)");

        device.request_status().await.unwrap();
        assert_eq!(device.brightness(), Brightness::new(64));
        assert!(device.power().is_on());
        assert_eq!(controller.active_devices().len(), 1);

        let diagnostics = controller.diagnostics();
        assert_eq!(diagnostics.device_count, 1);
        assert!(diagnostics.time_since_last_datagram.is_some());

        tokio::time::timeout(Duration::from_secs(2), controller.shutdown())
            .await
            .unwrap();
        assert!(!controller.is_running());
        responder.abort();
    }

    #[tokio::test]
    async fn test_shutdown_does_not_hang() {
        let controller = Controller::new(loopback_config());
        controller.start().unwrap();
        controller.scan_now().unwrap();

        tokio::time::timeout(Duration::from_secs(2), controller.shutdown())
            .await
            .unwrap();
        assert!(!controller.is_running());
        assert!(matches!(
            controller.scan_now(),
            Err(Error::QueueUnavailable { .. })
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_with_busy_senders() {
        let sink = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sink_port = sink.local_addr().unwrap().port();
        let controller = Arc::new(Controller::new(ControllerConfig {
            scan_port: sink_port,
            command_port: sink_port,
            status_timeout_ms: 10_000,
            ..loopback_config()
        }));
        controller.start().unwrap();

        let port = controller.listen_addr().unwrap().port();
        let announcer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        announcer
            .send_to(
                br#"{"msg":{"cmd":"devStatus","data":{"onOff":1,"brightness":50,"color":{"r":1,"g":2,"b":3},"colorTemInKelvin":0}}}"#,
                ("127.0.0.1", port),
            )
            .await
            .unwrap();
        let device = wait_for_device(&controller, Ipv4Addr::LOCALHOST).await;

        let toggler = tokio::spawn({
            let device = device.clone();
            async move {
                let mut sent = 0usize;
                loop {
                    match device.toggle() {
                        Ok(()) => sent += 1,
                        Err(Error::QueueUnavailable { ref reason, .. }) if reason == "closed" => {
                            return sent;
                        }
                        Err(_) => {}
                    }
                    tokio::task::yield_now().await;
                }
            }
        });
        let requests: Vec<_> = (0..2)
            .map(|_| {
                let device = device.clone();
                tokio::spawn(async move { device.request_status().await })
            })
            .collect();
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(3), controller.shutdown())
            .await
            .unwrap();
        assert!(!controller.is_running());

        let sent = tokio::time::timeout(Duration::from_secs(1), toggler)
            .await
            .unwrap()
            .unwrap();
        assert!(sent > 0);
        for request in requests {
            let result = tokio::time::timeout(Duration::from_secs(1), request)
                .await
                .unwrap()
                .unwrap();
            assert!(result.is_err());
        }
    }

    #[tokio::test]
    async fn test_shutdown_cancels_pending_status_request() {
        let controller = Arc::new(Controller::new(ControllerConfig {
            status_timeout_ms: 10_000,
            ..loopback_config()
        }));
        controller.start().unwrap();

        // Announce a device straight to the listen socket.
        let port = controller.listen_addr().unwrap().port();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        sender
            .send_to(
                br#"{"msg":{"cmd":"devStatus","data":{"onOff":0,"brightness":5,"color":{"r":0,"g":0,"b":0},"colorTemInKelvin":3000}}}"#,
                ("127.0.0.1", port),
            )
            .await
            .unwrap();
        let device = wait_for_device(&controller, Ipv4Addr::LOCALHOST).await;

        let waiting = tokio::spawn(async move { device.request_status().await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), controller.shutdown())
            .await
            .unwrap();
        let result = waiting.await.unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        let controller = Controller::new(loopback_config());
        controller.start().unwrap();
        assert!(matches!(controller.start(), Err(Error::AlreadyStarted)));
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_failure_starts_nothing() {
        let blocker = std::net::UdpSocket::bind("0.0.0.0:0").unwrap();
        let port = blocker.local_addr().unwrap().port();

        let controller = Controller::new(ControllerConfig {
            listen_port: port,
            ..loopback_config()
        });
        assert!(matches!(controller.start(), Err(Error::Socket { .. })));
        assert!(!controller.is_running());
        assert!(controller.listen_addr().is_none());

        drop(blocker);
        controller.start().unwrap();
        controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_lookups_before_discovery() {
        let controller = Controller::new(loopback_config());
        assert!(controller.devices().is_empty());
        assert!(matches!(
            controller.device_by_ip(Ipv4Addr::new(10, 0, 0, 1)),
            Err(Error::DeviceNotFound(_))
        ));
        assert!(matches!(
            controller.device_by_id("nope"),
            Err(Error::DeviceNotFound(_))
        ));
    }
}
