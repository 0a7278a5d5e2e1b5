//! Per-device handles and workers.

use std::fmt;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use futures::channel::{mpsc, oneshot};
use futures::future::{self, Either};
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use serde_json::{Value, json};

use crate::errors::Error;
use crate::history::{MessageHistory, MessageType};
use crate::payload::{Message, Request};
use crate::queue::OutboundQueue;
use crate::response::Response;
use crate::runtime::{self, Instant};
use crate::shutdown::Shutdown;
use crate::status::{DevicePhase, DeviceState};
use crate::types::{Brightness, Color, ColorKelvin, PowerState, Version};

type Result<T> = std::result::Result<T, Error>;

/// A Govee device on the local network.
///
/// `Device` is a cheap, cloneable handle. Commands are enqueued for the
/// controller's dispatcher and return as soon as they are queued; the
/// device's state only changes when the device answers and the listener
/// routes that answer to the device's worker.
///
/// Handles are obtained from a [`Controller`](crate::Controller) once the
/// device has answered a scan or status request.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

struct DeviceInner {
    ip: Ipv4Addr,
    state: RwLock<DeviceState>,
    history: Mutex<MessageHistory>,
    outbound: Arc<OutboundQueue>,
    inbox: mpsc::UnboundedSender<Response>,
    shutdown: Shutdown,
    status_timeout: Duration,
    // At most one status request is waiting at a time.
    status_waiter: Mutex<Option<oneshot::Sender<()>>>,
    request_lock: runtime::Mutex<()>,
}

/// The receiving half of a device: applies routed responses in arrival order.
pub(crate) struct DeviceWorker {
    device: Device,
    inbox: mpsc::UnboundedReceiver<Response>,
}

impl Device {
    pub(crate) fn new(
        ip: Ipv4Addr,
        outbound: Arc<OutboundQueue>,
        shutdown: Shutdown,
        status_timeout: Duration,
    ) -> (Self, DeviceWorker) {
        let (inbox, receiver) = mpsc::unbounded();
        let device = Device {
            inner: Arc::new(DeviceInner {
                ip,
                state: RwLock::new(DeviceState::new(ip)),
                history: Mutex::new(MessageHistory::new()),
                outbound,
                inbox,
                shutdown,
                status_timeout,
                status_waiter: Mutex::new(None),
                request_lock: runtime::Mutex::new(()),
            }),
        };
        let worker = DeviceWorker {
            device: device.clone(),
            inbox: receiver,
        };
        (device, worker)
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.inner.ip
    }

    /// A consistent copy of the device's identity and last reported state.
    pub fn snapshot(&self) -> DeviceState {
        self.inner.state.read().clone()
    }

    pub fn device_id(&self) -> Option<String> {
        self.inner.state.read().device_id().map(String::from)
    }

    pub fn sku(&self) -> Option<String> {
        self.inner.state.read().sku().map(String::from)
    }

    pub fn ble_version_hard(&self) -> Version {
        self.inner.state.read().ble_version_hard()
    }

    pub fn ble_version_soft(&self) -> Version {
        self.inner.state.read().ble_version_soft()
    }

    pub fn wifi_version_hard(&self) -> Version {
        self.inner.state.read().wifi_version_hard()
    }

    pub fn wifi_version_soft(&self) -> Version {
        self.inner.state.read().wifi_version_soft()
    }

    pub fn power(&self) -> PowerState {
        self.inner.state.read().power()
    }

    pub fn brightness(&self) -> Brightness {
        self.inner.state.read().brightness()
    }

    pub fn color(&self) -> Color {
        self.inner.state.read().color()
    }

    pub fn color_kelvin(&self) -> Option<ColorKelvin> {
        self.inner.state.read().color_kelvin()
    }

    pub fn phase(&self) -> DevicePhase {
        self.inner.state.read().phase()
    }

    pub fn last_seen(&self) -> Option<Instant> {
        self.inner.state.read().last_seen()
    }

    pub fn is_active(&self) -> bool {
        self.inner.state.read().is_active()
    }

    pub fn history(&self) -> MessageHistory {
        self.inner.history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.inner.history.lock().clear();
    }

    /// Returns diagnostics including identity, last reported state and history.
    pub fn diagnostics(&self) -> Value {
        let state = self.snapshot();
        let mut diag = json!({
            "ip": state.ip().to_string(),
            "device_id": state.device_id(),
            "sku": state.sku(),
            "phase": format!("{:?}", state.phase()),
            "active": state.is_active(),
            "seconds_since_seen": state.last_seen().map(|seen| seen.elapsed().as_secs_f64()),
            "versions": {
                "ble_hard": state.ble_version_hard().to_string(),
                "ble_soft": state.ble_version_soft().to_string(),
                "wifi_hard": state.wifi_version_hard().to_string(),
                "wifi_soft": state.wifi_version_soft().to_string(),
            },
            "status": {
                "on": state.power().is_on(),
                "brightness": state.brightness().value(),
                "color": state.color().to_string(),
                "color_kelvin": state.color_kelvin().map(|k| k.kelvin()),
            },
        });

        let history = self.inner.history.lock();
        diag["history"] = serde_json::to_value(history.summary()).unwrap_or(Value::Null);
        diag
    }

    pub fn turn_on(&self) -> Result<()> {
        self.send(Request::Turn(PowerState::On))
    }

    pub fn turn_off(&self) -> Result<()> {
        self.send(Request::Turn(PowerState::Off))
    }

    /// Flip the power state.
    ///
    /// The decision is made from the last reported state, which may be stale
    /// if the device was switched by other means since its last status
    /// response. Call [`Device::request_status`] first for a fresh value.
    pub fn toggle(&self) -> Result<()> {
        if self.power().is_on() {
            self.turn_off()
        } else {
            self.turn_on()
        }
    }

    pub fn set_brightness(&self, brightness: Brightness) -> Result<()> {
        self.send(Request::Brightness(brightness))
    }

    /// Show an rgb color. Clears any color temperature on the device.
    pub fn set_color(&self, color: Color) -> Result<()> {
        self.send(Request::Color(color))
    }

    /// Show a white color temperature. The device derives its rgb value.
    pub fn set_color_kelvin(&self, kelvin: ColorKelvin) -> Result<()> {
        self.send(Request::ColorKelvin(kelvin))
    }

    /// Ask the device for its current state and wait for the answer.
    ///
    /// Returns once a status response for this device has been applied, so
    /// [`Device::snapshot`] reflects it. Concurrent calls on the same device
    /// are serialized; the status timeout covers the wait for an earlier
    /// call as well as the wait for the answer. Fails with
    /// [`Error::StatusTimeout`] if no answer arrives in time, leaving the
    /// state untouched, and with [`Error::Cancelled`] if the controller shuts
    /// down first.
    pub async fn request_status(&self) -> Result<()> {
        let timeout = self.inner.status_timeout;
        let started = Instant::now();

        let lock = self.inner.request_lock.lock();
        futures::pin_mut!(lock);
        let acquire = future::select(lock, self.inner.shutdown.cancelled());
        let _guard = match runtime::timeout(timeout, acquire).await {
            Ok(Either::Left((guard, _))) => guard,
            Ok(Either::Right(_)) => return Err(Error::Cancelled),
            Err(runtime::TimedOut) => return Err(self.status_timed_out(timeout)),
        };
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let (tx, rx) = oneshot::channel();
        *self.inner.status_waiter.lock() = Some(tx);

        if let Err(err) = self.send(Request::DevStatus) {
            self.inner.status_waiter.lock().take();
            return Err(err);
        }

        let remaining = timeout.saturating_sub(started.elapsed());
        let wait = future::select(rx, self.inner.shutdown.cancelled());
        let outcome = runtime::timeout(remaining, wait).await;
        self.inner.status_waiter.lock().take();

        match outcome {
            Ok(Either::Left((Ok(()), _))) => {
                debug!("Status of {} updated", self.inner.ip);
                Ok(())
            }
            // The waiter is only dropped unsent when the slot is torn down.
            Ok(Either::Left((Err(oneshot::Canceled), _))) | Ok(Either::Right(_)) => {
                Err(Error::Cancelled)
            }
            Err(runtime::TimedOut) => Err(self.status_timed_out(timeout)),
        }
    }

    fn status_timed_out(&self, timeout: Duration) -> Error {
        let err = Error::StatusTimeout {
            ip: self.inner.ip,
            timeout,
        };
        warn!("{err}");
        self.inner.history.lock().record_error(&err.to_string());
        err
    }

    fn send(&self, request: Request) -> Result<()> {
        let cmd = request.command();
        let data = request.data()?;
        debug!("Queueing {} for {}", cmd, self.inner.ip);

        match self.inner.outbound.enqueue(Message::new(self.inner.ip, request)) {
            Ok(()) => {
                self.inner.history.lock().record(MessageType::Send, cmd, data);
                Ok(())
            }
            Err(err) => {
                warn!("{err}");
                self.inner.history.lock().record_error(&err.to_string());
                Err(err)
            }
        }
    }

    /// Hand a decoded response to this device's worker.
    pub(crate) fn route(&self, response: Response) {
        if self.inner.inbox.unbounded_send(response).is_err() {
            debug!("Worker for {} has exited; dropping response", self.inner.ip);
        }
    }

    fn apply(&self, response: Response) {
        let cmd = response.command();
        self.inner.state.write().apply(&response);

        match response.data() {
            Ok(data) => self.inner.history.lock().record(MessageType::Receive, cmd, data),
            Err(err) => warn!("Failed to record {} from {}: {}", cmd, self.inner.ip, err),
        }

        match response {
            Response::Scan(_) => info!("Discovered {}", self),
            Response::Status(_) => {
                debug!("Applied status for {}", self.inner.ip);
                if let Some(waiter) = self.inner.status_waiter.lock().take() {
                    let _ = waiter.send(());
                }
            }
        }
    }
}

impl DeviceWorker {
    /// Apply routed responses until shutdown.
    pub(crate) async fn run(self) {
        let DeviceWorker { device, mut inbox } = self;
        let mut cancelled = device.inner.shutdown.cancelled();

        loop {
            match future::select(inbox.next(), &mut cancelled).await {
                Either::Left((Some(response), _)) => device.apply(response),
                Either::Left((None, _)) => break,
                Either::Right(_) => break,
            }
        }
        debug!("Worker for {} exiting", device.inner.ip);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.read();
        write!(
            f,
            "{}: {} ({})",
            state.sku().unwrap_or("unknown"),
            state.ip(),
            state.device_id().unwrap_or("unknown")
        )
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("state", &*self.inner.state.read())
            .finish()
    }
}
