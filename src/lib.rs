//! # govee_lan_rs
//!
//! An async Rust library for discovering and controlling Govee smart lights
//! over the LAN API.
//!
//! This crate provides a **runtime-agnostic** controller that finds Govee
//! devices with multicast scans, keeps a registry of what they last reported,
//! and sends them power, brightness and color commands.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::net::Ipv4Addr;
//! use govee_lan_rs::{Color, Controller, ControllerConfig};
//!
//! async fn control_light() -> Result<(), govee_lan_rs::Error> {
//!     let controller = Controller::new(ControllerConfig::default());
//!     controller.start()?;
//!
//!     // ...give devices a moment to answer the first scan...
//!
//!     let device = controller.device_by_ip(Ipv4Addr::new(192, 168, 1, 23))?;
//!     device.set_color(Color::rgb(0, 0, 255))?;
//!     device.request_status().await?;
//!     println!("{device} is {}", device.power());
//!
//!     controller.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Runtime Agnostic**: Works with tokio, async-std, or smol async runtimes
//! - **Discovery**: Periodic multicast scans, plus [`Controller::scan_now`]
//! - **RGB Colors**: Set any RGB color using the [`Color`] type
//! - **Brightness**: Control brightness from 0-100% using [`Brightness`]
//! - **Color Temperature**: Set warm to cool white (2000K-9000K) using [`ColorKelvin`]
//! - **Status**: Query a device and wait for its answer with [`Device::request_status`]
//! - **Diagnostics**: Per-device [`MessageHistory`] and [`Controller::diagnostics`]
//!
//! ## Communication
//!
//! Devices answer on UDP port 4002, joined to the multicast group
//! `239.255.255.250`. Scans are sent to that group on port 4001 and commands
//! to each device on port 4003. The LAN API must be enabled for each device
//! in the Govee app.
//!
//! Commands are fire-and-forget: they return once queued, and a device's
//! state only changes when it reports back.
//!
//! ## Runtime Selection
//!
//! This library is runtime-agnostic. Select your preferred runtime using feature flags:
//!
//! ### Using tokio (default)
//!
//! ```toml
//! [dependencies]
//! govee-lan-rs = "0.1"
//! tokio = { version = "1", features = ["rt-multi-thread", "macros"] }
//! ```
//!
//! ### Using async-std
//!
//! ```toml
//! [dependencies]
//! govee-lan-rs = { version = "0.1", default-features = false, features = ["runtime-async-std"] }
//! async-std = { version = "1.12", features = ["attributes"] }
//! ```
//!
//! ### Using smol
//!
//! ```toml
//! [dependencies]
//! govee-lan-rs = { version = "0.1", default-features = false, features = ["runtime-smol"] }
//! smol = "2"
//! ```
//!
//! ## Feature Flags
//!
//! - `runtime-tokio` (default): Use the tokio async runtime
//! - `runtime-async-std`: Use the async-std runtime
//! - `runtime-smol`: Use the smol runtime

mod config;
mod controller;
mod device;
mod discovery;
mod dispatcher;
mod errors;
mod history;
mod listener;
mod payload;
mod queue;
mod registry;
mod response;
pub mod runtime;
mod shutdown;
mod status;
mod types;

/// Encoding and decoding of the `{"msg":{"cmd":..,"data":..}}` envelope.
pub mod envelope {
    pub use crate::payload::{Command, decode, encode};
}

// Re-export public API
pub use config::{COMMAND_PORT, ControllerConfig, LISTEN_PORT, MULTICAST_GROUP, SCAN_PORT};
pub use controller::{Controller, ControllerDiagnostics};
pub use device::Device;
pub use errors::Error;
pub use history::{HistoryEntry, HistorySummary, MessageHistory, MessageType};
pub use payload::{Message, Request};
pub use response::{Response, ScanResponse, StatusResponse};
pub use shutdown::Shutdown;
pub use status::{ACTIVE_WINDOW, DevicePhase, DeviceState};
pub use types::{Brightness, Color, ColorKelvin, PowerState, Version};
