//! CLI application for controlling Govee lights.
//!
//! Starts a controller, waits for devices to answer the discovery scan and
//! then runs one command against them.
//!
//! Run with: cargo run --example govee_cli -- --help
//! Set RUST_LOG=debug to see the controller's traffic.

use clap::{Parser, Subcommand};
use govee_lan_rs::{Brightness, Color, ColorKelvin, Controller, ControllerConfig, Device};
use std::net::Ipv4Addr;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "govee-cli")]
#[command(about = "Control Govee smart lights over the LAN API", long_about = None)]
struct Cli {
    /// IP address of the Govee device (not required for list command)
    #[arg(short, long, global = true)]
    ip: Option<Ipv4Addr>,

    /// Seconds to wait for devices to answer the discovery scan
    #[arg(short, long, global = true, default_value = "3")]
    wait: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List all devices that answered the scan
    List,

    /// Query and print the current state of the device
    Status,

    /// Turn the device on
    On,

    /// Turn the device off
    Off,

    /// Toggle the device on/off
    Toggle,

    /// Set brightness (0-100)
    Brightness {
        #[arg(value_parser = clap::value_parser!(u32).range(0..=100))]
        level: u32,
    },

    /// Set RGB color (0-255 for each component)
    Color {
        red: u8,
        green: u8,
        blue: u8,
    },

    /// Set color temperature in Kelvin (2000-9000)
    Kelvin {
        #[arg(value_parser = clap::value_parser!(u32).range(2000..=9000))]
        kelvin: u32,
    },
}

fn print_device(device: &Device) {
    let state = device.snapshot();
    println!("{device}");
    println!("  Power: {}", state.power());
    println!("  Brightness: {}", state.brightness());
    match state.color_kelvin() {
        Some(kelvin) => println!("  Temperature: {kelvin}"),
        None => println!("  Color: {}", state.color()),
    }
}

async fn run(controller: &Controller, cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if let Commands::List = cli.command {
        let devices = controller.devices();
        if devices.is_empty() {
            println!("No devices found on the network.");
        } else {
            println!("Found {} device(s):", devices.len());
            for device in devices {
                println!(
                    "  {}  ble {}/{}  wifi {}/{}",
                    device,
                    device.ble_version_hard(),
                    device.ble_version_soft(),
                    device.wifi_version_hard(),
                    device.wifi_version_soft()
                );
            }
        }
        return Ok(());
    }

    // All other commands require an IP address
    let ip = cli
        .ip
        .ok_or("IP address is required for this command. Use --ip <IP>")?;
    let device = controller.device_by_ip(ip)?;

    match cli.command {
        Commands::List => unreachable!(),
        Commands::Status => {
            device.request_status().await?;
            print_device(&device);
            return Ok(());
        }
        Commands::On => device.turn_on()?,
        Commands::Off => device.turn_off()?,
        Commands::Toggle => {
            // Refresh the cached power state so the toggle goes the right way.
            device.request_status().await?;
            device.toggle()?;
        }
        Commands::Brightness { level } => device.set_brightness(Brightness::new(level))?,
        Commands::Color { red, green, blue } => device.set_color(Color::rgb(red, green, blue))?,
        Commands::Kelvin { kelvin } => device.set_color_kelvin(ColorKelvin::new(kelvin))?,
    }

    println!("Command sent to {device}");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let controller = Controller::new(ControllerConfig::default());
    controller.start()?;

    println!("Waiting {}s for devices to answer...", cli.wait);
    tokio::time::sleep(Duration::from_secs(cli.wait)).await;

    let result = run(&controller, cli).await;

    // Queued commands are still sent during shutdown.
    controller.shutdown().await;
    result
}
