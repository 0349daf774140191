//! ATEN iKVM bridge — entry point.
//!
//! Connects to an ATEN IPMI/KVM console's RFB endpoint and re-exposes the
//! live screen and keyboard through a [`DisplayServer`] backend.  This
//! binary ships with the recording backend wired in; a deployment with a
//! real VNC server library implements [`DisplayServer`] for it and swaps
//! it in here.
//!
//! # Usage
//!
//! ```text
//! aten-bridge [OPTIONS] --username <USERNAME> --password <PASSWORD>
//!
//! Options:
//!   --host <HOST>              Device host name or address [default: localhost]
//!   --port <PORT>              Device RFB port [default: 5901]
//!   --username <USERNAME>      Login name, at most 23 bytes
//!   --password <PASSWORD>      Password, at most 23 bytes
//!   --initial-width <PIXELS>   Framebuffer width before the device reports one [default: 640]
//!   --initial-height <PIXELS>  Framebuffer height before the device reports one [default: 480]
//!   --reconnect-delay <SECS>   Pause between reconnect attempts [default: 1]
//!   --net-order-update-requests  Spec-compliant byte order for update requests
//! ```
//!
//! Every option can also come from an `ATEN_*` environment variable;
//! CLI arguments win when both are present.

use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use aten_bridge::display::headless::HeadlessDisplay;
use aten_bridge::display::DisplayServer;
use aten_bridge::{Bridge, ProxyConfig};

/// Protocol-translating VNC proxy for ATEN iKVM consoles.
#[derive(Debug, Parser)]
#[command(
    name = "aten-bridge",
    about = "Re-exposes an ATEN iKVM console as a standards-compliant VNC desktop",
    version
)]
struct Cli {
    /// Host name or IP address of the device's RFB endpoint.
    #[arg(long, default_value = "localhost", env = "ATEN_HOST")]
    host: String,

    /// TCP port of the device's RFB endpoint.
    #[arg(long, default_value_t = 5901, env = "ATEN_PORT")]
    port: u16,

    /// Login name; must fit the device's 24-byte field with its NUL.
    #[arg(long, env = "ATEN_USERNAME")]
    username: String,

    /// Password; same 23-byte limit as the username.
    #[arg(long, env = "ATEN_PASSWORD", hide_env_values = true)]
    password: String,

    /// Framebuffer width advertised until the device reports its own.
    #[arg(long, default_value_t = 640, env = "ATEN_INITIAL_WIDTH")]
    initial_width: u16,

    /// Framebuffer height advertised until the device reports its own.
    #[arg(long, default_value_t = 480, env = "ATEN_INITIAL_HEIGHT")]
    initial_height: u16,

    /// Seconds to wait between reconnect attempts.
    #[arg(long, default_value_t = 1, env = "ATEN_RECONNECT_DELAY")]
    reconnect_delay: u64,

    /// Encode update-request coordinates in network byte order, for
    /// devices that follow the RFB specification instead of the
    /// behaviour this bridge was built against.
    #[arg(long, env = "ATEN_NET_ORDER_UPDATE_REQUESTS")]
    net_order_update_requests: bool,
}

impl Cli {
    fn into_proxy_config(self) -> ProxyConfig {
        ProxyConfig {
            host: self.host,
            port: self.port,
            username: self.username,
            password: self.password,
            initial_width: self.initial_width,
            initial_height: self.initial_height,
            reconnect_delay: Duration::from_secs(self.reconnect_delay),
            network_order_updates: self.net_order_update_requests,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Structured logging; level overridden by `RUST_LOG`, `info` default.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_proxy_config();
    config.validate().context("invalid configuration")?;

    info!(
        "aten-bridge starting — upstream {}:{}",
        config.host, config.port
    );

    // No VNC server backend is compiled into this binary; the recording
    // display logs traffic, which is what the diagnostic mode is for.
    let (display, _probe) = HeadlessDisplay::new();
    let display: Box<dyn DisplayServer> = Box::new(display);

    let bridge = Bridge::new(config);
    bridge.run(display).context("bridge terminated")?;
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
