//! # aten-bridge
//!
//! A protocol-translating VNC proxy for ATEN iKVM consoles.
//!
//! The bridge connects as a client to the console's non-standard RFB
//! endpoint, decodes its tiled framebuffer encoding into a shared
//! 16-bpp image, and drives a pluggable [`display::DisplayServer`] that
//! re-exposes the screen and keyboard to ordinary VNC viewers.
//!
//! ```text
//! VNC viewer ⇄ DisplayServer ⇄ Bridge ⇄ ATEN device
//! ```
//!
//! See [`bridge::Bridge`] for the controller and thread layout,
//! [`session`] for the upstream protocol handling, and
//! [`display::headless::HeadlessDisplay`] for the built-in recording
//! backend.

pub mod bridge;
pub mod config;
pub mod display;
pub mod queue;
pub mod session;

pub use bridge::Bridge;
pub use config::ProxyConfig;
pub use session::SessionError;
