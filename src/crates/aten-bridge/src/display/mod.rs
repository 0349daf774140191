//! The downstream display boundary.
//!
//! The bridge does not implement a VNC server of its own; it drives one
//! through the [`DisplayServer`] trait, which models the handful of
//! operations every RFB server library exposes: stepping its client
//! event loop, swapping the framebuffer, marking regions dirty, renaming
//! the desktop, and delivering viewer key events through a callback.
//!
//! A dedicated pump thread owns the server object for its whole life —
//! it stays up across upstream reconnects — and alternates between
//! stepping the server and applying whatever [`DisplayUpdate`]s the
//! session reader has queued.
//!
//! [`headless::HeadlessDisplay`] is the built-in implementation: a
//! recording backend used by the test suite and as the binary's
//! diagnostic mode when no real server backend is wired in.

pub mod headless;

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use aten_core::FrameBuffer;
use tracing::debug;

use crate::queue::UpdateQueue;

/// How long one pump iteration lets the display server run before the
/// update queue is checked again.
const PUMP_STEP: Duration = Duration::from_millis(10);

/// Callback type for viewer key events: `(down, keysym)`.
pub type KeyEventHandler = Box<dyn Fn(bool, u32) + Send + Sync>;

/// The 16-bpp format advertised to viewers, matching the upstream pixels
/// after reformatting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    pub bits_per_pixel: u8,
    pub red_bits: u8,
    pub green_bits: u8,
    pub blue_bits: u8,
}

/// The one format the bridge produces.
pub const DEVICE_PIXEL_FORMAT: PixelFormat = PixelFormat {
    bits_per_pixel: 16,
    red_bits: 5,
    green_bits: 3,
    blue_bits: 2,
};

/// A half-open region of the framebuffer that changed: pixels with
/// `x1 <= x < x2` and `y1 <= y < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirtyRect {
    pub x1: u16,
    pub y1: u16,
    pub x2: u16,
    pub y2: u16,
}

impl DirtyRect {
    /// The full extent of `framebuffer`.
    pub fn full(framebuffer: &FrameBuffer) -> Self {
        Self {
            x1: 0,
            y1: 0,
            x2: framebuffer.width(),
            y2: framebuffer.height(),
        }
    }

    /// The smallest rectangle covering both inputs.
    pub fn union(self, other: Self) -> Self {
        Self {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }
}

/// One queued state change for the display side.
#[derive(Debug)]
pub enum DisplayUpdate {
    /// Install a new framebuffer (the screen was resized).  The previous
    /// buffer stays alive until the display server drops its reference.
    ReplaceFramebuffer(Arc<FrameBuffer>),
    /// Retransmit a region of the current framebuffer.
    MarkRect(DirtyRect),
    /// The device reported a new desktop name.  Ownership of the string
    /// moves to the display server; any previously installed name is
    /// simply dropped.
    SetDesktopName(String),
}

/// The operations the bridge needs from an RFB server implementation.
///
/// Implementations advertise [`DEVICE_PIXEL_FORMAT`] to their viewers;
/// the framebuffers handed over are always in that format.
pub trait DisplayServer: Send {
    /// Installs the callback invoked for every viewer key event.  Called
    /// once, before the first [`DisplayServer::process_events`].
    fn set_key_handler(&mut self, handler: KeyEventHandler);

    /// Runs the server's own event handling for up to `timeout`.
    fn process_events(&mut self, timeout: Duration);

    /// Switches to a new framebuffer, releasing the previous one.
    fn replace_framebuffer(&mut self, framebuffer: Arc<FrameBuffer>);

    /// Schedules a region of the current framebuffer for retransmission.
    fn mark_rect_modified(&mut self, rect: DirtyRect);

    /// Updates the advertised desktop name.
    fn set_desktop_name(&mut self, name: String);
}

/// Starts the display pump thread.
///
/// The pump owns `display` until process exit: upstream sessions come and
/// go, but viewers stay connected to the same server throughout.
pub fn spawn_display_pump(
    mut display: Box<dyn DisplayServer>,
    updates: Arc<UpdateQueue>,
) -> JoinHandle<()> {
    thread::spawn(move || loop {
        display.process_events(PUMP_STEP);

        for update in updates.drain() {
            match update {
                DisplayUpdate::ReplaceFramebuffer(framebuffer) => {
                    debug!(
                        "display: install {}x{} framebuffer",
                        framebuffer.width(),
                        framebuffer.height()
                    );
                    display.replace_framebuffer(framebuffer);
                }
                DisplayUpdate::MarkRect(rect) => display.mark_rect_modified(rect),
                DisplayUpdate::SetDesktopName(name) => display.set_desktop_name(name),
            }
        }
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
