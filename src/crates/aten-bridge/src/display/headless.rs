//! Recording display backend.
//!
//! Implements [`DisplayServer`] without any real viewers: every update is
//! recorded and logged.  It serves two purposes:
//!
//! - the binary's diagnostic mode, for soaking the upstream dialect
//!   against a device without wiring up a VNC server backend;
//! - the test suite's observation point, via the paired [`DisplayProbe`],
//!   which can inspect recorded state and inject key events exactly the
//!   way a connected viewer would.

use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use aten_core::FrameBuffer;
use tracing::debug;

use super::{DirtyRect, DisplayServer, KeyEventHandler};

#[derive(Default)]
struct Recorded {
    framebuffer: Option<Arc<FrameBuffer>>,
    desktop_name: Option<String>,
    dirty_rects: Vec<DirtyRect>,
    framebuffer_installs: usize,
}

#[derive(Default)]
struct Shared {
    recorded: Mutex<Recorded>,
    key_handler: Mutex<Option<KeyEventHandler>>,
}

/// A [`DisplayServer`] that records instead of serving.
pub struct HeadlessDisplay {
    shared: Arc<Shared>,
}

/// Observation and injection handle paired with a [`HeadlessDisplay`].
#[derive(Clone)]
pub struct DisplayProbe {
    shared: Arc<Shared>,
}

impl HeadlessDisplay {
    /// Creates the display and its probe.
    pub fn new() -> (Self, DisplayProbe) {
        let shared = Arc::new(Shared::default());
        (
            Self {
                shared: Arc::clone(&shared),
            },
            DisplayProbe { shared },
        )
    }
}

impl DisplayServer for HeadlessDisplay {
    fn set_key_handler(&mut self, handler: KeyEventHandler) {
        *self
            .shared
            .key_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handler);
    }

    fn process_events(&mut self, timeout: Duration) {
        // No viewers to serve; just pace the pump loop.
        thread::sleep(timeout);
    }

    fn replace_framebuffer(&mut self, framebuffer: Arc<FrameBuffer>) {
        let mut recorded = self.lock_recorded();
        recorded.framebuffer = Some(framebuffer);
        recorded.framebuffer_installs += 1;
    }

    fn mark_rect_modified(&mut self, rect: DirtyRect) {
        debug!(
            "display: dirty rect ({}, {})..({}, {})",
            rect.x1, rect.y1, rect.x2, rect.y2
        );
        self.lock_recorded().dirty_rects.push(rect);
    }

    fn set_desktop_name(&mut self, name: String) {
        debug!("display: desktop name {name:?}");
        self.lock_recorded().desktop_name = Some(name);
    }
}

impl HeadlessDisplay {
    fn lock_recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.shared
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplayProbe {
    /// Delivers a key event through the installed handler, as a viewer
    /// would.  Events before the handler is installed are dropped.
    pub fn press_key(&self, down: bool, keysym: u32) {
        let guard = self
            .shared
            .key_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(handler) = guard.as_ref() {
            handler(down, keysym);
        }
    }

    /// The most recently installed framebuffer, if any.
    pub fn framebuffer(&self) -> Option<Arc<FrameBuffer>> {
        self.lock_recorded().framebuffer.clone()
    }

    /// How many framebuffers have been installed so far.
    pub fn framebuffer_installs(&self) -> usize {
        self.lock_recorded().framebuffer_installs
    }

    /// The most recently applied desktop name, if any.
    pub fn desktop_name(&self) -> Option<String> {
        self.lock_recorded().desktop_name.clone()
    }

    /// Every dirty rectangle applied so far, in order.
    pub fn dirty_rects(&self) -> Vec<DirtyRect> {
        self.lock_recorded().dirty_rects.clone()
    }

    fn lock_recorded(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.shared
            .recorded
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
