//! The bridge controller: owns the queues, the shared session state, and
//! the connection loop.
//!
//! Thread layout while a session is live:
//!
//! ```text
//! display pump ── DisplayServer ──▶ viewers
//!      ▲  drains UpdateQueue
//!      │
//! session reader ◀── device socket ◀── session writer
//!      │  decodes, blits                   ▲  drains ActionQueue
//!      │                                   │
//!      └── connection loop (this module) ──┘
//! ```
//!
//! The pump outlives every session; the reader and writer are respawned
//! per connection attempt.  Transport failures recycle the connection
//! after a short pause, protocol failures abort the process, and the
//! display side never notices either beyond a momentarily frozen image.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use aten_core::{Connection, FrameBuffer, WriteAction};
use tracing::{error, info, warn};

use crate::config::ProxyConfig;
use crate::display::{spawn_display_pump, DisplayServer};
use crate::queue::{ActionQueue, UpdateQueue};
use crate::session::reader::SessionReader;
use crate::session::writer::SessionWriter;
use crate::session::{self, SessionError};

/// State shared by the worker threads and surviving across sessions.
pub struct BridgeState {
    /// The framebuffer the reader currently decodes into.  Only the
    /// reader replaces it; the display side receives its own reference
    /// through the update queue.
    framebuffer: Mutex<Arc<FrameBuffer>>,
    /// Set while the device reports no video signal.
    screen_off: AtomicBool,
    /// Cooperative end-of-session flag, cleared between attempts.
    terminating: AtomicBool,
}

impl BridgeState {
    fn new(framebuffer: Arc<FrameBuffer>) -> Self {
        Self {
            framebuffer: Mutex::new(framebuffer),
            screen_off: AtomicBool::new(false),
            terminating: AtomicBool::new(false),
        }
    }

    /// The framebuffer decoding currently targets.
    pub fn framebuffer(&self) -> Arc<FrameBuffer> {
        Arc::clone(&self.framebuffer.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Makes `framebuffer` the decode target (the screen was resized).
    pub fn install_framebuffer(&self, framebuffer: Arc<FrameBuffer>) {
        *self.framebuffer.lock().unwrap_or_else(PoisonError::into_inner) = framebuffer;
    }

    pub fn screen_off(&self) -> bool {
        self.screen_off.load(Ordering::Relaxed)
    }

    pub fn set_screen_off(&self, off: bool) {
        self.screen_off.store(off, Ordering::Relaxed);
    }

    pub fn is_terminating(&self) -> bool {
        self.terminating.load(Ordering::Relaxed)
    }

    pub fn set_terminating(&self) {
        self.terminating.store(true, Ordering::Relaxed);
    }

    fn clear_terminating(&self) {
        self.terminating.store(false, Ordering::Relaxed);
    }
}

/// The proxy: upstream connection management on one side, a
/// [`DisplayServer`] on the other.
pub struct Bridge {
    config: ProxyConfig,
    state: Arc<BridgeState>,
    actions: Arc<ActionQueue>,
    updates: Arc<UpdateQueue>,
}

impl Bridge {
    /// Creates the bridge with a zeroed framebuffer of the configured
    /// initial dimensions.
    pub fn new(config: ProxyConfig) -> Self {
        let framebuffer = FrameBuffer::new(config.initial_width, config.initial_height);
        Self {
            config,
            state: Arc::new(BridgeState::new(framebuffer)),
            actions: Arc::new(ActionQueue::new()),
            updates: Arc::new(UpdateQueue::new()),
        }
    }

    /// Wires `display` to the bridge and starts its pump thread: the key
    /// handler feeds the action queue, and the initial framebuffer is
    /// installed before the pump takes over.
    ///
    /// The pump runs until process exit; the returned handle is only
    /// useful for keeping it observable.
    pub fn attach_display(&self, mut display: Box<dyn DisplayServer>) -> JoinHandle<()> {
        let actions = Arc::clone(&self.actions);
        display.set_key_handler(Box::new(move |down, keysym| {
            actions.push(WriteAction::Key { down, keysym });
        }));
        display.replace_framebuffer(self.state.framebuffer());

        spawn_display_pump(display, Arc::clone(&self.updates))
    }

    /// Runs one connection attempt: connect, handshake, service the
    /// session until it ends.
    ///
    /// # Errors
    ///
    /// Returns whatever ended the attempt — including the ordinary
    /// end-of-session cases such as [`aten_core::NetError::PeerClosed`].
    /// `Ok(())` means the session wound down without the reader seeing
    /// an error of its own (for instance after a writer-side failure).
    pub fn run_session(&self) -> Result<(), SessionError> {
        let mut conn = Connection::connect(&self.config.host, self.config.port)?;
        session::handshake(&mut conn, &self.config, &self.updates)?;

        // Kick off streaming with one full-frame request.
        self.actions.push(WriteAction::full_update());

        let writer = SessionWriter::new(
            conn.writer()?,
            Arc::clone(&self.state),
            Arc::clone(&self.actions),
            self.config.network_order_updates,
        );
        let reader = SessionReader::new(
            conn,
            Arc::clone(&self.state),
            Arc::clone(&self.actions),
            Arc::clone(&self.updates),
        );

        let writer_handle = thread::spawn(move || writer.run());
        let reader_handle = thread::spawn(move || reader.run());

        let reader_result = reader_handle.join();
        if writer_handle.join().is_err() {
            error!("session writer panicked");
        }

        match reader_result {
            Ok(result) => result,
            Err(_) => {
                error!("session reader panicked");
                Ok(())
            }
        }
    }

    /// Attaches `display` and services upstream connections forever,
    /// pausing between attempts.
    ///
    /// # Errors
    ///
    /// Returns only on a fatal session error (see
    /// [`SessionError::is_fatal`]).
    pub fn run(&self, display: Box<dyn DisplayServer>) -> Result<(), SessionError> {
        let _pump = self.attach_display(display);

        info!(
            "bridging {}:{} (initial {}x{})",
            self.config.host, self.config.port, self.config.initial_width, self.config.initial_height
        );

        loop {
            match self.run_session() {
                Ok(()) => info!("session ended"),
                Err(e) if e.is_fatal() => {
                    error!("fatal session error: {e}");
                    return Err(e);
                }
                Err(e) => warn!("connection error: {e}"),
            }

            self.state.clear_terminating();
            thread::sleep(self.config.reconnect_delay);
        }
    }
}
