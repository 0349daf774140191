//! The upstream reader task: decodes everything the device sends.
//!
//! Runs on its own thread for the life of one session.  The loop reads a
//! one-byte message type and dispatches: framebuffer updates are decoded
//! into the shared framebuffer and turned into [`DisplayUpdate`]s; the
//! other recognized types carry nothing the bridge uses and are read and
//! discarded at their fixed lengths.  Any unrecognized type means the
//! decoder has lost framing, which is fatal to the whole process rather
//! than just the session.

use std::sync::Arc;

use aten_core::framebuffer::TILE_BYTES;
use aten_core::protocol::codec::{
    RectHeader, TileHeader, RECT_HEADER_LEN, TILE_HEADER_WIRE_LEN,
};
use aten_core::protocol::messages::{
    discard_len, MSG_FRAMEBUFFER_UPDATE, NO_SIGNAL_FILL, TILE_TYPE_SUBRECTS,
    TILE_TYPE_WHOLE_FRAME,
};
use aten_core::{Connection, FrameBuffer, ProtocolError, WriteAction};
use tracing::{debug, info, warn};

use crate::bridge::BridgeState;
use crate::display::{DirtyRect, DisplayUpdate};
use crate::queue::{ActionQueue, UpdateQueue};
use crate::session::SessionError;

/// Pixel edge length of one subrect tile, as a coordinate multiplier.
const TILE: u16 = 16;

/// Decodes device traffic for one session.
pub struct SessionReader {
    conn: Connection,
    state: Arc<BridgeState>,
    actions: Arc<ActionQueue>,
    updates: Arc<UpdateQueue>,
}

impl SessionReader {
    pub fn new(
        conn: Connection,
        state: Arc<BridgeState>,
        actions: Arc<ActionQueue>,
        updates: Arc<UpdateQueue>,
    ) -> Self {
        Self {
            conn,
            state,
            actions,
            updates,
        }
    }

    /// Runs until the session terminates, then wakes the writer so it
    /// notices.  The error (if any) is handed back to the connection
    /// loop, which decides between reconnecting and aborting.
    pub fn run(mut self) -> Result<(), SessionError> {
        let result = self.read_loop();
        if let Err(e) = &result {
            warn!("session reader stopping: {e}");
        }

        self.state.set_terminating();
        self.actions.push(WriteAction::Ping);
        self.conn.shutdown();
        debug!("session reader exit");
        result
    }

    fn read_loop(&mut self) -> Result<(), SessionError> {
        while !self.state.is_terminating() {
            let message_type = self.conn.read_u8()?;
            if message_type == MSG_FRAMEBUFFER_UPDATE {
                self.handle_framebuffer_update()?;
            } else {
                let len = discard_len(message_type)
                    .ok_or(ProtocolError::UnknownMessageType(message_type))?;
                self.conn.read_bytes(len)?;
            }
        }
        Ok(())
    }

    /// Decodes one framebuffer-update message and requests the next frame.
    fn handle_framebuffer_update(&mut self) -> Result<(), SessionError> {
        let mut fb = self.state.framebuffer();

        self.conn.read_u8()?; // padding
        let rect_count = self.conn.read_u16_be()?;

        for _ in 0..rect_count {
            let mut header_bytes = [0u8; RECT_HEADER_LEN];
            self.conn.read_exact_into(&mut header_bytes)?;
            let rect = RectHeader::parse(&header_bytes);

            if rect.is_no_signal() {
                if !self.state.screen_off() {
                    info!("upstream reports no signal, blanking the screen");
                    self.state.set_screen_off(true);
                }
                fb.fill(NO_SIGNAL_FILL);
                self.updates.push(DisplayUpdate::MarkRect(DirtyRect::full(&fb)));
            } else {
                if self.state.screen_off() {
                    info!("upstream signal restored");
                    self.state.set_screen_off(false);
                }
                if rect.width != fb.width() || rect.height != fb.height() {
                    info!(
                        "framebuffer resize {}x{} -> {}x{}",
                        fb.width(),
                        fb.height(),
                        rect.width,
                        rect.height
                    );
                    fb = FrameBuffer::new(rect.width, rect.height);
                    self.state.install_framebuffer(Arc::clone(&fb));
                    self.updates
                        .push(DisplayUpdate::ReplaceFramebuffer(Arc::clone(&fb)));
                }
            }

            // A no-signal rectangle carries no tile payload at all.
            if !self.state.screen_off() {
                self.decode_tile_payload(&fb)?;
            }
        }

        // Ask for the next frame straight away: incremental while live,
        // full once the signal returns from a blank period.
        let request = if self.state.screen_off() {
            WriteAction::full_update()
        } else {
            WriteAction::incremental_update()
        };
        self.actions.push(request);
        Ok(())
    }

    fn decode_tile_payload(&mut self, fb: &Arc<FrameBuffer>) -> Result<(), SessionError> {
        let mut header_bytes = [0u8; TILE_HEADER_WIRE_LEN];
        self.conn.read_exact_into(&mut header_bytes)?;
        let tile = TileHeader::parse(&header_bytes);

        match tile.tile_type {
            TILE_TYPE_SUBRECTS => {
                let mut bounds: Option<DirtyRect> = None;

                for _ in 0..tile.segments {
                    self.conn.read_bytes(4)?; // per-segment preamble, unused
                    let tile_y = self.conn.read_u8()?;
                    let tile_x = self.conn.read_u8()?;
                    let data = self.conn.read_bytes(TILE_BYTES)?;
                    fb.blit_tile(tile_x, tile_y, data);

                    let rect = DirtyRect {
                        x1: u16::from(tile_x) * TILE,
                        y1: u16::from(tile_y) * TILE,
                        x2: (u16::from(tile_x) + 1) * TILE,
                        y2: (u16::from(tile_y) + 1) * TILE,
                    };
                    bounds = Some(match bounds {
                        None => rect,
                        Some(merged) => merged.union(rect),
                    });
                }

                if let Some(rect) = bounds {
                    self.updates.push(DisplayUpdate::MarkRect(rect));
                }
            }

            TILE_TYPE_WHOLE_FRAME => {
                let pixel_bytes = tile
                    .total_len
                    .checked_sub(TILE_HEADER_WIRE_LEN as u32)
                    .ok_or(ProtocolError::ShortTilePayload(tile.total_len))?;
                let data = self.conn.read_bytes(pixel_bytes as usize)?;
                fb.blit_full(data);
                self.updates.push(DisplayUpdate::MarkRect(DirtyRect::full(fb)));
            }

            other => return Err(ProtocolError::UnknownTileEncoding(other).into()),
        }

        Ok(())
    }
}
