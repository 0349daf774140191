//! The upstream writer task: serializes queued actions onto the socket.
//!
//! Runs on its own thread for the life of one session, parked on the
//! action queue's condition variable whenever there is nothing to send.
//! A [`WriteAction::Ping`] produces no bytes; it exists so the reader
//! (or the connection loop) can knock the writer out of that wait when
//! the session is ending.

use std::sync::Arc;

use aten_core::keymap::{self, NO_MAPPING};
use aten_core::protocol::codec::{encode_key_event, encode_update_request};
use aten_core::{NetError, StreamWriter, WriteAction};
use tracing::{debug, warn};

use crate::bridge::BridgeState;
use crate::queue::ActionQueue;

/// Sends queued actions to the device for one session.
pub struct SessionWriter {
    stream: StreamWriter,
    state: Arc<BridgeState>,
    actions: Arc<ActionQueue>,
    network_order_updates: bool,
}

impl SessionWriter {
    pub fn new(
        stream: StreamWriter,
        state: Arc<BridgeState>,
        actions: Arc<ActionQueue>,
        network_order_updates: bool,
    ) -> Self {
        Self {
            stream,
            state,
            actions,
            network_order_updates,
        }
    }

    /// Runs until the session terminates.  A send failure ends the
    /// session: the flag is raised and the socket shut down so the
    /// reader's blocking receive returns too.
    pub fn run(mut self) {
        while !self.state.is_terminating() {
            let action = self.actions.pop_blocking();
            if let Err(e) = self.dispatch(action) {
                warn!("session writer stopping: {e}");
                self.state.set_terminating();
                self.stream.shutdown();
                break;
            }
        }
        debug!("session writer exit");
    }

    fn dispatch(&mut self, action: WriteAction) -> Result<(), NetError> {
        match action {
            WriteAction::Key { down, keysym } => {
                let usage = keymap::usage_for_keysym(keysym);
                debug!(
                    "key {} keysym={keysym:#x} usage={usage:#04x}",
                    if down { "down" } else { "up" }
                );
                // Unmapped keys are dropped rather than sent as usage 0.
                if usage != NO_MAPPING {
                    self.stream.write_all(&encode_key_event(down, usage))?;
                }
            }

            WriteAction::RequestUpdate {
                incremental,
                x,
                y,
                width,
                height,
            } => {
                self.stream.write_all(&encode_update_request(
                    incremental,
                    x,
                    y,
                    width,
                    height,
                    self.network_order_updates,
                ))?;
            }

            WriteAction::Ping => {}
        }
        Ok(())
    }
}
