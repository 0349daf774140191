//! Typed constants and message definitions for the ATEN-RFB dialect.

/// The RFB protocol version string exchanged during the handshake.  The
/// device sends its own twelve bytes first; we answer with this literal
/// regardless of what arrived.
pub const RFB_VERSION: &[u8; 12] = b"RFB 003.008\n";

/// The vendor security type the device advertises and the only one the
/// bridge accepts.
pub const SECURITY_TYPE_ATEN: u8 = 16;

/// Length of each of the two NUL-padded credential fields.
pub const CREDENTIAL_FIELD_LEN: usize = 24;

/// Longest usable username or password: one byte must remain for the NUL.
pub const MAX_CREDENTIAL_LEN: usize = CREDENTIAL_FIELD_LEN - 1;

/// Bytes of vendor data following the security-type acknowledgement.
pub const SECURITY_EXTRA_LEN: usize = 24;

/// Bytes of the device's server-init block preceding the name length.
/// Standard RFB would put dimensions and a pixel format here; the device
/// sends data with no usable structure, so it is read and discarded.
pub const SERVER_INIT_LEN: usize = 20;

/// Bytes of vendor data following the desktop name.
pub const POST_NAME_LEN: usize = 12;

/// Width sentinel (`-640` as a 16-bit pattern) of a "no signal" rectangle.
pub const NO_SIGNAL_WIDTH: u16 = 0xFD80;

/// Height sentinel (`-480` as a 16-bit pattern) of a "no signal" rectangle.
pub const NO_SIGNAL_HEIGHT: u16 = 0xFE20;

/// Byte the framebuffer is filled with while the device reports no signal.
pub const NO_SIGNAL_FILL: u8 = 0xF0;

// ── Server-to-client message types ────────────────────────────────────────────

/// Framebuffer update; the only inbound message with decoded content.
pub const MSG_FRAMEBUFFER_UPDATE: u8 = 0;

/// Returns how many payload bytes to read and discard for an inbound
/// message type the bridge recognizes but does not interpret, or `None`
/// for an unknown type (a fatal protocol error).
///
/// Type 4 mirrors our own key-event message; its reply payload is
/// ignored.  The 0x3x types carry device status the bridge has no use
/// for.
pub fn discard_len(message_type: u8) -> Option<usize> {
    match message_type {
        0x04 => Some(20),
        0x16 => Some(1),
        0x37 => Some(2),
        0x39 => Some(264),
        0x3c => Some(8),
        _ => None,
    }
}

// ── Tile encodings within a framebuffer update ────────────────────────────────

/// Tile payload carries 16x16 subrect segments.
pub const TILE_TYPE_SUBRECTS: u8 = 0;

/// Tile payload carries the entire frame in one run.
///
/// The payload's `total_len` counts its own 10-byte header, so a
/// whole-frame tile carries `total_len - 10` pixel bytes.
pub const TILE_TYPE_WHOLE_FRAME: u8 = 1;

// ── Client-to-server actions ──────────────────────────────────────────────────

/// One queued outbound action for the writer thread.
///
/// `Ping` carries no wire form at all: it exists to wake a writer blocked
/// on an empty queue so it can observe session termination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteAction {
    /// A key press or release to forward to the device.
    Key {
        /// `true` for press, `false` for release.
        down: bool,
        /// The X11 KeySym as delivered by the viewer.
        keysym: u32,
    },
    /// A framebuffer update request.
    RequestUpdate {
        /// 1 to request only changed regions, 0 for a full frame.
        incremental: u8,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
    },
    /// Queue wake-up; the writer sends nothing for it.
    Ping,
}

impl WriteAction {
    /// The initial full-frame request sent right after the handshake, and
    /// again whenever the screen reports no signal.
    pub fn full_update() -> Self {
        WriteAction::RequestUpdate {
            incremental: 0,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }
    }

    /// The steady-state request for changed regions only.
    pub fn incremental_update() -> Self {
        WriteAction::RequestUpdate {
            incremental: 1,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        }
    }
}
