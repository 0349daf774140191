//! Byte-level encoding and decoding for the ATEN-RFB dialect.
//!
//! All multi-byte fields on the wire are big-endian, with one deliberate
//! exception: the 16-bit coordinate fields of the outbound framebuffer
//! update request, which the device expects in the host's native order.
//! See [`encode_update_request`].

use thiserror::Error;

use super::messages::{CREDENTIAL_FIELD_LEN, NO_SIGNAL_HEIGHT, NO_SIGNAL_WIDTH};

/// Errors that indicate the upstream byte stream has left the dialect.
///
/// Unlike I/O failures these are not survivable by reconnecting: an
/// unknown message or tile type means the decoder has lost framing and
/// any further bytes would be misinterpreted, so the session controller
/// treats them as fatal.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// The device sent a message type outside the known dispatch table.
    #[error("unknown upstream message type 0x{0:02X}")]
    UnknownMessageType(u8),

    /// A framebuffer update carried a tile encoding we cannot decode.
    #[error("unknown tile encoding {0}")]
    UnknownTileEncoding(u8),

    /// A whole-frame tile declared fewer bytes than its own header.
    #[error("tile payload length {0} is shorter than its 10-byte header")]
    ShortTilePayload(u32),

    /// The device offered a security list not led by the vendor type.
    #[error("unsupported security type {0}")]
    UnsupportedSecurity(u8),
}

// ── Inbound headers ───────────────────────────────────────────────────────────

/// Header of one rectangle within a framebuffer update message.
///
/// Wire layout (all big-endian):
/// `[x:2][y:2][width:2][height:2][encoding:4][unknown:4][data_len:4]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RectHeader {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub encoding: u32,
    /// Purpose unestablished; carried for logging only.
    pub unknown: u32,
    pub data_len: u32,
}

/// Byte length of a [`RectHeader`] on the wire.
pub const RECT_HEADER_LEN: usize = 20;

impl RectHeader {
    /// Decodes a rectangle header from its 20 wire bytes.
    pub fn parse(bytes: &[u8; RECT_HEADER_LEN]) -> Self {
        Self {
            x: u16::from_be_bytes([bytes[0], bytes[1]]),
            y: u16::from_be_bytes([bytes[2], bytes[3]]),
            width: u16::from_be_bytes([bytes[4], bytes[5]]),
            height: u16::from_be_bytes([bytes[6], bytes[7]]),
            encoding: u32::from_be_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]),
            unknown: u32::from_be_bytes([bytes[12], bytes[13], bytes[14], bytes[15]]),
            data_len: u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]),
        }
    }

    /// True when the dimensions carry the "no signal" sentinel
    /// (the bit patterns of -640 and -480 in 16 bits).
    pub fn is_no_signal(&self) -> bool {
        self.width == NO_SIGNAL_WIDTH && self.height == NO_SIGNAL_HEIGHT
    }
}

/// Header of the tile payload that follows a live rectangle header.
///
/// Wire layout: `[type:1][pad:1][segments:4 BE][total_len:4 BE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileHeader {
    pub tile_type: u8,
    pub segments: u32,
    pub total_len: u32,
}

/// Byte length of a [`TileHeader`] on the wire.
pub const TILE_HEADER_WIRE_LEN: usize = 10;

impl TileHeader {
    /// Decodes a tile header from its 10 wire bytes.
    pub fn parse(bytes: &[u8; TILE_HEADER_WIRE_LEN]) -> Self {
        Self {
            tile_type: bytes[0],
            segments: u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]),
            total_len: u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
        }
    }
}

// ── Outbound records ──────────────────────────────────────────────────────────

/// Byte length of the key event record.
pub const KEY_EVENT_LEN: usize = 17;

/// Encodes a key event: message type 4, the press flag, and the HID
/// usage as a big-endian `u32`, padded to 17 bytes.
///
/// Layout: `[4][pad][down][pad:2][usage:4 BE][pad:9]`.
pub fn encode_key_event(down: bool, usage: u8) -> [u8; KEY_EVENT_LEN] {
    let mut buf = [0u8; KEY_EVENT_LEN];
    buf[0] = 4;
    buf[2] = down as u8;
    buf[5..9].copy_from_slice(&u32::from(usage).to_be_bytes());
    buf
}

/// Byte length of the framebuffer update request record.
pub const UPDATE_REQUEST_LEN: usize = 10;

/// Encodes a framebuffer update request: message type 3, the incremental
/// flag, and four 16-bit coordinates.
///
/// The device has only ever been observed honouring coordinates in the
/// host's native byte order, not the network order the RFB specification
/// calls for.  `network_order` selects the spec-compliant form for
/// devices that turn out to want it.
pub fn encode_update_request(
    incremental: u8,
    x: u16,
    y: u16,
    width: u16,
    height: u16,
    network_order: bool,
) -> [u8; UPDATE_REQUEST_LEN] {
    let put: fn(u16) -> [u8; 2] = if network_order {
        u16::to_be_bytes
    } else {
        u16::to_ne_bytes
    };

    let mut buf = [0u8; UPDATE_REQUEST_LEN];
    buf[0] = 3;
    buf[1] = incremental;
    buf[2..4].copy_from_slice(&put(x));
    buf[4..6].copy_from_slice(&put(y));
    buf[6..8].copy_from_slice(&put(width));
    buf[8..10].copy_from_slice(&put(height));
    buf
}

/// Encodes the 48-byte credentials record: two fixed-length NUL-padded
/// fields.  Inputs longer than 23 bytes are truncated so the final byte
/// of each field always stays NUL.
pub fn encode_credentials(username: &str, password: &str) -> [u8; 2 * CREDENTIAL_FIELD_LEN] {
    let mut buf = [0u8; 2 * CREDENTIAL_FIELD_LEN];
    copy_credential(&mut buf[..CREDENTIAL_FIELD_LEN], username);
    copy_credential(&mut buf[CREDENTIAL_FIELD_LEN..], password);
    buf
}

fn copy_credential(field: &mut [u8], value: &str) {
    let bytes = value.as_bytes();
    let len = bytes.len().min(field.len() - 1);
    field[..len].copy_from_slice(&bytes[..len]);
}

// ── Tests ─────────────────────────────────────────────────────────────────────
