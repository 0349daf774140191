//! The ATEN-RFB wire dialect.
//!
//! The device speaks RFB 3.8 on the surface but deviates everywhere that
//! matters: a vendor security type (16) with extra handshake reads, a
//! garbage server-init block, custom server-to-client message types, and
//! a tiled framebuffer encoding of its own.  `messages` defines the typed
//! view of that traffic; `codec` turns it into and out of bytes.

pub mod codec;
pub mod messages;

pub use codec::{ProtocolError, RectHeader, TileHeader};
pub use messages::WriteAction;
