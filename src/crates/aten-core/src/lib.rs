//! # aten-core
//!
//! Shared library for the ATEN iKVM bridge containing the upstream wire
//! protocol, the buffered TCP stream reader, the shared framebuffer, the
//! pixel codec, and the keysym-to-HID translation table.
//!
//! This crate is used by the `aten-bridge` proxy binary. It has no
//! dependencies on UI frameworks or on any particular downstream VNC
//! server implementation.
//!
//! # Architecture overview
//!
//! Certain ATEN IPMI/KVM devices expose their console as an RFB (VNC)
//! endpoint that deviates from the standard in several ways: extra
//! handshake bytes, a vendor security type, custom message types, and a
//! tiled 16x16 framebuffer encoding with a non-standard 16-bit pixel
//! layout.  This crate defines:
//!
//! - **`net`** – A buffered reader/writer over a blocking TCP socket,
//!   tuned for the mix of tiny header reads and whole-frame pixel reads
//!   that the dialect produces.
//!
//! - **`protocol`** – The wire format: message-type dispatch, rectangle
//!   and tile headers, and the serializers for the client-to-device
//!   messages (key events and framebuffer update requests).
//!
//! - **`framebuffer`** – The live 16-bpp screen image, shared between the
//!   upstream decode thread and the downstream display thread.
//!
//! - **`pixel`** – The per-pixel channel reshuffle between the device's
//!   layout and the one advertised downstream.
//!
//! - **`keymap`** – The X11 KeySym to USB HID Usage ID table used to
//!   translate viewer key events into the device's keyboard messages.

pub mod framebuffer;
pub mod keymap;
pub mod net;
pub mod pixel;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `aten_core::Connection` instead of `aten_core::net::Connection`.
pub use framebuffer::FrameBuffer;
pub use net::{Connection, NetError, StreamWriter};
pub use protocol::codec::ProtocolError;
pub use protocol::messages::WriteAction;
