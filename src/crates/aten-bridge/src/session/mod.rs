//! One upstream connection's lifetime: the handshake exchange and the two
//! worker tasks that service it afterwards.
//!
//! The handshake runs single-threaded on the connection-loop thread.
//! Once it succeeds, the connection is split: [`reader::SessionReader`]
//! takes the buffered connection and decodes everything the device
//! sends, while [`writer::SessionWriter`] takes a cloned write handle
//! and drains the action queue.  Either side can end the session; the
//! other observes it through the shared terminating flag, the `Ping`
//! wake-up, or the socket shutdown.

pub mod reader;
pub mod writer;

use aten_core::protocol::codec::encode_credentials;
use aten_core::protocol::messages::{
    POST_NAME_LEN, RFB_VERSION, SECURITY_EXTRA_LEN, SECURITY_TYPE_ATEN, SERVER_INIT_LEN,
};
use aten_core::{Connection, NetError, ProtocolError};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ProxyConfig;
use crate::display::DisplayUpdate;
use crate::queue::UpdateQueue;

/// Everything that can end an upstream session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport-level failure; survivable by reconnecting.
    #[error(transparent)]
    Net(#[from] NetError),

    /// The byte stream left the dialect; fatal, reconnecting would only
    /// misdecode the same stream again.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The device rejected the credentials.
    #[error("device rejected the credentials (status {0})")]
    AuthFailed(u32),
}

impl SessionError {
    /// True for errors the connection loop must not retry past.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::Protocol(_))
    }
}

/// Performs the device's variant of the RFB 3.8 handshake.
///
/// The exchange, in order: version strings (the device's twelve bytes are
/// ignored), the security list (must lead with the vendor type 16), 24
/// bytes of vendor data, the 48-byte credentials record, a 32-bit status
/// word, the shared-session client-init byte, the unusable server-init
/// block, the desktop name, and a final 12 vendor bytes.  The name is the
/// only thing worth keeping; it is forwarded to the display side.
///
/// # Errors
///
/// [`SessionError::AuthFailed`] on a non-zero status word,
/// [`ProtocolError::UnsupportedSecurity`] if the vendor type is missing,
/// or any transport error.
pub fn handshake(
    conn: &mut Connection,
    config: &ProxyConfig,
    updates: &UpdateQueue,
) -> Result<(), SessionError> {
    conn.read_bytes(RFB_VERSION.len())?;
    conn.write_all(RFB_VERSION)?;

    let security_count = conn.read_u8()? as usize;
    let security_types = conn.read_bytes(security_count)?;
    let offered = security_types.first().copied().unwrap_or(0);
    if offered != SECURITY_TYPE_ATEN {
        return Err(ProtocolError::UnsupportedSecurity(offered).into());
    }
    conn.write_all(&[SECURITY_TYPE_ATEN])?;

    conn.read_bytes(SECURITY_EXTRA_LEN)?;

    conn.write_all(&encode_credentials(&config.username, &config.password))?;
    let auth_status = conn.read_u32_be()?;
    if auth_status != 0 {
        return Err(SessionError::AuthFailed(auth_status));
    }

    // Client-init: request a shared session.
    conn.write_all(&[0])?;

    conn.read_bytes(SERVER_INIT_LEN)?;

    let name_len = conn.read_u32_be()? as usize;
    let name = String::from_utf8_lossy(conn.read_bytes(name_len)?).into_owned();
    conn.read_bytes(POST_NAME_LEN)?;

    info!("authenticated; upstream desktop name {name:?}");
    updates.push(DisplayUpdate::SetDesktopName(name));

    debug!("handshake complete");
    Ok(())
}
