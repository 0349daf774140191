//! Bridge configuration.

use std::time::Duration;

use aten_core::protocol::messages::MAX_CREDENTIAL_LEN;
use thiserror::Error;

/// Errors from validating a [`ProxyConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A credential would not fit its fixed 24-byte wire field.
    #[error("{field} is {len} bytes; the device accepts at most {MAX_CREDENTIAL_LEN}")]
    CredentialTooLong { field: &'static str, len: usize },
}

/// Everything the bridge needs to run, assembled from the CLI.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Upstream device host name or address.
    pub host: String,
    /// Upstream device port.
    pub port: u16,
    /// Login name, at most 23 bytes.
    pub username: String,
    /// Password, at most 23 bytes.
    pub password: String,
    /// Framebuffer width advertised before the device reports its own.
    pub initial_width: u16,
    /// Framebuffer height advertised before the device reports its own.
    pub initial_height: u16,
    /// Pause between reconnect attempts after a session ends.
    pub reconnect_delay: Duration,
    /// Encode update-request coordinates in network order instead of the
    /// host order the device has been observed to expect.
    pub network_order_updates: bool,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5901,
            username: String::new(),
            password: String::new(),
            initial_width: 640,
            initial_height: 480,
            reconnect_delay: Duration::from_secs(1),
            network_order_updates: false,
        }
    }
}

impl ProxyConfig {
    /// Checks the fields the wire format constrains.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CredentialTooLong`] if either credential
    /// exceeds its fixed field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [("username", &self.username), ("password", &self.password)] {
            if value.len() > MAX_CREDENTIAL_LEN {
                return Err(ConfigError::CredentialTooLong {
                    field,
                    len: value.len(),
                });
            }
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
