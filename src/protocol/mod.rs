//! Device protocol contract
//!
//! The negotiation engine only sees these traits; the production
//! implementation lives in [`espace`] and tests substitute deterministic
//! fakes. One client owns one session against one endpoint and is dropped
//! before the next attempt opens a new one.

pub mod espace;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::Path;

pub use espace::{EspaceClient, EspaceFactory};

/// Transport variant for one connection attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionScheme {
    Secure,
    Insecure,
}

impl ConnectionScheme {
    /// URL scheme token for this variant
    pub fn url_scheme(&self) -> &'static str {
        match self {
            ConnectionScheme::Secure => "https",
            ConnectionScheme::Insecure => "http",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectionScheme::Secure => "secure",
            ConnectionScheme::Insecure => "insecure",
        }
    }

    /// Default order when neither scheme is forced: secure, then insecure
    pub fn fallback_order() -> Vec<ConnectionScheme> {
        vec![ConnectionScheme::Secure, ConnectionScheme::Insecure]
    }
}

impl fmt::Display for ConnectionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Identity fields reported by an authenticated device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceIdentity {
    pub serial: String,
    pub main_software_version: String,
    pub boot_version: String,
    pub hardware_version: String,
    pub build_version: String,
}

/// Session establishment outcome; failure is a normal, expected result
#[derive(Debug, Clone, Default)]
pub struct SessionReply {
    pub success: bool,
    pub session_id: Option<String>,
}

impl SessionReply {
    pub fn denied() -> Self {
        Self::default()
    }

    pub fn granted(session_id: String) -> Self {
        Self {
            success: true,
            session_id: Some(session_id),
        }
    }
}

/// One authenticated session against one device endpoint
///
/// All operations are network-bound with a transport-owned timeout. An `Err`
/// signals an unexpected condition; a refused session or certificate is an
/// ordinary `Ok` outcome.
#[async_trait]
pub trait DeviceClient: Send {
    /// Ask the device for a session handle bound to `username`
    async fn request_session(&mut self, username: &str) -> crate::Result<SessionReply>;

    /// Submit the transformed credential for the current session
    async fn request_certificate(
        &mut self,
        username: &str,
        encoded_password: &str,
    ) -> crate::Result<bool>;

    /// Fetch the device identity; `None` when the device refuses or the
    /// payload is unreadable
    async fn request_version_info(&mut self) -> crate::Result<Option<DeviceIdentity>>;

    /// Write the device configuration to `destination`
    async fn request_export_config(&mut self, destination: &Path) -> crate::Result<bool>;
}

/// Binds a transport to one scheme and address; no network I/O is performed
/// until the first call on the returned client
pub trait ClientFactory: Send + Sync {
    type Client: DeviceClient;

    fn open(&self, scheme: ConnectionScheme, addr: Ipv4Addr) -> crate::Result<Self::Client>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_tokens() {
        assert_eq!(ConnectionScheme::Secure.url_scheme(), "https");
        assert_eq!(ConnectionScheme::Insecure.url_scheme(), "http");
        assert_eq!(ConnectionScheme::Secure.to_string(), "secure");
    }

    #[test]
    fn test_fallback_order_is_secure_first() {
        assert_eq!(
            ConnectionScheme::fallback_order(),
            vec![ConnectionScheme::Secure, ConnectionScheme::Insecure]
        );
    }
}
