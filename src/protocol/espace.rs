//! eSpace web session client
//!
//! Talks the device's session/certificate exchange over HTTP(S). Devices on
//! factory credentials almost always carry self-signed certificates, so the
//! secure scheme accepts invalid certs. Every transport-level failure is an
//! ordinary denial from the engine's point of view.

use crate::error::ScanError;
use crate::protocol::{ConnectionScheme, DeviceClient, DeviceIdentity, SessionReply};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::net::Ipv4Addr;
use std::path::Path;
use std::time::Duration;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
const SERVICE_PATH: &str = "/esconf/service.cgi";

#[derive(Debug, Deserialize)]
struct ServiceReply {
    success: bool,
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
    data: Option<serde_json::Value>,
}

// Field names as the device firmware spells them.
#[derive(Debug, Deserialize)]
struct VersionInfoData {
    #[serde(rename = "stMainVersionInfo")]
    main_version_info: MainVersionInfo,
}

#[derive(Debug, Deserialize)]
struct MainVersionInfo {
    #[serde(rename = "szSN")]
    serial: String,
    #[serde(rename = "szMainSoftWareVersion")]
    main_software_version: String,
    #[serde(rename = "szBootVersion")]
    boot_version: String,
    #[serde(rename = "szHardWareVersion")]
    hardware_version: String,
    #[serde(rename = "szBuildVersion")]
    build_version: String,
}

/// One session against one device endpoint
pub struct EspaceClient {
    http: reqwest::Client,
    base_url: String,
    session_id: Option<String>,
}

impl EspaceClient {
    /// Bind a transport to one scheme and address without any network I/O
    pub fn connect(
        scheme: ConnectionScheme,
        addr: Ipv4Addr,
        request_timeout: Duration,
    ) -> crate::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .cookie_store(true)
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| ScanError::NetworkError(e.to_string()))?;

        Ok(Self {
            http,
            base_url: format!("{}://{}{}", scheme.url_scheme(), addr, SERVICE_PATH),
            session_id: None,
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Post one service command; any transport or decode failure is a denial
    async fn service_call(&self, body: serde_json::Value) -> Option<ServiceReply> {
        let response = match self.http.post(&self.base_url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => {
                log::trace!("EspaceClient::service_call transport error: {}", e);
                return None;
            }
        };

        match response.json::<ServiceReply>().await {
            Ok(reply) => Some(reply),
            Err(e) => {
                log::trace!("EspaceClient::service_call decode error: {}", e);
                None
            }
        }
    }
}

#[async_trait]
impl DeviceClient for EspaceClient {
    async fn request_session(&mut self, username: &str) -> crate::Result<SessionReply> {
        let body = json!({ "action": "requestSession", "username": username });
        let reply = match self.service_call(body).await {
            Some(reply) if reply.success => reply,
            _ => return Ok(SessionReply::denied()),
        };

        match reply.session_id {
            Some(session_id) => {
                self.session_id = Some(session_id.clone());
                Ok(SessionReply::granted(session_id))
            }
            // A success without a handle is a firmware quirk, not a session.
            None => Ok(SessionReply::denied()),
        }
    }

    async fn request_certificate(
        &mut self,
        username: &str,
        encoded_password: &str,
    ) -> crate::Result<bool> {
        let body = json!({
            "action": "requestCertificate",
            "username": username,
            "certificate": encoded_password,
            "sessionId": self.session_id,
        });
        Ok(self.service_call(body).await.map_or(false, |r| r.success))
    }

    async fn request_version_info(&mut self) -> crate::Result<Option<DeviceIdentity>> {
        let body = json!({ "action": "requestVersionInfo", "sessionId": self.session_id });
        let reply = match self.service_call(body).await {
            Some(reply) if reply.success => reply,
            _ => return Ok(None),
        };

        let data = match reply.data {
            Some(data) => data,
            None => return Ok(None),
        };

        match serde_json::from_value::<VersionInfoData>(data) {
            Ok(info) => {
                let main = info.main_version_info;
                Ok(Some(DeviceIdentity {
                    serial: main.serial,
                    main_software_version: main.main_software_version,
                    boot_version: main.boot_version,
                    hardware_version: main.hardware_version,
                    build_version: main.build_version,
                }))
            }
            Err(e) => {
                log::trace!("EspaceClient::request_version_info malformed payload: {}", e);
                Ok(None)
            }
        }
    }

    async fn request_export_config(&mut self, destination: &Path) -> crate::Result<bool> {
        let body = json!({ "action": "requestExportConfig", "sessionId": self.session_id });
        let response = match self.http.post(&self.base_url).json(&body).send().await {
            Ok(response) if response.status().is_success() => response,
            Ok(_) | Err(_) => return Ok(false),
        };

        let content = match response.bytes().await {
            Ok(content) => content,
            Err(_) => return Ok(false),
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(destination, &content).await?;
        Ok(true)
    }
}

/// Opens one [`EspaceClient`] per scheme and address
#[derive(Debug, Clone)]
pub struct EspaceFactory {
    request_timeout: Duration,
}

impl EspaceFactory {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

impl Default for EspaceFactory {
    fn default() -> Self {
        Self::new(DEFAULT_REQUEST_TIMEOUT)
    }
}

impl crate::protocol::ClientFactory for EspaceFactory {
    type Client = EspaceClient;

    fn open(&self, scheme: ConnectionScheme, addr: Ipv4Addr) -> crate::Result<EspaceClient> {
        EspaceClient::connect(scheme, addr, self.request_timeout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_url_uses_scheme_token() {
        let client = EspaceClient::connect(
            ConnectionScheme::Insecure,
            Ipv4Addr::new(10, 1, 60, 15),
            DEFAULT_REQUEST_TIMEOUT,
        )
        .unwrap();
        assert_eq!(client.base_url, "http://10.1.60.15/esconf/service.cgi");
        assert!(client.session_id().is_none());
    }

    #[test]
    fn test_version_payload_field_names() {
        let data = serde_json::json!({
            "stMainVersionInfo": {
                "szSN": "2102310ABC",
                "szMainSoftWareVersion": "V100R001C03",
                "szBootVersion": "1.9",
                "szHardWareVersion": "VER.B",
                "szBuildVersion": "B021"
            }
        });
        let info: VersionInfoData = serde_json::from_value(data).unwrap();
        assert_eq!(info.main_version_info.serial, "2102310ABC");
        assert_eq!(info.main_version_info.build_version, "B021");
    }
}
