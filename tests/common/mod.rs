//! Deterministic fakes shared by the integration tests
//!
//! The mock device accepts exactly one (username, scheme) pair for session
//! establishment and exactly one encoded certificate, and records every
//! protocol call in arrival order so tests can assert the search contract.

use async_trait::async_trait;
use espace_scan::probe::Probe;
use espace_scan::protocol::{
    ClientFactory, ConnectionScheme, DeviceClient, DeviceIdentity, SessionReply,
};
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub username: String,
    pub scheme: ConnectionScheme,
    pub session_id: String,
    pub accepted_certificate: String,
    pub identity: Option<DeviceIdentity>,
    pub export_ok: bool,
}

impl MockDevice {
    pub fn new(username: &str, scheme: ConnectionScheme, session_id: &str, certificate: &str) -> Self {
        Self {
            username: username.to_string(),
            scheme,
            session_id: session_id.to_string(),
            accepted_certificate: certificate.to_string(),
            identity: Some(sample_identity("2102310ABC")),
            export_ok: true,
        }
    }

    pub fn without_identity(mut self) -> Self {
        self.identity = None;
        self
    }

    pub fn with_serial(mut self, serial: &str) -> Self {
        self.identity = Some(sample_identity(serial));
        self
    }

    pub fn failing_export(mut self) -> Self {
        self.export_ok = false;
        self
    }
}

pub fn sample_identity(serial: &str) -> DeviceIdentity {
    DeviceIdentity {
        serial: serial.to_string(),
        main_software_version: "V100R001C03".to_string(),
        boot_version: "1.9".to_string(),
        hardware_version: "VER.B".to_string(),
        build_version: "B021".to_string(),
    }
}

/// Factory backed by a fixed device population
#[derive(Clone, Default)]
pub struct MockFactory {
    devices: Arc<HashMap<Ipv4Addr, MockDevice>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MockFactory {
    pub fn new(devices: HashMap<Ipv4Addr, MockDevice>) -> Self {
        Self {
            devices: Arc::new(devices),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// Every protocol call made so far, in arrival order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

impl ClientFactory for MockFactory {
    type Client = MockClient;

    fn open(&self, scheme: ConnectionScheme, addr: Ipv4Addr) -> espace_scan::Result<MockClient> {
        Ok(MockClient {
            factory: self.clone(),
            scheme,
            addr,
            authenticated: false,
        })
    }
}

pub struct MockClient {
    factory: MockFactory,
    scheme: ConnectionScheme,
    addr: Ipv4Addr,
    authenticated: bool,
}

#[async_trait]
impl DeviceClient for MockClient {
    async fn request_session(&mut self, username: &str) -> espace_scan::Result<SessionReply> {
        self.factory
            .record(format!("session {} {} {}", self.addr, self.scheme, username));
        match self.factory.devices.get(&self.addr) {
            Some(device) if device.scheme == self.scheme && device.username == username => {
                Ok(SessionReply::granted(device.session_id.clone()))
            }
            _ => Ok(SessionReply::denied()),
        }
    }

    async fn request_certificate(
        &mut self,
        username: &str,
        encoded_password: &str,
    ) -> espace_scan::Result<bool> {
        self.factory.record(format!(
            "certificate {} {} {}",
            self.addr, username, encoded_password
        ));
        let accepted = self
            .factory
            .devices
            .get(&self.addr)
            .map_or(false, |d| d.accepted_certificate == encoded_password);
        self.authenticated = accepted;
        Ok(accepted)
    }

    async fn request_version_info(&mut self) -> espace_scan::Result<Option<DeviceIdentity>> {
        self.factory.record(format!("version {}", self.addr));
        if !self.authenticated {
            return Ok(None);
        }
        Ok(self
            .factory
            .devices
            .get(&self.addr)
            .and_then(|d| d.identity.clone()))
    }

    async fn request_export_config(&mut self, destination: &Path) -> espace_scan::Result<bool> {
        self.factory
            .record(format!("export {} {}", self.addr, destination.display()));
        Ok(self
            .factory
            .devices
            .get(&self.addr)
            .map_or(false, |d| self.authenticated && d.export_ok))
    }
}

/// Probe answering from a fixed reachability set, recording every call
#[derive(Clone, Default)]
pub struct ScriptedProbe {
    reachable: Arc<HashSet<Ipv4Addr>>,
    calls: Arc<Mutex<Vec<Ipv4Addr>>>,
}

impl ScriptedProbe {
    pub fn new(reachable: HashSet<Ipv4Addr>) -> Self {
        Self {
            reachable: Arc::new(reachable),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<Ipv4Addr> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, target: Ipv4Addr, _wait: Duration) -> Option<Duration> {
        self.calls.lock().unwrap().push(target);
        self.reachable
            .contains(&target)
            .then(|| Duration::from_millis(1))
    }
}
