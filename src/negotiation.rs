//! Credential negotiation engine
//!
//! For one target address, searches the bounded (account x scheme x
//! encoding) space in its configured order until one combination
//! authenticates or the space is exhausted. The search order is an
//! operator-auditable contract: accounts in file order, schemes then
//! encodings in configured order, first match wins. Ordinary authentication
//! failure never raises an error; it just advances the search.

use crate::accounts::Account;
use crate::probe::Probe;
use crate::protocol::{ClientFactory, ConnectionScheme, DeviceClient};
use crate::scanner::DeviceRecord;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How a plaintext password is transformed before submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PasswordEncoding {
    /// Standard base64 with the final character replaced by `:`
    Base64Alt,
    /// Standard base64
    Base64,
    /// Lowercase-hex MD5 of `username:password:sessionHandle`
    Digest,
    /// Password unchanged
    Plain,
}

impl PasswordEncoding {
    pub fn name(&self) -> &'static str {
        match self {
            PasswordEncoding::Base64Alt => "base64alt",
            PasswordEncoding::Base64 => "base64",
            PasswordEncoding::Digest => "md5",
            PasswordEncoding::Plain => "plain",
        }
    }

    /// Default order when no mode is forced
    pub fn default_order() -> Vec<PasswordEncoding> {
        vec![
            PasswordEncoding::Base64Alt,
            PasswordEncoding::Base64,
            PasswordEncoding::Digest,
        ]
    }
}

impl fmt::Display for PasswordEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PasswordEncoding {
    type Err = crate::ScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "base64alt" | "base64-alt" => Ok(PasswordEncoding::Base64Alt),
            "base64" => Ok(PasswordEncoding::Base64),
            "md5" | "digest" => Ok(PasswordEncoding::Digest),
            "plain" => Ok(PasswordEncoding::Plain),
            _ => Err(crate::ScanError::ConfigError(format!(
                "unknown password mode: {}",
                s
            ))),
        }
    }
}

/// Transform `password` per the encoding rule
///
/// `session_id` is the handle returned by session establishment; only the
/// digest mode consumes it.
pub fn encode_password(
    encoding: PasswordEncoding,
    username: &str,
    password: &str,
    session_id: &str,
) -> String {
    match encoding {
        PasswordEncoding::Plain => password.to_string(),
        PasswordEncoding::Base64 => BASE64.encode(password),
        PasswordEncoding::Base64Alt => {
            let mut encoded = BASE64.encode(password);
            encoded.pop();
            encoded.push(':');
            encoded
        }
        PasswordEncoding::Digest => {
            let digest = md5::compute(format!("{}:{}:{}", username, password, session_id));
            format!("{:x}", digest)
        }
    }
}

/// One trial within an address's search, kept for diagnostics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationAttempt {
    pub account_index: usize,
    pub username: String,
    pub scheme: ConnectionScheme,
    pub encoding: Option<PasswordEncoding>,
    pub success: bool,
}

/// A session that passed certificate submission
pub struct AuthenticatedSession<C: DeviceClient> {
    pub client: C,
    pub account: Account,
    pub scheme: ConnectionScheme,
    pub encoding: PasswordEncoding,
    pub session_id: String,
}

/// Drives the per-address search and, on success, identity retrieval and
/// optional configuration export
pub struct NegotiationEngine<'a, F: ClientFactory> {
    factory: &'a F,
    probe: &'a dyn Probe,
    accounts: &'a [Account],
    schemes: &'a [ConnectionScheme],
    encodings: &'a [PasswordEncoding],
    ping_timeout: Duration,
    export_dir: Option<&'a Path>,
}

impl<'a, F: ClientFactory> NegotiationEngine<'a, F> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        factory: &'a F,
        probe: &'a dyn Probe,
        accounts: &'a [Account],
        schemes: &'a [ConnectionScheme],
        encodings: &'a [PasswordEncoding],
        ping_timeout: Duration,
        export_dir: Option<&'a Path>,
    ) -> Self {
        Self {
            factory,
            probe,
            accounts,
            schemes,
            encodings,
            ping_timeout,
            export_dir,
        }
    }

    /// Run the full per-address flow: liveness check, credential search,
    /// identity retrieval, optional export
    ///
    /// `Ok(None)` covers every ordinary non-discovery: unreachable host,
    /// exhausted search, unreadable identity.
    pub async fn discover(&self, addr: Ipv4Addr) -> crate::Result<Option<DeviceRecord>> {
        if !self.ping_timeout.is_zero() {
            match self.probe.probe(addr, self.ping_timeout).await {
                Some(rtt) => {
                    log::debug!("Device \"{}\" ping reply {:.3} ms", addr, rtt.as_secs_f64() * 1000.0)
                }
                None => {
                    log::debug!("Device \"{}\" ping timeout.", addr);
                    return Ok(None);
                }
            }
        }

        let Some(mut session) = self.negotiate(addr).await? else {
            return Ok(None);
        };

        let Some(identity) = session.client.request_version_info().await? else {
            log::error!("Cannot get hardware information for {}.", addr);
            return Ok(None);
        };

        log::info!("eSpace device found at {}", addr);
        log::info!(
            "Hardware Information =\n\tMain SoftWare Version: {}\n\tBoot Version:          {}\n\tHardWare Version:      {}\n\tSerial Number:         {}\n\tBuild Version:         {}",
            identity.main_software_version,
            identity.boot_version,
            identity.hardware_version,
            identity.serial,
            identity.build_version,
        );

        if let Some(export_dir) = self.export_dir {
            let destination = export_path(export_dir, &identity.serial);
            match session.client.request_export_config(&destination).await {
                Ok(true) => {
                    log::debug!("Downloaded xml file to {} for {}.", destination.display(), addr)
                }
                // Export failure is non-fatal; the device stays recorded.
                Ok(false) => log::error!(
                    "Cannot download xml file to {} for {}.",
                    destination.display(),
                    addr
                ),
                Err(e) => log::error!(
                    "Cannot download xml file to {} for {}: {}",
                    destination.display(),
                    addr,
                    e
                ),
            }
        }

        Ok(Some(DeviceRecord::new(addr, identity)))
    }

    /// Search for a working (account, scheme, encoding) combination
    ///
    /// The first combination that authenticates wins and the search stops.
    /// `Ok(None)` means the space is exhausted.
    pub async fn negotiate(
        &self,
        addr: Ipv4Addr,
    ) -> crate::Result<Option<AuthenticatedSession<F::Client>>> {
        let total = self.accounts.len();

        for (index, account) in self.accounts.iter().enumerate() {
            let attempt = index + 1;

            let Some((client, session_id, scheme)) =
                self.establish_session(addr, account, attempt, total).await?
            else {
                continue; // no scheme yielded a session, next account
            };

            match self
                .submit_credentials(client, session_id, scheme, addr, account, attempt, total)
                .await?
            {
                Some(session) => return Ok(Some(session)),
                None => continue, // session discarded, next account
            }
        }

        Ok(None)
    }

    /// Scheme stage: first scheme that yields a session short-circuits
    async fn establish_session(
        &self,
        addr: Ipv4Addr,
        account: &Account,
        attempt: usize,
        total: usize,
    ) -> crate::Result<Option<(F::Client, String, ConnectionScheme)>> {
        for &scheme in self.schemes {
            let mut client = self.factory.open(scheme, addr)?;
            let reply = client.request_session(&account.username).await?;
            let session_id = if reply.success { reply.session_id } else { None };

            log::trace!(
                "{:?}",
                NegotiationAttempt {
                    account_index: attempt - 1,
                    username: account.username.clone(),
                    scheme,
                    encoding: None,
                    success: session_id.is_some(),
                }
            );

            match session_id {
                Some(session_id) => {
                    log::info!(
                        "SUCCESSFUL connection to device \"{}\" using {} mode with username \"{}\" at attempt {}/{}.",
                        addr, scheme, account.username, attempt, total
                    );
                    return Ok(Some((client, session_id, scheme)));
                }
                None => {
                    log::debug!(
                        "Failed connection to device \"{}\" using {} mode with username \"{}\" at attempt {}/{}.",
                        addr, scheme, account.username, attempt, total
                    );
                    // client dropped here; at most one session per address
                }
            }
        }
        Ok(None)
    }

    /// Encoding stage: first accepted certificate short-circuits
    async fn submit_credentials(
        &self,
        mut client: F::Client,
        session_id: String,
        scheme: ConnectionScheme,
        addr: Ipv4Addr,
        account: &Account,
        attempt: usize,
        total: usize,
    ) -> crate::Result<Option<AuthenticatedSession<F::Client>>> {
        for &encoding in self.encodings {
            let encoded =
                encode_password(encoding, &account.username, &account.password, &session_id);
            let accepted = client.request_certificate(&account.username, &encoded).await?;

            log::trace!(
                "{:?}",
                NegotiationAttempt {
                    account_index: attempt - 1,
                    username: account.username.clone(),
                    scheme,
                    encoding: Some(encoding),
                    success: accepted,
                }
            );

            if accepted {
                log::info!(
                    "SUCCESSFUL {} login to \"{}\" using \"{}:{}\" at attempt {}/{}",
                    encoding, addr, account.username, encoded, attempt, total
                );
                return Ok(Some(AuthenticatedSession {
                    client,
                    account: account.clone(),
                    scheme,
                    encoding,
                    session_id,
                }));
            }
            log::debug!(
                "Failed {} login to \"{}\" using \"{}:{}\" at attempt {}/{}",
                encoding, addr, account.username, encoded, attempt, total
            );
        }
        Ok(None)
    }
}

/// Export destination derived deterministically from the device serial
pub fn export_path(export_dir: &Path, serial: &str) -> PathBuf {
    export_dir.join(format!("Config-eSpace-{}.xml", serial))
}
