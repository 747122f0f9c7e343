//! Configuration for a scan run
//!
//! Everything the orchestrator consumes is resolved here up front: the
//! address range, the scheme and encoding orders, timeouts, and output
//! destinations. Nothing reads ambient state after this point, so a test can
//! run many configurations in one process without interference.

use crate::error::ScanError;
use crate::negotiation::PasswordEncoding;
use crate::protocol::ConnectionScheme;
use serde::Deserialize;
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Inclusive IPv4 interval to scan, end strictly greater than start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressRange {
    start: u32,
    end: u32,
}

impl AddressRange {
    pub fn new(start: Ipv4Addr, end: Ipv4Addr) -> crate::Result<Self> {
        let (start, end) = (u32::from(start), u32::from(end));
        if end <= start {
            return Err(ScanError::InvalidRange(format!(
                "end address {} must be greater than start address {}",
                Ipv4Addr::from(end),
                Ipv4Addr::from(start)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.start)
    }

    pub fn end(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.end)
    }

    /// Number of addresses in the range, both endpoints included
    pub fn len(&self) -> u64 {
        u64::from(self.end - self.start) + 1
    }

    pub fn is_empty(&self) -> bool {
        false // end > start is enforced at construction
    }

    /// Addresses in ascending numeric order, inclusive of both endpoints
    pub fn iter(&self) -> impl Iterator<Item = Ipv4Addr> {
        (self.start..=self.end).map(Ipv4Addr::from)
    }
}

/// Main configuration structure for one scan run
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Address interval to sweep
    pub range: AddressRange,

    /// Connection schemes in the order they are tried per account
    pub schemes: Vec<ConnectionScheme>,

    /// Password encodings in the order they are tried per session
    pub encodings: Vec<PasswordEncoding>,

    /// Ping timeout in seconds; 0 disables the liveness check entirely
    pub ping_timeout: u64,

    /// Download the XML configuration of every discovered device
    pub export_config: bool,

    /// Destination directory for exported configurations
    pub export_dir: PathBuf,

    /// Write the discovered device records to this file
    pub output_file: Option<PathBuf>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            range: AddressRange {
                start: u32::from(Ipv4Addr::new(127, 0, 0, 1)),
                end: u32::from(Ipv4Addr::new(127, 0, 0, 2)),
            },
            schemes: ConnectionScheme::fallback_order(),
            encodings: PasswordEncoding::default_order(),
            ping_timeout: 1,
            export_config: false,
            export_dir: PathBuf::from("data"),
            output_file: None,
        }
    }
}

impl ScanConfig {
    pub fn new(range: AddressRange) -> Self {
        Self {
            range,
            ..Default::default()
        }
    }

    /// Set the connection scheme order
    pub fn with_schemes(mut self, schemes: Vec<ConnectionScheme>) -> Self {
        self.schemes = schemes;
        self
    }

    /// Set the password encoding order
    pub fn with_encodings(mut self, encodings: Vec<PasswordEncoding>) -> Self {
        self.encodings = encodings;
        self
    }

    /// Set the ping timeout in seconds; 0 disables probing
    pub fn with_ping_timeout(mut self, seconds: u64) -> Self {
        self.ping_timeout = seconds;
        self
    }

    /// Get the ping timeout as a Duration
    pub fn ping_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.ping_timeout)
    }

    /// Validate the configuration before any network activity
    pub fn validate(&self) -> crate::Result<()> {
        if self.schemes.is_empty() {
            return Err(ScanError::ConfigError(
                "no connection scheme configured".to_string(),
            ));
        }
        if self.encodings.is_empty() {
            return Err(ScanError::ConfigError(
                "no password encoding configured".to_string(),
            ));
        }
        Ok(())
    }
}

/// Optional defaults loaded from a TOML file, overridden by CLI arguments
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileDefaults {
    pub timeout: Option<u64>,
    pub accounts_list: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub hash_password: Option<String>,
    pub export_dir: Option<String>,
}

impl FileDefaults {
    /// Load defaults from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            ScanError::ConfigError(format!(
                "failed to read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load defaults from `~/.espace-scan.toml` when present
    pub fn load_default_config() -> Self {
        let home_dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let config_path = home_dir.join(".espace-scan.toml");

        if config_path.exists() {
            if let Ok(defaults) = Self::from_toml_file(&config_path) {
                log::debug!("Loaded defaults from {}", config_path.display());
                return defaults;
            }
        }

        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_rejects_inverted() {
        let start = Ipv4Addr::new(10, 1, 60, 100);
        let end = Ipv4Addr::new(10, 1, 60, 15);
        assert!(matches!(
            AddressRange::new(start, end),
            Err(ScanError::InvalidRange(_))
        ));
    }

    #[test]
    fn test_range_rejects_equal_endpoints() {
        let addr = Ipv4Addr::new(10, 1, 60, 15);
        assert!(AddressRange::new(addr, addr).is_err());
    }

    #[test]
    fn test_range_iterates_ascending_inclusive() {
        let range = AddressRange::new(
            Ipv4Addr::new(10, 1, 60, 254),
            Ipv4Addr::new(10, 1, 61, 1),
        )
        .unwrap();

        let addrs: Vec<Ipv4Addr> = range.iter().collect();
        assert_eq!(
            addrs,
            vec![
                Ipv4Addr::new(10, 1, 60, 254),
                Ipv4Addr::new(10, 1, 60, 255),
                Ipv4Addr::new(10, 1, 61, 0),
                Ipv4Addr::new(10, 1, 61, 1),
            ]
        );
        assert_eq!(range.len(), 4);
    }

    #[test]
    fn test_validate_rejects_empty_orders() {
        let range =
            AddressRange::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)).unwrap();

        let config = ScanConfig::new(range).with_schemes(Vec::new());
        assert!(config.validate().is_err());

        let config = ScanConfig::new(range).with_encodings(Vec::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_any_timeout() {
        let range =
            AddressRange::new(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)).unwrap();
        assert!(ScanConfig::new(range).with_ping_timeout(0).validate().is_ok());
        assert!(ScanConfig::new(range).with_ping_timeout(3600).validate().is_ok());
    }

    #[test]
    fn test_file_defaults_parse() {
        let defaults: FileDefaults = toml::from_str(
            r#"
            timeout = 2
            username = "admin"
            hash_password = "md5"
            "#,
        )
        .unwrap();
        assert_eq!(defaults.timeout, Some(2));
        assert_eq!(defaults.username.as_deref(), Some("admin"));
        assert_eq!(defaults.hash_password.as_deref(), Some("md5"));
        assert!(defaults.accounts_list.is_none());
    }
}
