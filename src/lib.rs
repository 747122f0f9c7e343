//! espace-scan - locate default-credentialed eSpace devices before someone else does
//!
//! Scans an inclusive IPv4 range for eSpace-family devices, negotiating a
//! working combination of connection scheme, account, and password encoding
//! against each device's web session protocol.

pub mod accounts;
pub mod config;
pub mod error;
pub mod negotiation;
pub mod output;
pub mod probe;
pub mod protocol;
pub mod scanner;

// Re-export commonly used types
pub use accounts::{Account, AccountStore};
pub use config::{AddressRange, ScanConfig};
pub use error::ScanError;
pub use negotiation::{NegotiationEngine, PasswordEncoding};
pub use protocol::{ClientFactory, ConnectionScheme, DeviceClient, DeviceIdentity};
pub use scanner::engine::ScanOrchestrator;
pub use scanner::{DeviceRecord, ScanReport};

pub type Result<T> = std::result::Result<T, ScanError>;
