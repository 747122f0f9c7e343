//! Scan results and the range orchestrator

pub mod engine;

use crate::protocol::DeviceIdentity;
use serde::Serialize;
use std::net::Ipv4Addr;
use std::time::Duration;

pub use engine::ScanOrchestrator;

/// A confirmed, authenticated device; never mutated after creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceRecord {
    pub ip: Ipv4Addr,
    pub serial: String,
    pub main_software_version: String,
    pub boot_version: String,
    pub hardware_version: String,
    pub build_version: String,
}

impl DeviceRecord {
    pub fn new(ip: Ipv4Addr, identity: DeviceIdentity) -> Self {
        Self {
            ip,
            serial: identity.serial,
            main_software_version: identity.main_software_version,
            boot_version: identity.boot_version,
            hardware_version: identity.hardware_version,
            build_version: identity.build_version,
        }
    }

    /// One comma-separated report line, fields in the contract order
    pub fn report_line(&self) -> String {
        format!(
            "{},{},{},{},{},{}",
            self.ip,
            self.serial,
            self.main_software_version,
            self.boot_version,
            self.hardware_version,
            self.build_version
        )
    }
}

/// Aggregate result of one run, devices kept in scan order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub devices: Vec<DeviceRecord>,
    pub addresses_probed: u64,
    pub duration: Duration,
}

impl ScanReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_device(&mut self, record: DeviceRecord) {
        self.devices.push(record);
    }

    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_record() -> DeviceRecord {
        DeviceRecord::new(
            Ipv4Addr::new(10, 1, 60, 17),
            DeviceIdentity {
                serial: "2102310ABC".to_string(),
                main_software_version: "V100R001C03".to_string(),
                boot_version: "1.9".to_string(),
                hardware_version: "VER.B".to_string(),
                build_version: "B021".to_string(),
            },
        )
    }

    #[test]
    fn test_report_line_field_order() {
        assert_eq!(
            sample_record().report_line(),
            "10.1.60.17,2102310ABC,V100R001C03,1.9,VER.B,B021"
        );
    }

    #[test]
    fn test_report_preserves_scan_order() {
        let mut report = ScanReport::new();
        let mut second = sample_record();
        second.ip = Ipv4Addr::new(10, 1, 60, 90);
        report.add_device(sample_record());
        report.add_device(second.clone());
        assert_eq!(report.device_count(), 2);
        assert_eq!(report.devices[1], second);
    }
}
