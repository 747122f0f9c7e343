//! Report output
//!
//! The only persisted artifact of a run: one comma-separated line per
//! discovered device, no header, `\n` separated.

use crate::error::ScanError;
use crate::scanner::ScanReport;
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Writes the run's device records to a flat file
pub struct ReportWriter {
    path: PathBuf,
}

impl ReportWriter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serialize the report, one record per line
    pub fn write(&self, report: &ScanReport) -> crate::Result<()> {
        let mut contents = report
            .devices
            .iter()
            .map(|d| d.report_line())
            .collect::<Vec<_>>()
            .join("\n");
        contents.push('\n');

        fs::write(&self.path, contents).map_err(|e| {
            ScanError::OutputError(format!(
                "cannot write result file {}: {}",
                self.path.display(),
                e
            ))
        })
    }
}

/// Console summary after the sweep
pub fn print_summary(report: &ScanReport, colored: bool) {
    if !colored {
        println!(
            "Scanned {} address(es) in {:.1?}, found {} device(s).",
            report.addresses_probed,
            report.duration,
            report.device_count()
        );
        for device in &report.devices {
            println!("{}", device.report_line());
        }
        return;
    }

    println!(
        "{} {} {} {:.1?}{} {} {}",
        "[~] Scanned".bright_blue(),
        report.addresses_probed.to_string().bright_white().bold(),
        "address(es) in".bright_blue(),
        report.duration,
        ",".bright_blue(),
        "found".bright_blue(),
        format!("{} device(s)", report.device_count()).bright_green().bold(),
    );
    for device in &report.devices {
        println!(
            "{:<16} {} {}",
            device.ip.to_string().bright_cyan(),
            device.serial.bright_white().bold(),
            device.main_software_version.bright_yellow()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::DeviceIdentity;
    use crate::scanner::DeviceRecord;
    use std::net::Ipv4Addr;

    fn sample_report() -> ScanReport {
        let mut report = ScanReport::new();
        report.addresses_probed = 3;
        report.add_device(DeviceRecord::new(
            Ipv4Addr::new(10, 1, 60, 16),
            DeviceIdentity {
                serial: "2102310ABC".to_string(),
                main_software_version: "V100R001C03".to_string(),
                boot_version: "1.9".to_string(),
                hardware_version: "VER.B".to_string(),
                build_version: "B021".to_string(),
            },
        ));
        report
    }

    #[test]
    fn test_written_file_matches_record_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ip-list.txt");

        ReportWriter::new(&path).write(&sample_report()).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "10.1.60.16,2102310ABC,V100R001C03,1.9,VER.B,B021\n");
    }

    #[test]
    fn test_unwritable_path_is_an_output_error() {
        let result = ReportWriter::new("/nonexistent/dir/ip-list.txt").write(&sample_report());
        assert!(matches!(result, Err(ScanError::OutputError(_))));
    }
}
