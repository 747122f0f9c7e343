//! Range orchestration
//!
//! Walks the address range in ascending order, one address at a time, and
//! hands each address to the negotiation engine. Per-address failures are
//! logged at the address boundary and the sweep moves on; only
//! configuration-class errors abort the run. Cancellation is honored
//! between addresses: an in-flight exchange finishes, no new address
//! starts.

use crate::accounts::AccountStore;
use crate::config::ScanConfig;
use crate::error::{is_fatal, ScanError};
use crate::negotiation::NegotiationEngine;
use crate::output::ReportWriter;
use crate::probe::Probe;
use crate::protocol::ClientFactory;
use crate::scanner::ScanReport;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Drives the negotiation engine across the full address range
pub struct ScanOrchestrator<F: ClientFactory, P: Probe> {
    config: ScanConfig,
    accounts: AccountStore,
    factory: F,
    probe: P,
    cancelled: Arc<AtomicBool>,
}

impl<F: ClientFactory, P: Probe> ScanOrchestrator<F, P> {
    /// Create an orchestrator; all configuration errors surface here,
    /// before any network activity
    pub fn new(
        config: ScanConfig,
        accounts: AccountStore,
        factory: F,
        probe: P,
    ) -> crate::Result<Self> {
        config.validate()?;
        if accounts.is_empty() {
            return Err(ScanError::AccountsError(
                "accounts list contains no records".to_string(),
            ));
        }
        Ok(Self {
            config,
            accounts,
            factory,
            probe,
            cancelled: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag checked between addresses; setting it stops the sweep
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    /// Sweep the range and assemble the run's report
    pub async fn scan(&self) -> crate::Result<ScanReport> {
        let start_time = Instant::now();
        log::info!(
            "Scanning IP range \"{} -> {}\" ...",
            self.config.range.start(),
            self.config.range.end()
        );

        let export_dir = self
            .config
            .export_config
            .then(|| self.config.export_dir.as_path());
        let engine = NegotiationEngine::new(
            &self.factory,
            &self.probe,
            self.accounts.accounts(),
            &self.config.schemes,
            &self.config.encodings,
            self.config.ping_timeout_duration(),
            export_dir,
        );

        let mut report = ScanReport::new();
        for addr in self.config.range.iter() {
            if self.cancelled.load(Ordering::SeqCst) {
                log::info!(
                    "Scan cancelled after {} address(es).",
                    report.addresses_probed
                );
                break;
            }
            report.addresses_probed += 1;

            // Each address is independent; any unexpected failure is
            // contained here and the sweep continues. Only configuration
            // class errors abort the run.
            match engine.discover(addr).await {
                Ok(Some(record)) => report.add_device(record),
                Ok(None) => {}
                Err(e) if is_fatal(&e) => return Err(e),
                Err(e) => log::error!("Skipping {} after unexpected failure: {}", addr, e),
            }
        }

        report.duration = start_time.elapsed();
        log::info!(
            "Finished. Scan found {} eSpace device(s).",
            report.device_count()
        );

        // The result file is only written when something was found.
        if report.device_count() > 0 {
            if let Some(path) = &self.config.output_file {
                ReportWriter::new(path).write(&report)?;
                log::info!("Scan result written to file \"{}\"", path.display());
            }
        }

        Ok(report)
    }
}
