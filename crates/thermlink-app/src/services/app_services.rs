// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer. Owns the worker runtime, the platform radio and the
// loaded configuration, and runs print jobs on behalf of `main`.
//
// The thread calling into `AppServices` is the origin thread: job callbacks
// are queued for it and run there, while connecting and writing happen on
// the runtime's workers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thermlink_bridge::{BluetoothRadio, platform_bridge};
use thermlink_core::AppConfig;
use thermlink_core::error::Result;
use thermlink_core::types::JobReport;
use thermlink_print::{
    DiscoveredPrinter, JobOptions, OriginQueue, PlainTextFormatter, PrintOrchestrator,
    PrinterClassifier,
};
use tokio::runtime::Runtime;
use tracing::{info, warn};

use super::console::ConsoleListener;
use super::data_dir;

pub struct AppServices {
    runtime: Runtime,
    radio: Arc<dyn BluetoothRadio>,
    data_dir: PathBuf,
    config: AppConfig,
}

impl AppServices {
    /// Initialise all services.  Call once at startup.
    pub fn init() -> Result<Self> {
        let dir = data_dir::data_dir();
        info!(path = %dir.display(), "initialising app services");

        let config = load_config(&dir);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("thermlink-worker")
            .build()?;
        let radio = platform_bridge();
        info!(platform = radio.platform_name(), "bluetooth bridge ready");

        Ok(Self {
            runtime,
            radio,
            data_dir: dir,
            config,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn classifier(&self) -> PrinterClassifier {
        PrinterClassifier::from_config(Arc::clone(&self.radio), &self.config)
    }

    /// Bonded devices that look like printers.
    pub fn list_printers(&self) -> Vec<DiscoveredPrinter> {
        self.runtime.block_on(self.classifier().list_bonded())
    }

    /// Print each file as one payload of a single job on the first printer
    /// that connects. Blocks until the job has finished and its callbacks
    /// have run.
    pub fn print_files(&self, paths: &[PathBuf]) -> Result<JobReport> {
        let payloads = paths
            .iter()
            .map(std::fs::read_to_string)
            .collect::<std::io::Result<Vec<_>>>()?;

        let target = self.runtime.block_on(self.classifier().select_first());
        if target.is_none() {
            warn!("no printer connected");
        }

        let (queue, mut origin) = OriginQueue::new();
        let orchestrator = PrintOrchestrator::new(
            self.runtime.handle().clone(),
            Arc::new(PlainTextFormatter::default()),
            Arc::new(queue),
            JobOptions::from(&self.config),
        );
        let listener = Arc::new(ConsoleListener::default());
        let handle = orchestrator.submit(target, payloads, listener.clone());
        info!(job = %handle.id(), files = paths.len(), "job submitted");

        while !listener.is_done() {
            if !origin.blocking_next() {
                break;
            }
        }
        Ok(self.runtime.block_on(handle.wait()))
    }
}

// -- Config file persistence -------------------------------------------------

const CONFIG_FILE: &str = "config.json";

/// Load the config from `data_dir`, writing the defaults on first run. A
/// broken file is reported and replaced by defaults in memory only.
fn load_config(data_dir: &Path) -> AppConfig {
    let path = data_dir.join(CONFIG_FILE);
    if !path.exists() {
        let config = AppConfig::default();
        if let Err(e) = config.save(&path) {
            warn!(path = %path.display(), error = %e, "could not write default config");
        }
        return config;
    }
    match AppConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring invalid config");
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_run_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path());
        assert_eq!(config, AppConfig::default());
        assert!(dir.path().join(CONFIG_FILE).exists());
    }

    #[test]
    fn saved_config_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let custom = AppConfig {
            retry_count: 5,
            preferred_device: Some("66:55:44:33:22:11".into()),
            ..Default::default()
        };
        custom.save(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(load_config(dir.path()), custom);
    }

    #[test]
    fn broken_config_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "{ not json").unwrap();
        assert_eq!(load_config(dir.path()), AppConfig::default());
    }
}
