// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ThermlinkError};
use crate::types::CharsetEncoding;

/// Persistent application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Extra connection attempts after the first one.
    pub retry_count: u32,
    /// Upper bound for a single channel connect, in milliseconds.
    pub connect_timeout_ms: u64,
    /// Pause between failed connection attempts, in milliseconds.
    pub retry_backoff_ms: u64,
    /// Settling time between two payloads of the same job, in milliseconds.
    pub payload_pacing_ms: u64,
    /// Number of print jobs allowed to run at the same time.
    pub max_concurrent_jobs: usize,
    /// Character encoding used when formatting payloads.
    pub charset: CharsetEncoding,
    /// Address of the printer to use instead of the first bonded one.
    pub preferred_device: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            retry_count: 3,
            connect_timeout_ms: 10_000,
            retry_backoff_ms: 1_000,
            payload_pacing_ms: 500,
            max_concurrent_jobs: 2,
            charset: CharsetEncoding::default(),
            preferred_device: None,
        }
    }
}

impl AppConfig {
    /// Load settings from a JSON file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Write settings as pretty-printed JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_jobs == 0 {
            return Err(ThermlinkError::Config(
                "max_concurrent_jobs must be at least 1".into(),
            ));
        }
        if self.charset.name.trim().is_empty() {
            return Err(ThermlinkError::Config("charset name is empty".into()));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn payload_pacing(&self) -> Duration {
        Duration::from_millis(self.payload_pacing_ms)
    }
}
