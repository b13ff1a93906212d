// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Server configuration.
//
// Loaded once at startup from a JSON file.  Every field has a default so a
// partial file (or none at all) yields a working demo setup with three
// simulated printers.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{PrintDeskError, Result};
use crate::types::{PaperSize, PrinterCapabilities, PrinterId};

/// Process-level configuration for the print server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind the HTTP server to.
    pub bind_address: String,
    /// HTTP port.
    pub port: u16,
    /// Override for the data directory (documents, job database, settings).
    pub data_dir: Option<PathBuf>,
    /// Upper bound for delivering one job, across all retry attempts.
    pub print_timeout_secs: u64,
    /// Delivery attempts per job before it is failed.
    pub max_print_attempts: u32,
    /// Base delay for exponential backoff between attempts.
    pub retry_base_delay_ms: u64,
    /// Ceiling for the backoff delay.
    pub retry_max_delay_ms: u64,
    /// How often expired uploads are purged.
    pub retention_sweep_interval_secs: u64,
    /// Provisioned printers.
    pub printers: Vec<PrinterConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".into(),
            port: 8001,
            data_dir: None,
            print_timeout_secs: 300,
            max_print_attempts: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 30_000,
            retention_sweep_interval_secs: 3_600,
            printers: default_printers(),
        }
    }
}

impl ServerConfig {
    /// Read a config file.  A missing file yields the defaults; a malformed
    /// one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        let data = match std::fs::read_to_string(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no config file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        info!(path = %path.display(), printers = config.printers.len(), "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_print_attempts == 0 {
            return Err(PrintDeskError::InvalidArgument(
                "max_print_attempts must be at least 1".into(),
            ));
        }
        if self.print_timeout_secs == 0 {
            return Err(PrintDeskError::InvalidArgument(
                "print_timeout_secs must be at least 1".into(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for printer in &self.printers {
            if !seen.insert(&printer.id) {
                return Err(PrintDeskError::InvalidArgument(format!(
                    "duplicate printer id '{}'",
                    printer.id
                )));
            }
        }
        if self.printers.is_empty() {
            warn!("no printers configured, print jobs cannot be created");
        }
        Ok(())
    }

    pub fn print_timeout(&self) -> Duration {
        Duration::from_secs(self.print_timeout_secs)
    }

    pub fn retention_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retention_sweep_interval_secs.max(1))
    }
}

/// A provisioned printer and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrinterConfig {
    pub id: PrinterId,
    pub name: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub capabilities: PrinterCapabilities,
    #[serde(default)]
    pub connection: PrinterConnection,
}

/// Transport used to deliver jobs to a printer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PrinterConnection {
    /// No device; pages are "printed" after a delay.
    Simulated {
        #[serde(default = "default_ms_per_page")]
        ms_per_page: u64,
    },
    /// JetDirect raw TCP (usually port 9100).
    Raw {
        host: String,
        #[serde(default = "default_raw_port")]
        port: u16,
    },
}

impl Default for PrinterConnection {
    fn default() -> Self {
        Self::Simulated {
            ms_per_page: default_ms_per_page(),
        }
    }
}

fn default_ms_per_page() -> u64 {
    200
}

fn default_raw_port() -> u16 {
    9100
}

fn default_printers() -> Vec<PrinterConfig> {
    vec![
        PrinterConfig {
            id: PrinterId::new("printer-1"),
            name: "HP LaserJet Pro M404n".into(),
            model: Some("HP LaserJet Pro M404n".into()),
            location: Some("Front desk".into()),
            capabilities: PrinterCapabilities {
                color: true,
                duplex: true,
                paper_sizes: vec![PaperSize::A4, PaperSize::Letter, PaperSize::Legal],
            },
            connection: PrinterConnection::default(),
        },
        PrinterConfig {
            id: PrinterId::new("printer-2"),
            name: "Canon PIXMA G6020".into(),
            model: Some("Canon PIXMA G6020".into()),
            location: Some("Back office".into()),
            capabilities: PrinterCapabilities {
                color: true,
                duplex: false,
                paper_sizes: vec![PaperSize::A4, PaperSize::A5, PaperSize::Letter],
            },
            connection: PrinterConnection::default(),
        },
        PrinterConfig {
            id: PrinterId::new("printer-3"),
            name: "Brother HL-L2350DW".into(),
            model: Some("Brother HL-L2350DW".into()),
            location: Some("Copy room".into()),
            capabilities: PrinterCapabilities {
                color: false,
                duplex: true,
                paper_sizes: vec![PaperSize::A4, PaperSize::A3, PaperSize::Letter],
            },
            connection: PrinterConnection::default(),
        },
    ]
}
