// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk — Core types, errors, configuration, and the settings store shared
// across all crates.

pub mod config;
pub mod error;
pub mod settings;
pub mod types;

pub use config::{PrinterConfig, PrinterConnection, ServerConfig};
pub use error::{ErrorKind, PrintDeskError};
pub use settings::{Settings, SettingsStore};
pub use types::*;
