// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer registry — provisioned printers, their live status, and drivers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use printdesk_core::config::{PrinterConfig, PrinterConnection};
use printdesk_core::error::{PrintDeskError, Result};
use printdesk_core::types::{Printer, PrinterId, PrinterStatus};
use tracing::{debug, info, instrument};

use crate::driver::{PrinterDriver, SimulatedDriver};
use crate::raw_client::RawDriver;

/// Printers known to the server, in configuration order.
pub struct PrinterRegistry {
    printers: RwLock<Vec<Printer>>,
    drivers: HashMap<PrinterId, Arc<dyn PrinterDriver>>,
}

impl PrinterRegistry {
    /// Build a registry from explicit printer/driver pairs. All printers
    /// start `online`.
    pub fn new(entries: Vec<(Printer, Arc<dyn PrinterDriver>)>) -> Self {
        let mut printers = Vec::with_capacity(entries.len());
        let mut drivers = HashMap::with_capacity(entries.len());
        for (mut printer, driver) in entries {
            printer.status = PrinterStatus::Online;
            drivers.insert(printer.id.clone(), driver);
            printers.push(printer);
        }
        Self {
            printers: RwLock::new(printers),
            drivers,
        }
    }

    /// Provision printers from configuration.
    pub fn from_config(configs: &[PrinterConfig]) -> Self {
        let entries = configs
            .iter()
            .map(|config| {
                let driver: Arc<dyn PrinterDriver> = match &config.connection {
                    PrinterConnection::Simulated { ms_per_page } => {
                        Arc::new(SimulatedDriver::from_millis(*ms_per_page))
                    }
                    PrinterConnection::Raw { host, port } => {
                        Arc::new(RawDriver::new(host.clone(), *port))
                    }
                };
                info!(
                    printer_id = %config.id,
                    name = %config.name,
                    driver = driver.kind(),
                    "printer provisioned"
                );
                let printer = Printer {
                    id: config.id.clone(),
                    name: config.name.clone(),
                    model: config.model.clone(),
                    location: config.location.clone(),
                    status: PrinterStatus::Online,
                    capabilities: config.capabilities.clone(),
                };
                (printer, driver)
            })
            .collect();
        Self::new(entries)
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Printer>> {
        self.printers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Printer>> {
        self.printers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn list(&self) -> Vec<Printer> {
        self.read().clone()
    }

    pub fn ids(&self) -> Vec<PrinterId> {
        self.read().iter().map(|p| p.id.clone()).collect()
    }

    pub fn get(&self, id: &PrinterId) -> Result<Printer> {
        self.read()
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| PrintDeskError::not_found("printer", id))
    }

    pub fn status(&self, id: &PrinterId) -> Result<PrinterStatus> {
        self.get(id).map(|p| p.status)
    }

    #[instrument(skip(self), fields(printer_id = %id))]
    pub fn set_status(&self, id: &PrinterId, status: PrinterStatus) -> Result<Printer> {
        let mut printers = self.write();
        let printer = printers
            .iter_mut()
            .find(|p| &p.id == id)
            .ok_or_else(|| PrintDeskError::not_found("printer", id))?;
        if printer.status != status {
            info!(from = ?printer.status, to = ?status, "printer status changed");
            printer.status = status;
        }
        Ok(printer.clone())
    }

    /// Move a printer from `expected` to `next`; any other current status
    /// (typically one set by an operator meanwhile) is left alone.
    pub fn swap_status(&self, id: &PrinterId, expected: PrinterStatus, next: PrinterStatus) -> bool {
        let mut printers = self.write();
        match printers.iter_mut().find(|p| &p.id == id) {
            Some(printer) if printer.status == expected => {
                debug!(printer_id = %id, from = ?expected, to = ?next, "printer status swapped");
                printer.status = next;
                true
            }
            _ => false,
        }
    }

    pub fn driver(&self, id: &PrinterId) -> Result<Arc<dyn PrinterDriver>> {
        self.drivers
            .get(id)
            .cloned()
            .ok_or_else(|| PrintDeskError::not_found("printer", id))
    }
}
