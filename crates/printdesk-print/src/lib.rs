// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk Print — printer registry and drivers, the persistent job store,
// the per-printer job scheduler, and the statistics built on top of it.
// This crate sits between the domain types in `printdesk-core` and the
// printers that actually put ink on paper.

pub mod driver;
pub mod printers;
pub mod raw_client;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use driver::{PrinterDriver, SimulatedDriver};
pub use printers::PrinterRegistry;
pub use raw_client::RawDriver;
pub use scheduler::{JobScheduler, JobStatusReport, SchedulerConfig, StartedJob};
pub use stats::{DashboardStats, HistoryEntry, StatsAggregator};
pub use store::JobStore;
