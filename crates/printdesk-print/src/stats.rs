// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Dashboard statistics and print history, derived from the job store on
// every call.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use printdesk_core::error::Result;
use printdesk_core::types::{JobId, JobStatus, PrintJob, PrinterId};
use printdesk_document::FileRegistry;

use crate::scheduler::clamp_limit;
use crate::store::JobStore;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardStats {
    /// Files currently in the registry.
    pub total_files: usize,
    /// Pages produced by completed jobs.
    pub total_pages: u64,
    /// Jobs ever created, in any state.
    pub total_print_jobs: u64,
    /// completed / (completed + failed) × 100, one decimal; 0 with no outcomes.
    pub success_rate: f64,
}

/// One finished job, as listed in the print history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub job_id: JobId,
    pub printer_id: PrinterId,
    pub status: JobStatus,
    pub file_names: Vec<String>,
    pub total_pages: u64,
    pub pages_printed: u64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<PrintJob> for HistoryEntry {
    fn from(job: PrintJob) -> Self {
        Self {
            job_id: job.id,
            printer_id: job.printer_id,
            status: job.status,
            file_names: job.files.into_iter().map(|f| f.name).collect(),
            total_pages: job.total_pages,
            pages_printed: job.pages_printed,
            created_at: job.created_at,
            completed_at: job.completed_at,
            error_message: job.error_message,
        }
    }
}

/// Percentage of decided jobs that completed, rounded to one decimal.
pub fn success_rate(completed: u64, failed: u64) -> f64 {
    let decided = completed + failed;
    if decided == 0 {
        return 0.0;
    }
    let rate = completed as f64 / decided as f64 * 100.0;
    (rate * 10.0).round() / 10.0
}

/// Read-only view over the job store and file registry.
pub struct StatsAggregator {
    files: Arc<FileRegistry>,
    store: Arc<JobStore>,
}

impl StatsAggregator {
    pub fn new(files: Arc<FileRegistry>, store: Arc<JobStore>) -> Self {
        Self { files, store }
    }

    pub fn dashboard(&self) -> Result<DashboardStats> {
        let counts = self.store.count_by_status()?;
        let count = |status: JobStatus| counts.get(&status).copied().unwrap_or(0);

        let stats = DashboardStats {
            total_files: self.files.len(),
            total_pages: self.store.completed_pages()?,
            total_print_jobs: counts.values().sum(),
            success_rate: success_rate(count(JobStatus::Completed), count(JobStatus::Failed)),
        };
        debug!(?stats, "dashboard computed");
        Ok(stats)
    }

    /// Terminal jobs, newest completion first.
    pub fn history(&self, limit: Option<usize>) -> Result<Vec<HistoryEntry>> {
        Ok(self
            .store
            .history(clamp_limit(limit))?
            .into_iter()
            .map(HistoryEntry::from)
            .collect())
    }
}
