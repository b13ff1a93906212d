// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer drivers — the seam between the scheduler and a physical device.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use printdesk_core::error::{PrintDeskError, Result};
use printdesk_core::types::{JobFile, JobId, PrintSettings};
use tracing::{debug, info, warn};

/// One document of a job, with its bytes loaded.
#[derive(Debug, Clone)]
pub struct PrintDocument {
    pub file: JobFile,
    pub content: Vec<u8>,
}

/// Everything a driver needs to print one job.
#[derive(Debug, Clone)]
pub struct PrintPayload {
    pub job_id: JobId,
    pub settings: PrintSettings,
    pub documents: Vec<PrintDocument>,
}

/// Sink for page-level progress reported by a driver during an attempt.
#[derive(Clone)]
pub struct Progress {
    sink: Arc<dyn Fn(u64) + Send + Sync>,
}

impl Progress {
    pub fn new(sink: impl Fn(u64) + Send + Sync + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    /// A progress handle that discards updates.
    #[cfg(test)]
    pub fn ignore() -> Self {
        Self::new(|_| {})
    }

    /// Report the number of pages printed so far in this attempt.
    pub fn pages_printed(&self, pages: u64) {
        (self.sink)(pages);
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Progress")
    }
}

/// Delivers job payloads to a printer.
///
/// A call covers one attempt: it either prints the whole payload or returns
/// the error that stopped it. Retrying is the caller's job.
#[async_trait]
pub trait PrinterDriver: Send + Sync {
    /// Short transport name for logs ("simulated", "raw").
    fn kind(&self) -> &'static str;

    async fn deliver(&self, payload: &PrintPayload, progress: &Progress) -> Result<()>;
}

// ---------------------------------------------------------------------------
// Simulated printer
// ---------------------------------------------------------------------------

/// A printer without hardware: each page takes a fixed time.
///
/// Faults can be scripted with [`fail_next`](Self::fail_next); each queued
/// fault makes one delivery attempt fail before the first page.
pub struct SimulatedDriver {
    per_page: Duration,
    faults: Mutex<VecDeque<String>>,
}

impl SimulatedDriver {
    pub fn new(per_page: Duration) -> Self {
        Self {
            per_page,
            faults: Mutex::new(VecDeque::new()),
        }
    }

    pub fn from_millis(ms_per_page: u64) -> Self {
        Self::new(Duration::from_millis(ms_per_page))
    }

    /// Make the next delivery attempt fail with `detail`.
    pub fn fail_next(&self, detail: impl Into<String>) {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push_back(detail.into());
    }

    fn take_fault(&self) -> Option<String> {
        self.faults
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front()
    }
}

#[async_trait]
impl PrinterDriver for SimulatedDriver {
    fn kind(&self) -> &'static str {
        "simulated"
    }

    async fn deliver(&self, payload: &PrintPayload, progress: &Progress) -> Result<()> {
        if let Some(detail) = self.take_fault() {
            warn!(job_id = %payload.job_id, %detail, "simulated printer fault");
            return Err(PrintDeskError::Printer(detail));
        }

        let mut printed = 0u64;
        for document in &payload.documents {
            debug!(job_id = %payload.job_id, file = %document.file.name, "simulating document");
            for _ in 0..document.file.printed_pages() {
                tokio::time::sleep(self.per_page).await;
                printed += 1;
                progress.pages_printed(printed);
            }
        }

        info!(job_id = %payload.job_id, pages = printed, "simulated print finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    use printdesk_core::types::{DocumentType, FileId};

    fn payload(pages: u32, copies: u32) -> PrintPayload {
        PrintPayload {
            job_id: JobId::new(),
            settings: PrintSettings::default(),
            documents: vec![PrintDocument {
                file: JobFile {
                    file_id: FileId::new(),
                    name: "a.pdf".into(),
                    pages,
                    copies,
                    size: 3,
                    document_type: DocumentType::Pdf,
                    content_hash: String::new(),
                },
                content: b"pdf".to_vec(),
            }],
        }
    }

    #[tokio::test]
    async fn simulated_driver_reports_every_page() {
        let driver = SimulatedDriver::from_millis(1);
        let seen = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |pages| sink.store(pages, Ordering::SeqCst));

        let payload = payload(2, 3);
        driver.deliver(&payload, &progress).await.unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn scripted_fault_fails_one_attempt() {
        let driver = SimulatedDriver::from_millis(0);
        driver.fail_next("connection reset");

        let payload = payload(1, 1);
        let err = driver.deliver(&payload, &Progress::ignore()).await.unwrap_err();
        assert!(matches!(err, PrintDeskError::Printer(_)));
        assert!(driver.deliver(&payload, &Progress::ignore()).await.is_ok());
    }
}
