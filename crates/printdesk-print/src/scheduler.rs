// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job scheduler — creates jobs, queues them per printer, and drives them
// through their lifecycle.
//
// Each printer owns a lane: a FIFO of job ids, a `Notify`, and one worker
// task. The worker pops the next job and moves it to `printing` while holding
// the lane lock, so a concurrent cancel either removes the job from the FIFO
// first or finds it already printing. One worker per lane means at most one
// printing job per printer; lanes of different printers run independently.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument, warn};

use printdesk_core::config::ServerConfig;
use printdesk_core::error::{PrintDeskError, Result};
use printdesk_core::settings::SettingsStore;
use printdesk_core::types::{
    FileId, JobId, JobStatus, PrintJob, PrintSettings, Printer, PrinterId, PrinterStatus,
};
use printdesk_document::FileRegistry;

use crate::driver::{PrintDocument, PrintPayload, Progress};
use crate::printers::PrinterRegistry;
use crate::retry::{RetryConfig, RetryDecision, should_retry};
use crate::store::JobStore;

/// Jobs returned by listings when the caller gives no limit.
pub const DEFAULT_LIST_LIMIT: usize = 50;
/// Upper bound for listing limits.
pub const MAX_LIST_LIMIT: usize = 500;

/// Cap a caller-supplied listing limit at `MAX_LIST_LIMIT`. `0` lists nothing.
pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIST_LIMIT).min(MAX_LIST_LIMIT)
}

/// Timing and retry policy for print execution.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Bound on one job's delivery, all attempts and backoff included.
    pub print_timeout: Duration,
    pub retry: RetryConfig,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            print_timeout: Duration::from_secs(300),
            retry: RetryConfig::default(),
        }
    }
}

impl SchedulerConfig {
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            print_timeout: config.print_timeout(),
            retry: RetryConfig::from_server_config(config),
        }
    }
}

/// Snapshot of a job's progress as exposed to pollers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobStatusReport {
    pub job_id: JobId,
    pub status: JobStatus,
    /// 0–100.
    pub progress: u8,
    pub error: Option<String>,
}

/// Result of a combined create-and-start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartedJob {
    pub job_id: JobId,
    pub total_pages: u64,
}

/// What [`JobScheduler::recover`] did with jobs left over from a previous run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// Jobs that were printing when the process stopped; now failed.
    pub interrupted: Vec<JobId>,
    /// Queued jobs put back on their printer's lane.
    pub requeued: Vec<JobId>,
    /// Jobs whose files or printer disappeared; now failed.
    pub lost: Vec<JobId>,
}

struct Lane {
    queue: Mutex<VecDeque<JobId>>,
    wake: Notify,
}

impl Lane {
    fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            wake: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<JobId>> {
        self.queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// The print-job state machine and its per-printer lanes.
pub struct JobScheduler {
    files: Arc<FileRegistry>,
    printers: Arc<PrinterRegistry>,
    settings: Arc<SettingsStore>,
    store: Arc<JobStore>,
    lanes: HashMap<PrinterId, Arc<Lane>>,
    config: SchedulerConfig,
}

impl JobScheduler {
    /// Build a scheduler with one (idle) lane per registered printer.
    /// Call [`spawn_workers`](Self::spawn_workers) to start printing.
    pub fn new(
        files: Arc<FileRegistry>,
        printers: Arc<PrinterRegistry>,
        settings: Arc<SettingsStore>,
        store: Arc<JobStore>,
        config: SchedulerConfig,
    ) -> Self {
        let lanes = printers
            .ids()
            .into_iter()
            .map(|id| (id, Arc::new(Lane::new())))
            .collect();
        Self {
            files,
            printers,
            settings,
            store,
            lanes,
            config,
        }
    }

    pub fn printers(&self) -> &Arc<PrinterRegistry> {
        &self.printers
    }

    fn lane(&self, printer_id: &PrinterId) -> Result<&Arc<Lane>> {
        self.lanes.get(printer_id).ok_or_else(|| {
            PrintDeskError::InvalidState(format!("printer '{printer_id}' has no job lane"))
        })
    }

    // -- Job operations -------------------------------------------------------

    /// Create a job in `created` state from registered files.
    ///
    /// Explicit settings must be supported by the printer; omitted settings
    /// default to the system defaults fitted to the printer's capabilities.
    #[instrument(skip(self, file_ids, settings), fields(printer_id = %printer_id, files = file_ids.len()))]
    pub fn create_job(
        &self,
        file_ids: &[FileId],
        printer_id: &PrinterId,
        settings: Option<PrintSettings>,
    ) -> Result<PrintJob> {
        if file_ids.is_empty() {
            return Err(PrintDeskError::InvalidArgument(
                "a print job needs at least one file".into(),
            ));
        }
        let printer = self.printers.get(printer_id)?;
        for id in file_ids {
            self.files.get(*id)?;
        }

        let settings = match settings {
            Some(explicit) => {
                printer.capabilities.check(&explicit)?;
                explicit
            }
            None => printer
                .capabilities
                .fit(&self.settings.get().default_settings),
        };

        let snapshots = self.files.snapshot_and_pin(file_ids)?;
        let job = PrintJob::new(snapshots, printer_id.clone(), settings)
            .and_then(|job| self.store.insert(&job).map(|()| job));
        match job {
            Ok(job) => {
                info!(job_id = %job.id, total_pages = job.total_pages, "print job created");
                Ok(job)
            }
            Err(err) => {
                self.files.unpin(file_ids);
                Err(err)
            }
        }
    }

    /// Queue a `created` job on its printer's lane. Returns without waiting
    /// for the print.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn start(&self, job_id: JobId) -> Result<PrintJob> {
        let job = self.store.require(job_id)?;
        let lane = self.lane(&job.printer_id)?;

        let queued = {
            let mut queue = lane.lock();
            let queued = self.store.transition(job_id, JobStatus::Queued, None)?;
            queue.push_back(job_id);
            queued
        };
        lane.wake.notify_one();

        info!(printer_id = %queued.printer_id, "print job queued");
        Ok(queued)
    }

    /// Create a job and queue it. If queueing fails the new job is failed
    /// with the start error, which is also returned.
    pub fn create_and_start(
        &self,
        file_ids: &[FileId],
        printer_id: &PrinterId,
        settings: Option<PrintSettings>,
    ) -> Result<StartedJob> {
        let job = self.create_job(file_ids, printer_id, settings)?;
        match self.start(job.id) {
            Ok(_) => Ok(StartedJob {
                job_id: job.id,
                total_pages: job.total_pages,
            }),
            Err(err) => {
                warn!(job_id = %job.id, error = %err, "start after create failed");
                match self
                    .store
                    .transition(job.id, JobStatus::Failed, Some(&err.to_string()))
                {
                    Ok(_) => self.files.unpin(&job.file_ids()),
                    Err(mark_err) => {
                        error!(job_id = %job.id, error = %mark_err, "could not fail job")
                    }
                }
                Err(err)
            }
        }
    }

    pub fn status(&self, job_id: JobId) -> Result<JobStatusReport> {
        let job = self.store.require(job_id)?;
        Ok(JobStatusReport {
            job_id,
            status: job.status,
            progress: job.progress(),
            error: job.error_message,
        })
    }

    /// Cancel a job that has not started printing.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub fn cancel(&self, job_id: JobId) -> Result<PrintJob> {
        let job = self.store.require(job_id)?;
        let cancelled = match self.lanes.get(&job.printer_id) {
            Some(lane) => {
                let mut queue = lane.lock();
                let cancelled = self.store.transition(job_id, JobStatus::Cancelled, None)?;
                queue.retain(|queued| *queued != job_id);
                cancelled
            }
            None => self.store.transition(job_id, JobStatus::Cancelled, None)?,
        };
        self.files.unpin(&cancelled.file_ids());

        info!("print job cancelled");
        Ok(cancelled)
    }

    pub fn get(&self, job_id: JobId) -> Result<PrintJob> {
        self.store.require(job_id)
    }

    /// Most recently created jobs first.
    pub fn list(&self, limit: Option<usize>) -> Result<Vec<PrintJob>> {
        self.store.list(clamp_limit(limit))
    }

    /// Change a printer's status. Taking a printer `offline` holds its queue;
    /// any other status lets the lane run.
    pub fn set_printer_status(&self, printer_id: &PrinterId, status: PrinterStatus) -> Result<Printer> {
        let printer = self.printers.set_status(printer_id, status)?;
        if let Some(lane) = self.lanes.get(printer_id) {
            lane.wake.notify_one();
        }
        Ok(printer)
    }

    // -- Startup --------------------------------------------------------------

    /// Reconcile jobs persisted by a previous run. Call before
    /// [`spawn_workers`](Self::spawn_workers).
    #[instrument(skip(self))]
    pub fn recover(&self) -> Result<RecoveryReport> {
        let mut report = RecoveryReport::default();

        for job in self.store.with_status(JobStatus::Printing)? {
            self.store
                .transition(job.id, JobStatus::Failed, Some("interrupted by restart"))?;
            report.interrupted.push(job.id);
        }

        for job in self.store.with_status(JobStatus::Created)? {
            if let Err(err) = self.files.snapshot_and_pin(&job.file_ids()) {
                self.store.transition(
                    job.id,
                    JobStatus::Failed,
                    Some(&format!("referenced file unavailable: {err}")),
                )?;
                report.lost.push(job.id);
            }
        }

        for job in self.store.with_status(JobStatus::Queued)? {
            let file_ids = job.file_ids();
            if let Err(err) = self.files.snapshot_and_pin(&file_ids) {
                self.store.transition(
                    job.id,
                    JobStatus::Failed,
                    Some(&format!("referenced file unavailable: {err}")),
                )?;
                report.lost.push(job.id);
                continue;
            }
            match self.lanes.get(&job.printer_id) {
                Some(lane) => {
                    lane.lock().push_back(job.id);
                    lane.wake.notify_one();
                    report.requeued.push(job.id);
                }
                None => {
                    self.store.transition(
                        job.id,
                        JobStatus::Failed,
                        Some(&format!("printer '{}' is no longer configured", job.printer_id)),
                    )?;
                    self.files.unpin(&file_ids);
                    report.lost.push(job.id);
                }
            }
        }

        info!(
            interrupted = report.interrupted.len(),
            requeued = report.requeued.len(),
            lost = report.lost.len(),
            "job recovery finished"
        );
        Ok(report)
    }

    /// Start one worker task per printer lane. Must run inside a tokio runtime.
    pub fn spawn_workers(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        self.lanes
            .iter()
            .map(|(printer_id, lane)| {
                let scheduler = Arc::clone(self);
                let printer_id = printer_id.clone();
                let lane = Arc::clone(lane);
                tokio::spawn(async move { scheduler.run_lane(printer_id, lane).await })
            })
            .collect()
    }

    // -- Lane worker ----------------------------------------------------------

    async fn run_lane(&self, printer_id: PrinterId, lane: Arc<Lane>) {
        info!(printer_id = %printer_id, "lane worker started");
        loop {
            match self.next_job(&printer_id, &lane) {
                Some(job) => self.execute(job).await,
                // `notify_one` leaves a permit when nobody waits, so a start
                // between `next_job` and here is not lost.
                None => lane.wake.notified().await,
            }
        }
    }

    /// Pop the next job and mark it printing, under the lane lock.
    fn next_job(&self, printer_id: &PrinterId, lane: &Lane) -> Option<PrintJob> {
        match self.printers.status(printer_id) {
            Ok(PrinterStatus::Offline) | Err(_) => return None,
            Ok(_) => {}
        }

        let mut queue = lane.lock();
        while let Some(job_id) = queue.pop_front() {
            match self.store.transition(job_id, JobStatus::Printing, None) {
                Ok(job) => return Some(job),
                Err(err) => {
                    warn!(job_id = %job_id, error = %err, "skipping job that can no longer print")
                }
            }
        }
        None
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, printer_id = %job.printer_id))]
    async fn execute(&self, job: PrintJob) {
        if let Err(err) = self.printers.set_status(&job.printer_id, PrinterStatus::Busy) {
            warn!(error = %err, "could not mark printer busy");
        }
        info!(total_pages = job.total_pages, "printing");

        let delivery = tokio::time::timeout(self.config.print_timeout, self.deliver(&job));
        let outcome = match delivery.await {
            Ok(result) => result,
            Err(_) => Err(PrintDeskError::Timeout(format!(
                "job did not finish within {:?}",
                self.config.print_timeout
            ))),
        };

        let next_printer_status = match outcome {
            Ok(()) => {
                if let Err(err) = self.store.transition(job.id, JobStatus::Completed, None) {
                    error!(error = %err, "could not mark job completed");
                }
                info!("print job completed");
                PrinterStatus::Online
            }
            Err(err) => {
                let message = err.to_string();
                if let Err(store_err) =
                    self.store
                        .transition(job.id, JobStatus::Failed, Some(&message))
                {
                    error!(error = %store_err, "could not mark job failed");
                }
                warn!(error = %message, "print job failed");
                match err {
                    PrintDeskError::Printer(_) | PrintDeskError::Timeout(_) => PrinterStatus::Error,
                    _ => PrinterStatus::Online,
                }
            }
        };

        self.printers
            .swap_status(&job.printer_id, PrinterStatus::Busy, next_printer_status);
        self.files.unpin(&job.file_ids());
    }

    /// Deliver a job, retrying transient failures with backoff.
    async fn deliver(&self, job: &PrintJob) -> Result<()> {
        let driver = self.printers.driver(&job.printer_id)?;
        let payload = self.load_payload(job)?;

        let store = Arc::clone(&self.store);
        let job_id = job.id;
        let progress = Progress::new(move |pages| {
            if let Err(err) = store.record_progress(job_id, pages) {
                warn!(job_id = %job_id, error = %err, "could not record progress");
            }
        });

        loop {
            let attempt = self.store.begin_attempt(job.id)?;
            debug!(attempt, driver = driver.kind(), "delivery attempt");

            let err = match driver.deliver(&payload, &progress).await {
                Ok(()) => return Ok(()),
                Err(err) => err,
            };
            warn!(attempt, error = %err, "delivery attempt failed");
            self.store.record_attempt_error(job.id, &err.to_string())?;

            match should_retry(&err, attempt, &self.config.retry) {
                RetryDecision::RetryAfter(delay) => tokio::time::sleep(delay).await,
                RetryDecision::GiveUp(_) | RetryDecision::Exhausted => return Err(err),
            }
        }
    }

    fn load_payload(&self, job: &PrintJob) -> Result<PrintPayload> {
        let documents = job
            .files
            .iter()
            .map(|file| {
                Ok(PrintDocument {
                    file: file.clone(),
                    content: self.files.content(file.file_id)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(PrintPayload {
            job_id: job.id,
            settings: job.settings,
            documents,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    use printdesk_core::error::ErrorKind;
    use printdesk_core::settings::Settings;
    use printdesk_core::types::{ColorMode, DuplexMode, PrinterCapabilities, StoredFile};
    use printdesk_document::{DocumentStore, Upload};
    use printdesk_document::test_support::blank_pdf;

    use crate::driver::{PrinterDriver, SimulatedDriver};

    struct Fixture {
        scheduler: Arc<JobScheduler>,
        files: Arc<FileRegistry>,
        drivers: Vec<Arc<SimulatedDriver>>,
    }

    fn printer(id: &str, color: bool) -> Printer {
        Printer {
            id: PrinterId::new(id),
            name: format!("Test {id}"),
            model: None,
            location: None,
            status: PrinterStatus::Online,
            capabilities: PrinterCapabilities {
                color,
                duplex: false,
                ..Default::default()
            },
        }
    }

    fn fixture_with(ms_per_page: u64, config: SchedulerConfig) -> Fixture {
        let drivers: Vec<Arc<SimulatedDriver>> = (0..2)
            .map(|_| Arc::new(SimulatedDriver::from_millis(ms_per_page)))
            .collect();
        let printers = PrinterRegistry::new(vec![
            (printer("p1", true), drivers[0].clone() as Arc<dyn PrinterDriver>),
            (printer("p2", false), drivers[1].clone() as Arc<dyn PrinterDriver>),
        ]);
        let files = Arc::new(FileRegistry::in_memory());
        let scheduler = Arc::new(JobScheduler::new(
            Arc::clone(&files),
            Arc::new(printers),
            Arc::new(SettingsStore::default()),
            Arc::new(JobStore::open_in_memory().unwrap()),
            config,
        ));
        Fixture {
            scheduler,
            files,
            drivers,
        }
    }

    fn fast_config() -> SchedulerConfig {
        SchedulerConfig {
            print_timeout: Duration::from_secs(10),
            retry: RetryConfig {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(5),
            },
        }
    }

    fn fixture(ms_per_page: u64) -> Fixture {
        fixture_with(ms_per_page, fast_config())
    }

    fn upload_pdf(files: &FileRegistry, name: &str, pages: u32) -> StoredFile {
        files
            .upload(
                &Settings::default(),
                Upload::new(name, "application/pdf", blank_pdf(pages)),
            )
            .unwrap()
    }

    fn p1() -> PrinterId {
        PrinterId::new("p1")
    }

    async fn wait_for_status(scheduler: &JobScheduler, job_id: JobId, want: JobStatus) -> PrintJob {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let job = scheduler.get(job_id).unwrap();
            if job.status == want {
                return job;
            }
            assert!(
                Instant::now() < deadline,
                "job stuck in {} waiting for {}",
                job.status,
                want
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn total_pages_is_snapshotted_at_creation() {
        let fx = fixture(0);
        let a = upload_pdf(&fx.files, "a.pdf", 3);
        let b = upload_pdf(&fx.files, "b.pdf", 2);
        fx.files.set_copies(b.id, 2).unwrap();

        let job = fx.scheduler.create_job(&[a.id, b.id], &p1(), None).unwrap();
        assert_eq!(job.total_pages, 7);
        assert_eq!(job.status, JobStatus::Created);

        fx.files.set_copies(a.id, 5).unwrap();
        assert_eq!(fx.scheduler.get(job.id).unwrap().total_pages, 7);
    }

    #[test]
    fn create_job_validation_creates_nothing() {
        let fx = fixture(0);
        let a = upload_pdf(&fx.files, "a.pdf", 1);

        let err = fx.scheduler.create_job(&[], &p1(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let err = fx
            .scheduler
            .create_job(&[a.id], &PrinterId::new("nope"), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        let err = fx
            .scheduler
            .create_job(&[a.id, FileId::new()], &p1(), None)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);

        assert!(fx.scheduler.list(None).unwrap().is_empty());
        assert!(!fx.files.is_pinned(a.id));
    }

    #[test]
    fn explicit_settings_must_fit_printer_but_defaults_are_fitted() {
        let fx = fixture(0);
        let a = upload_pdf(&fx.files, "a.pdf", 1);
        let mono = PrinterId::new("p2");

        let color = PrintSettings::default();
        let err = fx.scheduler.create_job(&[a.id], &mono, Some(color)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);

        let job = fx.scheduler.create_job(&[a.id], &mono, None).unwrap();
        assert_eq!(job.settings.color_mode, ColorMode::Bw);
        assert_eq!(job.settings.duplex, DuplexMode::None);
    }

    #[test]
    fn pinned_files_cannot_be_deleted_until_terminal() {
        let fx = fixture(0);
        let a = upload_pdf(&fx.files, "a.pdf", 1);
        let job = fx.scheduler.create_job(&[a.id], &p1(), None).unwrap();

        assert_eq!(fx.files.delete(a.id).unwrap_err().kind(), ErrorKind::InvalidState);
        fx.scheduler.cancel(job.id).unwrap();
        fx.files.delete(a.id).unwrap();
    }

    #[test]
    fn start_twice_is_invalid_state() {
        let fx = fixture(0);
        let a = upload_pdf(&fx.files, "a.pdf", 1);
        let job = fx.scheduler.create_job(&[a.id], &p1(), None).unwrap();

        let queued = fx.scheduler.start(job.id).unwrap();
        assert_eq!(queued.status, JobStatus::Queued);
        assert!(queued.queued_at.is_some());

        let err = fx.scheduler.start(job.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            fx.scheduler.start(JobId::new()).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn started_job_prints_to_completion() {
        let fx = fixture(1);
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 3);

        let started = fx.scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        assert_eq!(started.total_pages, 3);

        let job = wait_for_status(&fx.scheduler, started.job_id, JobStatus::Completed).await;
        assert_eq!(job.pages_printed, 3);
        assert_eq!(job.attempts, 1);
        assert!(job.started_at.is_some() && job.completed_at.is_some());

        let report = fx.scheduler.status(started.job_id).unwrap();
        assert_eq!(report.progress, 100);
        assert!(report.error.is_none());

        assert_eq!(
            fx.scheduler.printers().status(&p1()).unwrap(),
            PrinterStatus::Online
        );
        assert!(!fx.files.is_pinned(a.id));
    }

    #[tokio::test]
    async fn one_printer_prints_one_job_at_a_time_in_fifo_order() {
        let fx = fixture(10);
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 3);

        let mut ids = Vec::new();
        for _ in 0..4 {
            let job = fx.scheduler.create_job(&[a.id], &p1(), None).unwrap();
            fx.scheduler.start(job.id).unwrap();
            ids.push(job.id);
        }

        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            let jobs: Vec<PrintJob> = ids.iter().map(|id| fx.scheduler.get(*id).unwrap()).collect();
            let printing = jobs.iter().filter(|j| j.status == JobStatus::Printing).count();
            assert!(printing <= 1, "{printing} jobs printing on one printer");
            if jobs.iter().all(|j| j.status == JobStatus::Completed) {
                for pair in jobs.windows(2) {
                    assert!(pair[0].completed_at <= pair[1].started_at);
                }
                break;
            }
            assert!(Instant::now() < deadline, "jobs did not finish");
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_starts_keep_one_printing_job_per_printer() {
        let fx = fixture(3);
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 2);

        let created: Vec<JobId> = (0..12)
            .map(|_| fx.scheduler.create_job(&[a.id], &p1(), None).unwrap().id)
            .collect();
        let starts: Vec<_> = created
            .iter()
            .map(|&id| {
                let scheduler = Arc::clone(&fx.scheduler);
                tokio::spawn(async move { scheduler.start(id) })
            })
            .collect();
        for handle in starts {
            assert_eq!(handle.await.unwrap().unwrap().status, JobStatus::Queued);
        }

        let deadline = Instant::now() + Duration::from_secs(20);
        let mut max_printing = 0;
        let mut jobs = loop {
            let jobs: Vec<PrintJob> = created.iter().map(|id| fx.scheduler.get(*id).unwrap()).collect();
            let printing = jobs.iter().filter(|j| j.status == JobStatus::Printing).count();
            max_printing = max_printing.max(printing);
            if jobs.iter().all(|j| j.status == JobStatus::Completed) {
                break jobs;
            }
            assert!(Instant::now() < deadline, "jobs did not finish");
            tokio::time::sleep(Duration::from_millis(1)).await;
        };
        assert!(max_printing <= 1, "{max_printing} jobs printing on one printer");

        // Print order must follow queue order, one job after another.
        jobs.sort_by_key(|j| j.started_at);
        for pair in jobs.windows(2) {
            assert!(pair[0].queued_at <= pair[1].queued_at);
            assert!(pair[0].completed_at <= pair[1].started_at);
        }
    }

    #[tokio::test]
    async fn content_changed_on_disk_fails_the_job() {
        let dir = tempfile::tempdir().unwrap();
        let files = Arc::new(FileRegistry::open(DocumentStore::open(dir.path()).unwrap()).unwrap());
        let driver = Arc::new(SimulatedDriver::from_millis(0));
        let printers = PrinterRegistry::new(vec![(printer("p1", true), driver as Arc<dyn PrinterDriver>)]);
        let scheduler = Arc::new(JobScheduler::new(
            Arc::clone(&files),
            Arc::new(printers),
            Arc::new(SettingsStore::default()),
            Arc::new(JobStore::open_in_memory().unwrap()),
            fast_config(),
        ));
        scheduler.spawn_workers();

        let a = upload_pdf(&files, "a.pdf", 1);
        std::fs::write(dir.path().join(a.id.to_string()), b"changed").unwrap();

        let started = scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        let job = wait_for_status(&scheduler, started.job_id, JobStatus::Failed).await;
        assert!(job.error_message.unwrap().contains("integrity check failed"));
        assert_eq!(job.pages_printed, 0);
    }

    #[tokio::test]
    async fn different_printers_print_concurrently() {
        let fx = fixture(40);
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 5);
        let bw = PrintSettings {
            color_mode: ColorMode::Bw,
            ..Default::default()
        };

        let j1 = fx.scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        let j2 = fx
            .scheduler
            .create_and_start(&[a.id], &PrinterId::new("p2"), Some(bw))
            .unwrap();

        let first = wait_for_status(&fx.scheduler, j1.job_id, JobStatus::Completed).await;
        let second = wait_for_status(&fx.scheduler, j2.job_id, JobStatus::Completed).await;
        assert!(second.started_at < first.completed_at);
        assert!(first.started_at < second.completed_at);
    }

    #[tokio::test]
    async fn transient_fault_is_retried() {
        let fx = fixture(1);
        fx.drivers[0].fail_next("connection reset by peer");
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 2);

        let started = fx.scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        let job = wait_for_status(&fx.scheduler, started.job_id, JobStatus::Completed).await;
        assert_eq!(job.attempts, 2);
        assert_eq!(job.error_history.len(), 1);
        assert!(job.error_message.is_none());
    }

    #[tokio::test]
    async fn exhausted_retries_fail_the_job() {
        let fx = fixture(1);
        for _ in 0..3 {
            fx.drivers[0].fail_next("connection refused");
        }
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 1);

        let started = fx.scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        let job = wait_for_status(&fx.scheduler, started.job_id, JobStatus::Failed).await;
        assert_eq!(job.attempts, 3);
        assert!(job.error_message.unwrap().contains("connection refused"));
        assert_eq!(
            fx.scheduler.printers().status(&p1()).unwrap(),
            PrinterStatus::Error
        );
        assert!(!fx.files.is_pinned(a.id));
    }

    #[tokio::test]
    async fn user_action_fault_fails_without_retry() {
        let fx = fixture(1);
        fx.drivers[0].fail_next("printer stopped: paper-jam");
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 1);

        let started = fx.scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        let job = wait_for_status(&fx.scheduler, started.job_id, JobStatus::Failed).await;
        assert_eq!(job.attempts, 1);

        let report = fx.scheduler.status(started.job_id).unwrap();
        assert!(report.error.unwrap().contains("paper-jam"));
    }

    #[tokio::test]
    async fn slow_print_times_out() {
        let fx = fixture_with(
            1_000,
            SchedulerConfig {
                print_timeout: Duration::from_millis(50),
                ..fast_config()
            },
        );
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 5);

        let started = fx.scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        let job = wait_for_status(&fx.scheduler, started.job_id, JobStatus::Failed).await;
        assert!(job.error_message.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn queued_job_can_be_cancelled_while_printer_is_offline() {
        let fx = fixture(1);
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 1);
        fx.scheduler
            .set_printer_status(&p1(), PrinterStatus::Offline)
            .unwrap();

        let held = fx.scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        let kept = fx.scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(fx.scheduler.get(held.job_id).unwrap().status, JobStatus::Queued);

        let cancelled = fx.scheduler.cancel(held.job_id).unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.completed_at.is_some());

        fx.scheduler
            .set_printer_status(&p1(), PrinterStatus::Online)
            .unwrap();
        wait_for_status(&fx.scheduler, kept.job_id, JobStatus::Completed).await;
        assert_eq!(
            fx.scheduler.get(held.job_id).unwrap().status,
            JobStatus::Cancelled
        );

        let err = fx.scheduler.cancel(kept.job_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[tokio::test]
    async fn printing_job_cannot_be_cancelled() {
        let fx = fixture(200);
        fx.scheduler.spawn_workers();
        let a = upload_pdf(&fx.files, "a.pdf", 5);

        let started = fx.scheduler.create_and_start(&[a.id], &p1(), None).unwrap();
        wait_for_status(&fx.scheduler, started.job_id, JobStatus::Printing).await;

        let err = fx.scheduler.cancel(started.job_id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(
            fx.scheduler.printers().status(&p1()).unwrap(),
            PrinterStatus::Busy
        );
    }

    #[tokio::test]
    async fn recovery_fails_interrupted_and_requeues_queued() {
        let files = Arc::new(FileRegistry::in_memory());
        let store = Arc::new(JobStore::open_in_memory().unwrap());
        let build = || {
            let driver: Arc<dyn PrinterDriver> = Arc::new(SimulatedDriver::from_millis(1));
            Arc::new(JobScheduler::new(
                Arc::clone(&files),
                Arc::new(PrinterRegistry::new(vec![(printer("p1", true), driver)])),
                Arc::new(SettingsStore::default()),
                Arc::clone(&store),
                fast_config(),
            ))
        };
        let a = upload_pdf(&files, "a.pdf", 2);

        let before = build();
        let queued = before.create_and_start(&[a.id], &p1(), None).unwrap();
        let interrupted = before.create_and_start(&[a.id], &p1(), None).unwrap();
        store
            .transition(interrupted.job_id, JobStatus::Printing, None)
            .unwrap();
        let created = before.create_job(&[a.id], &p1(), None).unwrap();
        drop(before);

        let after = build();
        let report = after.recover().unwrap();
        assert_eq!(report.interrupted, vec![interrupted.job_id]);
        assert_eq!(report.requeued, vec![queued.job_id]);
        assert!(report.lost.is_empty());

        let failed = after.get(interrupted.job_id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert_eq!(failed.error_message.as_deref(), Some("interrupted by restart"));

        after.spawn_workers();
        wait_for_status(&after, queued.job_id, JobStatus::Completed).await;
        assert_eq!(after.get(created.id).unwrap().status, JobStatus::Created);
    }

    #[test]
    fn list_is_newest_first_and_capped() {
        let fx = fixture(0);
        let a = upload_pdf(&fx.files, "a.pdf", 1);
        let first = fx.scheduler.create_job(&[a.id], &p1(), None).unwrap();
        let second = fx.scheduler.create_job(&[a.id], &p1(), None).unwrap();

        let jobs = fx.scheduler.list(None).unwrap();
        assert_eq!(jobs[0].id, second.id);
        assert_eq!(jobs[1].id, first.id);
        assert_eq!(fx.scheduler.list(Some(1)).unwrap().len(), 1);
        assert!(fx.scheduler.list(Some(0)).unwrap().is_empty());
        assert_eq!(clamp_limit(Some(10_000)), MAX_LIST_LIMIT);
        assert_eq!(clamp_limit(None), DEFAULT_LIST_LIMIT);
    }
}
