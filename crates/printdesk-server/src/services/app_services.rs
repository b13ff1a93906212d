// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Central service layer — opens every backend subsystem and hands the HTTP
// handlers one cheaply cloneable bundle.
//
// All members are `Arc`-wrapped and internally synchronised, so handlers call
// them directly without an outer lock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use printdesk_core::config::ServerConfig;
use printdesk_core::error::Result;
use printdesk_core::settings::SettingsStore;
use printdesk_core::types::FileId;
use printdesk_document::{DocumentStore, FileRegistry};
use printdesk_print::{JobScheduler, JobStore, PrinterRegistry, SchedulerConfig, StatsAggregator};

use super::data_dir;

const CONFIG_FILE: &str = "printdesk.json";
const SETTINGS_FILE: &str = "settings.json";
const JOBS_DB: &str = "jobs.db";

/// Shared application services, registered once as actix `web::Data`.
#[derive(Clone)]
pub struct AppServices {
    files: Arc<FileRegistry>,
    settings: Arc<SettingsStore>,
    scheduler: Arc<JobScheduler>,
    stats: Arc<StatsAggregator>,
    config: Arc<ServerConfig>,
    data_dir: Option<PathBuf>,
}

impl AppServices {
    /// Open the persistent stores under `dir`.  Call once at startup.
    pub fn init(config: ServerConfig, dir: &Path) -> Result<Self> {
        info!(path = %dir.display(), "initialising app services");

        let documents = DocumentStore::open(data_dir::data_subdir(dir, "documents")?)?;
        let files = Arc::new(FileRegistry::open(documents)?);
        let settings = Arc::new(SettingsStore::open(dir.join(SETTINGS_FILE)));
        let store = Arc::new(JobStore::open(dir.join(JOBS_DB))?);

        let services = Self::assemble(config, files, settings, store, Some(dir.to_path_buf()));
        info!("app services initialised");
        Ok(services)
    }

    /// Services with no disk footprint (tests, throwaway demo servers).
    pub fn ephemeral(config: ServerConfig) -> Result<Self> {
        Ok(Self::assemble(
            config,
            Arc::new(FileRegistry::in_memory()),
            Arc::new(SettingsStore::default()),
            Arc::new(JobStore::open_in_memory()?),
            None,
        ))
    }

    fn assemble(
        config: ServerConfig,
        files: Arc<FileRegistry>,
        settings: Arc<SettingsStore>,
        store: Arc<JobStore>,
        data_dir: Option<PathBuf>,
    ) -> Self {
        let printers = Arc::new(PrinterRegistry::from_config(&config.printers));
        let scheduler = Arc::new(JobScheduler::new(
            Arc::clone(&files),
            printers,
            Arc::clone(&settings),
            Arc::clone(&store),
            SchedulerConfig::from_server_config(&config),
        ));
        let stats = Arc::new(StatsAggregator::new(Arc::clone(&files), store));
        Self {
            files,
            settings,
            scheduler,
            stats,
            config: Arc::new(config),
            data_dir,
        }
    }

    // -- Background work -----------------------------------------------------

    /// Reconcile jobs left by a previous run, then start the printer lanes and
    /// the retention sweeper.  Must run inside a tokio runtime.
    pub fn start_background(&self) -> Result<Vec<JoinHandle<()>>> {
        let report = self.scheduler.recover()?;
        if !report.interrupted.is_empty() || !report.lost.is_empty() {
            info!(
                interrupted = report.interrupted.len(),
                lost = report.lost.len(),
                "jobs from the previous run were failed"
            );
        }

        let mut handles = self.scheduler.spawn_workers();
        handles.push(self.spawn_retention_sweeper());
        Ok(handles)
    }

    /// Delete uploads past the configured retention window.
    pub fn purge_expired_files(&self) -> Result<Vec<FileId>> {
        let days = self.settings.get().file_retention_days;
        self.files.purge_expired(days, Utc::now())
    }

    fn spawn_retention_sweeper(&self) -> JoinHandle<()> {
        let services = self.clone();
        let period = self.config.retention_sweep_interval();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                if let Err(e) = services.purge_expired_files() {
                    error!(error = %e, "retention sweep failed");
                }
            }
        })
    }

    // -- Accessors -----------------------------------------------------------

    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    pub fn stats(&self) -> &StatsAggregator {
        &self.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.data_dir.as_deref()
    }
}

/// Config path: `$PRINTDESK_CONFIG`, else `<data_dir>/printdesk.json`.
pub fn config_path(explicit: Option<PathBuf>, dir: &Path) -> PathBuf {
    explicit.unwrap_or_else(|| dir.join(CONFIG_FILE))
}

/// Load the server config for `dir`.  A missing file yields the defaults.
pub fn load_config(dir: &Path) -> Result<ServerConfig> {
    let explicit = std::env::var_os("PRINTDESK_CONFIG")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    ServerConfig::load(&config_path(explicit, dir))
}
