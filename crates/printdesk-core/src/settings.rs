// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// System settings and the store that owns them.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::error::{PrintDeskError, Result};
use crate::types::{PrintSettings, file_extension};

const MIB: u64 = 1024 * 1024;

/// Mutable system-wide defaults and limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Print settings used when a job request does not carry any.
    pub default_settings: PrintSettings,
    /// Uploads older than this are purged. `0` keeps them forever.
    pub file_retention_days: u32,
    pub max_file_size_mb: u64,
    /// Extensions (".pdf") and/or MIME types ("application/pdf").
    pub supported_file_types: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_settings: PrintSettings::default(),
            file_retention_days: 30,
            max_file_size_mb: 100,
            supported_file_types: [
                ".pdf", ".doc", ".docx", ".xls", ".xlsx", ".csv", ".txt", ".jpg", ".jpeg",
                ".png",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl Settings {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(MIB)
    }

    /// Whether an upload called `name` with declared `mime` is accepted.
    pub fn accepts(&self, name: &str, mime: &str) -> bool {
        let ext = file_extension(name).map(|e| format!(".{}", e.to_ascii_lowercase()));
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();

        self.supported_file_types.iter().any(|entry| {
            let entry = entry.trim().to_ascii_lowercase();
            if entry.starts_with('.') {
                ext.as_deref() == Some(entry.as_str())
            } else {
                !essence.is_empty() && entry == essence
            }
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_file_size_mb == 0 {
            return Err(PrintDeskError::InvalidArgument(
                "max_file_size_mb must be at least 1".into(),
            ));
        }
        if self.supported_file_types.is_empty() {
            return Err(PrintDeskError::InvalidArgument(
                "supported_file_types must not be empty".into(),
            ));
        }
        if self.supported_file_types.iter().any(|t| t.trim().is_empty()) {
            return Err(PrintDeskError::InvalidArgument(
                "supported_file_types must not contain blank entries".into(),
            ));
        }
        Ok(())
    }
}

/// Owner of the current [`Settings`].
///
/// Readers get a clone; updates replace the whole value.  When opened from a
/// path the settings are written back on every update.
pub struct SettingsStore {
    current: RwLock<Settings>,
    path: Option<PathBuf>,
}

impl SettingsStore {
    /// A store that lives only in memory (tests, ephemeral servers).
    pub fn in_memory(settings: Settings) -> Self {
        Self {
            current: RwLock::new(settings),
            path: None,
        }
    }

    /// Load settings from `path`, or start from defaults if it is missing or
    /// unreadable.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let settings = match std::fs::read_to_string(&path) {
            Ok(data) => match serde_json::from_str::<Settings>(&data) {
                Ok(s) if s.validate().is_ok() => s,
                Ok(_) | Err(_) => {
                    warn!("stored settings invalid, using defaults");
                    Settings::default()
                }
            },
            Err(_) => Settings::default(),
        };
        info!(max_file_size_mb = settings.max_file_size_mb, "settings loaded");
        Self {
            current: RwLock::new(settings),
            path: Some(path),
        }
    }

    pub fn get(&self) -> Settings {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Replace the settings.  Invalid input leaves the current value untouched.
    #[instrument(skip_all)]
    pub fn update(&self, new_settings: Settings) -> Result<Settings> {
        new_settings.validate()?;

        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(path) = &self.path {
            let json = serde_json::to_string_pretty(&new_settings)?;
            std::fs::write(path, json)?;
        }
        *guard = new_settings.clone();

        info!(
            max_file_size_mb = new_settings.max_file_size_mb,
            file_retention_days = new_settings.file_retention_days,
            "settings updated"
        );
        Ok(new_settings)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::in_memory(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_by_extension_or_mime() {
        let mut settings = Settings::default();
        assert!(settings.accepts("report.PDF", "application/octet-stream"));
        assert!(settings.accepts("test_data.csv", "text/csv"));
        assert!(!settings.accepts("archive.zip", "application/zip"));

        settings.supported_file_types = vec!["application/zip".into()];
        assert!(settings.accepts("archive.zip", "application/zip; charset=binary"));
        assert!(!settings.accepts("archive.zip", ""));
    }

    #[test]
    fn update_replaces_everything() {
        let store = SettingsStore::default();
        let mut next = store.get();
        next.max_file_size_mb = 150;
        next.file_retention_days = 45;

        let saved = store.update(next.clone()).unwrap();
        assert_eq!(saved, next);
        assert_eq!(store.get().max_file_size_mb, 150);
        assert_eq!(store.get().file_retention_days, 45);
    }

    #[test]
    fn invalid_update_is_rejected_without_change() {
        let store = SettingsStore::default();
        let before = store.get();

        let mut next = before.clone();
        next.supported_file_types.clear();
        let err = store.update(next).unwrap_err();
        assert!(matches!(err, PrintDeskError::InvalidArgument(_)));

        let mut next = before.clone();
        next.max_file_size_mb = 0;
        assert!(store.update(next).is_err());

        assert_eq!(store.get(), before);
    }

    #[test]
    fn negative_numbers_do_not_deserialize() {
        let mut json = serde_json::to_value(Settings::default()).unwrap();
        json["file_retention_days"] = serde_json::json!(-1);
        assert!(serde_json::from_value::<Settings>(json).is_err());
    }

    #[test]
    fn file_backed_store_persists_updates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let store = SettingsStore::open(&path);
        let mut next = store.get();
        next.max_file_size_mb = 5;
        store.update(next).unwrap();

        let reopened = SettingsStore::open(&path);
        assert_eq!(reopened.get().max_file_size_mb, 5);
    }
}
