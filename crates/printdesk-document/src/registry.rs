// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// File registry — the ordered list of uploaded documents.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use printdesk_core::error::{PrintDeskError, Result};
use printdesk_core::settings::Settings;
use printdesk_core::types::{DocumentType, FileId, JobFile, StoredFile};
use tracing::{debug, info, instrument, warn};

use crate::integrity::{hash_bytes, verify_hash};
use crate::pages::count_pages;
use crate::store::DocumentStore;

/// A document received from a client, not yet registered.
#[derive(Debug, Clone)]
pub struct Upload {
    pub name: String,
    /// MIME type declared by the client (may be empty).
    pub mime_type: String,
    pub content: Vec<u8>,
}

impl Upload {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            content,
        }
    }
}

#[derive(Default)]
struct Inner {
    /// Upload order; `position` always equals the index.
    files: Vec<StoredFile>,
    /// Number of live jobs referencing each file.
    pins: HashMap<FileId, usize>,
    /// Content for registries without a document store.
    blobs: HashMap<FileId, Vec<u8>>,
}

impl Inner {
    fn find(&self, id: FileId) -> Result<usize> {
        self.files
            .iter()
            .position(|f| f.id == id)
            .ok_or_else(|| PrintDeskError::not_found("file", id))
    }

    fn renumber(files: &mut [StoredFile]) {
        for (position, file) in files.iter_mut().enumerate() {
            file.position = position;
        }
    }
}

/// Registry of uploaded files.
///
/// Metadata lives in memory behind an `RwLock`; bytes live in a
/// [`DocumentStore`] when one is attached, otherwise in memory.
pub struct FileRegistry {
    inner: RwLock<Inner>,
    store: Option<DocumentStore>,
}

impl FileRegistry {
    pub fn in_memory() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            store: None,
        }
    }

    /// Open a registry over `store`, restoring any files recorded in its index.
    #[instrument(skip_all, fields(root = %store.root().display()))]
    pub fn open(store: DocumentStore) -> Result<Self> {
        let mut files = store.load_index()?;
        Inner::renumber(&mut files);
        info!(files = files.len(), "file registry restored");
        Ok(Self {
            inner: RwLock::new(Inner {
                files,
                ..Inner::default()
            }),
            store: Some(store),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn save_index(&self, files: &[StoredFile]) -> Result<()> {
        match &self.store {
            Some(store) => store.save_index(files),
            None => Ok(()),
        }
    }

    // -- Uploads --------------------------------------------------------------

    /// Validate one upload against `settings` and build its record.
    fn prepare(settings: &Settings, upload: &Upload) -> Result<StoredFile> {
        let name = upload.name.trim();
        if name.is_empty() {
            return Err(PrintDeskError::InvalidArgument("file name is empty".into()));
        }

        let size = upload.content.len() as u64;
        if size > settings.max_file_size_bytes() {
            return Err(PrintDeskError::SizeExceeded {
                name: name.to_owned(),
                size,
                limit_mb: settings.max_file_size_mb,
            });
        }

        if !settings.accepts(name, &upload.mime_type) {
            return Err(PrintDeskError::UnsupportedType(format!(
                "'{}' ({})",
                name,
                if upload.mime_type.is_empty() {
                    "no content type"
                } else {
                    upload.mime_type.as_str()
                }
            )));
        }

        let document_type = DocumentType::detect(name, &upload.mime_type);
        let pages = count_pages(&upload.content, document_type)?;
        let mime_type = if upload.mime_type.trim().is_empty() {
            document_type.mime_type().to_owned()
        } else {
            upload.mime_type.clone()
        };

        Ok(StoredFile {
            id: FileId::new(),
            name: name.to_owned(),
            size,
            pages,
            copies: 1,
            position: 0,
            mime_type,
            document_type,
            content_hash: hash_bytes(&upload.content),
            created_at: Utc::now(),
        })
    }

    /// Register a single upload.
    pub fn upload(&self, settings: &Settings, upload: Upload) -> Result<StoredFile> {
        self.upload_batch(settings, vec![upload])?
            .into_iter()
            .next()
            .ok_or_else(|| PrintDeskError::Internal("upload produced no file".into()))
    }

    /// Register several uploads. Either all of them are registered, in the
    /// given order, or none are.
    #[instrument(skip_all, fields(count = uploads.len()))]
    pub fn upload_batch(&self, settings: &Settings, uploads: Vec<Upload>) -> Result<Vec<StoredFile>> {
        if uploads.is_empty() {
            return Err(PrintDeskError::InvalidArgument("no files uploaded".into()));
        }

        let prepared = uploads
            .iter()
            .map(|upload| Self::prepare(settings, upload))
            .collect::<Result<Vec<_>>>()?;

        if let Some(store) = &self.store {
            for (i, (file, upload)) in prepared.iter().zip(&uploads).enumerate() {
                if let Err(err) = store.put(file.id, &upload.content) {
                    for written in &prepared[..i] {
                        if let Err(e) = store.remove(written.id) {
                            warn!(file_id = %written.id, error = %e, "rollback could not remove stored content");
                        }
                    }
                    return Err(err);
                }
            }
        }

        let mut inner = self.write();
        let mut files = inner.files.clone();
        files.extend(prepared.iter().cloned());
        Inner::renumber(&mut files);
        if let Err(err) = self.save_index(&files) {
            if let Some(store) = &self.store {
                for file in &prepared {
                    if let Err(e) = store.remove(file.id) {
                        warn!(file_id = %file.id, error = %e, "rollback could not remove stored content");
                    }
                }
            }
            return Err(err);
        }

        let first = inner.files.len();
        inner.files = files;
        if self.store.is_none() {
            for (file, upload) in prepared.iter().zip(uploads) {
                inner.blobs.insert(file.id, upload.content);
            }
        }

        let registered = inner.files[first..].to_vec();
        for file in &registered {
            info!(
                file_id = %file.id,
                name = %file.name,
                size = file.size,
                pages = file.pages,
                "file uploaded"
            );
        }
        Ok(registered)
    }

    // -- Queries --------------------------------------------------------------

    pub fn list(&self) -> Vec<StoredFile> {
        self.read().files.clone()
    }

    pub fn len(&self) -> usize {
        self.read().files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: FileId) -> Result<StoredFile> {
        let inner = self.read();
        let idx = inner.find(id)?;
        Ok(inner.files[idx].clone())
    }

    /// Stored bytes of a file, checked against the hash recorded at upload.
    pub fn content(&self, id: FileId) -> Result<Vec<u8>> {
        let (expected, blob) = {
            let inner = self.read();
            let idx = inner.find(id)?;
            (inner.files[idx].content_hash.clone(), inner.blobs.get(&id).cloned())
        };
        let bytes = match &self.store {
            Some(store) => store.get(id)?,
            None => blob.ok_or_else(|| PrintDeskError::not_found("file content", id))?,
        };
        verify_hash(&bytes, &expected)?;
        Ok(bytes)
    }

    // -- Mutation -------------------------------------------------------------

    /// Change how many copies of a file get printed by future jobs.
    #[instrument(skip(self), fields(file_id = %id))]
    pub fn set_copies(&self, id: FileId, copies: i64) -> Result<StoredFile> {
        let mut inner = self.write();
        let idx = inner.find(id)?;
        if copies < 1 {
            return Err(PrintDeskError::InvalidArgument(format!(
                "copies must be at least 1, got {copies}"
            )));
        }
        let copies = u32::try_from(copies).map_err(|_| {
            PrintDeskError::InvalidArgument(format!("copies out of range: {copies}"))
        })?;

        let mut files = inner.files.clone();
        files[idx].copies = copies;
        self.save_index(&files)?;
        inner.files = files;

        debug!(copies, "copies updated");
        Ok(inner.files[idx].clone())
    }

    /// Replace the upload order. `ids` must be a permutation of the current ids.
    #[instrument(skip_all, fields(count = ids.len()))]
    pub fn reorder(&self, ids: &[FileId]) -> Result<()> {
        let mut inner = self.write();

        let unique: HashSet<FileId> = ids.iter().copied().collect();
        if ids.len() != inner.files.len() || unique.len() != ids.len() {
            return Err(PrintDeskError::InvalidArgument(format!(
                "reorder needs each of the {} file ids exactly once, got {}",
                inner.files.len(),
                ids.len()
            )));
        }

        let mut by_id: HashMap<FileId, StoredFile> =
            inner.files.iter().map(|f| (f.id, f.clone())).collect();
        let mut files = Vec::with_capacity(ids.len());
        for id in ids {
            let file = by_id.remove(id).ok_or_else(|| {
                PrintDeskError::InvalidArgument(format!("unknown file id {id} in reorder"))
            })?;
            files.push(file);
        }
        Inner::renumber(&mut files);

        self.save_index(&files)?;
        inner.files = files;
        info!("files reordered");
        Ok(())
    }

    /// Remove a file and its content. Files used by a live job are kept.
    #[instrument(skip(self), fields(file_id = %id))]
    pub fn delete(&self, id: FileId) -> Result<()> {
        let mut inner = self.write();
        let idx = inner.find(id)?;
        if inner.pins.get(&id).copied().unwrap_or(0) > 0 {
            return Err(PrintDeskError::InvalidState(format!(
                "file {id} is used by a pending print job"
            )));
        }

        let mut files = inner.files.clone();
        files.remove(idx);
        Inner::renumber(&mut files);
        self.save_index(&files)?;
        inner.files = files;
        inner.blobs.remove(&id);

        if let Some(store) = &self.store {
            store.remove(id)?;
        }
        info!("file deleted");
        Ok(())
    }

    // -- Job references -------------------------------------------------------

    /// Snapshot `ids` for a new job and pin them so they cannot be deleted
    /// until [`unpin`](Self::unpin) is called. Fails without pinning anything
    /// if an id is unknown.
    pub fn snapshot_and_pin(&self, ids: &[FileId]) -> Result<Vec<JobFile>> {
        let mut inner = self.write();
        let snapshots = ids
            .iter()
            .map(|id| inner.find(*id).map(|idx| JobFile::snapshot(&inner.files[idx])))
            .collect::<Result<Vec<_>>>()?;
        for id in ids {
            *inner.pins.entry(*id).or_insert(0) += 1;
        }
        Ok(snapshots)
    }

    /// Release pins taken by [`snapshot_and_pin`](Self::snapshot_and_pin).
    pub fn unpin(&self, ids: &[FileId]) {
        let mut inner = self.write();
        for id in ids {
            match inner.pins.get_mut(id) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    inner.pins.remove(id);
                }
                None => warn!(file_id = %id, "unpin of a file that was not pinned"),
            }
        }
    }

    pub fn is_pinned(&self, id: FileId) -> bool {
        self.read().pins.contains_key(&id)
    }

    // -- Retention ------------------------------------------------------------

    /// Delete unpinned files created more than `retention_days` before `now`.
    /// `0` keeps files forever.
    #[instrument(skip(self))]
    pub fn purge_expired(&self, retention_days: u32, now: DateTime<Utc>) -> Result<Vec<FileId>> {
        if retention_days == 0 {
            return Ok(Vec::new());
        }
        let cutoff = now - Duration::days(i64::from(retention_days));

        let mut inner = self.write();
        let (expired, kept): (Vec<StoredFile>, Vec<StoredFile>) =
            inner.files.iter().cloned().partition(|f| {
                f.created_at < cutoff && !inner.pins.contains_key(&f.id)
            });
        if expired.is_empty() {
            return Ok(Vec::new());
        }

        let mut files = kept;
        Inner::renumber(&mut files);
        self.save_index(&files)?;
        inner.files = files;

        let mut purged = Vec::with_capacity(expired.len());
        for file in expired {
            inner.blobs.remove(&file.id);
            if let Some(store) = &self.store {
                store.remove(file.id)?;
            }
            purged.push(file.id);
        }
        info!(purged = purged.len(), "expired files purged");
        Ok(purged)
    }

    #[cfg(test)]
    fn backdate(&self, id: FileId, created_at: DateTime<Utc>) {
        let mut inner = self.write();
        if let Ok(idx) = inner.find(id) {
            inner.files[idx].created_at = created_at;
        }
    }
}

impl Default for FileRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}
