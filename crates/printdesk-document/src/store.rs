// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// On-disk document store — one file per upload plus a JSON index of metadata.

use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

use printdesk_core::error::{PrintDeskError, Result};
use printdesk_core::types::{FileId, StoredFile};
use tracing::{debug, info, instrument, warn};

const INDEX_FILE: &str = "index.json";

/// Directory-backed storage for uploaded document bytes.
///
/// Layout:
/// ```text
/// <root>/index.json     registry metadata, in upload order
/// <root>/<file_id>      raw bytes of each upload
/// ```
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Open (creating if necessary) a store rooted at `root`.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)?;
        info!("document store ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: FileId) -> PathBuf {
        self.root.join(id.to_string())
    }

    pub fn put(&self, id: FileId, content: &[u8]) -> Result<()> {
        std::fs::write(self.blob_path(id), content)?;
        debug!(file_id = %id, bytes = content.len(), "stored document");
        Ok(())
    }

    pub fn get(&self, id: FileId) -> Result<Vec<u8>> {
        match std::fs::read(self.blob_path(id)) {
            Ok(bytes) => Ok(bytes),
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                Err(PrintDeskError::not_found("file content", id))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Delete stored bytes. Missing content is not an error.
    pub fn remove(&self, id: FileId) -> Result<()> {
        match std::fs::remove_file(self.blob_path(id)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == IoErrorKind::NotFound => {
                warn!(file_id = %id, "document content already gone");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Read the metadata index. A missing index means an empty store.
    pub fn load_index(&self) -> Result<Vec<StoredFile>> {
        match std::fs::read_to_string(self.root.join(INDEX_FILE)) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(err) if err.kind() == IoErrorKind::NotFound => Ok(Vec::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomically replace the metadata index (write to a temp file, rename).
    pub fn save_index(&self, files: &[StoredFile]) -> Result<()> {
        let json = serde_json::to_vec_pretty(files)?;
        let tmp = self.root.join(format!("{INDEX_FILE}.tmp"));
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, self.root.join(INDEX_FILE))?;
        Ok(())
    }
}
