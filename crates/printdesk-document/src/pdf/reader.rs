// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — inspect uploaded PDF documents using the `lopdf` crate.

use lopdf::Document;
use printdesk_core::error::PrintDeskError;
use tracing::{debug, instrument};

/// Read-only view of a PDF document.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self, PrintDeskError> {
        let document = Document::load_mem(data).map_err(|err| {
            PrintDeskError::PdfError(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    /// Number of pages in the document, from the page tree.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }
}
