// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page counting for uploads.

use printdesk_core::error::{PrintDeskError, Result};
use printdesk_core::types::DocumentType;
use tracing::debug;

use crate::pdf::PdfReader;

/// Number of printable pages in `content`.
///
/// PDFs are counted from their page tree. Every other type is treated as a
/// single page. A PDF without any pages is rejected.
pub fn count_pages(content: &[u8], document_type: DocumentType) -> Result<u32> {
    if !document_type.is_paginated() {
        return Ok(1);
    }

    let reader = PdfReader::from_bytes(content)?;
    let pages = reader.page_count();
    debug!(pages, "counted PDF pages");
    if pages == 0 {
        return Err(PrintDeskError::PdfError("document has no pages".into()));
    }
    u32::try_from(pages)
        .map_err(|_| PrintDeskError::PdfError(format!("page count {pages} out of range")))
}
