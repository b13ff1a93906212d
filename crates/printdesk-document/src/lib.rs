// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printdesk-document — Uploaded documents for the Printdesk print backend.
//
// Counts pages (PDF via lopdf), fingerprints content with SHA-256, keeps bytes
// in an on-disk document store, and maintains the ordered file registry.

pub mod integrity;
pub mod pages;
pub mod pdf;
pub mod registry;
pub mod store;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

// Re-export the primary structs so callers can use `printdesk_document::FileRegistry` etc.
pub use pages::count_pages;
pub use pdf::reader::PdfReader;
pub use registry::{FileRegistry, Upload};
pub use store::DocumentStore;
