// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Printdesk print backend.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{PrintDeskError, Result};

/// Unique identifier for an uploaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(pub Uuid);

impl FileId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Unique identifier for a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Identifier of a provisioned printer (assigned in configuration).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrinterId(pub String);

impl PrinterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PrinterId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

/// Supported input document types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Pdf,
    Jpeg,
    Png,
    Tiff,
    PlainText,
    Csv,
    /// Word processing documents (DOC, DOCX, ODT).
    Word,
    /// Spreadsheets (XLS, XLSX, ODS).
    Spreadsheet,
    /// Presentations (PPT, PPTX, ODP).
    Presentation,
    Other,
}

impl DocumentType {
    /// Canonical MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Pdf => "application/pdf",
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
            Self::PlainText => "text/plain",
            Self::Csv => "text/csv",
            Self::Word => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            Self::Spreadsheet => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Presentation => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            Self::Other => "application/octet-stream",
        }
    }

    /// Infer document type from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            "tif" | "tiff" => Some(Self::Tiff),
            "txt" => Some(Self::PlainText),
            "csv" => Some(Self::Csv),
            "doc" | "docx" | "odt" => Some(Self::Word),
            "xls" | "xlsx" | "ods" => Some(Self::Spreadsheet),
            "ppt" | "pptx" | "odp" => Some(Self::Presentation),
            _ => None,
        }
    }

    /// Infer document type from a MIME type, ignoring parameters.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "application/pdf" => Some(Self::Pdf),
            "image/jpeg" | "image/jpg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/tiff" => Some(Self::Tiff),
            "text/plain" => Some(Self::PlainText),
            "text/csv" => Some(Self::Csv),
            "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            | "application/vnd.oasis.opendocument.text" => Some(Self::Word),
            "application/vnd.ms-excel"
            | "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.oasis.opendocument.spreadsheet" => Some(Self::Spreadsheet),
            "application/vnd.ms-powerpoint"
            | "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            | "application/vnd.oasis.opendocument.presentation" => Some(Self::Presentation),
            _ => None,
        }
    }

    /// Resolve the type of an upload: the file extension wins, the declared
    /// MIME type is the fallback.
    pub fn detect(name: &str, mime: &str) -> Self {
        file_extension(name)
            .and_then(Self::from_extension)
            .or_else(|| Self::from_mime(mime))
            .unwrap_or(Self::Other)
    }

    /// Whether the page count comes from the document structure.
    pub fn is_paginated(&self) -> bool {
        matches!(self, Self::Pdf)
    }
}

/// Extension of `name` without the dot, if any.
pub fn file_extension(name: &str) -> Option<&str> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// An uploaded document as tracked by the file registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFile {
    pub id: FileId,
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    pub pages: u32,
    pub copies: u32,
    /// Zero-based position in the upload order.
    pub position: usize,
    pub mime_type: String,
    pub document_type: DocumentType,
    /// SHA-256 hex digest of the stored bytes.
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Print settings
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    Color,
    Bw,
}

/// Standard paper sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaperSize {
    A4,
    A3,
    A5,
    Letter,
    Legal,
}

impl PaperSize {
    /// PJL `PAPER` value.
    pub fn pjl_keyword(&self) -> &'static str {
        match self {
            Self::A4 => "A4",
            Self::A3 => "A3",
            Self::A5 => "A5",
            Self::Letter => "LETTER",
            Self::Legal => "LEGAL",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrintQuality {
    Standard,
    High,
    Draft,
}

impl PrintQuality {
    /// PJL `RESOLUTION` in dpi.
    pub fn resolution_dpi(&self) -> u32 {
        match self {
            Self::Draft => 300,
            Self::Standard => 600,
            Self::High => 1200,
        }
    }
}

/// Duplex printing mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplexMode {
    None,
    LongEdge,
    ShortEdge,
}

/// Print settings snapshotted into a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintSettings {
    pub color_mode: ColorMode,
    pub paper_size: PaperSize,
    pub orientation: Orientation,
    pub quality: PrintQuality,
    pub duplex: DuplexMode,
}

impl Default for PrintSettings {
    fn default() -> Self {
        Self {
            color_mode: ColorMode::Color,
            paper_size: PaperSize::A4,
            orientation: Orientation::Portrait,
            quality: PrintQuality::Standard,
            duplex: DuplexMode::None,
        }
    }
}

// ---------------------------------------------------------------------------
// Printers
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrinterStatus {
    Online,
    Busy,
    Offline,
    Error,
}

/// What a printer can do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterCapabilities {
    pub color: bool,
    pub duplex: bool,
    pub paper_sizes: Vec<PaperSize>,
}

impl Default for PrinterCapabilities {
    fn default() -> Self {
        Self {
            color: true,
            duplex: true,
            paper_sizes: vec![PaperSize::A4, PaperSize::Letter],
        }
    }
}

impl PrinterCapabilities {
    /// Check that `settings` can be honoured by this printer.
    pub fn check(&self, settings: &PrintSettings) -> Result<()> {
        if settings.color_mode == ColorMode::Color && !self.color {
            return Err(PrintDeskError::InvalidArgument(
                "printer does not support color output".into(),
            ));
        }
        if settings.duplex != DuplexMode::None && !self.duplex {
            return Err(PrintDeskError::InvalidArgument(
                "printer does not support duplex printing".into(),
            ));
        }
        if !self.paper_sizes.is_empty() && !self.paper_sizes.contains(&settings.paper_size) {
            return Err(PrintDeskError::InvalidArgument(format!(
                "printer does not support paper size {:?}",
                settings.paper_size
            )));
        }
        Ok(())
    }

    /// Adjust `settings` down to what this printer can do: colour becomes
    /// black and white, duplex becomes single-sided, and an unsupported
    /// paper size falls back to the first supported one.
    pub fn fit(&self, settings: &PrintSettings) -> PrintSettings {
        let mut fitted = *settings;
        if !self.color {
            fitted.color_mode = ColorMode::Bw;
        }
        if !self.duplex {
            fitted.duplex = DuplexMode::None;
        }
        if let Some(first) = self.paper_sizes.first() {
            if !self.paper_sizes.contains(&fitted.paper_size) {
                fitted.paper_size = *first;
            }
        }
        fitted
    }
}

/// A provisioned printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Printer {
    pub id: PrinterId,
    pub name: String,
    pub model: Option<String>,
    pub location: Option<String>,
    pub status: PrinterStatus,
    pub capabilities: PrinterCapabilities,
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Lifecycle states of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Created, not yet submitted to a printer.
    Created,
    /// Waiting in the printer's queue.
    Queued,
    /// Being delivered to the printer.
    Printing,
    Completed,
    /// Printing failed; see the job error field.
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 6] = [
        Self::Created,
        Self::Queued,
        Self::Printing,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// The transition table.
    ///
    /// `Created -> Failed` only happens when a combined create-and-start
    /// cannot enqueue the job it just created.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Created, Queued)
                | (Created, Cancelled)
                | (Created, Failed)
                | (Queued, Printing)
                | (Queued, Failed)
                | (Queued, Cancelled)
                | (Printing, Completed)
                | (Printing, Failed)
        )
    }

    /// Validate a transition, returning the new state.
    pub fn transition(self, next: JobStatus) -> Result<JobStatus> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(PrintDeskError::InvalidState(format!(
                "cannot move job from {} to {}",
                self.as_str(),
                next.as_str()
            )))
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Queued => "queued",
            Self::Printing => "printing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = PrintDeskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| PrintDeskError::InvalidArgument(format!("unknown job status '{s}'")))
    }
}

/// Classification of printer errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorClass {
    /// Network blip or busy printer. Safe to retry automatically.
    Transient,
    /// Someone must act on the printer (paper, toner, jam).
    UserAction,
    /// Retrying cannot help.
    Permanent,
}

/// Per-file data copied into a job when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFile {
    pub file_id: FileId,
    pub name: String,
    pub pages: u32,
    pub copies: u32,
    pub size: u64,
    pub document_type: DocumentType,
    pub content_hash: String,
}

impl JobFile {
    pub fn snapshot(file: &StoredFile) -> Self {
        Self {
            file_id: file.id,
            name: file.name.clone(),
            pages: file.pages,
            copies: file.copies,
            size: file.size,
            document_type: file.document_type,
            content_hash: file.content_hash.clone(),
        }
    }

    pub fn printed_pages(&self) -> u64 {
        u64::from(self.pages) * u64::from(self.copies)
    }
}

/// A print job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub files: Vec<JobFile>,
    pub printer_id: PrinterId,
    pub settings: PrintSettings,
    pub total_pages: u64,
    pub pages_printed: u64,
    pub status: JobStatus,
    /// Delivery attempts made so far.
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub queued_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    /// Error messages from each failed attempt.
    pub error_history: Vec<String>,
}

impl PrintJob {
    /// Build a job in `Created` state. `files` must be non-empty.
    pub fn new(files: Vec<JobFile>, printer_id: PrinterId, settings: PrintSettings) -> Result<Self> {
        if files.is_empty() {
            return Err(PrintDeskError::InvalidArgument(
                "a print job needs at least one file".into(),
            ));
        }
        let total_pages = files.iter().map(JobFile::printed_pages).sum();
        Ok(Self {
            id: JobId::new(),
            files,
            printer_id,
            settings,
            total_pages,
            pages_printed: 0,
            status: JobStatus::Created,
            attempts: 0,
            created_at: Utc::now(),
            queued_at: None,
            started_at: None,
            completed_at: None,
            error_message: None,
            error_history: Vec::new(),
        })
    }

    pub fn file_ids(&self) -> Vec<FileId> {
        self.files.iter().map(|f| f.file_id).collect()
    }

    /// Progress in percent, 100 once completed.
    pub fn progress(&self) -> u8 {
        if self.status == JobStatus::Completed {
            return 100;
        }
        if self.total_pages == 0 {
            return 0;
        }
        let pct = self.pages_printed.min(self.total_pages) * 100 / self.total_pages;
        pct as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored(pages: u32, copies: u32) -> StoredFile {
        StoredFile {
            id: FileId::new(),
            name: "doc.pdf".into(),
            size: 1024,
            pages,
            copies,
            position: 0,
            mime_type: "application/pdf".into(),
            document_type: DocumentType::Pdf,
            content_hash: "abc".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn total_pages_multiplies_pages_by_copies() {
        let files = vec![JobFile::snapshot(&stored(3, 1)), JobFile::snapshot(&stored(2, 2))];
        let job = PrintJob::new(files, PrinterId::new("p1"), PrintSettings::default()).unwrap();
        assert_eq!(job.total_pages, 7);
        assert_eq!(job.status, JobStatus::Created);
    }

    #[test]
    fn empty_job_is_rejected() {
        let err = PrintJob::new(Vec::new(), PrinterId::new("p1"), PrintSettings::default())
            .unwrap_err();
        assert!(matches!(err, PrintDeskError::InvalidArgument(_)));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for from in JobStatus::ALL.into_iter().filter(JobStatus::is_terminal) {
            for to in JobStatus::ALL {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be illegal");
            }
        }
    }

    #[test]
    fn printing_cannot_be_cancelled() {
        let err = JobStatus::Printing.transition(JobStatus::Cancelled).unwrap_err();
        assert!(matches!(err, PrintDeskError::InvalidState(_)));
    }

    #[test]
    fn lifecycle_happy_path() {
        let s = JobStatus::Created
            .transition(JobStatus::Queued)
            .and_then(|s| s.transition(JobStatus::Printing))
            .and_then(|s| s.transition(JobStatus::Completed))
            .unwrap();
        assert_eq!(s, JobStatus::Completed);
    }

    #[test]
    fn queued_cannot_be_queued_again() {
        assert!(!JobStatus::Queued.can_transition_to(JobStatus::Queued));
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in JobStatus::ALL {
            assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
        }
    }

    #[test]
    fn settings_use_wire_keywords() {
        let json = serde_json::json!({
            "color_mode": "bw",
            "paper_size": "A4",
            "orientation": "portrait",
            "quality": "high",
            "duplex": "long-edge"
        });
        let settings: PrintSettings = serde_json::from_value(json).unwrap();
        assert_eq!(settings.color_mode, ColorMode::Bw);
        assert_eq!(settings.duplex, DuplexMode::LongEdge);
        assert_eq!(settings.quality, PrintQuality::High);
    }

    #[test]
    fn document_type_prefers_extension() {
        assert_eq!(DocumentType::detect("data.csv", "application/octet-stream"), DocumentType::Csv);
        assert_eq!(DocumentType::detect("noext", "application/pdf"), DocumentType::Pdf);
        assert_eq!(DocumentType::detect("blob", "weird/type"), DocumentType::Other);
        assert!(DocumentType::Pdf.is_paginated());
        assert!(!DocumentType::Csv.is_paginated());
    }

    #[test]
    fn capabilities_reject_color_on_mono_printer() {
        let caps = PrinterCapabilities {
            color: false,
            ..Default::default()
        };
        assert!(caps.check(&PrintSettings::default()).is_err());
        let bw = PrintSettings {
            color_mode: ColorMode::Bw,
            ..Default::default()
        };
        assert!(caps.check(&bw).is_ok());
    }

    #[test]
    fn fit_downgrades_to_capabilities() {
        let caps = PrinterCapabilities {
            color: false,
            duplex: false,
            paper_sizes: vec![PaperSize::Letter],
        };
        let wanted = PrintSettings {
            duplex: DuplexMode::LongEdge,
            ..Default::default()
        };
        let fitted = caps.fit(&wanted);
        assert_eq!(fitted.color_mode, ColorMode::Bw);
        assert_eq!(fitted.duplex, DuplexMode::None);
        assert_eq!(fitted.paper_size, PaperSize::Letter);
        assert!(caps.check(&fitted).is_ok());
    }

    #[test]
    fn progress_is_bounded() {
        let mut job = PrintJob::new(
            vec![JobFile::snapshot(&stored(4, 1))],
            PrinterId::new("p1"),
            PrintSettings::default(),
        )
        .unwrap();
        job.pages_printed = 2;
        assert_eq!(job.progress(), 50);
        job.pages_printed = 10;
        assert_eq!(job.progress(), 100);
    }
}
