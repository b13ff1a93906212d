// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printdesk.

use serde::Serialize;
use thiserror::Error;

/// Top-level error type for all Printdesk operations.
#[derive(Debug, Error)]
pub enum PrintDeskError {
    // -- Lookup / validation --
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("file '{name}' of {size} bytes exceeds maximum size of {limit_mb} MB")]
    SizeExceeded {
        name: String,
        size: u64,
        limit_mb: u64,
    },

    #[error("unsupported file type: {0}")]
    UnsupportedType(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    // -- Printing --
    #[error("print timed out: {0}")]
    Timeout(String),

    #[error("printer communication failed: {0}")]
    Printer(String),

    // -- Documents --
    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal failure: {0}")]
    Internal(String),
}

/// Coarse classification exposed to API clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    SizeExceeded,
    UnsupportedType,
    InvalidState,
    Timeout,
    InternalFailure,
}

impl PrintDeskError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument(_) | Self::PdfError(_) => ErrorKind::InvalidArgument,
            Self::SizeExceeded { .. } => ErrorKind::SizeExceeded,
            Self::UnsupportedType(_) => ErrorKind::UnsupportedType,
            Self::InvalidState(_) => ErrorKind::InvalidState,
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Printer(_)
            | Self::IntegrityMismatch { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_) => ErrorKind::InternalFailure,
        }
    }

    /// Whether a client may reasonably repeat the same request later.
    ///
    /// Validation and state errors are terminal for the given input;
    /// timeouts and backend faults are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Timeout | ErrorKind::InternalFailure
        )
    }
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PrintDeskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_exceeded_message_mentions_maximum_size() {
        let err = PrintDeskError::SizeExceeded {
            name: "large_file.pdf".into(),
            size: 200 * 1024 * 1024,
            limit_mb: 100,
        };
        assert!(err.to_string().contains("exceeds maximum size"));
        assert_eq!(err.kind(), ErrorKind::SizeExceeded);
        assert!(!err.is_retryable());
    }

    #[test]
    fn not_found_names_entity_and_id() {
        let err = PrintDeskError::not_found("printer", "invalid-printer");
        assert_eq!(err.to_string(), "printer 'invalid-printer' not found");
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn backend_faults_are_retryable() {
        assert!(PrintDeskError::Database("locked".into()).is_retryable());
        assert!(PrintDeskError::Timeout("60s".into()).is_retryable());
        assert!(!PrintDeskError::InvalidState("printing".into()).is_retryable());
    }

    #[test]
    fn kind_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidState).unwrap();
        assert_eq!(json, "\"invalid_state\"");
    }
}
