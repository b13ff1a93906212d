// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retry engine with exponential backoff + jitter for print delivery.
//
// Classifies errors into Transient (auto-retry), UserAction (someone has to
// walk over to the printer), and Permanent (give up). Only transient errors
// trigger automatic retries.

use std::time::Duration;

use printdesk_core::config::ServerConfig;
use printdesk_core::error::PrintDeskError;
use printdesk_core::types::ErrorClass;
use tracing::{debug, info, warn};

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total delivery attempts, including the first.
    pub max_attempts: u32,
    /// Base delay between attempts (exponential backoff).
    pub base_delay: Duration,
    /// Maximum delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn from_server_config(config: &ServerConfig) -> Self {
        Self {
            max_attempts: config.max_print_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
        }
    }
}

/// Result of evaluating whether to retry.
#[derive(Debug)]
pub enum RetryDecision {
    /// Retry after this delay.
    RetryAfter(Duration),
    /// Do not retry: the error is permanent or needs a person.
    GiveUp(ErrorClass),
    /// Maximum attempts exhausted.
    Exhausted,
}

/// Classify a `PrintDeskError` into an `ErrorClass` for retry decisions.
pub fn classify_error(err: &PrintDeskError) -> ErrorClass {
    match err {
        PrintDeskError::Printer(detail) => classify_printer_detail(detail),
        PrintDeskError::Timeout(_) => ErrorClass::Transient,
        PrintDeskError::Database(_) => ErrorClass::Transient,

        // Bad input or bad stored data; another attempt sends the same bytes.
        PrintDeskError::NotFound { .. }
        | PrintDeskError::InvalidArgument(_)
        | PrintDeskError::SizeExceeded { .. }
        | PrintDeskError::UnsupportedType(_)
        | PrintDeskError::InvalidState(_)
        | PrintDeskError::PdfError(_)
        | PrintDeskError::IntegrityMismatch { .. }
        | PrintDeskError::Serialization(_)
        | PrintDeskError::Internal(_) => ErrorClass::Permanent,

        PrintDeskError::Io(io_err) => match io_err.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => {
                ErrorClass::UserAction
            }
            _ => ErrorClass::Transient,
        },
    }
}

/// Classify a printer communication failure from its detail text.
fn classify_printer_detail(detail: &str) -> ErrorClass {
    let lower = detail.to_ascii_lowercase();

    if lower.contains("timed out")
        || lower.contains("connection refused")
        || lower.contains("connection reset")
        || lower.contains("broken pipe")
        || lower.contains("busy")
    {
        return ErrorClass::Transient;
    }

    if lower.contains("paper-jam")
        || lower.contains("media-jam")
        || lower.contains("media-empty")
        || lower.contains("out of paper")
        || lower.contains("toner")
        || lower.contains("door-open")
        || lower.contains("cover-open")
    {
        return ErrorClass::UserAction;
    }

    if lower.contains("unsupported") || lower.contains("invalid address") {
        return ErrorClass::Permanent;
    }

    // Unknown printer faults get the benefit of the doubt.
    ErrorClass::Transient
}

/// Decide whether to retry after `attempt` attempts (1-based) have failed.
pub fn should_retry(err: &PrintDeskError, attempt: u32, config: &RetryConfig) -> RetryDecision {
    match classify_error(err) {
        ErrorClass::Permanent => {
            info!("permanent error, not retrying");
            RetryDecision::GiveUp(ErrorClass::Permanent)
        }
        ErrorClass::UserAction => {
            info!("user action required, not auto-retrying");
            RetryDecision::GiveUp(ErrorClass::UserAction)
        }
        ErrorClass::Transient => {
            if attempt >= config.max_attempts {
                warn!(attempt, max = config.max_attempts, "retry limit exhausted");
                RetryDecision::Exhausted
            } else {
                let delay = compute_delay(attempt.saturating_sub(1), config);
                debug!(attempt, delay_ms = delay.as_millis() as u64, "scheduling retry");
                RetryDecision::RetryAfter(delay)
            }
        }
    }
}

/// Exponential backoff with jitter.
///
/// delay = min(base * 2^retry + jitter, max_delay), jitter in [0, base).
pub fn compute_delay(retry: u32, config: &RetryConfig) -> Duration {
    let base_ms = config.base_delay.as_millis() as u64;
    let exp_ms = base_ms.saturating_mul(1u64 << retry.min(10));
    let total_ms = exp_ms.saturating_add(jitter(base_ms, retry));
    Duration::from_millis(total_ms.min(config.max_delay.as_millis() as u64))
}

/// Deterministic spread in [0, base).
fn jitter(base_ms: u64, retry: u32) -> u64 {
    let hash = (retry as u64).wrapping_mul(6364136223846793005);
    hash % base_ms.max(1)
}
