// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP projection of `PrintDeskError`.

use std::fmt;

use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError, web};
use serde_json::json;
use tracing::{error, warn};

use printdesk_core::error::{ErrorKind, PrintDeskError};

/// Wraps a domain error so handlers can `?` straight into a response.
#[derive(Debug)]
pub struct ApiError(pub PrintDeskError);

impl ApiError {
    pub fn invalid(message: impl Into<String>) -> Self {
        Self(PrintDeskError::InvalidArgument(message.into()))
    }
}

impl From<PrintDeskError> for ApiError {
    fn from(err: PrintDeskError) -> Self {
        Self(err)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::InvalidArgument | ErrorKind::SizeExceeded | ErrorKind::UnsupportedType => {
                StatusCode::BAD_REQUEST
            }
            ErrorKind::InvalidState => StatusCode::CONFLICT,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::InternalFailure => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        } else {
            warn!(status = status.as_u16(), error = %self.0, "request rejected");
        }

        HttpResponse::build(status).json(json!({
            "detail": self.0.to_string(),
            "kind": self.0.kind(),
            "retryable": self.0.is_retryable(),
        }))
    }
}

/// Malformed JSON bodies are client errors, reported in the usual error shape.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .error_handler(|err, _req: &HttpRequest| ApiError::invalid(err.to_string()).into())
}

pub fn query_config() -> web::QueryConfig {
    web::QueryConfig::default()
        .error_handler(|err, _req: &HttpRequest| ApiError::invalid(err.to_string()).into())
}
