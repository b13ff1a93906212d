// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use actix_web::{HttpResponse, get, put, web};
use serde::Deserialize;
use serde_json::json;

use printdesk_core::types::{PrinterId, PrinterStatus};

use crate::error::ApiError;
use crate::services::app_services::AppServices;

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: PrinterStatus,
}

#[get("/printers")]
pub async fn list(services: web::Data<AppServices>) -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "printers": services.scheduler().printers().list(),
    }))
}

#[get("/printers/status/{id}")]
pub async fn status(
    services: web::Data<AppServices>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let printer_id = PrinterId::new(path.into_inner());
    let status = services.scheduler().printers().status(&printer_id)?;
    Ok(HttpResponse::Ok().json(json!({
        "printer_id": printer_id,
        "status": status,
    })))
}

/// Operator override; `offline` holds the printer's queue.
#[put("/printers/{id}/status")]
pub async fn set_status(
    services: web::Data<AppServices>,
    path: web::Path<String>,
    body: web::Json<StatusRequest>,
) -> Result<HttpResponse, ApiError> {
    let printer_id = PrinterId::new(path.into_inner());
    let printer = services
        .scheduler()
        .set_printer_status(&printer_id, body.status)?;
    Ok(HttpResponse::Ok().json(json!({
        "printer_id": printer.id,
        "status": printer.status,
    })))
}
