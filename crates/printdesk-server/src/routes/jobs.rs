// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Print jobs: create, start, cancel, poll.

use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;
use serde_json::json;

use printdesk_core::types::{FileId, JobId, PrintSettings, PrinterId};

use crate::error::ApiError;
use crate::services::app_services::AppServices;

use super::{LimitQuery, parse_id};

/// Body of `POST /print-jobs` and `POST /print/start`.
#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    /// File ids in print order.
    pub files: Vec<String>,
    pub printer_id: PrinterId,
    /// Omitted settings fall back to the system defaults.
    #[serde(default)]
    pub settings: Option<PrintSettings>,
}

impl CreateJobRequest {
    fn file_ids(&self) -> Result<Vec<FileId>, ApiError> {
        self.files.iter().map(|raw| parse_id("file", raw)).collect()
    }
}

#[post("/print-jobs")]
pub async fn create(
    services: web::Data<AppServices>,
    body: web::Json<CreateJobRequest>,
) -> Result<HttpResponse, ApiError> {
    let file_ids = body.file_ids()?;
    let job = services
        .scheduler()
        .create_job(&file_ids, &body.printer_id, body.settings)?;
    Ok(HttpResponse::Ok().json(json!({ "job": job })))
}

#[get("/print-jobs")]
pub async fn list(
    services: web::Data<AppServices>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let jobs = services.scheduler().list(query.limit)?;
    Ok(HttpResponse::Ok().json(json!({ "jobs": jobs })))
}

#[get("/print-jobs/{id}")]
pub async fn get_job(
    services: web::Data<AppServices>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id: JobId = parse_id("print job", &path)?;
    let job = services.scheduler().get(id)?;
    Ok(HttpResponse::Ok().json(json!({ "job": job })))
}

#[get("/print-jobs/{id}/status")]
pub async fn status(
    services: web::Data<AppServices>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id: JobId = parse_id("print job", &path)?;
    Ok(HttpResponse::Ok().json(services.scheduler().status(id)?))
}

#[post("/print-jobs/{id}/start")]
pub async fn start(
    services: web::Data<AppServices>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id: JobId = parse_id("print job", &path)?;
    let job = services.scheduler().start(id)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "print job queued",
        "job_id": job.id,
        "status": job.status,
    })))
}

#[post("/print-jobs/{id}/cancel")]
pub async fn cancel(
    services: web::Data<AppServices>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id: JobId = parse_id("print job", &path)?;
    let job = services.scheduler().cancel(id)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "print job cancelled",
        "job_id": job.id,
        "status": job.status,
    })))
}

#[post("/print/start")]
pub async fn create_and_start(
    services: web::Data<AppServices>,
    body: web::Json<CreateJobRequest>,
) -> Result<HttpResponse, ApiError> {
    let file_ids = body.file_ids()?;
    let started = services
        .scheduler()
        .create_and_start(&file_ids, &body.printer_id, body.settings)?;
    Ok(HttpResponse::Ok().json(started))
}
