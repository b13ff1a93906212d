// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Upload list: multipart upload, listing, copies, ordering, deletion.

use actix_multipart::Multipart;
use actix_web::{HttpResponse, delete, get, post, put, web};
use futures_util::TryStreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use printdesk_core::error::PrintDeskError;
use printdesk_core::settings::Settings;
use printdesk_core::types::FileId;
use printdesk_document::Upload;

use crate::error::ApiError;
use crate::services::app_services::AppServices;

use super::parse_id;

/// Multipart part name carrying documents.
const FILES_FIELD: &str = "files";

#[derive(Debug, Deserialize)]
pub struct CopiesRequest {
    pub copies: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReorderRequest {
    pub file_ids: Vec<FileId>,
}

/// Accept one or more `files` parts.  The batch is registered only if every
/// part is valid.
#[post("/files/upload")]
pub async fn upload(
    services: web::Data<AppServices>,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let settings = services.settings().get();
    let mut uploads = Vec::new();

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::invalid(format!("malformed multipart body: {e}")))?
    {
        let (part, filename) = match field.content_disposition() {
            Some(cd) => (
                cd.get_name().map(str::to_owned),
                cd.get_filename().map(str::to_owned),
            ),
            None => (None, None),
        };
        if part.as_deref() != Some(FILES_FIELD) {
            debug!(part = ?part, "skipping multipart part");
            while field
                .try_next()
                .await
                .map_err(|e| ApiError::invalid(e.to_string()))?
                .is_some()
            {}
            continue;
        }

        let name = filename.unwrap_or_else(|| "upload".to_owned());
        let mime_type = field
            .content_type()
            .map(|m| m.essence_str().to_owned())
            .unwrap_or_default();
        let content = read_part(&mut field, &name, &settings).await?;
        uploads.push(Upload::new(name, mime_type, content));
    }

    if uploads.is_empty() {
        return Err(ApiError::invalid(format!(
            "no '{FILES_FIELD}' parts in upload"
        )));
    }

    let files = services.files().upload_batch(&settings, uploads)?;
    info!(count = files.len(), "files uploaded");
    Ok(HttpResponse::Ok().json(json!({ "files": files })))
}

/// Buffer one part, stopping as soon as it outgrows the size limit.
async fn read_part(
    field: &mut actix_multipart::Field,
    name: &str,
    settings: &Settings,
) -> Result<Vec<u8>, ApiError> {
    let limit = settings.max_file_size_bytes();
    let mut content = Vec::new();
    while let Some(chunk) = field
        .try_next()
        .await
        .map_err(|e| ApiError::invalid(format!("failed to read '{name}': {e}")))?
    {
        content.extend_from_slice(&chunk);
        if content.len() as u64 > limit {
            return Err(ApiError(PrintDeskError::SizeExceeded {
                name: name.to_owned(),
                size: content.len() as u64,
                limit_mb: settings.max_file_size_mb,
            }));
        }
    }
    Ok(content)
}

#[get("/files")]
pub async fn list(services: web::Data<AppServices>) -> HttpResponse {
    HttpResponse::Ok().json(json!({ "files": services.files().list() }))
}

#[put("/files/reorder")]
pub async fn reorder(
    services: web::Data<AppServices>,
    body: web::Json<ReorderRequest>,
) -> Result<HttpResponse, ApiError> {
    services.files().reorder(&body.file_ids)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": "files reordered",
        "success": true,
    })))
}

#[put("/files/{id}/copies")]
pub async fn set_copies(
    services: web::Data<AppServices>,
    path: web::Path<String>,
    body: web::Json<CopiesRequest>,
) -> Result<HttpResponse, ApiError> {
    let id: FileId = parse_id("file", &path)?;
    let file = services.files().set_copies(id, body.copies)?;
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("copies set to {}", file.copies),
        "file": file,
    })))
}

#[delete("/files/{id}")]
pub async fn remove(
    services: web::Data<AppServices>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id: FileId = parse_id("file", &path)?;
    services.files().delete(id)?;
    Ok(HttpResponse::Ok().json(json!({ "message": "file deleted" })))
}
