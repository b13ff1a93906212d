// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use actix_web::{HttpResponse, get, web};
use serde_json::json;

use crate::error::ApiError;
use crate::services::app_services::AppServices;

use super::LimitQuery;

#[get("/stats/dashboard")]
pub async fn dashboard(services: web::Data<AppServices>) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(services.stats().dashboard()?))
}

#[get("/print-history")]
pub async fn history(
    services: web::Data<AppServices>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, ApiError> {
    let history = services.stats().history(query.limit)?;
    Ok(HttpResponse::Ok().json(json!({ "history": history })))
}
