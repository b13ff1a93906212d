// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// HTTP routes.  Everything lives under `/api`:
//
// - GET    /api/                          health check
// - POST   /api/files/upload              multipart, parts named `files`
// - GET    /api/files
// - PUT    /api/files/reorder
// - PUT    /api/files/{id}/copies
// - DELETE /api/files/{id}
// - GET    /api/printers
// - GET    /api/printers/status/{id}
// - PUT    /api/printers/{id}/status
// - POST   /api/print-jobs
// - GET    /api/print-jobs?limit=N
// - GET    /api/print-jobs/{id}
// - GET    /api/print-jobs/{id}/status
// - POST   /api/print-jobs/{id}/start
// - POST   /api/print-jobs/{id}/cancel
// - POST   /api/print/start
// - GET    /api/stats/dashboard
// - GET    /api/print-history?limit=N
// - GET    /api/settings, PUT /api/settings

/// Build an actix test service over `services` with every route mounted.
#[cfg(test)]
macro_rules! test_app {
    ($services:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($services.clone()))
                .configure($crate::routes::configure_routes),
        )
        .await
    };
}

pub mod files;
pub mod jobs;
pub mod printers;
pub mod settings;
pub mod stats;

use std::str::FromStr;

use actix_web::{HttpResponse, get, web};
use serde::Deserialize;
use serde_json::json;

use printdesk_core::error::PrintDeskError;

use crate::error::{ApiError, json_config, query_config};

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .app_data(json_config())
            .app_data(query_config())
            .service(health)
            .service(files::upload)
            .service(files::list)
            .service(files::reorder)
            .service(files::set_copies)
            .service(files::remove)
            .service(printers::list)
            .service(printers::status)
            .service(printers::set_status)
            .service(jobs::create)
            .service(jobs::list)
            .service(jobs::get_job)
            .service(jobs::status)
            .service(jobs::start)
            .service(jobs::cancel)
            .service(jobs::create_and_start)
            .service(stats::dashboard)
            .service(stats::history)
            .service(settings::get_settings)
            .service(settings::update_settings),
    );
}

#[get("/")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "message": "Printdesk print management API",
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// `?limit=N` on listing endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

/// Parse a path id.  Anything that is not a valid id cannot name an existing
/// entity, so it is reported as not found.
pub(crate) fn parse_id<T: FromStr>(entity: &'static str, raw: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError(PrintDeskError::not_found(entity, raw)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use printdesk_core::config::{PrinterConnection, ServerConfig};

    /// Default config with fast simulated printers.
    pub fn fast_config() -> ServerConfig {
        let mut config = ServerConfig::default();
        for printer in &mut config.printers {
            printer.connection = PrinterConnection::Simulated { ms_per_page: 1 };
        }
        config.retry_base_delay_ms = 1;
        config.retry_max_delay_ms = 5;
        config
    }

    /// Hand-built multipart body with one `files` part per `(name, mime, bytes)`.
    pub fn multipart_body(parts: &[(&str, &str, &[u8])]) -> (String, Vec<u8>) {
        let boundary = "printdesk-test-boundary";
        let mut body = Vec::new();
        for (name, mime, bytes) in parts {
            body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
            body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n\
                     Content-Type: {mime}\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body)
    }
}

#[cfg(test)]
mod tests {
    use actix_web::test;

    use super::test_support::fast_config;
    use crate::services::app_services::AppServices;

    #[actix_web::test]
    async fn health_reports_message_and_status() {
        let services = AppServices::ephemeral(fast_config()).unwrap();
        let app = test_app!(services);

        let req = test::TestRequest::get().uri("/api/").to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert!(body["message"].is_string());
        assert_eq!(body["status"], "running");
    }

    #[actix_web::test]
    async fn malformed_json_is_a_bad_request_in_the_error_shape() {
        let services = AppServices::ephemeral(fast_config()).unwrap();
        let app = test_app!(services);

        let req = test::TestRequest::put()
            .uri("/api/settings")
            .insert_header(("content-type", "application/json"))
            .set_payload("{not json")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["kind"], "invalid_argument");
    }
}
