// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>

use actix_web::{HttpResponse, get, put, web};

use printdesk_core::settings::Settings;

use crate::error::ApiError;
use crate::services::app_services::AppServices;

#[get("/settings")]
pub async fn get_settings(services: web::Data<AppServices>) -> HttpResponse {
    HttpResponse::Ok().json(services.settings().get())
}

/// Full replace.  Existing files and jobs are not re-validated.
#[put("/settings")]
pub async fn update_settings(
    services: web::Data<AppServices>,
    body: web::Json<Settings>,
) -> Result<HttpResponse, ApiError> {
    let updated = services.settings().update(body.into_inner())?;
    Ok(HttpResponse::Ok().json(updated))
}

#[cfg(test)]
mod tests {
    use actix_web::test;
    use serde_json::{Value, json};

    use crate::routes::test_support::fast_config;
    use crate::services::app_services::AppServices;

    fn new_settings() -> Value {
        json!({
            "default_settings": {
                "color_mode": "bw",
                "paper_size": "Letter",
                "orientation": "landscape",
                "quality": "high",
                "duplex": "long-edge"
            },
            "file_retention_days": 7,
            "max_file_size_mb": 50,
            "supported_file_types": [".pdf", ".txt"]
        })
    }

    #[actix_web::test]
    async fn update_echoes_and_persists_new_values() {
        let services = AppServices::ephemeral(fast_config()).unwrap();
        let app = test_app!(services);

        let req = test::TestRequest::put()
            .uri("/api/settings")
            .set_json(new_settings())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, new_settings());

        let req = test::TestRequest::get().uri("/api/settings").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["max_file_size_mb"], 50);
        assert_eq!(body["default_settings"]["paper_size"], "Letter");
    }

    #[actix_web::test]
    async fn invalid_settings_are_rejected_and_leave_current_values() {
        let services = AppServices::ephemeral(fast_config()).unwrap();
        let app = test_app!(services);
        let before = services.settings().get();

        let mut empty_types = new_settings();
        empty_types["supported_file_types"] = json!([]);
        let mut negative = new_settings();
        negative["max_file_size_mb"] = json!(-1);
        let mut zero = new_settings();
        zero["max_file_size_mb"] = json!(0);

        for body in [empty_types, negative, zero] {
            let req = test::TestRequest::put()
                .uri("/api/settings")
                .set_json(body)
                .to_request();
            assert_eq!(test::call_service(&app, req).await.status(), 400);
        }
        assert_eq!(services.settings().get(), before);
    }
}
