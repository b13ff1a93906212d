// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printdesk — print station backend
//
// Entry point. Initialises logging, resolves the data directory and config,
// opens the backend services, and serves the HTTP API.

mod error;
mod routes;
mod services;

use std::path::PathBuf;

use actix_web::{App, HttpServer, web};
use tracing::{error, info};

use services::app_services::{self, AppServices};
use services::data_dir;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "Printdesk starting");

    let services = match init_services() {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "startup failed");
            return Err(std::io::Error::other(e.to_string()));
        }
    };
    if let Err(e) = services.start_background() {
        error!(error = %e, "could not start print workers");
        return Err(std::io::Error::other(e.to_string()));
    }

    let bind = (services.config().bind_address.clone(), services.config().port);
    info!(
        address = %bind.0,
        port = bind.1,
        data_dir = ?services.data_dir(),
        "HTTP server listening"
    );

    let data = web::Data::new(services);
    HttpServer::new(move || {
        App::new()
            .app_data(data.clone())
            .configure(routes::configure_routes)
    })
    .bind(bind)?
    .run()
    .await
}

fn init_services() -> printdesk_core::error::Result<AppServices> {
    let default_dir = data_dir::data_dir()?;
    let config = app_services::load_config(&default_dir)?;
    let dir: PathBuf = match &config.data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            dir.clone()
        }
        None => default_dir,
    };
    AppServices::init(config, &dir)
}
