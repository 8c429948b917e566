use std::io;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use tokio::signal;

mod api_error;
mod config;
mod db;
mod http;
mod middleware;
mod models;
mod notifier;
mod service;
mod telemetry;

use crate::config::Config;
use crate::db::create_pool;
use crate::middleware::cors_middleware;
use crate::notifier::SessionHub;
use crate::service::{MatchService, RegistrationService, SessionService};
use crate::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> io::Result<()> {
    let config = Config::from_env().expect("Failed to load configuration");

    init_telemetry();

    let db_pool = create_pool(&config)
        .await
        .expect("Failed to create database pool");

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .expect("Failed to run database migrations");

    let hub = Arc::new(SessionHub::new());

    tracing::info!(
        "Starting courtside backend server on {}:{}",
        config.server.host,
        config.server.port
    );

    let server = HttpServer::new({
        let db_pool = db_pool.clone();
        let hub = hub.clone();
        move || {
            App::new()
                .app_data(web::Data::new(db_pool.clone()))
                .app_data(web::Data::new(hub.clone()))
                .app_data(web::Data::new(SessionService::new(db_pool.clone())))
                .app_data(web::Data::new(RegistrationService::new(
                    db_pool.clone(),
                    hub.clone(),
                )))
                .app_data(web::Data::new(MatchService::new(
                    db_pool.clone(),
                    hub.clone(),
                )))
                .wrap(cors_middleware())
                .wrap(actix_web::middleware::Logger::default())
                .service(
                    web::scope("/api")
                        .route("/health", web::get().to(crate::http::health::health_check))
                        .configure(crate::http::session_handler::configure_routes)
                        .configure(crate::http::registration_handler::configure_routes)
                        .configure(crate::http::match_handler::configure_routes),
                )
                .configure(crate::http::session_ws_handler::configure_ws_routes)
        }
    })
    .bind((config.server.host.clone(), config.server.port))?
    .run();

    // Graceful shutdown
    let server_handle = server.handle();
    tokio::spawn(async move {
        signal::ctrl_c()
            .await
            .expect("Failed to listen for shutdown signal");
        tracing::info!("Shutdown signal received, stopping server...");
        server_handle.stop(true).await;
    });

    server.await
}
