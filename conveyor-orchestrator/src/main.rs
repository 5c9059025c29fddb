use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod config;
pub mod db;
pub mod driver;
pub mod repository;
pub mod service;

#[cfg(test)]
mod testing;

use config::Config;
use driver::Drivers;
use repository::{PgProjectRepository, PgPublishRepository, PgSettingRepository};
use service::PipelineManager;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conveyor_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Conveyor Orchestrator...");

    let config = Config::from_env().expect("Failed to load configuration");
    config.validate().expect("Invalid configuration");

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");

    // One HTTP client shared by every driver
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .expect("Failed to create HTTP client");

    let manager = PipelineManager::new(
        Arc::new(PgPublishRepository::new(pool.clone())),
        Arc::new(PgProjectRepository::new(pool.clone())),
        Arc::new(PgSettingRepository::new(pool)),
        Drivers::http(http),
        config.engine.clone(),
    );

    tracing::info!(
        "Pipeline manager ready, callbacks go to {}",
        manager.config().server_url
    );

    // Build router with all API endpoints
    let app = api::create_router(Arc::new(manager));

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
