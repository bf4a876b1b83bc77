//! # Clinic Rate Limit Service
//!
//! Actix-web server that enforces per-action request budgets for the
//! clinic backend and lets administrators inspect and clear them.

use actix_web::{App, HttpServer, web};
use std::net::IpAddr;
use std::sync::Arc;
use tracing_actix_web::TracingLogger;

#[cfg(feature = "scheduler")]
mod background;
mod config;
mod handlers;
mod middleware;
mod state;
mod telemetry;

use config::AppConfig;
use state::AppState;
use telemetry::TelemetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    telemetry::init_telemetry(&TelemetryConfig::from_env());

    let config = AppConfig::from_env();

    tracing::info!(
        "Starting clinic rate limit service on {}:{}",
        config.host,
        config.port
    );

    let state = AppState::new(&config).await?;

    #[cfg(feature = "scheduler")]
    let mut scheduler = match &state.memory_store {
        Some(store) => {
            let scheduler = background::Scheduler::new(config.scheduler.clone()).await?;
            background::schedule_counter_purge(&scheduler, store.clone()).await?;
            scheduler.start().await?;
            Some(scheduler)
        }
        None => None,
    };

    let limiter = state.limiter.clone();
    let tokens = state.tokens.clone();
    let trusted_proxies: Arc<[IpAddr]> = config.trusted_proxies.clone().into();

    HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .app_data(web::Data::new(state.clone()))
            .app_data(web::Data::new(tokens.clone()))
            .configure(|cfg| handlers::configure_routes(cfg, &limiter, &trusted_proxies))
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    #[cfg(feature = "scheduler")]
    if let Some(scheduler) = scheduler.as_mut() {
        scheduler.shutdown().await?;
    }

    Ok(())
}
