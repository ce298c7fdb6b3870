use std::sync::Arc;
use std::time::Duration;

use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer};
use chrono::Local;

mod api;
mod auth;
mod collab;
mod config;
mod context;
mod db;
mod docs;
mod engine;
mod error;
mod feed;
mod model;
mod models;
mod routes;
mod state;
mod store;
mod utils;

use crate::collab::local_storage::LocalProofStorage;
use crate::collab::outbox::MySqlOutbox;
use crate::docs::ApiDoc;
use crate::engine::Services;
use crate::feed::{ChangeFeed, Table};
use crate::routes::RateLimits;
use crate::state::AppState;
use crate::store::mysql::MySqlStore;
use crate::utils::query_generation::QueryGenerations;
use config::Config;
use db::init_db;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

const RETENTION_SWEEP_EVERY: Duration = Duration::from_secs(6 * 60 * 60);

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::other(format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = Config::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url)
        .await
        .map_err(|e| startup_error("Database unavailable", e))?;

    let outbox = Arc::new(MySqlOutbox::new(pool.clone()));
    let services = Services {
        store: Arc::new(MySqlStore::new(pool.clone())),
        gamification: outbox.clone(),
        notifier: outbox,
        proofs: Arc::new(LocalProofStorage::new(
            config.proof_dir.clone(),
            config.proof_public_base.clone(),
        )),
        policy: config.policy.clone(),
    };
    let state = AppState {
        services,
        config: config.clone(),
        feed: ChangeFeed::new(),
        generations: QueryGenerations::new(),
    };
    let limits = RateLimits::from_config(&config)
        .map_err(|e| startup_error("Invalid rate limit", e))?;

    let sweeper = state.clone();
    actix_web::rt::spawn(async move {
        let mut ticker = actix_web::rt::time::interval(RETENTION_SWEEP_EVERY);
        loop {
            ticker.tick().await;
            let today = Local::now().date_naive();
            match engine::attendance::purge_expired(&sweeper.services, today).await {
                Ok(0) => {}
                Ok(removed) => {
                    info!(removed, "Expired attendance purged");
                    sweeper.feed.publish(Table::AttendanceLogs, None);
                }
                Err(e) => error!(error = %e, "Attendance retention sweep failed"),
            }
        }
    });

    let server_addr = config.server_addr.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(state.clone()))
            .configure(|cfg| routes::configure(cfg, &config, &limits))
    })
    .bind(server_addr)?
    .run()
    .await
}
