use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;
mod utils;

#[cfg(test)]
mod test_support;

use config::Config;
use db::init_store;

use crate::docs::ApiDoc;
use crate::store::DocumentStore;
use crate::utils::email_cache::EmailCache;
use crate::utils::email_filter::EmailFilter;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling;
use utoipa::OpenApi; // ← needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index() -> impl Responder {
    "WorkTrack is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
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

    info!(backend = ?config.store_backend, "Server starting...");

    let store: Arc<dyn DocumentStore> = init_store(&config).await?;
    let filter = Data::new(EmailFilter::new());
    let cache = Data::new(EmailCache::new());

    let store_for_filter_warmup = store.clone();
    let filter_for_warmup = filter.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = filter_for_warmup
            .warmup(store_for_filter_warmup.as_ref(), 100)
            .await
        {
            error!(error = %e, "Failed to warm up email filter");
        }
    });

    let store_for_cache_warmup = store.clone();
    let cache_for_warmup = cache.clone();
    actix_web::rt::spawn(async move {
        // Warm up last 30 days of recent users in batches of 250
        if let Err(e) = cache_for_warmup
            .warmup(store_for_cache_warmup.as_ref(), 30, 250)
            .await
        {
            error!(error = %e, "Failed to warm up email cache");
        }
    });

    let server_addr = config.server_addr.clone();
    let store_data: Data<dyn DocumentStore> = Data::from(store);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}") // ← important: wildcard {_:.*} to match JS/CSS files
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(store_data.clone())
            .app_data(Data::new(config.clone()))
            .app_data(filter.clone())
            .app_data(cache.clone())
            .service(index)
            // Configure auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config.clone()))
    })
    .bind(server_addr)?
    .run()
    .await?;

    Ok(())
}
