//! Consulta settlement server
//!
//! Serves the call lifecycle, settlement, balance, payout, payment webhook,
//! referral, earnings and matching endpoints over HTTP.

use actix_cors::Cors;
use actix_web::{http::header, middleware, web, App, HttpResponse, HttpServer};
use anyhow::Context;
use consulta_api::AppState;
use consulta_auth::JwtService;
use consulta_cache::RedisCache;
use consulta_core::AppConfig;
use consulta_db::{create_pool, pg_repositories, run_migrations};
use consulta_services::Services;
use std::sync::Arc;
use tracing::info;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing(json_logs: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            "consulta=info,consulta_api=info,consulta_services=info,consulta_db=info,actix_web=info,sqlx=warn",
        )
    });

    let registry = tracing_subscriber::registry().with(env_filter);

    if json_logs {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .init();
    }
}

fn cors(origins: &str) -> Cors {
    let origins: Vec<String> = origins
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

    Cors::default()
        .allowed_origin_fn(move |origin, _req_head| {
            origin
                .to_str()
                .map(|o| origins.iter().any(|allowed| allowed == o))
                .unwrap_or(false)
        })
        .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
        .allowed_headers(vec![
            header::AUTHORIZATION,
            header::ACCEPT,
            header::CONTENT_TYPE,
        ])
        .max_age(3600)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let config = AppConfig::load().context("failed to load configuration")?;
    init_tracing(config.server.json_logs);
    config.validate().context("invalid configuration")?;

    info!("Starting Consulta v{}", env!("CARGO_PKG_VERSION"));

    info!("Connecting to database...");
    let pool = create_pool(&config.database)
        .await
        .context("failed to create database pool")?;
    info!(
        "Database connection established with {} max connections",
        config.database.max_connections
    );

    if config.database.run_migrations {
        run_migrations(&pool)
            .await
            .context("failed to run migrations")?;
    }

    let cache = RedisCache::new(&config.redis.url)
        .await
        .context("failed to connect to Redis")?;
    info!("Redis connection established");

    let services = Services::new(pg_repositories(&pool), Arc::new(cache), &config)
        .context("failed to build services")?;
    let state = web::Data::new(AppState::new(services));
    let jwt_service = web::Data::new(JwtService::from_config(&config.auth));

    let bind_addr = config.server_addr();
    let cors_origins = config.server.cors_origins.clone();
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, config.server.workers
    );

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(jwt_service.clone())
            .wrap(cors(&cors_origins))
            .wrap(TracingLogger::default())
            .wrap(middleware::NormalizePath::trim())
            .configure(consulta_api::configure)
            .route(
                "/",
                web::get().to(|| async {
                    HttpResponse::Found()
                        .append_header(("Location", "/api/v1/health"))
                        .finish()
                }),
            )
    })
    .workers(config.server.workers)
    .bind(&bind_addr)?
    .run()
    .await?;

    info!("Server stopped, closing database pool");
    pool.close().await;
    Ok(())
}
