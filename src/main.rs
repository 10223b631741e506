// SPDX-License-Identifier: Apache-2.0
use actix_files::{Files, NamedFile};
use actix_web::{web, App, HttpServer};
use tracing_actix_web::TracingLogger;

use pontgate::auth;
use pontgate::config::{GatewayConfig, BACKEND_URL_ENV};
use pontgate::logging;
use pontgate::middleware::SessionGate;
use pontgate::proxy::proxy_entry;
use pontgate::rate_limit::RateLimiters;

/// Environment variable switching log output to Bunyan JSON
const JSON_LOGS_ENV: &str = "PONTGATE_JSON_LOGS";

async fn landing_page() -> std::io::Result<NamedFile> {
    NamedFile::open_async("static/index.html").await
}

async fn auth_page() -> std::io::Result<NamedFile> {
    NamedFile::open_async("static/auth.html").await
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let json_logs = std::env::var(JSON_LOGS_ENV)
        .map(|v| matches!(v.as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(false);
    if json_logs {
        logging::init_tracing("pontgate", std::io::stdout);
    } else {
        logging::init_console_tracing();
    }

    if std::env::var(BACKEND_URL_ENV).is_err() {
        tracing::warn!(
            "{} is not set; auth and proxy requests will answer 500 until it is",
            BACKEND_URL_ENV
        );
    }

    let config = GatewayConfig::load();
    let listen_addr = config.listen_addr.clone();
    let app_config = web::Data::new(config);
    let rate_limiters = web::Data::new(RateLimiters::new());

    tracing::info!("Starting pontgate session gateway on {}", listen_addr);

    HttpServer::new(move || {
        App::new()
            .wrap(SessionGate::new())
            .wrap(TracingLogger::default())
            .app_data(app_config.clone())
            .app_data(rate_limiters.clone())
            // Auth gateway
            .service(web::resource("/auth/login").route(web::post().to(auth::login)))
            .service(web::resource("/auth/signup").route(web::post().to(auth::signup)))
            .service(web::resource("/auth/google").route(web::post().to(auth::google)))
            .service(web::resource("/auth/logout").route(web::post().to(auth::logout)))
            .service(web::resource("/auth/ping").route(web::post().to(auth::ping)))
            // Auth UI page sits next to the auth API namespace
            .service(web::resource("/auth").route(web::get().to(auth_page)))
            // Catch-all reverse proxy to the upstream API, any method
            .service(web::resource("/proxy/{tail:.*}").route(web::route().to(proxy_entry)))
            // Static pages: landing plus the authenticated app shells
            .service(web::resource("/").route(web::get().to(landing_page)))
            .service(Files::new("/static", "static"))
            .service(Files::new("/", "static").index_file("index.html"))
    })
    .bind(listen_addr)?
    .workers(4)
    .run()
    .await
}
