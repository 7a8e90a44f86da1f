use actix_web::{middleware::Logger, web, App, HttpServer};
use log::info;
use std::io;

use file_drop::api;
use file_drop::app_state::AppState;
use file_drop::config::AppConfig;
use file_drop::logging::init_logging;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = AppConfig::load().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    init_logging(&config.logging);

    let state = AppState::from_config(config.clone()).map_err(io::Error::other)?;
    let state = web::Data::new(state);

    info!(
        "Starting server on {}:{} with {} storage",
        config.server.host,
        config.server.port,
        state.storage_service.backend_kind()
    );

    HttpServer::new(move || {
        App::new()
            .wrap(api::cors())
            .wrap(Logger::default())
            .app_data(state.clone())
            .configure(api::configure)
    })
    .workers(config.server.workers)
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
