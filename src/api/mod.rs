//! HTTP surface: route table and CORS headers
//!
//! Every route is served both at the root and under `/api`.

pub mod handlers;
pub mod models;

use actix_web::middleware::DefaultHeaders;
use actix_web::web;

/// Permissive CORS headers added to every response
pub fn cors() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("Access-Control-Allow-Origin", "*"))
        .add(("Access-Control-Allow-Methods", "GET,POST,DELETE,OPTIONS"))
        .add((
            "Access-Control-Allow-Headers",
            "X-Requested-With, Accept, Content-Length, Content-Type, Date",
        ))
}

/// Register all routes and the fallback service
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/api").configure(routes));
    routes(cfg);
    cfg.default_service(web::to(handlers::route_fallback));
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/upload")
            .route(web::post().to(handlers::upload_files))
            .default_service(web::to(handlers::method_fallback)),
    )
    .service(
        web::resource("/files")
            .route(web::get().to(handlers::list_files))
            .route(web::delete().to(handlers::delete_files))
            .default_service(web::to(handlers::method_fallback)),
    )
    .service(
        web::resource("/files/{filename}")
            .route(web::get().to(handlers::download_by_path))
            .route(web::delete().to(handlers::delete_by_path))
            .default_service(web::to(handlers::method_fallback)),
    )
    .service(
        web::resource("/download")
            .route(web::get().to(handlers::download_by_query))
            .default_service(web::to(handlers::method_fallback)),
    )
    .service(
        web::resource("/delete")
            .route(web::delete().to(handlers::delete_by_query))
            .default_service(web::to(handlers::method_fallback)),
    )
    .service(
        web::resource("/uploads/{filename}")
            .route(web::get().to(handlers::serve_upload))
            .default_service(web::to(handlers::method_fallback)),
    );
}
