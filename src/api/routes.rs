// src/api/routes.rs
use actix_web::web;
use crate::api::handlers;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .route("/health", web::get().to(handlers::health_check))
            .route("/resources/for-event", web::post().to(handlers::resources_for_event))
            .route("/resources/authorize", web::post().to(handlers::authorize_resources))
            .route("/resources/allocate", web::post().to(handlers::allocate_resources))
            .route("/resources/release", web::post().to(handlers::release_resources))
            .route("/resources/{tenant}/{id}", web::get().to(handlers::get_resource))
    );
}
