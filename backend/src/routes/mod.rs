pub mod diseases;
pub mod health;
pub mod history;
pub mod predict;

use actix_files::Files;
use actix_web::web;
use std::path::Path;

use crate::auth::routes as auth;

pub fn configure_routes(cfg: &mut web::ServiceConfig, media_root: &Path) {
    cfg.service(web::resource("/predict").route(web::post().to(predict::predict)))
        .service(web::resource("/health").route(web::get().to(health::health)))
        .service(web::resource("/classes").route(web::get().to(diseases::list_classes)))
        .service(
            web::scope("/auth")
                .service(web::resource("/register").route(web::post().to(auth::register)))
                .service(web::resource("/login").route(web::post().to(auth::login)))
                .service(web::resource("/logout").route(web::post().to(auth::logout)))
                .service(
                    web::resource("/profile")
                        .route(web::get().to(auth::profile))
                        .route(web::put().to(auth::update_profile)),
                ),
        )
        .service(web::resource("/history").route(web::get().to(history::list_history)))
        .service(
            web::resource("/history/{id}")
                .route(web::get().to(history::get_history))
                .route(web::delete().to(history::delete_history)),
        )
        .service(web::resource("/diseases").route(web::get().to(diseases::list_diseases)))
        .service(web::resource("/diseases/{id}").route(web::get().to(diseases::get_disease)))
        .service(Files::new("/media", media_root));
}
