use actix_cors::Cors;
use actix_web::middleware::{Logger, NormalizePath, TrailingSlash};
use actix_web::{App, HttpServer};
use backend::config::{AppConfig, ModelConfig};
use backend::inference::default_backend_loader;
use backend::{db, AppServices};
use std::env;

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, e);
    std::io::Error::other(format!("{}: {}", context, e))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    }

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;
    let model_config = ModelConfig::load_or_default(&config.model_config_path)
        .map_err(|e| startup_error("Model config loading failed", e))?;

    std::fs::create_dir_all(&config.media_root)?;
    let conn = db::open_database(&config.database_path)
        .map_err(|e| startup_error("Database initialization failed", e))?;
    log::info!("Database ready at {}", config.database_path.display());

    let services = AppServices::build(&config, model_config, conn, default_backend_loader())
        .map_err(|e| startup_error("Service initialization failed", e))?;

    if services.classifier.warm_up() {
        log::info!("Model preloaded");
    } else {
        log::warn!("Model not available, /predict serves demo results until it is");
    }

    let bind_address = format!("0.0.0.0:{}", config.port);
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(services.auth_middleware())
            .wrap(NormalizePath::new(TrailingSlash::Trim))
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "PUT", "DELETE", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::AUTHORIZATION,
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .configure(|cfg| services.configure(cfg))
    })
    .bind(&bind_address)?
    .run()
    .await
}
