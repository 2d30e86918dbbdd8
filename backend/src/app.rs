use actix_web::web;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Arc;

use crate::auth::{AuthMiddleware, JwtService, PasswordHasher};
use crate::config::{AppConfig, ConfigError, ModelConfig};
use crate::db::SqliteRepository;
use crate::diagnosis::ResultComposer;
use crate::error::ApiError;
use crate::history::HistoryService;
use crate::inference::{BackendLoader, Classifier, ModelLoader};
use crate::routes::{self, predict::PredictSettings};
use crate::storage::ImageStore;

/// Everything the handlers need, built once and shared by every worker.
#[derive(Clone)]
pub struct AppServices {
    pub repo: SqliteRepository,
    pub classifier: web::Data<Classifier>,
    pub composer: web::Data<ResultComposer>,
    pub history: HistoryService,
    pub jwt: JwtService,
    pub hasher: PasswordHasher,
    pub predict: PredictSettings,
    pub media_root: PathBuf,
}

impl AppServices {
    pub fn build(
        config: &AppConfig,
        model_config: ModelConfig,
        conn: Connection,
        backend_loader: Arc<dyn BackendLoader>,
    ) -> Result<Self, ConfigError> {
        model_config.validate()?;

        let repo = SqliteRepository::new(conn);
        let image_store = ImageStore::new(config.media_root.clone());

        let model_path = config
            .model_path_override
            .clone()
            .unwrap_or_else(|| model_config.model_path.clone());
        let loader = ModelLoader::new(model_path, model_config.clone(), backend_loader);
        let classifier = Classifier::new(Arc::new(loader), &model_config)?;

        Ok(Self {
            repo: repo.clone(),
            classifier: web::Data::new(classifier),
            composer: web::Data::new(ResultComposer::with_catalog(repo.clone())),
            history: HistoryService::new(repo, image_store),
            jwt: JwtService::new(&config.jwt_secret),
            hasher: PasswordHasher::new(config.password_iterations),
            predict: PredictSettings::new(config, &model_config),
            media_root: config.media_root.clone(),
        })
    }

    pub fn auth_middleware(&self) -> AuthMiddleware {
        AuthMiddleware::new(self.jwt.clone())
    }

    pub fn configure(&self, cfg: &mut web::ServiceConfig) {
        cfg.app_data(web::Data::new(self.repo.clone()))
            .app_data(self.classifier.clone())
            .app_data(self.composer.clone())
            .app_data(web::Data::new(self.history.clone()))
            .app_data(web::Data::new(self.jwt.clone()))
            .app_data(web::Data::new(self.hasher.clone()))
            .app_data(web::Data::new(self.predict.clone()))
            .app_data(web::JsonConfig::default().error_handler(|err, _req| {
                ApiError::BadRequest(format!("Body JSON tidak valid: {}", err)).into()
            }));
        routes::configure_routes(cfg, &self.media_root);
    }
}
