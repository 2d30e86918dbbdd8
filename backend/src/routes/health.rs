use actix_web::{web, HttpResponse};
use shared::HealthResponse;

use crate::inference::Classifier;

pub const API_VERSION: &str = "1.0.0";

/// Liveness only; the payload does not change with model state.
pub async fn health(classifier: web::Data<Classifier>) -> HttpResponse {
    log::debug!("Health check, model loaded: {}", classifier.model_loaded());
    HttpResponse::Ok().json(HealthResponse {
        status: "aktif".to_string(),
        message: "ChiliGuard API berjalan dengan baik".to_string(),
        version: API_VERSION.to_string(),
    })
}
