use actix_multipart::{Multipart, MultipartError};
use actix_web::{web, HttpResponse};
use futures::TryStreamExt;
use log::{error, info, warn};
use shared::{PredictionResponse, RankedPrediction};
use std::collections::HashSet;
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::config::{AppConfig, ModelConfig};
use crate::diagnosis::{DiseaseInfo, ResultComposer};
use crate::error::ApiError;
use crate::history::{DetectionInput, HistoryService};
use crate::inference::{ClassificationResult, Classifier, TOP_K};

pub const IMAGE_FIELD: &str = "image";
pub const ALLOWED_CONTENT_TYPES: [&str; 4] = ["image/jpeg", "image/png", "image/jpg", "image/webp"];
const BYTES_PER_MB: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("File gambar tidak ditemukan. Kirim file dengan key \"image\".")]
    MissingImage,
    #[error("Tipe file tidak valid. Gunakan: {}", ALLOWED_CONTENT_TYPES.join(", "))]
    InvalidType(Option<String>),
    #[error("Ukuran file terlalu besar. Maksimal {max_mb}MB.")]
    TooLarge { max_mb: usize },
}

/// Per-process knobs of the prediction endpoint.
#[derive(Debug, Clone)]
pub struct PredictSettings {
    pub max_upload_bytes: usize,
    pub healthy_classes: HashSet<String>,
}

impl PredictSettings {
    pub fn new(app: &AppConfig, model: &ModelConfig) -> Self {
        Self {
            max_upload_bytes: app.max_upload_bytes,
            healthy_classes: model.healthy_classes.iter().cloned().collect(),
        }
    }

    pub fn is_healthy(&self, class_label: &str) -> bool {
        self.healthy_classes.contains(class_label)
    }
}

/// The `image` part as received. `size` counts every byte sent even when
/// buffering stopped at the limit.
#[derive(Debug)]
pub struct Upload {
    pub content_type: Option<String>,
    pub data: Vec<u8>,
    pub size: usize,
}

#[derive(Debug)]
pub struct ValidImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Reads the first non-empty `image` part and drains everything else.
pub async fn read_upload(mut payload: Multipart, limit: usize) -> Result<Option<Upload>, MultipartError> {
    let mut upload = None;

    while let Some(mut field) = payload.try_next().await? {
        if upload.is_some() || field.name() != Some(IMAGE_FIELD) {
            while field.try_next().await?.is_some() {}
            continue;
        }

        let content_type = field.content_type().map(|mime| mime.essence_str().to_string());
        let mut data = Vec::new();
        let mut size = 0usize;
        while let Some(chunk) = field.try_next().await? {
            size += chunk.len();
            if size <= limit {
                data.extend_from_slice(&chunk);
            }
        }

        if size > 0 {
            upload = Some(Upload {
                content_type,
                data,
                size,
            });
        }
    }

    Ok(upload)
}

/// Presence, then declared type, then size.
pub fn validate(upload: Option<Upload>, max_bytes: usize) -> Result<ValidImage, ValidationError> {
    let upload = upload.ok_or(ValidationError::MissingImage)?;

    let mime_type = match upload.content_type.map(|ct| ct.to_ascii_lowercase()) {
        Some(ct) if ALLOWED_CONTENT_TYPES.contains(&ct.as_str()) => ct,
        other => return Err(ValidationError::InvalidType(other)),
    };

    if upload.size > max_bytes {
        return Err(ValidationError::TooLarge {
            max_mb: max_bytes / BYTES_PER_MB,
        });
    }

    Ok(ValidImage {
        mime_type,
        data: upload.data,
    })
}

fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn compose_response(
    result: &ClassificationResult,
    info: &DiseaseInfo,
    healthy: bool,
    history_id: Option<i64>,
) -> PredictionResponse {
    let confidence = f64::from(result.confidence);
    PredictionResponse {
        success: true,
        class_name: info.name.clone(),
        local_name: info.local_name.clone(),
        confidence: round_to(confidence, 4),
        confidence_percent: round_to(confidence * 100.0, 2),
        healthy,
        description: info.description.clone(),
        symptoms: info.symptoms.clone(),
        organic_treatments: info.organic_treatments.clone(),
        chemical_treatments: info.chemical_treatments.clone(),
        prevention: info.prevention.clone(),
        top_predictions: result
            .top(TOP_K)
            .iter()
            .map(|score| RankedPrediction {
                class_name: score.class_name.clone(),
                confidence: round_to(f64::from(score.confidence), 4),
            })
            .collect(),
        message: result.message.clone(),
        history_id,
    }
}

struct PendingDetection {
    image: ValidImage,
    class_name: String,
    confidence: f64,
    healthy: bool,
    disease_id: Option<i64>,
}

/// Best effort: a failed save is logged and the prediction still goes out.
async fn persist(history: web::Data<HistoryService>, user_id: Uuid, pending: PendingDetection) -> Option<i64> {
    let saved = web::block(move || {
        history.record_detection(
            user_id,
            DetectionInput {
                image: &pending.image.data,
                mime_type: &pending.image.mime_type,
                class_name: &pending.class_name,
                confidence: pending.confidence,
                healthy: pending.healthy,
                disease_id: pending.disease_id,
            },
        )
    })
    .await;

    match saved {
        Ok(Ok(record)) => {
            info!("Saved detection {} for user {}", record.id, user_id);
            Some(record.id)
        }
        Ok(Err(e)) => {
            error!("Failed to save detection history for user {}: {}", user_id, e);
            None
        }
        Err(e) => {
            error!("Detection history task failed for user {}: {}", user_id, e);
            None
        }
    }
}

pub async fn predict(
    payload: Multipart,
    user: Option<AuthenticatedUser>,
    classifier: web::Data<Classifier>,
    composer: web::Data<ResultComposer>,
    history: web::Data<HistoryService>,
    settings: web::Data<PredictSettings>,
) -> Result<HttpResponse, ApiError> {
    let upload = read_upload(payload, settings.max_upload_bytes)
        .await
        .map_err(|e| {
            warn!("Unreadable multipart upload: {}", e);
            ApiError::Validation(ValidationError::MissingImage)
        })?;

    let image = validate(upload, settings.max_upload_bytes).map_err(|e| {
        warn!("Rejected upload: {}", e);
        e
    })?;
    info!("Classifying {} upload of {} bytes", image.mime_type, image.data.len());

    let (image, result) = {
        let classifier = classifier.into_inner();
        web::block(move || {
            let result = classifier.classify(&image.data);
            (image, result)
        })
        .await?
    };

    let label = match result.label.clone() {
        Some(label) if result.success => label,
        _ => return Err(ApiError::Classification(result.message.clone())),
    };

    let (label, info) = {
        let composer = composer.into_inner();
        web::block(move || {
            let info = composer.enrich(&label);
            (label, info)
        })
        .await?
    };
    let healthy = settings.is_healthy(&label);
    if result.demo {
        warn!("Serving demo prediction, no model loaded");
    }

    let history_id = match user {
        Some(AuthenticatedUser(user_id)) => {
            let pending = PendingDetection {
                image,
                class_name: label.clone(),
                confidence: round_to(f64::from(result.confidence), 4),
                healthy,
                disease_id: info.catalog_id,
            };
            persist(history, user_id, pending).await
        }
        None => None,
    };

    info!(
        "Predicted {} ({:.4}) healthy={}",
        label, result.confidence, healthy
    );
    Ok(HttpResponse::Ok().json(compose_response(&result, &info, healthy, history_id)))
}
