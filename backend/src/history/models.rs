use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::db::models::{DetectionRecord, DiseaseRecord};
use crate::storage::ImageStore;

/// One row of a user's detection history as the client sees it.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub username: String,
    /// Public URL of the stored upload.
    pub gambar: String,
    pub nama_kelas: String,
    pub kepercayaan: f64,
    pub status_sehat: bool,
    pub penyakit_detail: Option<DiseaseRecord>,
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn from_record(
        record: DetectionRecord,
        username: &str,
        disease: Option<DiseaseRecord>,
    ) -> Self {
        Self {
            id: record.id,
            username: username.to_string(),
            gambar: ImageStore::public_url(&record.image_path),
            nama_kelas: record.class_name,
            kepercayaan: record.confidence,
            status_sehat: record.healthy,
            penyakit_detail: disease,
            created_at: record.created_at,
        }
    }
}

/// What the prediction pipeline hands over for persistence.
#[derive(Debug, Clone, Copy)]
pub struct DetectionInput<'a> {
    pub image: &'a [u8],
    pub mime_type: &'a str,
    pub class_name: &'a str,
    pub confidence: f64,
    pub healthy: bool,
    pub disease_id: Option<i64>,
}
