use std::collections::HashMap;
use uuid::Uuid;

use crate::db::models::{DetectionRecord, DiseaseRecord, NewDetection};
use crate::db::{RepositoryError, SqliteRepository};
use crate::history::models::{DetectionInput, HistoryEntry};
use crate::storage::{ImageStore, StorageError};

#[derive(Clone)]
pub struct HistoryService {
    repo: SqliteRepository,
    image_store: ImageStore,
}

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("History entry not found")]
    NotFound,
}

impl HistoryService {
    pub fn new(repo: SqliteRepository, image_store: ImageStore) -> Self {
        Self { repo, image_store }
    }

    /// Stores the upload and links a detection row to it. The file write and
    /// the insert share one repository hold.
    pub fn record_detection(
        &self,
        user_id: Uuid,
        input: DetectionInput<'_>,
    ) -> Result<DetectionRecord, HistoryError> {
        let store = &self.image_store;
        self.repo.insert_detection_with_image(
            || -> Result<NewDetection, HistoryError> {
                let image_path = store.save_image(input.image, input.mime_type)?;
                Ok(NewDetection {
                    user_id: Some(user_id),
                    image_path,
                    disease_id: input.disease_id,
                    class_name: input.class_name.to_string(),
                    confidence: input.confidence,
                    healthy: input.healthy,
                })
            },
            |image_path| discard_image(store, image_path),
        )
    }

    /// Newest first.
    pub fn list_history(&self, user_id: Uuid) -> Result<Vec<HistoryEntry>, HistoryError> {
        let username = self.username(user_id)?;
        let records = self.repo.list_detections_for_user(user_id)?;

        let mut diseases: HashMap<i64, Option<DiseaseRecord>> = HashMap::new();
        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            let disease = match record.disease_id {
                Some(id) => match diseases.get(&id) {
                    Some(cached) => cached.clone(),
                    None => {
                        let found = self.repo.get_disease(id)?;
                        diseases.insert(id, found.clone());
                        found
                    }
                },
                None => None,
            };
            entries.push(HistoryEntry::from_record(record, &username, disease));
        }
        Ok(entries)
    }

    pub fn get_history(&self, user_id: Uuid, id: i64) -> Result<HistoryEntry, HistoryError> {
        let record = self
            .repo
            .get_detection_for_user(user_id, id)?
            .ok_or(HistoryError::NotFound)?;
        let username = self.username(user_id)?;
        let disease = match record.disease_id {
            Some(disease_id) => self.repo.get_disease(disease_id)?,
            None => None,
        };
        Ok(HistoryEntry::from_record(record, &username, disease))
    }

    /// Removes the row; the image goes too once nothing references it.
    pub fn delete_history(&self, user_id: Uuid, id: i64) -> Result<(), HistoryError> {
        let store = &self.image_store;
        let record = self
            .repo
            .delete_detection_for_user(user_id, id, |image_path| discard_image(store, image_path))?
            .ok_or(HistoryError::NotFound)?;
        log::info!("Deleted detection {} for user {}", record.id, user_id);
        Ok(())
    }

    fn username(&self, user_id: Uuid) -> Result<String, HistoryError> {
        Ok(self
            .repo
            .get_user_by_id(user_id)?
            .map(|user| user.username)
            .unwrap_or_default())
    }
}

fn discard_image(store: &ImageStore, image_path: &str) {
    if let Err(e) = store.delete_image(image_path) {
        log::warn!("Failed to delete image {}: {}", image_path, e);
    }
}
