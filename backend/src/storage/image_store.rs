use chrono::{DateTime, Datelike, Utc};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Stores uploaded images on local disk under `deteksi/YYYY/MM/DD/<sha256>.<ext>`.
#[derive(Clone)]
pub struct ImageStore {
    root: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid file format")]
    InvalidFormat,
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
}

pub const UPLOAD_PREFIX: &str = "deteksi";

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn calculate_image_hash(image_data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(image_data);
        hex::encode(hasher.finalize())
    }

    pub fn generate_key(at: DateTime<Utc>, image_hash: &str, file_extension: &str) -> String {
        format!(
            "{}/{:04}/{:02}/{:02}/{}.{}",
            UPLOAD_PREFIX,
            at.year(),
            at.month(),
            at.day(),
            image_hash,
            file_extension
        )
    }

    pub fn extract_file_extension(mime_type: &str) -> Result<&'static str, StorageError> {
        match mime_type {
            "image/jpeg" | "image/jpg" => Ok("jpg"),
            "image/png" => Ok("png"),
            "image/webp" => Ok("webp"),
            _ => Err(StorageError::InvalidFormat),
        }
    }

    /// Writes the image and returns its key relative to the store root.
    /// Identical content on the same day maps to the same key.
    pub fn save_image(&self, image_data: &[u8], mime_type: &str) -> Result<String, StorageError> {
        let extension = Self::extract_file_extension(mime_type)?;
        let image_hash = Self::calculate_image_hash(image_data);
        let key = Self::generate_key(Utc::now(), &image_hash, extension);
        let path = self.resolve(&key)?;

        if path.exists() {
            log::debug!("Image {} already stored", key);
            return Ok(key);
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, image_data)?;
        log::info!("Stored image {} ({} bytes)", key, image_data.len());
        Ok(key)
    }

    #[cfg(test)]
    pub fn get_image(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        Ok(fs::read(self.resolve(key)?)?)
    }

    /// Missing files are not an error.
    pub fn delete_image(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.resolve(key)?) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    /// Public URL path under which actix-files serves the key.
    pub fn public_url(key: &str) -> String {
        format!("/media/{}", key)
    }

    fn resolve(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let safe = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));
        if !safe || key.is_empty() {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn key_is_date_partitioned() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 10, 0, 0).unwrap();
        assert_eq!(
            ImageStore::generate_key(at, "abc", "png"),
            "deteksi/2024/03/07/abc.png"
        );
    }

    #[test]
    fn unsupported_mime_has_no_extension() {
        assert!(ImageStore::extract_file_extension("image/gif").is_err());
        assert_eq!(ImageStore::extract_file_extension("image/jpg").unwrap(), "jpg");
    }

    #[test]
    fn save_read_delete_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        let key = store.save_image(b"not really a png", "image/png").unwrap();
        assert!(key.starts_with("deteksi/"));
        assert!(key.ends_with(".png"));
        assert_eq!(store.get_image(&key).unwrap(), b"not really a png");

        store.delete_image(&key).unwrap();
        assert!(store.get_image(&key).is_err());
        // second delete is a no-op
        store.delete_image(&key).unwrap();
    }

    #[test]
    fn traversal_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = ImageStore::new(dir.path());
        assert!(matches!(
            store.get_image("../etc/passwd"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.delete_image("/abs/path"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
