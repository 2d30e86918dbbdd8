use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use super::models::{DetectionRecord, DiseaseRecord, NewDetection, NewDisease, Profile, User};
use super::RepositoryError;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, first_name, last_name, is_active, created_at, last_login";
const DISEASE_COLUMNS: &str = "id, name, local_name, description, symptoms, organic_treatments, chemical_treatments, prevention, created_at, updated_at";
const DETECTION_COLUMNS: &str =
    "id, user_id, image_path, disease_id, class_name, confidence, healthy, created_at";

#[derive(Clone)]
pub struct SqliteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRepository {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, RepositoryError> {
        self.conn.lock().map_err(|_| RepositoryError::LockPoisoned)
    }

    // ---- users -------------------------------------------------------------

    /// Inserts the user together with its (empty) profile.
    pub fn create_user(&self, user: &User, profile: &Profile) -> Result<(), RepositoryError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO users (id, username, email, password_hash, first_name, last_name, is_active, created_at, last_login)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                user.id.to_string(),
                user.username,
                user.email,
                user.password_hash,
                user.first_name,
                user.last_name,
                user.is_active,
                user.created_at,
                user.last_login,
            ],
        )
        .map_err(map_write_error)?;
        tx.execute(
            "INSERT INTO profiles (user_id, photo, phone, address, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                profile.user_id.to_string(),
                profile.photo,
                profile.phone,
                profile.address,
                profile.created_at,
                profile.updated_at,
            ],
        )
        .map_err(map_write_error)?;
        tx.commit()?;
        log::info!("Created user {} ({})", user.username, user.id);
        Ok(())
    }

    pub fn get_user_by_id(&self, user_id: Uuid) -> Result<Option<User>, RepositoryError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?1", USER_COLUMNS),
                params![user_id.to_string()],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>, RepositoryError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(
                &format!("SELECT {} FROM users WHERE username = ?1", USER_COLUMNS),
                params![username],
                map_user,
            )
            .optional()?;
        Ok(user)
    }

    pub fn username_exists(&self, username: &str) -> Result<bool, RepositoryError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// `exclude` lets a user keep their own address when updating a profile.
    pub fn email_exists(&self, email: &str, exclude: Option<Uuid>) -> Result<bool, RepositoryError> {
        let conn = self.conn()?;
        let exclude = exclude.map(|id| id.to_string()).unwrap_or_default();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE lower(email) = lower(?1) AND id != ?2",
            params![email, exclude],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn update_last_login(&self, user_id: Uuid, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![at, user_id.to_string()],
        )?;
        Ok(())
    }

    pub fn update_user_details(
        &self,
        user_id: Uuid,
        email: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        let changed = conn
            .execute(
                "UPDATE users SET email = ?1, first_name = ?2, last_name = ?3 WHERE id = ?4",
                params![email, first_name, last_name, user_id.to_string()],
            )
            .map_err(map_write_error)?;
        if changed == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    pub fn get_profile(&self, user_id: Uuid) -> Result<Option<Profile>, RepositoryError> {
        let conn = self.conn()?;
        let profile = conn
            .query_row(
                "SELECT user_id, photo, phone, address, created_at, updated_at FROM profiles WHERE user_id = ?1",
                params![user_id.to_string()],
                |row| {
                    Ok(Profile {
                        user_id: parse_uuid(0, row.get(0)?)?,
                        photo: row.get(1)?,
                        phone: row.get(2)?,
                        address: row.get(3)?,
                        created_at: row.get(4)?,
                        updated_at: row.get(5)?,
                    })
                },
            )
            .optional()?;
        Ok(profile)
    }

    pub fn update_profile(&self, profile: &Profile) -> Result<(), RepositoryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO profiles (user_id, photo, phone, address, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(user_id) DO UPDATE SET
                photo = excluded.photo,
                phone = excluded.phone,
                address = excluded.address,
                updated_at = excluded.updated_at",
            params![
                profile.user_id.to_string(),
                profile.photo,
                profile.phone,
                profile.address,
                profile.created_at,
                profile.updated_at,
            ],
        )?;
        Ok(())
    }

    // ---- disease catalog ---------------------------------------------------

    /// Insert or update by English name. Returns the stored row and whether it was new.
    pub fn upsert_disease(&self, disease: &NewDisease) -> Result<(DiseaseRecord, bool), RepositoryError> {
        let conn = self.conn()?;
        let existed: i64 = conn.query_row(
            "SELECT COUNT(*) FROM diseases WHERE name = ?1",
            params![disease.name],
            |row| row.get(0),
        )?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO diseases (name, local_name, description, symptoms, organic_treatments, chemical_treatments, prevention, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
             ON CONFLICT(name) DO UPDATE SET
                local_name = excluded.local_name,
                description = excluded.description,
                symptoms = excluded.symptoms,
                organic_treatments = excluded.organic_treatments,
                chemical_treatments = excluded.chemical_treatments,
                prevention = excluded.prevention,
                updated_at = excluded.updated_at",
            params![
                disease.name,
                disease.local_name,
                disease.description,
                serde_json::to_string(&disease.symptoms)?,
                serde_json::to_string(&disease.organic_treatments)?,
                serde_json::to_string(&disease.chemical_treatments)?,
                serde_json::to_string(&disease.prevention)?,
                now,
            ],
        )?;
        let record = conn.query_row(
            &format!("SELECT {} FROM diseases WHERE name = ?1", DISEASE_COLUMNS),
            params![disease.name],
            map_disease,
        )?;
        Ok((record, existed == 0))
    }

    pub fn list_diseases(&self) -> Result<Vec<DiseaseRecord>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM diseases ORDER BY name",
            DISEASE_COLUMNS
        ))?;
        let rows = stmt.query_map([], map_disease)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn get_disease(&self, id: i64) -> Result<Option<DiseaseRecord>, RepositoryError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM diseases WHERE id = ?1", DISEASE_COLUMNS),
                params![id],
                map_disease,
            )
            .optional()?;
        Ok(record)
    }

    pub fn find_disease_by_name(&self, name: &str) -> Result<Option<DiseaseRecord>, RepositoryError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM diseases WHERE name = ?1", DISEASE_COLUMNS),
                params![name],
                map_disease,
            )
            .optional()?;
        Ok(record)
    }

    pub fn count_diseases(&self) -> Result<usize, RepositoryError> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM diseases", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    #[cfg(test)]
    pub fn delete_disease(&self, id: i64) -> Result<bool, RepositoryError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM diseases WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // ---- detections --------------------------------------------------------

    #[cfg(test)]
    pub fn insert_detection(&self, detection: &NewDetection) -> Result<DetectionRecord, RepositoryError> {
        let conn = self.conn()?;
        insert_detection_on(&conn, detection)
    }

    /// Calls `store_image` and inserts the detection it returns under one hold
    /// of the connection. If the insert fails, `discard_image` runs before the
    /// connection is released unless another detection references the image.
    pub fn insert_detection_with_image<S, D, E>(
        &self,
        store_image: S,
        discard_image: D,
    ) -> Result<DetectionRecord, E>
    where
        S: FnOnce() -> Result<NewDetection, E>,
        D: FnOnce(&str),
        E: From<RepositoryError>,
    {
        let conn = self.conn()?;
        let detection = store_image()?;
        match insert_detection_on(&conn, &detection) {
            Ok(record) => Ok(record),
            Err(e) => {
                release_if_unreferenced(&conn, &detection.image_path, discard_image);
                Err(e.into())
            }
        }
    }

    /// Newest first.
    pub fn list_detections_for_user(&self, user_id: Uuid) -> Result<Vec<DetectionRecord>, RepositoryError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM detections WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            DETECTION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![user_id.to_string()], map_detection)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Records owned by someone else are indistinguishable from missing ones.
    pub fn get_detection_for_user(
        &self,
        user_id: Uuid,
        id: i64,
    ) -> Result<Option<DetectionRecord>, RepositoryError> {
        let conn = self.conn()?;
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM detections WHERE id = ?1 AND user_id = ?2",
                    DETECTION_COLUMNS
                ),
                params![id, user_id.to_string()],
                map_detection,
            )
            .optional()?;
        Ok(record)
    }

    /// Deletes the row and returns it. Stored images are content addressed, so
    /// `release_image` only runs when no remaining detection shares the image,
    /// and it runs before the connection is released.
    pub fn delete_detection_for_user<F>(
        &self,
        user_id: Uuid,
        id: i64,
        release_image: F,
    ) -> Result<Option<DetectionRecord>, RepositoryError>
    where
        F: FnOnce(&str),
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let record = tx
            .query_row(
                &format!(
                    "SELECT {} FROM detections WHERE id = ?1 AND user_id = ?2",
                    DETECTION_COLUMNS
                ),
                params![id, user_id.to_string()],
                map_detection,
            )
            .optional()?;
        if record.is_some() {
            tx.execute(
                "DELETE FROM detections WHERE id = ?1 AND user_id = ?2",
                params![id, user_id.to_string()],
            )?;
        }
        tx.commit()?;

        if let Some(record) = &record {
            release_if_unreferenced(&conn, &record.image_path, release_image);
        }
        Ok(record)
    }
}

fn insert_detection_on(
    conn: &Connection,
    detection: &NewDetection,
) -> Result<DetectionRecord, RepositoryError> {
    if !(0.0..=1.0).contains(&detection.confidence) {
        return Err(RepositoryError::InvalidData(format!(
            "confidence {} outside [0, 1]",
            detection.confidence
        )));
    }
    let created_at = Utc::now();
    conn.execute(
        "INSERT INTO detections (user_id, image_path, disease_id, class_name, confidence, healthy, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            detection.user_id.map(|id| id.to_string()),
            detection.image_path,
            detection.disease_id,
            detection.class_name,
            detection.confidence,
            detection.healthy,
            created_at,
        ],
    )
    .map_err(map_write_error)?;
    let id = conn.last_insert_rowid();

    Ok(DetectionRecord {
        id,
        user_id: detection.user_id,
        image_path: detection.image_path.clone(),
        disease_id: detection.disease_id,
        class_name: detection.class_name.clone(),
        confidence: detection.confidence,
        healthy: detection.healthy,
        created_at,
    })
}

fn release_if_unreferenced<F>(conn: &Connection, image_path: &str, release_image: F)
where
    F: FnOnce(&str),
{
    let count = conn.query_row(
        "SELECT COUNT(*) FROM detections WHERE image_path = ?1",
        params![image_path],
        |row| row.get::<_, i64>(0),
    );
    match count {
        Ok(0) => release_image(image_path),
        Ok(_) => log::debug!("Image {} still referenced, keeping it", image_path),
        Err(e) => log::warn!("Could not check references to {}: {}", image_path, e),
    }
}

fn map_write_error(e: rusqlite::Error) -> RepositoryError {
    match &e {
        rusqlite::Error::SqliteFailure(err, msg)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            RepositoryError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
        }
        _ => RepositoryError::Sqlite(e),
    }
}

fn parse_uuid(idx: usize, value: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn parse_list(idx: usize, value: String) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&value)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: parse_uuid(0, row.get(0)?)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        is_active: row.get(6)?,
        created_at: row.get(7)?,
        last_login: row.get(8)?,
    })
}

fn map_disease(row: &Row<'_>) -> rusqlite::Result<DiseaseRecord> {
    Ok(DiseaseRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        local_name: row.get(2)?,
        description: row.get(3)?,
        symptoms: parse_list(4, row.get(4)?)?,
        organic_treatments: parse_list(5, row.get(5)?)?,
        chemical_treatments: parse_list(6, row.get(6)?)?,
        prevention: parse_list(7, row.get(7)?)?,
        created_at: Some(row.get(8)?),
        updated_at: Some(row.get(9)?),
    })
}

fn map_detection(row: &Row<'_>) -> rusqlite::Result<DetectionRecord> {
    let user_id: Option<String> = row.get(1)?;
    Ok(DetectionRecord {
        id: row.get(0)?,
        user_id: user_id.map(|id| parse_uuid(1, id)).transpose()?,
        image_path: row.get(2)?,
        disease_id: row.get(3)?,
        class_name: row.get(4)?,
        confidence: row.get(5)?,
        healthy: row.get(6)?,
        created_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    fn repo() -> SqliteRepository {
        SqliteRepository::new(open_memory_database().unwrap())
    }

    fn user(repo: &SqliteRepository, name: &str) -> User {
        let user = User::new(
            name.to_string(),
            format!("{}@example.com", name),
            "pbkdf2_sha256$1$00$00".to_string(),
            String::new(),
            String::new(),
        );
        repo.create_user(&user, &Profile::empty(user.id)).unwrap();
        user
    }

    fn disease(name: &str) -> NewDisease {
        NewDisease {
            name: name.to_string(),
            local_name: format!("{} (id)", name),
            description: "desc".to_string(),
            symptoms: vec!["a".to_string(), "b".to_string()],
            organic_treatments: vec![],
            chemical_treatments: vec!["c".to_string()],
            prevention: vec![],
        }
    }

    fn detection(user_id: Option<Uuid>, class_name: &str) -> NewDetection {
        NewDetection {
            user_id,
            image_path: "deteksi/2024/01/01/x.jpg".to_string(),
            disease_id: None,
            class_name: class_name.to_string(),
            confidence: 0.8,
            healthy: false,
        }
    }

    #[test]
    fn user_round_trips_with_profile() {
        let repo = repo();
        let created = user(&repo, "petani");
        let loaded = repo.get_user_by_username("petani").unwrap().unwrap();
        assert_eq!(loaded.id, created.id);
        assert!(loaded.is_active);
        assert!(repo.get_profile(created.id).unwrap().is_some());
        assert!(repo.username_exists("petani").unwrap());
        assert!(repo.email_exists("PETANI@example.com", None).unwrap());
        assert!(!repo.email_exists("petani@example.com", Some(created.id)).unwrap());
    }

    #[test]
    fn duplicate_username_is_a_conflict() {
        let repo = repo();
        user(&repo, "petani");
        let dup = User::new(
            "petani".to_string(),
            "other@example.com".to_string(),
            "h".to_string(),
            String::new(),
            String::new(),
        );
        let err = repo.create_user(&dup, &Profile::empty(dup.id)).unwrap_err();
        assert!(matches!(err, RepositoryError::Conflict(_)));
        // the profile insert must have rolled back with the user
        assert!(repo.get_profile(dup.id).unwrap().is_none());
    }

    #[test]
    fn upsert_disease_creates_then_updates() {
        let repo = repo();
        let (first, created) = repo.upsert_disease(&disease("Leaf Spot")).unwrap();
        assert!(created);
        assert_eq!(first.symptoms, vec!["a", "b"]);

        let mut changed = disease("Leaf Spot");
        changed.description = "updated".to_string();
        let (second, created) = repo.upsert_disease(&changed).unwrap();
        assert!(!created);
        assert_eq!(second.id, first.id);
        assert_eq!(second.description, "updated");
        assert_eq!(repo.count_diseases().unwrap(), 1);
    }

    #[test]
    fn diseases_are_listed_by_name() {
        let repo = repo();
        repo.upsert_disease(&disease("Whitefly")).unwrap();
        repo.upsert_disease(&disease("Anthracnose")).unwrap();
        let names: Vec<String> = repo
            .list_diseases()
            .unwrap()
            .into_iter()
            .map(|d| d.name)
            .collect();
        assert_eq!(names, vec!["Anthracnose", "Whitefly"]);
    }

    #[test]
    fn detections_are_scoped_to_their_owner() {
        let repo = repo();
        let alice = user(&repo, "alice");
        let bob = user(&repo, "bob");
        let record = repo.insert_detection(&detection(Some(alice.id), "Leaf Curl")).unwrap();

        assert!(repo.get_detection_for_user(alice.id, record.id).unwrap().is_some());
        assert!(repo.get_detection_for_user(bob.id, record.id).unwrap().is_none());
        assert!(repo.delete_detection_for_user(bob.id, record.id, |_| {}).unwrap().is_none());
        assert!(repo.list_detections_for_user(bob.id).unwrap().is_empty());
    }

    #[test]
    fn detections_list_newest_first() {
        let repo = repo();
        let alice = user(&repo, "alice");
        let first = repo.insert_detection(&detection(Some(alice.id), "Leaf Curl")).unwrap();
        let second = repo.insert_detection(&detection(Some(alice.id), "Whitefly")).unwrap();
        let ids: Vec<i64> = repo
            .list_detections_for_user(alice.id)
            .unwrap()
            .iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn deleted_detection_is_gone() {
        let repo = repo();
        let alice = user(&repo, "alice");
        let record = repo.insert_detection(&detection(Some(alice.id), "Leaf Curl")).unwrap();
        let deleted = repo.delete_detection_for_user(alice.id, record.id, |_| {}).unwrap();
        assert_eq!(deleted.map(|d| d.id), Some(record.id));
        assert!(repo.get_detection_for_user(alice.id, record.id).unwrap().is_none());
    }

    #[test]
    fn shared_image_is_released_with_its_last_detection() {
        let repo = repo();
        let alice = user(&repo, "alice");
        let first = repo.insert_detection(&detection(Some(alice.id), "Leaf Curl")).unwrap();
        let second = repo.insert_detection(&detection(Some(alice.id), "Leaf Curl")).unwrap();

        let mut released = Vec::new();
        repo.delete_detection_for_user(alice.id, first.id, |path| released.push(path.to_string()))
            .unwrap();
        assert!(released.is_empty());

        repo.delete_detection_for_user(alice.id, second.id, |path| released.push(path.to_string()))
            .unwrap();
        assert_eq!(released, vec![second.image_path]);
    }

    #[test]
    fn failed_insert_discards_the_fresh_image() {
        let repo = repo();
        let mut discarded = None;
        let result = repo.insert_detection_with_image(
            || -> Result<NewDetection, RepositoryError> {
                let mut bad = detection(None, "Leaf Spot");
                bad.confidence = 2.0;
                Ok(bad)
            },
            |path| discarded = Some(path.to_string()),
        );
        assert!(matches!(result, Err(RepositoryError::InvalidData(_))));
        assert_eq!(discarded.as_deref(), Some("deteksi/2024/01/01/x.jpg"));
    }

    #[test]
    fn removing_a_disease_unlinks_detections() {
        let repo = repo();
        let alice = user(&repo, "alice");
        let (spot, _) = repo.upsert_disease(&disease("Leaf Spot")).unwrap();
        let mut new = detection(Some(alice.id), "Leaf Spot");
        new.disease_id = Some(spot.id);
        let record = repo.insert_detection(&new).unwrap();

        assert!(repo.delete_disease(spot.id).unwrap());
        let reloaded = repo.get_detection_for_user(alice.id, record.id).unwrap().unwrap();
        assert_eq!(reloaded.disease_id, None);
        assert_eq!(reloaded.class_name, "Leaf Spot");
    }

    #[test]
    fn out_of_range_confidence_is_rejected() {
        let repo = repo();
        let mut bad = detection(None, "Leaf Spot");
        bad.confidence = 1.5;
        assert!(matches!(
            repo.insert_detection(&bad),
            Err(RepositoryError::InvalidData(_))
        ));
    }
}
