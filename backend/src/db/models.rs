use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    pub fn new(
        username: String,
        email: String,
        password_hash: String,
        first_name: String,
        last_name: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            first_name,
            last_name,
            is_active: true,
            created_at: Utc::now(),
            last_login: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Profile {
    pub user_id: Uuid,
    pub photo: Option<String>,
    pub phone: String,
    pub address: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn empty(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            photo: None,
            phone: String::new(),
            address: String::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Catalog entry for one disease class, keyed by its English name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiseaseRecord {
    pub id: i64,
    #[serde(rename = "nama")]
    pub name: String,
    #[serde(rename = "nama_indonesia")]
    pub local_name: String,
    #[serde(rename = "deskripsi")]
    pub description: String,
    #[serde(rename = "gejala")]
    pub symptoms: Vec<String>,
    #[serde(rename = "penanganan_organik")]
    pub organic_treatments: Vec<String>,
    #[serde(rename = "penanganan_kimia")]
    pub chemical_treatments: Vec<String>,
    #[serde(rename = "pencegahan")]
    pub prevention: Vec<String>,
    #[serde(skip)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Insert/update payload for the catalog.
#[derive(Debug, Clone)]
pub struct NewDisease {
    pub name: String,
    pub local_name: String,
    pub description: String,
    pub symptoms: Vec<String>,
    pub organic_treatments: Vec<String>,
    pub chemical_treatments: Vec<String>,
    pub prevention: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRecord {
    pub id: i64,
    pub user_id: Option<Uuid>,
    pub image_path: String,
    pub disease_id: Option<i64>,
    pub class_name: String,
    pub confidence: f64,
    pub healthy: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDetection {
    pub user_id: Option<Uuid>,
    pub image_path: String,
    pub disease_id: Option<i64>,
    pub class_name: String,
    pub confidence: f64,
    pub healthy: bool,
}
