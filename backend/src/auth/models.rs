use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{Profile, User};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub username: String,
    pub email: String,
}

impl From<&User> for AuthUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub username: String,
    pub email: String,
    /// Token id, the handle used for logout revocation.
    pub jti: String,
    pub exp: usize,
    pub iat: usize,
}

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub username: String,
    pub email: String,
    pub foto_profil: Option<String>,
    pub nomor_telepon: String,
    pub alamat: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub profil: Option<ProfileView>,
}

impl UserView {
    pub fn new(user: &User, profile: Option<&Profile>) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            email: user.email.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            profil: profile.map(|p| ProfileView {
                username: user.username.clone(),
                email: user.email.clone(),
                foto_profil: p.photo.clone(),
                nomor_telepon: p.phone.clone(),
                alamat: p.address.clone(),
                created_at: p.created_at,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub sukses: bool,
    pub pesan: String,
    pub token: String,
    pub user: UserView,
}
