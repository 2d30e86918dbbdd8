use actix_web::{web, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use chrono::Utc;
use log::info;
use shared::{LoginRequest, MessageResponse, ProfileUpdateRequest, RegisterRequest};

use crate::db::models::{Profile, User};
use crate::db::{RepositoryError, SqliteRepository};
use crate::error::ApiError;

use super::jwt::JwtService;
use super::middleware::AuthenticatedUser;
use super::models::{AuthResponse, AuthUser, UserView};
use super::password::{validate_password, PasswordHasher};

fn invalid_credentials() -> ApiError {
    ApiError::Unauthorized("Username atau password salah.".to_string())
}

fn normalize_email(raw: &str) -> Result<String, ApiError> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(email),
        _ => Err(ApiError::BadRequest("Format email tidak valid.".to_string())),
    }
}

fn load_user(repo: &SqliteRepository, user: AuthenticatedUser) -> Result<User, ApiError> {
    repo.get_user_by_id(user.0)?
        .ok_or_else(|| ApiError::NotFound("Pengguna tidak ditemukan.".to_string()))
}

pub async fn register(
    body: web::Json<RegisterRequest>,
    repo: web::Data<SqliteRepository>,
    jwt_service: web::Data<JwtService>,
    hasher: web::Data<PasswordHasher>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let username = request.username.trim().to_string();
    if username.is_empty() || request.email.trim().is_empty() {
        return Err(ApiError::BadRequest("Username dan email wajib diisi.".to_string()));
    }
    let email = normalize_email(&request.email)?;
    if request.password != request.password2 {
        return Err(ApiError::BadRequest("Password tidak cocok.".to_string()));
    }
    validate_password(&request.password)?;

    let repo = repo.into_inner();
    let hasher = hasher.into_inner();
    let (user, profile) = web::block(move || -> Result<(User, Profile), ApiError> {
        if repo.username_exists(&username)? {
            return Err(ApiError::BadRequest("Username sudah digunakan.".to_string()));
        }
        if repo.email_exists(&email, None)? {
            return Err(ApiError::BadRequest("Email sudah terdaftar.".to_string()));
        }

        let user = User::new(
            username,
            email,
            hasher.hash(&request.password),
            request.first_name.trim().to_string(),
            request.last_name.trim().to_string(),
        );
        let profile = Profile::empty(user.id);
        repo.create_user(&user, &profile).map_err(|e| match e {
            RepositoryError::Conflict(_) => {
                ApiError::BadRequest("Username atau email sudah terdaftar.".to_string())
            }
            other => other.into(),
        })?;
        Ok((user, profile))
    })
    .await??;

    let token = jwt_service.generate_token(&AuthUser::from(&user))?;
    info!("Registered user {} ({})", user.username, user.id);

    Ok(HttpResponse::Created().json(AuthResponse {
        sukses: true,
        pesan: "Registrasi berhasil.".to_string(),
        token,
        user: UserView::new(&user, Some(&profile)),
    }))
}

pub async fn login(
    body: web::Json<LoginRequest>,
    repo: web::Data<SqliteRepository>,
    jwt_service: web::Data<JwtService>,
    hasher: web::Data<PasswordHasher>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    let repo = repo.into_inner();
    let hasher = hasher.into_inner();
    let (user, profile) = web::block(move || -> Result<(User, Option<Profile>), ApiError> {
        let Some(user) = repo.get_user_by_username(request.username.trim())? else {
            return Err(invalid_credentials());
        };
        if !hasher.verify(&request.password, &user.password_hash)? {
            log::warn!("Failed login for user {}", user.username);
            return Err(invalid_credentials());
        }
        if !user.is_active {
            return Err(ApiError::Unauthorized("Akun tidak aktif.".to_string()));
        }

        repo.update_last_login(user.id, Utc::now())?;
        let profile = repo.get_profile(user.id)?;
        Ok((user, profile))
    })
    .await??;

    let token = jwt_service.generate_token(&AuthUser::from(&user))?;
    info!("User {} logged in", user.username);

    Ok(HttpResponse::Ok().json(AuthResponse {
        sukses: true,
        pesan: "Login berhasil.".to_string(),
        token,
        user: UserView::new(&user, profile.as_ref()),
    }))
}

pub async fn logout(
    auth: BearerAuth,
    jwt_service: web::Data<JwtService>,
) -> Result<HttpResponse, ApiError> {
    let claims = jwt_service
        .revoke_token(auth.token())
        .map_err(|_| ApiError::Unauthorized("Token tidak valid.".to_string()))?;
    info!("User {} logged out", claims.sub);
    Ok(HttpResponse::Ok().json(MessageResponse::ok("Logout berhasil.")))
}

pub async fn profile(
    user: AuthenticatedUser,
    repo: web::Data<SqliteRepository>,
) -> Result<HttpResponse, ApiError> {
    let repo = repo.into_inner();
    let (account, profile) = web::block(move || -> Result<(User, Option<Profile>), ApiError> {
        let account = load_user(&repo, user)?;
        let profile = repo.get_profile(account.id)?;
        Ok((account, profile))
    })
    .await??;
    Ok(HttpResponse::Ok().json(UserView::new(&account, profile.as_ref())))
}

pub async fn update_profile(
    user: AuthenticatedUser,
    body: web::Json<ProfileUpdateRequest>,
    repo: web::Data<SqliteRepository>,
) -> Result<HttpResponse, ApiError> {
    let update = body.into_inner();
    let repo = repo.into_inner();
    let (account, profile) = web::block(move || apply_profile_update(&repo, user, update)).await??;

    info!("Updated profile for user {}", account.username);
    Ok(HttpResponse::Ok().json(UserView::new(&account, Some(&profile))))
}

fn apply_profile_update(
    repo: &SqliteRepository,
    user: AuthenticatedUser,
    update: ProfileUpdateRequest,
) -> Result<(User, Profile), ApiError> {
    let mut account = load_user(repo, user)?;

    if let Some(raw) = update.email {
        let email = normalize_email(&raw)?;
        if email != account.email && repo.email_exists(&email, Some(account.id))? {
            return Err(ApiError::BadRequest("Email sudah terdaftar.".to_string()));
        }
        account.email = email;
    }
    if let Some(first_name) = update.first_name {
        account.first_name = first_name.trim().to_string();
    }
    if let Some(last_name) = update.last_name {
        account.last_name = last_name.trim().to_string();
    }
    repo.update_user_details(account.id, &account.email, &account.first_name, &account.last_name)?;

    let mut profile = repo
        .get_profile(account.id)?
        .unwrap_or_else(|| Profile::empty(account.id));
    if let Some(phone) = update.nomor_telepon {
        profile.phone = phone.trim().to_string();
    }
    if let Some(address) = update.alamat {
        profile.address = address.trim().to_string();
    }
    profile.updated_at = Utc::now();
    repo.update_profile(&profile)?;
    Ok((account, profile))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Tani@Example.COM ").unwrap(), "tani@example.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for raw in ["", "tani", "@example.com", "tani@localhost"] {
            assert!(normalize_email(raw).is_err(), "{raw} accepted");
        }
    }
}
