use actix_web::{web, HttpResponse};
use shared::{ClassItem, ClassListResponse};

use crate::db::SqliteRepository;
use crate::diagnosis::known_classes;
use crate::error::ApiError;

pub async fn list_classes(repo: web::Data<SqliteRepository>) -> Result<HttpResponse, ApiError> {
    let repo = repo.into_inner();
    let classes = web::block(move || known_classes(&repo)).await??;

    let classes: Vec<ClassItem> = classes
        .into_iter()
        .map(|info| ClassItem {
            class_name: info.name,
            local_name: info.local_name,
            description: info.description,
        })
        .collect();

    Ok(HttpResponse::Ok().json(ClassListResponse {
        success: true,
        count: classes.len(),
        classes,
    }))
}

pub async fn list_diseases(repo: web::Data<SqliteRepository>) -> Result<HttpResponse, ApiError> {
    let repo = repo.into_inner();
    let diseases = web::block(move || repo.list_diseases()).await??;
    Ok(HttpResponse::Ok().json(diseases))
}

pub async fn get_disease(
    path: web::Path<i64>,
    repo: web::Data<SqliteRepository>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let repo = repo.into_inner();
    let disease = web::block(move || repo.get_disease(id))
        .await??
        .ok_or_else(|| ApiError::NotFound("Penyakit tidak ditemukan.".to_string()))?;
    Ok(HttpResponse::Ok().json(disease))
}
