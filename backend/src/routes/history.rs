use actix_web::{web, HttpResponse};

use crate::auth::AuthenticatedUser;
use crate::error::ApiError;
use crate::history::HistoryService;

pub async fn list_history(
    user: AuthenticatedUser,
    history: web::Data<HistoryService>,
) -> Result<HttpResponse, ApiError> {
    let history = history.into_inner();
    let entries = web::block(move || history.list_history(user.0)).await??;
    Ok(HttpResponse::Ok().json(entries))
}

pub async fn get_history(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    history: web::Data<HistoryService>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let history = history.into_inner();
    let entry = web::block(move || history.get_history(user.0, id)).await??;
    Ok(HttpResponse::Ok().json(entry))
}

pub async fn delete_history(
    user: AuthenticatedUser,
    path: web::Path<i64>,
    history: web::Data<HistoryService>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();
    let history = history.into_inner();
    web::block(move || history.delete_history(user.0, id)).await??;
    Ok(HttpResponse::NoContent().finish())
}
