use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::api_error::ApiError;
use crate::models::registration::RegistrationActionRequest;
use crate::service::RegistrationService;

pub async fn register(
    service: web::Data<RegistrationService>,
    path: web::Path<Uuid>,
    payload: web::Json<RegistrationActionRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = service.register(path.into_inner(), payload.user_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn cancel(
    service: web::Data<RegistrationService>,
    path: web::Path<Uuid>,
    payload: web::Json<RegistrationActionRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = service.cancel(path.into_inner(), payload.user_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn check_in(
    service: web::Data<RegistrationService>,
    path: web::Path<Uuid>,
    payload: web::Json<RegistrationActionRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = service.check_in(path.into_inner(), payload.user_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn check_out(
    service: web::Data<RegistrationService>,
    path: web::Path<Uuid>,
    payload: web::Json<RegistrationActionRequest>,
) -> Result<HttpResponse, ApiError> {
    let response = service.check_out(path.into_inner(), payload.user_id).await?;
    Ok(HttpResponse::Ok().json(response))
}

pub async fn list_registrations(
    service: web::Data<RegistrationService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let roster = service.list_registrations(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(roster))
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/sessions/{id}/register", web::post().to(register))
        .route("/sessions/{id}/cancel", web::post().to(cancel))
        .route("/sessions/{id}/checkin", web::post().to(check_in))
        .route("/sessions/{id}/checkout", web::post().to(check_out))
        .route(
            "/sessions/{id}/registrations",
            web::get().to(list_registrations),
        );
}
